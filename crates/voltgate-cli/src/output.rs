use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(value: &Value, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(value)?
            } else {
                serde_json::to_string(value)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(value)?),
    }

    Ok(())
}

/// Aligned `key : value` lines for top-level scalars; nested objects and
/// arrays are printed as indented pretty JSON under their key.
fn render_table(value: &Value) -> Result<String, CliError> {
    let Value::Object(map) = value else {
        return Ok(format!("{}\n", serde_json::to_string_pretty(value)?));
    };

    let width = map
        .iter()
        .filter(|(_, entry)| !entry.is_object() && !entry.is_array())
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (key, entry) in map {
        match entry {
            Value::Object(_) | Value::Array(_) => {
                out.push_str(key);
                out.push_str(":\n");
                for line in serde_json::to_string_pretty(entry)?.lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            scalar => {
                out.push_str(&format!("{key:width$} : {}\n", display_scalar(scalar)));
            }
        }
    }
    Ok(out)
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
