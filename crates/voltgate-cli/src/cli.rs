//! CLI argument definitions for Voltgate.
//!
//! This module contains the command-line interface structure using Clap.
//! The CLI covers vehicle reads, command dispatch, automation rule
//! management and the foreground monitoring loop.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `status` | Show the current vehicle state snapshot |
//! | `vehicles` | List vehicles from the active provider |
//! | `command` | Execute a named command on the vehicle |
//! | `wake` | Wake the vehicle up |
//! | `rules` | Manage automation rules |
//! | `monitor` | Run the automation engine until interrupted |
//! | `providers` | Show provider availability and rate budgets |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `$VOLTGATE_CONFIG` or `voltgate.json` | Config file path |
//! | `--mock` | `false` | Deterministic offline providers |
//! | `--vehicle` | configured default | Vehicle to target |
//! | `--format` | `table` | Output format (table, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Latest snapshot for the configured vehicle
//! voltgate status
//!
//! # Bypass the snapshot cache
//! voltgate status --no-cache --format json --pretty
//!
//! # Honk, with provider parameters
//! voltgate command honk_horn
//! voltgate command set_charge_limit --params '{"percent": 80}'
//!
//! # Manage rules
//! voltgate rules list
//! voltgate rules add --file low-battery.json
//!
//! # Run the automation engine in the foreground
//! voltgate monitor --interval-secs 30
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// 🦀 Voltgate - Vehicle API gateway and automation CLI
///
/// Talk to your vehicle through whichever provider (Tessie, TeslaFi) is
/// configured, with failover, rate limiting and a snapshot cache in between.
#[derive(Debug, Parser)]
#[command(
    name = "voltgate",
    author,
    version,
    about = "Vehicle API gateway and automation CLI",
    long_about = "Voltgate fronts third-party vehicle data providers behind one \
normalized interface. Features include:\n\
\n\
  • Provider failover (Tessie, TeslaFi) with sticky switching\n\
  • Per-provider rate budgets and a dedicated wake budget\n\
  • Snapshot caching with stale fallback\n\
  • Persisted automation rules and a monitoring engine\n\
\n\
Use 'voltgate <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Config file path (default: $VOLTGATE_CONFIG, then ./voltgate.json).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use deterministic built-in providers instead of the network.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Vehicle to target, overriding the configured default vehicle.
    #[arg(long, global = true, value_name = "VEHICLE_ID")]
    pub vehicle: Option<String>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned key/value lines for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// 🔋 Show the current vehicle state snapshot.
    ///
    /// Serves from the snapshot cache when the entry is fresh; pass
    /// --no-cache to force a provider call.
    ///
    /// # Examples
    ///
    ///   voltgate status
    ///   voltgate status --no-cache --format json
    Status(StatusArgs),

    /// 🚗 List vehicles known to the active provider.
    Vehicles,

    /// 📡 Execute a named command on the vehicle.
    ///
    /// The vehicle is woken first when it is asleep or offline. Command
    /// names and parameters pass through to the provider unchanged.
    ///
    /// # Examples
    ///
    ///   voltgate command honk_horn
    ///   voltgate command set_charge_limit --params '{"percent": 80}'
    Command(CommandArgs),

    /// ⏰ Wake the vehicle up.
    ///
    /// Wakes draw from a separate, much smaller rate budget than regular
    /// calls.
    Wake,

    /// 🤖 Manage automation rules.
    Rules(RulesArgs),

    /// 👀 Run the automation engine in the foreground until ctrl-c.
    ///
    /// Evaluates vehicle-state rules and time-of-day schedules on their
    /// configured intervals and executes matching rules.
    Monitor(MonitorArgs),

    /// 🔌 Show provider availability, the active provider and budgets.
    Providers,
}

/// Arguments for the `status` command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Skip the snapshot cache and call the provider.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

/// Arguments for the `command` command.
#[derive(Debug, Args)]
pub struct CommandArgs {
    /// Provider command name (e.g. honk_horn, flash_lights).
    pub name: String,

    /// Command parameters as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub params: Option<String>,
}

/// Arguments for the `rules` command group.
#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

/// Rule management subcommands.
#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List all automation rules.
    List,

    /// Show one rule by id.
    Show(RuleIdArgs),

    /// Add a rule from a JSON definition file.
    ///
    /// The file holds name, optional description, trigger and actions:
    ///
    ///   {"name": "Low battery", "trigger": {"trigger": "vehicle_state",
    ///    "condition": "battery_level < 20"}, "actions": [...]}
    Add(RuleAddArgs),

    /// Enable a rule.
    Enable(RuleIdArgs),

    /// Disable a rule without deleting it.
    Disable(RuleIdArgs),

    /// Delete a rule permanently.
    Delete(RuleIdArgs),

    /// Fire a location or calendar rule on behalf of an external
    /// integration. Other trigger kinds are refused.
    Trigger(RuleIdArgs),
}

/// Arguments addressing one rule.
#[derive(Debug, Args)]
pub struct RuleIdArgs {
    /// Rule id (UUID).
    pub id: String,
}

/// Arguments for `rules add`.
#[derive(Debug, Args)]
pub struct RuleAddArgs {
    /// Path to the JSON rule definition.
    #[arg(long, value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for the `monitor` command.
#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Override both pass intervals, in seconds.
    #[arg(long, value_name = "N")]
    pub interval_secs: Option<u64>,
}
