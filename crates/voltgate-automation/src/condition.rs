//! Evaluator for vehicle-state trigger conditions.
//!
//! The condition language is deliberately tiny. Exactly three shapes are
//! recognized:
//!
//! ```text
//! battery_level < 20
//! battery_level > 80
//! charging_state = Charging
//! ```
//!
//! Anything else is an [`InvalidRuleCondition`] error; the engine treats
//! that as "does not match" so a malformed rule can never take down the
//! monitoring loop.
//!
//! [`InvalidRuleCondition`]: voltgate_core::GatewayErrorKind::InvalidRuleCondition

use voltgate_core::{GatewayError, VehicleSnapshot};

/// Evaluates a condition expression against a snapshot.
pub fn evaluate(expression: &str, snapshot: &VehicleSnapshot) -> Result<bool, GatewayError> {
    let trimmed = expression.trim();

    if let Some(rest) = strip_field(trimmed, "battery_level") {
        if let Some(value) = rest.strip_prefix('<') {
            return Ok(snapshot.charge.battery_level < threshold(trimmed, value)?);
        }
        if let Some(value) = rest.strip_prefix('>') {
            return Ok(snapshot.charge.battery_level > threshold(trimmed, value)?);
        }
    }

    if let Some(rest) = strip_field(trimmed, "charging_state") {
        let value = rest
            .strip_prefix("==")
            .or_else(|| rest.strip_prefix('='))
            .map(str::trim);
        if let Some(expected) = value {
            return Ok(snapshot
                .charge
                .charging_state
                .as_str()
                .eq_ignore_ascii_case(expected));
        }
    }

    Err(unsupported(trimmed))
}

fn strip_field<'a>(expression: &'a str, field: &str) -> Option<&'a str> {
    expression.strip_prefix(field).map(str::trim_start)
}

fn threshold(expression: &str, value: &str) -> Result<f64, GatewayError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| unsupported(expression))
}

fn unsupported(expression: &str) -> GatewayError {
    GatewayError::invalid_rule_condition(format!(
        "condition `{expression}` is not a recognized shape"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltgate_core::{
        ChargeState, ChargingState, ClimateState, ConnectivityState, DriveState, GatewayErrorKind,
        SecurityState, ShiftState, UtcDateTime, VehicleId, VehicleSnapshot,
    };

    fn snapshot(battery_level: f64, charging_state: ChargingState) -> VehicleSnapshot {
        VehicleSnapshot::new(
            VehicleId::parse("veh-1").expect("valid id"),
            "Test",
            ConnectivityState::Online,
            ChargeState::new(battery_level, charging_state, 200.0, 0.0, None)
                .expect("valid charge state"),
            ClimateState::new(false, None, None).expect("valid climate state"),
            SecurityState::new(true, false, 1_000.0, "2024.8.7").expect("valid security state"),
            DriveState::new(52.0, 13.0, ShiftState::Park, None).expect("valid drive state"),
            UtcDateTime::now(),
        )
    }

    #[test]
    fn battery_comparisons_match_boundaries_strictly() {
        let low = snapshot(15.0, ChargingState::Disconnected);
        assert!(evaluate("battery_level < 20", &low).expect("evaluates"));
        assert!(!evaluate("battery_level < 15", &low).expect("evaluates"));
        assert!(evaluate("battery_level > 10", &low).expect("evaluates"));
        assert!(!evaluate("battery_level > 15", &low).expect("evaluates"));
    }

    #[test]
    fn charging_state_equality_ignores_case_and_accepts_double_equals() {
        let charging = snapshot(50.0, ChargingState::Charging);
        assert!(evaluate("charging_state = Charging", &charging).expect("evaluates"));
        assert!(evaluate("charging_state == charging", &charging).expect("evaluates"));
        assert!(!evaluate("charging_state = Complete", &charging).expect("evaluates"));
    }

    #[test]
    fn whitespace_around_the_expression_is_tolerated() {
        let low = snapshot(15.0, ChargingState::Disconnected);
        assert!(evaluate("  battery_level<20 ", &low).expect("evaluates"));
    }

    #[test]
    fn unknown_shapes_are_invalid_rule_conditions() {
        let low = snapshot(15.0, ChargingState::Disconnected);
        for expression in [
            "doors = open",
            "battery_level = 20",
            "battery_level < twenty",
            "",
        ] {
            let error = evaluate(expression, &low).expect_err("must fail");
            assert_eq!(error.kind(), GatewayErrorKind::InvalidRuleCondition);
        }
    }
}
