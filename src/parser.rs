//! ==============================================================================
//! parser.rs - classify device lines
//! ==============================================================================
//!
//! purpose:
//!     decides what a single framed line is:
//!     - a reading: `{"distance": <number>, "state": <string>, ...}`
//!     - diagnostic text: anything not starting with `{` (banners, debug prints)
//!     - malformed: starts with `{` but is not a usable reading
//!
//! the parser never touches the cache; it only reports what it saw.
//! a line missing either field is dropped whole, never merged into the
//! previous reading.
//!
//! ==============================================================================

use crate::domain::Reading;
use serde_json::Value;

/// Outcome of classifying one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// a usable reading, stamped at parse time
    Reading(Reading),
    /// non-JSON device text
    Diagnostic { text: String, suppressed: bool },
    /// JSON-looking line that could not be used
    Malformed { line: String, reason: String },
}

/// Classifies lines, knowing which device banners to keep quiet about
#[derive(Debug, Clone)]
pub struct ReadingParser {
    suppressed: Vec<String>,
}

impl ReadingParser {
    pub fn new(suppressed: Vec<String>) -> Self {
        Self { suppressed }
    }

    pub fn classify(&self, line: &str) -> LineOutcome {
        let trimmed = line.trim();

        if !trimmed.starts_with('{') {
            let suppressed = trimmed.is_empty() || self.is_suppressed(trimmed);
            return LineOutcome::Diagnostic {
                text: trimmed.to_string(),
                suppressed,
            };
        }

        match parse_fields(trimmed) {
            Ok((distance, state)) => LineOutcome::Reading(Reading::stamp(distance, state)),
            Err(reason) => LineOutcome::Malformed {
                line: trimmed.to_string(),
                reason,
            },
        }
    }

    fn is_suppressed(&self, text: &str) -> bool {
        self.suppressed.iter().any(|s| !s.is_empty() && text.contains(s.as_str()))
    }
}

fn parse_fields(json: &str) -> Result<(serde_json::Number, String), String> {
    let value: Value = serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(mut fields) = value else {
        return Err("not a JSON object".to_string());
    };

    let distance = match fields.remove("distance") {
        Some(Value::Number(n)) => n,
        Some(_) => return Err("distance is not a number".to_string()),
        None => return Err("missing distance".to_string()),
    };
    let state = match fields.remove("state") {
        Some(Value::String(s)) => s,
        Some(_) => return Err("state is not a string".to_string()),
        None => return Err("missing state".to_string()),
    };

    Ok((distance, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parser() -> ReadingParser {
        ReadingParser::new(vec![
            "Traffic Light System Initialized".into(),
            "Monitoring traffic".into(),
        ])
    }

    fn expect_reading(outcome: LineOutcome) -> Reading {
        match outcome {
            LineOutcome::Reading(r) => r,
            other => panic!("expected a reading, got {other:?}"),
        }
    }

    #[test]
    fn valid_line_keeps_sensor_values() {
        let before = Utc::now();
        let r = expect_reading(parser().classify(r#"{"distance": 12.5, "state": "GREEN"}"#));
        assert_eq!(r.distance.as_f64(), Some(12.5));
        assert_eq!(r.state, "GREEN");
        assert!(r.timestamp >= before);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let r = expect_reading(parser().classify("  {\"distance\": 7, \"state\": \"RED\"}\r"));
        assert_eq!(r.distance.as_i64(), Some(7));
        assert_eq!(r.state, "RED");
    }

    #[test]
    fn sensor_timestamp_is_not_copied() {
        let r = expect_reading(parser().classify(
            r#"{"distance": 3, "state": "YELLOW", "timestamp": "1999-01-01T00:00:00.000Z"}"#,
        ));
        assert!(r.timestamp.timestamp() > 1_700_000_000);
    }

    #[test]
    fn unknown_state_passes_through_verbatim() {
        let r = expect_reading(parser().classify(r#"{"distance": -4, "state": "BLINKING"}"#));
        assert_eq!(r.state, "BLINKING");
        assert_eq!(r.distance.as_i64(), Some(-4));
    }

    #[test]
    fn known_banner_is_suppressed() {
        assert_eq!(
            parser().classify("Traffic Light System Initialized"),
            LineOutcome::Diagnostic {
                text: "Traffic Light System Initialized".into(),
                suppressed: true,
            }
        );
        assert!(matches!(
            parser().classify("Monitoring traffic..."),
            LineOutcome::Diagnostic { suppressed: true, .. }
        ));
    }

    #[test]
    fn other_text_is_surfaced() {
        assert!(matches!(
            parser().classify("sensor warming up"),
            LineOutcome::Diagnostic { suppressed: false, .. }
        ));
    }

    #[test]
    fn blank_lines_are_quiet() {
        assert!(matches!(
            parser().classify("   "),
            LineOutcome::Diagnostic { suppressed: true, .. }
        ));
    }

    #[test]
    fn missing_state_is_malformed() {
        match parser().classify(r#"{"distance": 40}"#) {
            LineOutcome::Malformed { reason, .. } => assert_eq!(reason, "missing state"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_distance_is_malformed() {
        assert!(matches!(
            parser().classify(r#"{"state": "RED"}"#),
            LineOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn truncated_json_is_malformed() {
        assert!(matches!(
            parser().classify(r#"{"distance": 12.5, "sta"#),
            LineOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        assert!(matches!(
            parser().classify(r#"{"distance": "12", "state": "RED"}"#),
            LineOutcome::Malformed { .. }
        ));
        assert!(matches!(
            parser().classify(r#"{"distance": 12, "state": 1}"#),
            LineOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn json_array_is_diagnostic_not_malformed() {
        // only `{` marks a line as an attempted reading
        assert!(matches!(
            parser().classify("[1, 2]"),
            LineOutcome::Diagnostic { suppressed: false, .. }
        ));
    }
}
