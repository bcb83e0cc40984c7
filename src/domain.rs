use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// one accepted sensor observation
///
/// `distance` and `state` are kept exactly as the device sent them.
/// `timestamp` is stamped by the relay when the line is accepted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    /// distance in centimeters, unclamped
    pub distance: serde_json::Number,

    /// signal label, usually RED / YELLOW / GREEN
    pub state: String,

    /// receipt time, ISO-8601 UTC with millisecond precision
    #[serde(serialize_with = "serialize_iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// build a reading stamped with the current time
    pub fn stamp(distance: serde_json::Number, state: String) -> Self {
        Self {
            distance,
            state,
            timestamp: Utc::now(),
        }
    }

    /// the safe value served before the device has sent anything
    pub fn initial() -> Self {
        Self::stamp(serde_json::Number::from(0), SignalState::Green.label().to_string())
    }

    pub fn signal(&self) -> SignalState {
        SignalState::from_label(&self.state)
    }
}

/// classification of the `state` label
///
/// derived on demand; the reading always keeps the raw label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalState {
    Red,
    Yellow,
    Green,
    Unrecognized,
}

impl SignalState {
    pub fn from_label(label: &str) -> Self {
        match label {
            "RED" => Self::Red,
            "YELLOW" => Self::Yellow,
            "GREEN" => Self::Green,
            _ => Self::Unrecognized,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
            Self::Unrecognized => "UNKNOWN",
        }
    }
}

/// format a timestamp the way browsers print `Date#toISOString`
pub fn iso_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_iso_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&iso_millis(ts))
}
