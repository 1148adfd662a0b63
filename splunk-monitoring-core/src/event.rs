//! Event model shared by the client and every transport
//!
//! An [`Event`] is built, handed to a transport and dropped within a single
//! logging call. It carries no identity of its own.
//!
//! ## Payload precedence
//!
//! Payloads are assembled by successive merges into an [`EventData`] map, so a
//! later source overwrites an earlier one on key conflicts:
//!
//! ```text
//! environment context  <  error fields  <  data  <  extra  <  enrichment
//! ```

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Category used by metric events.
pub const TRACK: &str = "Track";
/// Category used by errors logged through `log_error`.
pub const UNKNOWN_ERROR: &str = "UnknownError";
/// Category used by failed GraphQL queries.
pub const QUERY_ERROR: &str = "QueryError";
/// Category used by failed GraphQL mutations.
pub const MUTATION_ERROR: &str = "MutationError";

// ============================================
// Levels
// ============================================

/// Event severity, fixed per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Error => "Error",
        }
    }
}

/// Event importance, fixed per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Importance {
    Important,
    Critical,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Important => "Important",
            Importance::Critical => "Critical",
        }
    }
}

// ============================================
// Payload
// ============================================

/// A single payload value.
///
/// `Undefined` marks a key that exists but carries nothing; it is dropped when
/// the payload is written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Bool(bool),
    Undefined,
}

impl FieldValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts to JSON, `None` for `Undefined` and non-finite numbers.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            FieldValue::String(s) => Some(serde_json::Value::String(s.clone())),
            FieldValue::Bool(b) => Some(serde_json::Value::Bool(*b)),
            FieldValue::Number(n) => number_to_json(*n),
            FieldValue::Undefined => None,
        }
    }
}

fn number_to_json(n: f64) -> Option<serde_json::Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(serde_json::Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(serde_json::Value::Number)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Undefined => f.write_str("undefined"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Number(value as f64)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Undefined)
    }
}

/// Structured event payload keyed by field name.
pub type EventData = BTreeMap<String, FieldValue>;

/// Builds an [`EventData`] map from `key => value` pairs.
///
/// ```
/// use splunk_monitoring_core::event_data;
///
/// let data = event_data! { "userId" => "9876", "attempt" => 2 };
/// assert_eq!(data.len(), 2);
/// ```
#[macro_export]
macro_rules! event_data {
    () => { $crate::event::EventData::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut data = $crate::event::EventData::new();
        $( data.insert(::std::string::String::from($key), $crate::event::FieldValue::from($value)); )+
        data
    }};
}

/// Converts a payload to a JSON object, dropping `Undefined` keys.
pub fn payload_to_json(payload: &EventData) -> serde_json::Map<String, serde_json::Value> {
    payload
        .iter()
        .filter_map(|(key, value)| value.to_json().map(|v| (key.clone(), v)))
        .collect()
}

// ============================================
// Event
// ============================================

/// A shaped telemetry event, ready for a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub importance: Importance,
    pub severity: Severity,
    /// Action label: `Track`, `UnknownError`, a GraphQL error kind, ...
    pub category: String,
    /// Call site or component; may be empty
    pub instance: String,
    pub payload: EventData,
    /// Routing field taken from the environment context
    pub account: String,
}

// ============================================
// Error rendering
// ============================================

/// Renders an error for the `error` payload field.
///
/// Errors with a `source()` chain are rendered as a trace, one cause per line.
/// Errors without one fall back to their `Debug` form, which is the closest
/// thing to a serialized representation a bare `std::error::Error` offers.
pub fn error_trace(error: &(dyn std::error::Error + 'static)) -> String {
    let Some(mut source) = error.source() else {
        return format!("{:?}", error);
    };

    let mut trace = error.to_string();
    loop {
        trace.push_str("\n  caused by: ");
        trace.push_str(&source.to_string());
        match source.source() {
            Some(next) => source = next,
            None => break,
        }
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Leaf;

    impl fmt::Display for Leaf {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk full")
        }
    }

    impl std::error::Error for Leaf {}

    #[derive(Debug)]
    struct Outer(Leaf);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("failed to save")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_trace_without_source_uses_debug() {
        assert_eq!(error_trace(&Leaf), "Leaf");
    }

    #[test]
    fn test_error_trace_renders_cause_chain() {
        let trace = error_trace(&Outer(Leaf));
        assert_eq!(trace, "failed to save\n  caused by: disk full");
    }

    #[test]
    fn test_payload_to_json_drops_undefined() {
        let data = event_data! {
            "name" => "checkout",
            "count" => 3,
            "ratio" => 0.5,
            "missing" => None::<String>,
        };

        let json = payload_to_json(&data);
        assert_eq!(json.len(), 3);
        assert_eq!(json["count"], serde_json::json!(3));
        assert_eq!(json["ratio"], serde_json::json!(0.5));
        assert!(!json.contains_key("missing"));
    }

    #[test]
    fn test_level_names() {
        assert_eq!(Severity::Info.as_str(), "Info");
        assert_eq!(Importance::Critical.as_str(), "Critical");
        assert_eq!(
            serde_json::to_string(&Importance::Important).unwrap(),
            "\"Important\""
        );
    }
}
