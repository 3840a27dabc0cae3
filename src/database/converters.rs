//! Outbound converter table.
//!
//! Some backends have no native type for a value the variable layer produces.
//! A [`WireConverters`] value says which of those are rendered as text (or as
//! integers) before binding. It is built once per adapter and handed to each
//! connection through [`ConnectionConfig`](super::ConnectionConfig).

use crate::value::{
    format_interval, Value, DATETIME_FORMAT, DATETIME_TZ_FORMAT, DATE_FORMAT, TIME_FORMAT,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireConverters {
    /// Intervals become `"<d> days HH:MM:SS.ffffff"`.
    pub interval_as_text: bool,
    /// Dates, times and datetimes become ISO-style text.
    pub temporal_as_text: bool,
    pub decimal_as_text: bool,
    pub json_as_text: bool,
    /// Booleans become 0 or 1.
    pub bool_as_int: bool,
}

impl WireConverters {
    /// Converters for a backend without interval, temporal, decimal, json or
    /// boolean column types.
    pub fn all_text() -> Self {
        Self {
            interval_as_text: true,
            temporal_as_text: true,
            decimal_as_text: true,
            json_as_text: true,
            bool_as_int: true,
        }
    }

    /// Apply the table to one outbound value.
    pub fn apply(&self, value: Value) -> Value {
        match value {
            Value::Interval(d) if self.interval_as_text => Value::Text(format_interval(d)),
            Value::Date(d) if self.temporal_as_text => Value::Text(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) if self.temporal_as_text => Value::Text(t.format(TIME_FORMAT).to_string()),
            Value::DateTime(dt) if self.temporal_as_text => {
                Value::Text(dt.format(DATETIME_FORMAT).to_string())
            }
            Value::DateTimeTz(dt) if self.temporal_as_text => {
                Value::Text(dt.format(DATETIME_TZ_FORMAT).to_string())
            }
            Value::Decimal(d) if self.decimal_as_text => Value::Text(d.to_string()),
            Value::Json(j) if self.json_as_text => Value::Text(j.to_string()),
            Value::Bool(b) if self.bool_as_int => Value::Int(b as i64),
            Value::List(items) => Value::List(items.into_iter().map(|v| self.apply(v)).collect()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_leaves_values_alone() {
        let converters = WireConverters::default();
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(converters.apply(date.clone()), date);
        assert_eq!(converters.apply(Value::Bool(true)), Value::Bool(true));
    }

    #[test]
    fn test_all_text() {
        let converters = WireConverters::all_text();
        let noon = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(12, 0, 0, 500)
            .unwrap();
        assert_eq!(
            converters.apply(Value::DateTime(noon)),
            Value::Text("2024-02-29 12:00:00.000500".into())
        );
        assert_eq!(
            converters.apply(Value::Interval(Duration::days(12) + Duration::seconds(34))),
            Value::Text("12 days 00:00:34.000000".into())
        );
        assert_eq!(converters.apply(Value::Bool(false)), Value::Int(0));
        assert_eq!(
            converters.apply(Value::Json(serde_json::json!({"a": 1}))),
            Value::Text("{\"a\":1}".into())
        );
    }
}
