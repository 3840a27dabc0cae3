//! Typed value containers with bidirectional wire conversion.
//!
//! A [`Variable`] is either `UNDEFINED` (no value was ever supplied) or
//! `DEFINED`, where a defined null is distinct from undefined. Each
//! [`VariableKind`] owns two conversions:
//!
//! - inbound, [`VariableKind::parse_set`], from an application value or a wire
//!   value;
//! - outbound, [`VariableKind::parse_get`], to an application value or a wire
//!   value.
//!
//! Values outside the kind's semantic category are rejected with
//! [`SquallError::TypeMismatch`] rather than coerced.

use crate::error::{SquallError, SquallResult};
use crate::value::{
    parse_interval, Value, DATETIME_FORMAT, DATETIME_TZ_FORMAT, DATE_FORMAT, TIME_FORMAT,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;

/// The semantic category of a [`Variable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Accepts any value unchanged.
    Any,
    Bool,
    Int,
    Float,
    Decimal,
    /// Unicode text.
    Text,
    /// Raw byte sequence, independent of any string encoding.
    Bytes,
    Date,
    Time,
    /// Naive (timezone-less) datetime.
    DateTime,
    /// Timezone-aware datetime, normalised to UTC.
    DateTimeTz,
    Interval,
    /// Arbitrary structured value, serialised as JSON on the wire.
    Json,
    /// Homogeneous list of the inner kind.
    List(Box<VariableKind>),
}

impl VariableKind {
    /// Convert a non-null value entering a variable.
    pub fn parse_set(&self, value: Value, from_wire: bool) -> SquallResult<Value> {
        match (self, value) {
            (VariableKind::Any, v) => Ok(v),

            (VariableKind::Bool, v @ Value::Bool(_)) => Ok(v),
            (VariableKind::Bool, Value::Int(i)) if from_wire => Ok(Value::Bool(i != 0)),
            (VariableKind::Bool, Value::Text(s)) if from_wire => parse_bool(&s)
                .map(Value::Bool)
                .ok_or_else(|| SquallError::type_mismatch("bool", s)),

            (VariableKind::Int, v @ Value::Int(_)) => Ok(v),
            (VariableKind::Int, Value::Bool(b)) if from_wire => Ok(Value::Int(b as i64)),
            (VariableKind::Int, Value::Decimal(d)) if from_wire && d.fract().is_zero() => d
                .to_i64()
                .map(Value::Int)
                .ok_or_else(|| SquallError::type_mismatch("integer", d)),
            (VariableKind::Int, Value::Text(s)) if from_wire => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| SquallError::type_mismatch("integer", s)),

            (VariableKind::Float, v @ Value::Float(_)) => Ok(v),
            (VariableKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (VariableKind::Float, Value::Decimal(d)) if from_wire => d
                .to_f64()
                .map(Value::Float)
                .ok_or_else(|| SquallError::type_mismatch("float", d)),
            (VariableKind::Float, Value::Text(s)) if from_wire => s
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| SquallError::type_mismatch("float", s)),

            (VariableKind::Decimal, v @ Value::Decimal(_)) => Ok(v),
            (VariableKind::Decimal, Value::Int(i)) => Ok(Value::Decimal(Decimal::from(i))),
            (VariableKind::Decimal, Value::Float(f)) if from_wire => Decimal::from_f64(f)
                .map(Value::Decimal)
                .ok_or_else(|| SquallError::type_mismatch("decimal", f)),
            (VariableKind::Decimal, Value::Text(s)) if from_wire => Decimal::from_str(s.trim())
                .map(Value::Decimal)
                .map_err(|_| SquallError::type_mismatch("decimal", s)),

            (VariableKind::Text, v @ Value::Text(_)) => Ok(v),
            (VariableKind::Text, Value::Bytes(b)) if from_wire => String::from_utf8(b)
                .map(Value::Text)
                .map_err(|e| SquallError::type_mismatch("utf-8 text", e.into_bytes())),

            (VariableKind::Bytes, v @ Value::Bytes(_)) => Ok(v),
            (VariableKind::Bytes, Value::Text(s)) if from_wire => Ok(Value::Bytes(s.into_bytes())),

            (VariableKind::Date, v @ Value::Date(_)) => Ok(v),
            (VariableKind::Date, Value::DateTime(dt)) if from_wire => Ok(Value::Date(dt.date())),
            (VariableKind::Date, Value::Text(s)) if from_wire => {
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|_| SquallError::type_mismatch("date", s))
            }

            (VariableKind::Time, v @ Value::Time(_)) => Ok(v),
            (VariableKind::Time, Value::Interval(d)) if from_wire => time_from_interval(d),
            (VariableKind::Time, Value::Text(s)) if from_wire => parse_time(&s),

            (VariableKind::DateTime, v @ Value::DateTime(_)) => Ok(v),
            (VariableKind::DateTime, Value::DateTimeTz(dt)) if from_wire => {
                Ok(Value::DateTime(dt.naive_utc()))
            }
            (VariableKind::DateTime, Value::Text(s)) if from_wire => parse_naive_datetime(&s)
                .map(Value::DateTime)
                .ok_or_else(|| SquallError::type_mismatch("datetime", s)),

            (VariableKind::DateTimeTz, v @ Value::DateTimeTz(_)) => Ok(v),
            (VariableKind::DateTimeTz, Value::DateTime(naive)) if from_wire => {
                Ok(Value::DateTimeTz(Utc.from_utc_datetime(&naive)))
            }
            (VariableKind::DateTimeTz, Value::Text(s)) if from_wire => parse_aware_datetime(&s)
                .map(Value::DateTimeTz)
                .ok_or_else(|| SquallError::type_mismatch("datetime with timezone", s)),

            (VariableKind::Interval, v @ Value::Interval(_)) => Ok(v),
            (VariableKind::Interval, Value::Time(t)) if from_wire => Ok(Value::Interval(
                Duration::seconds(t.num_seconds_from_midnight() as i64)
                    + Duration::nanoseconds(t.nanosecond() as i64),
            )),
            (VariableKind::Interval, Value::Text(s)) if from_wire => parse_interval(&s)
                .map(Value::Interval)
                .ok_or_else(|| SquallError::type_mismatch("interval", s)),

            (VariableKind::Json, v @ Value::Json(_)) => Ok(v),
            (VariableKind::Json, Value::Text(s)) if from_wire => serde_json::from_str(&s)
                .map(Value::Json)
                .map_err(|e| SquallError::TypeMismatch(format!("invalid json: {e}"))),
            (VariableKind::Json, Value::Bytes(b)) if from_wire => serde_json::from_slice(&b)
                .map(Value::Json)
                .map_err(|e| SquallError::TypeMismatch(format!("invalid json: {e}"))),

            (VariableKind::List(item), Value::List(items)) => items
                .into_iter()
                .map(|v| match v {
                    Value::Null => Ok(Value::Null),
                    v => item.parse_set(v, from_wire),
                })
                .collect::<SquallResult<Vec<_>>>()
                .map(Value::List),

            (kind, v) => Err(SquallError::TypeMismatch(format!(
                "{kind:?} variable cannot hold {} value {v:?}",
                v.category()
            ))),
        }
    }

    /// Convert a stored non-null value on its way out of a variable.
    pub fn parse_get(&self, value: &Value, to_wire: bool) -> Value {
        match (self, value) {
            (VariableKind::Json, Value::Json(j)) if to_wire => Value::Text(j.to_string()),
            (VariableKind::List(item), Value::List(items)) => Value::List(
                items
                    .iter()
                    .map(|v| match v {
                        Value::Null => Value::Null,
                        v => item.parse_get(v, to_wire),
                    })
                    .collect(),
            ),
            (_, v) => v.clone(),
        }
    }

    /// The kind a literal of this value compiles to.
    pub fn for_value(value: &Value) -> VariableKind {
        match value {
            Value::Null => VariableKind::Any,
            Value::Bool(_) => VariableKind::Bool,
            Value::Int(_) => VariableKind::Int,
            Value::Float(_) => VariableKind::Float,
            Value::Decimal(_) => VariableKind::Decimal,
            Value::Text(_) => VariableKind::Text,
            Value::Bytes(_) => VariableKind::Bytes,
            Value::Date(_) => VariableKind::Date,
            Value::Time(_) => VariableKind::Time,
            Value::DateTime(_) => VariableKind::DateTime,
            Value::DateTimeTz(_) => VariableKind::DateTimeTz,
            Value::Interval(_) => VariableKind::Interval,
            Value::Json(_) => VariableKind::Json,
            Value::List(_) => VariableKind::List(Box::new(VariableKind::Any)),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" => Some(true),
        "f" | "false" | "0" | "n" | "no" => Some(false),
        _ => None,
    }
}

fn parse_time(s: &str) -> SquallResult<Value> {
    if let Ok(t) = NaiveTime::parse_from_str(s.trim(), TIME_FORMAT) {
        return Ok(Value::Time(t));
    }
    // MySQL hands TIME columns over as "H:MM:SS[.f]" with unpadded hours.
    match parse_interval(s) {
        Some(d) => time_from_interval(d),
        None => Err(SquallError::type_mismatch("time", s)),
    }
}

fn time_from_interval(d: Duration) -> SquallResult<Value> {
    let secs = d.num_seconds();
    let nanos = (d - Duration::seconds(secs)).num_nanoseconds().unwrap_or(0);
    u32::try_from(secs)
        .ok()
        .zip(u32::try_from(nanos).ok())
        .and_then(|(s, n)| NaiveTime::from_num_seconds_from_midnight_opt(s, n))
        .map(Value::Time)
        .ok_or_else(|| SquallError::type_mismatch("time of day", d))
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn parse_aware_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_str(s, DATETIME_TZ_FORMAT)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_datetime(s).map(|naive| Utc.from_utc_datetime(&naive)))
}

/// A typed box around at most one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    kind: VariableKind,
    value: Option<Value>,
    allow_null: bool,
}

impl Variable {
    /// Create an `UNDEFINED` variable of the given kind.
    pub fn new(kind: VariableKind) -> Self {
        Self {
            kind,
            value: None,
            allow_null: true,
        }
    }

    /// Create a `DEFINED` variable from an application value.
    pub fn with_value(kind: VariableKind, value: impl Into<Value>) -> SquallResult<Self> {
        let mut variable = Self::new(kind);
        variable.set(value, false)?;
        Ok(variable)
    }

    /// Wrap a literal value in a variable of the matching kind.
    pub fn for_value(value: Value) -> Self {
        Self {
            kind: VariableKind::for_value(&value),
            value: Some(value),
            allow_null: true,
        }
    }

    /// Reject null values from now on.
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// Store a value, converting it from the wire representation when `from_wire` is set.
    pub fn set(&mut self, value: impl Into<Value>, from_wire: bool) -> SquallResult<()> {
        let value = value.into();
        if value.is_null() {
            if !self.allow_null {
                return Err(SquallError::NoneValue(format!(
                    "{:?} variable does not accept null",
                    self.kind
                )));
            }
            self.value = Some(Value::Null);
            return Ok(());
        }
        self.value = Some(self.kind.parse_set(value, from_wire)?);
        Ok(())
    }

    /// The stored value, converted for the wire when `to_wire` is set.
    ///
    /// Returns `None` while the variable is `UNDEFINED`.
    pub fn get(&self, to_wire: bool) -> Option<Value> {
        self.value.as_ref().map(|v| match v {
            Value::Null => Value::Null,
            v => self.kind.parse_get(v, to_wire),
        })
    }

    /// Return the variable to the `UNDEFINED` state.
    pub fn delete(&mut self) {
        self.value = None;
    }
}

/// A statement parameter: either a bare value or a variable to marshal.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Value(Value),
    Variable(Variable),
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Value(v)
    }
}

impl From<Variable> for Param {
    fn from(v: Variable) -> Self {
        Param::Variable(v)
    }
}
