//! Dynamic values exchanged between variables, statements and backends.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// A single application or wire value.
///
/// The same enum is used on both sides of marshalling: a [`Variable`](crate::variables::Variable)
/// decides which shapes it accepts from the application and which it accepts
/// from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<Utc>),
    Interval(Duration),
    Json(serde_json::Value),
    List(Vec<Value>),
}

/// One result row: a fixed-arity ordered sequence of wire values.
pub type Row = Vec<Value>;

impl Value {
    /// Short category name used in error messages.
    pub fn category(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeTz(_) => "datetime with timezone",
            Value::Interval(_) => "interval",
            Value::Json(_) => "json",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => {
                write!(f, "\\x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::DateTimeTz(dt) => write!(f, "{}", dt.format(DATETIME_TZ_FORMAT)),
            Value::Interval(d) => write!(f, "{}", format_interval(*d)),
            Value::Json(j) => write!(f, "{j}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub(crate) const DATETIME_TZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Render a duration as `"<d> days HH:MM:SS.ffffff"`.
///
/// Negative durations carry a leading `-` in front of the whole form.
pub fn format_interval(duration: Duration) -> String {
    let negative = duration < Duration::zero();
    let duration = if negative { -duration } else { duration };
    let micros_total = duration.num_microseconds().unwrap_or(i64::MAX);
    let micros = micros_total % 1_000_000;
    let secs_total = micros_total / 1_000_000;
    let days = secs_total / 86_400;
    let rem = secs_total % 86_400;
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    let sign = if negative { "-" } else { "" };
    format!("{sign}{days} days {h:02}:{m:02}:{s:02}.{micros:06}")
}

/// Parse the interval text form.
///
/// Accepts `"<d> days HH:MM:SS[.f]"`, `"<d> day, H:MM:SS"`, and plain
/// `"H:MM:SS[.f]"` (hours may exceed 24, as MySQL TIME values do).
/// Returns `None` for malformed text and for spans `Duration` cannot hold.
pub fn parse_interval(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };

    let mut days = 0i64;
    let mut clock = text;
    if let Some(pos) = text.find("day") {
        days = text[..pos].trim().parse().ok()?;
        let rest = text[pos + 3..].trim_start_matches('s');
        clock = rest.trim_start_matches(',').trim();
    }

    let mut total = Duration::try_days(days)?;
    if !clock.is_empty() {
        let mut parts = clock.splitn(3, ':');
        let hours: i64 = parts.next()?.trim().parse().ok()?;
        let minutes: i64 = parts.next()?.parse().ok()?;
        let seconds = parts.next()?;
        let (whole, fraction) = match seconds.split_once('.') {
            Some((w, f)) => (w, f),
            None => (seconds, ""),
        };
        let whole: i64 = whole.parse().ok()?;
        let micros = if fraction.is_empty() {
            0
        } else {
            if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{fraction:0<6}");
            padded[..6].parse::<i64>().ok()?
        };
        if minutes >= 60 || whole >= 60 {
            return None;
        }
        total = total
            .checked_add(&Duration::try_hours(hours)?)?
            .checked_add(&Duration::try_minutes(minutes)?)?
            .checked_add(&Duration::try_seconds(whole)?)?
            .checked_add(&Duration::microseconds(micros))?;
    }

    Some(if negative { -total } else { total })
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeTz,
    Duration => Interval,
    serde_json::Value => Json,
    Vec<Value> => List,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
