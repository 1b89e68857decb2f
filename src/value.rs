//! The typed result of parsing one field, and the coercions that move it
//! into an entity property. A `Null` landing on an `Option` target becomes
//! `None`; on a plain target it becomes that type's zero equivalent. All
//! string conversions are locale-invariant.

use crate::error::{ErrorKind, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
    Flag(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Flag(v) => write!(f, "{}", v),
        }
    }
}

fn coercion(target: &'static str, value: &Value) -> ErrorKind {
    ErrorKind::Coercion {
        target,
        value: value.to_string(),
    }
}

/// Conversion from a parsed [`Value`] into a concrete property type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Option<T>> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) => Ok(s),
            Value::Integer(v) => Ok(v.to_string()),
            Value::Decimal(v) => Ok(v.to_string()),
            Value::Date(v) => Ok(v.format("%Y-%m-%d").to_string()),
            Value::Timestamp(v) => Ok(v.to_rfc3339()),
            Value::Flag(v) => Ok(v.to_string()),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<i64> {
        match &value {
            Value::Null => Ok(0),
            Value::Integer(v) => Ok(*v),
            Value::Decimal(v) if v.fract().is_zero() => {
                v.to_i64().ok_or_else(|| coercion("i64", &value).into())
            }
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| coercion("i64", &value).into()),
            Value::Flag(v) => Ok(*v as i64),
            _ => Err(coercion("i64", &value).into()),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<i32> {
        let wide = i64::from_value(value.clone())?;
        if wide < i64::from(i32::min_value()) || wide > i64::from(i32::max_value()) {
            return Err(coercion("i32", &value).into());
        }
        Ok(wide as i32)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<f64> {
        match &value {
            Value::Null => Ok(0.0),
            Value::Integer(v) => Ok(*v as f64),
            Value::Decimal(v) => v.to_f64().ok_or_else(|| coercion("f64", &value).into()),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| coercion("f64", &value).into()),
            _ => Err(coercion("f64", &value).into()),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Decimal> {
        match &value {
            Value::Null => Ok(Decimal::new(0, 0)),
            Value::Decimal(v) => Ok(*v),
            Value::Integer(v) => Ok(Decimal::from(*v)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| coercion("Decimal", &value).into()),
            _ => Err(coercion("Decimal", &value).into()),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<bool> {
        match &value {
            Value::Null => Ok(false),
            Value::Flag(v) => Ok(*v),
            Value::Integer(v) => Ok(*v != 0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(coercion("bool", &value).into()),
            },
            _ => Err(coercion("bool", &value).into()),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<NaiveDate> {
        match &value {
            Value::Null => Ok(NaiveDate::default()),
            Value::Date(v) => Ok(*v),
            Value::Timestamp(v) => Ok(v.date_naive()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| coercion("NaiveDate", &value).into()),
            _ => Err(coercion("NaiveDate", &value).into()),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<NaiveDateTime> {
        match &value {
            Value::Null => Ok(NaiveDateTime::default()),
            Value::Timestamp(v) => Ok(v.naive_local()),
            Value::Date(v) => Ok(NaiveDateTime::new(*v, NaiveTime::MIN)),
            Value::Text(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%dT%H:%M:%S")
                .map_err(|_| coercion("NaiveDateTime", &value).into()),
            _ => Err(coercion("NaiveDateTime", &value).into()),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<DateTime<Utc>> {
        match &value {
            Value::Null => Ok(DateTime::<Utc>::UNIX_EPOCH),
            Value::Timestamp(v) => Ok(v.with_timezone(&Utc)),
            Value::Date(v) => Ok(NaiveDateTime::new(*v, NaiveTime::MIN).and_utc()),
            Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| coercion("DateTime<Utc>", &value).into()),
            _ => Err(coercion("DateTime<Utc>", &value).into()),
        }
    }
}

/// Conversion from a property back into a [`Value`], used when the parser
/// reads a count field off the parent record.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            None => Value::Null,
            Some(v) => v.to_value(),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        match Decimal::from_f64_retain(*self) {
            Some(d) => Value::Decimal(d),
            None => Value::Null,
        }
    }
}

impl ToValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Flag(*self)
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Date(*self)
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.and_utc().fixed_offset())
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.fixed_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_into_option_is_none() {
        let v: Option<i64> = FromValue::from_value(Value::Null).unwrap();
        assert_eq!(v, None);
        let v: Option<String> = FromValue::from_value(Value::Null).unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn test_null_into_plain_is_zero_equivalent() {
        assert_eq!(i64::from_value(Value::Null).unwrap(), 0);
        assert_eq!(String::from_value(Value::Null).unwrap(), "");
        assert_eq!(bool::from_value(Value::Null).unwrap(), false);
        assert_eq!(
            Decimal::from_value(Value::Null).unwrap(),
            Decimal::new(0, 0)
        );
    }

    #[test]
    fn test_text_parses_into_numbers() {
        assert_eq!(
            i64::from_value(Value::Text(" 42 ".to_string())).unwrap(),
            42
        );
        assert_eq!(
            Decimal::from_value(Value::Text("1.25".to_string())).unwrap(),
            "1.25".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_integer_widens_into_decimal() {
        assert_eq!(
            Decimal::from_value(Value::Integer(7)).unwrap(),
            Decimal::from(7)
        );
    }

    #[test]
    fn test_fractional_decimal_rejected_as_integer() {
        let err = i64::from_value(Value::Decimal("1.5".parse().unwrap())).unwrap_err();
        assert!(err.kind().is_record_error());
    }

    #[test]
    fn test_date_into_timestamp_is_midnight_utc() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let ts: DateTime<Utc> = FromValue::from_value(Value::Date(d)).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-31T00:00:00+00:00");
    }

    #[test]
    fn test_unconvertible_reports_coercion() {
        let err = NaiveDate::from_value(Value::Flag(true)).unwrap_err();
        match err.kind() {
            ErrorKind::Coercion { target, .. } => assert_eq!(*target, "NaiveDate"),
            k => panic!("unexpected kind {:?}", k),
        }
    }

    #[test]
    fn test_round_trip_through_to_value() {
        assert_eq!(Value::Integer(9), 9i64.to_value());
        assert_eq!(Value::Null, (None as Option<i64>).to_value());
        assert_eq!(Value::Flag(true), true.to_value());
    }
}
