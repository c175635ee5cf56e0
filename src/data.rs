use std::{cmp::Ordering, fmt};

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

/// Groups of values that compare with each other without conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFamily {
    Numeric,
    Text,
}

impl Value {
    pub fn family(&self) -> ValueFamily {
        match self {
            Value::Text(_) => ValueFamily::Text,
            Value::Number(_) | Value::Boolean(_) | Value::DateTime(_) => ValueFamily::Numeric,
        }
    }

    pub fn is_date_time(&self) -> bool {
        matches!(self, Value::DateTime(_))
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Numeric view used when comparing inside the numeric family. Date/times
    /// compare through their serial so a serialized and a typed date agree.
    fn numeric_key(&self) -> Option<f64> {
        match self {
            Value::Number(f) => Some(*f),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::DateTime(dt) => Some(crate::dates::to_serial(dt)),
            Value::Text(_) => None,
        }
    }

    /// Compares two values of the same family. Returns `None` when the values
    /// belong to different families.
    pub fn natural_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => {
                let left = self.numeric_key()?;
                let right = other.numeric_key()?;
                Some(left.total_cmp(&right))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses a date written day-before-month, or ISO year-first.
pub fn parse_day_first_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d"];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_day_first_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Date-like text to a date/time value; a bare date lands on midnight.
pub fn parse_date_like(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = parse_day_first_datetime(value) {
        return Some(parsed);
    }
    parse_day_first_date(value)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}
