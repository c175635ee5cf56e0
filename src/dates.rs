//! Spreadsheet serial dates.
//!
//! A serial date counts days since 1899-12-30, with the time of day as the
//! fractional part. Columns that hold only date/time values are switched to
//! serials before sorting and switched back afterwards, so comparisons never
//! mix date objects with other scalars.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::debug;

use crate::{data::Value, merge::Dataset};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub fn to_serial(value: &NaiveDateTime) -> f64 {
    let elapsed = value.signed_duration_since(epoch());
    elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(millis as i64)?;
    epoch().checked_add_signed(delta)
}

/// Columns whose non-null values are all date/times. A column with no values
/// at all does not qualify.
pub fn date_columns(dataset: &Dataset) -> Vec<usize> {
    (0..dataset.headers.len())
        .filter(|&idx| {
            let mut seen = false;
            for value in dataset.column(idx).flatten() {
                if !value.is_date_time() {
                    return false;
                }
                seen = true;
            }
            seen
        })
        .collect()
}

/// Replaces every date/time in uniformly dated columns by its serial and
/// returns those columns for [`deserialize_dates`].
pub fn serialize_dates(dataset: &mut Dataset) -> Vec<usize> {
    let columns = date_columns(dataset);
    for &idx in &columns {
        for row in dataset.rows.iter_mut() {
            if let Some(Value::DateTime(dt)) = &row[idx] {
                row[idx] = Some(Value::Number(to_serial(dt)));
            }
        }
    }
    if !columns.is_empty() {
        debug!(
            "Serialized date column(s): {:?}",
            columns
                .iter()
                .map(|&idx| dataset.headers[idx].as_str())
                .collect::<Vec<_>>()
        );
    }
    columns
}

pub fn deserialize_dates(dataset: &mut Dataset, columns: &[usize]) {
    for &idx in columns {
        for row in dataset.rows.iter_mut() {
            if let Some(Value::Number(serial)) = row[idx] {
                if let Some(restored) = from_serial(serial) {
                    row[idx] = Some(Value::DateTime(restored));
                }
            }
        }
    }
}
