use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction code the portal uses for consumed energy.
const CONSUMED: &str = "A+";
/// Direction code the portal uses for energy returned to the grid.
const RETURNED: &str = "A-";

/// One meter reading, exactly as the portal reported it.
///
/// The portal emits `value` either as a JSON number or as a numeric string
/// depending on the page; it is passed through untouched. Use
/// [`Reading::value_f64`] for a numeric view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: String,
    pub value: Value,
}

impl Reading {
    /// The reading as a float, if the upstream value is a number or a
    /// numeric string.
    pub fn value_f64(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Readings in the order the portal returned them (chronological upstream,
/// never re-sorted here).
pub type ReadingSeries = Vec<Reading>;

/// The two series a fetch yields. Either may be empty, e.g. `returned` for
/// meters that never export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub consumed: ReadingSeries,
    pub returned: ReadingSeries,
}

impl FetchResult {
    /// Normalizes the decoded chart payload.
    ///
    /// Only `/values/<direction>/total/data` is relied upon; a missing or
    /// oddly-shaped branch yields an empty series, and any extra fields on
    /// the records are dropped.
    pub(crate) fn from_payload(payload: &Value) -> Self {
        FetchResult {
            consumed: direction_readings(payload, CONSUMED),
            returned: direction_readings(payload, RETURNED),
        }
    }

    /// Both series stacked into a `direction`/`timestamp`/`value` DataFrame.
    /// Values that are not numbers or numeric strings become NaN.
    pub fn as_polars_df(&self) -> Result<DataFrame, anyhow::Error> {
        let mut directions: Vec<String> = vec![];
        let mut timestamps: Vec<String> = vec![];
        let mut values: Vec<f64> = vec![];

        for (direction, series) in [("consumed", &self.consumed), ("returned", &self.returned)] {
            for reading in series {
                directions.push(direction.to_string());
                timestamps.push(reading.timestamp.clone());
                values.push(reading.value_f64().unwrap_or(f64::NAN));
            }
        }

        let direction_series = Series::new("direction".into(), directions);
        let timestamp_series = Series::new("timestamp".into(), timestamps);
        let value_series = Series::new("value".into(), values);

        let df = DataFrame::new(vec![
            direction_series.into(),
            timestamp_series.into(),
            value_series.into(),
        ])?;

        Ok(df)
    }
}

fn direction_readings(payload: &Value, direction: &str) -> ReadingSeries {
    payload
        .pointer(&format!("/values/{}/total/data", direction))
        .and_then(Value::as_array)
        .map(|records| records.iter().map(reading).collect())
        .unwrap_or_default()
}

fn reading(record: &Value) -> Reading {
    let timestamp = match record.get("timestamp") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let value = record.get("value").cloned().unwrap_or(Value::Null);

    Reading { timestamp, value }
}
