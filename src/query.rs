use core::fmt;

use chrono::{Datelike, Days, Local, NaiveDate};

/// The top-level query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    /// A single day
    #[default]
    Day,
    /// A calendar month
    Month,
    /// A full year
    Year,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = match self {
            Period::Day => "D",
            Period::Month => "M",
            Period::Year => "Y",
        };
        write!(f, "{}", p)
    }
}

/// The resolution of data points within the returned series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Whatever resolution the portal records natively
    Native,
    Hour,
    Day,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = match self {
            Granularity::Native => "NATIVE",
            Granularity::Hour => "H",
            Granularity::Day => "D",
        };
        write!(f, "{}", g)
    }
}

/// A semantic query for the consumption-graphs page.
///
/// Date parts left as `None` fall back to yesterday's corresponding field at
/// fetch time; `granularity` falls back to [`Granularity::Hour`]. Fields that
/// do not apply to the chosen period are ignored.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub period: Period,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub granularity: Option<Granularity>,
}

impl QuerySpec {
    /// Builds the query pairs for the data page, filling unspecified date
    /// parts from `fallback`.
    pub(crate) fn to_query_pairs(&self, meter_id: &str, fallback: NaiveDate) -> Vec<(String, String)> {
        let year = self.year.unwrap_or_else(|| fallback.year());
        let month = self.month.unwrap_or_else(|| fallback.month());
        let day = self.day.unwrap_or_else(|| fallback.day());
        let granularity = self.granularity.unwrap_or(Granularity::Hour);

        let mut pairs = vec![
            ("counterNumber".to_string(), meter_id.to_string()),
            ("period".to_string(), self.period.to_string()),
        ];

        match self.period {
            Period::Year => {
                pairs.push(("year".to_string(), year.to_string()));
            }
            Period::Month => {
                pairs.push(("year".to_string(), year.to_string()));
                pairs.push(("month".to_string(), month.to_string()));
                pairs.push(("granularity".to_string(), granularity.to_string()));
            }
            Period::Day => {
                pairs.push((
                    "date".to_string(),
                    format!("{:02}.{:02}.{}", day, month, year),
                ));
                pairs.push(("granularity".to_string(), granularity.to_string()));
            }
        }

        pairs
    }
}

/// The portal's default reporting date: the last full day.
pub(crate) fn yesterday() -> NaiveDate {
    Local::now().date_naive() - Days::new(1)
}
