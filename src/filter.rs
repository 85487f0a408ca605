use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SubsecRound, Utc};
use serde::Deserialize;

use crate::records::parse_timestamp;

// -------------------------------------------------------------------------------------------------
// FilterError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, PartialEq)]
pub enum FilterError {
    InvalidDate {
        /// The name of the parameter
        param: &'static str,

        /// The value that failed to parse
        value: String,
    },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::InvalidDate { param, value } => write!(
                f,
                "invalid {param} {value:?}: expected a date like 2024-01-31 or an RFC 3339 timestamp"
            ),
        }
    }
}

impl std::error::Error for FilterError {}

// -------------------------------------------------------------------------------------------------
// FilterParams
// -------------------------------------------------------------------------------------------------
/// Unparsed filter parameters, as they arrive in a query string
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FilterParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub repo: Option<String>,
}

impl FilterParams {
    pub fn parse(&self) -> Result<MetricFilter, FilterError> {
        MetricFilter::parse(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            self.repo.as_deref(),
        )
    }
}

// -------------------------------------------------------------------------------------------------
// MetricFilter
// -------------------------------------------------------------------------------------------------
/// Restrictions applied to a metrics query.
///
/// Every restriction is optional; the ones that are present all have to hold. Both date bounds are
/// inclusive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub repo: Option<String>,
}

impl MetricFilter {
    /// Build a filter from textual parameters.
    ///
    /// Dates may be given as `YYYY-MM-DD` or as RFC 3339 timestamps. A bare start date means the
    /// beginning of that day and a bare end date the end of it, both in UTC. Missing and blank
    /// parameters impose no restriction.
    pub fn parse(
        start_date: Option<&str>,
        end_date: Option<&str>,
        repo: Option<&str>,
    ) -> Result<Self, FilterError> {
        let start = match present(start_date) {
            None => None,
            Some(s) => Some(parse_bound("start_date", s, Bound::Start)?),
        };
        let end = match present(end_date) {
            None => None,
            Some(s) => Some(parse_bound("end_date", s, Bound::End)?),
        };
        let repo = present(repo).map(str::to_string);
        Ok(MetricFilter { start, end, repo })
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(param: &'static str, value: &str, bound: Bound) -> Result<DateTime<Utc>, FilterError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_opt(23, 59, 59).expect("end of day should be valid"),
        };
        return Ok(date.and_time(time).and_utc());
    }
    let t = parse_timestamp(value).map_err(|_e| FilterError::InvalidDate {
        param,
        value: value.to_string(),
    })?;
    match bound {
        Bound::Start => Ok(ceil_to_second(t)),
        Bound::End => Ok(floor_to_second(t)),
    }
}

// Stored timestamps have whole-second resolution. Rounding a start bound up and an end bound down
// keeps every stored timestamp outside the requested range out of the result.

/// The earliest whole second at or after `t`.
pub(crate) fn ceil_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = t.trunc_subsecs(0);
    if truncated < t {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

/// The latest whole second at or before `t`.
pub(crate) fn floor_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}
