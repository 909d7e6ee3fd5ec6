//! Canonical tone-chart document stored per topic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One histogram bucket: a tone score bin and the number of articles in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneBin {
    pub bin: i64,
    pub count: i64,
}

/// `{timespan, query_date, histogram}` as persisted and served.
///
/// The `Default` value serialises to `{"histogram":[]}`, the document served
/// for topics that have no chart yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneChartDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timespan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_date: Option<NaiveDate>,
    #[serde(default)]
    pub histogram: Vec<ToneBin>,
}

impl ToneChartDocument {
    /// An empty histogram stamped with the query window and date.
    #[must_use]
    pub fn empty(timespan: &str, query_date: NaiveDate) -> Self {
        Self::with_histogram(timespan, query_date, Vec::new())
    }

    #[must_use]
    pub fn with_histogram(timespan: &str, query_date: NaiveDate, histogram: Vec<ToneBin>) -> Self {
        Self {
            timespan: Some(timespan.to_string()),
            query_date: Some(query_date),
            histogram,
        }
    }
}
