//! News tone histogram for a topic over a rolling window.

use chrono::NaiveDate;
use serde::Deserialize;
use topics_core::{ToneBin, ToneChartDocument};

use crate::client::SourceClient;
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct ToneResponse {
    #[serde(default)]
    tonechart: Vec<ToneEntry>,
}

#[derive(Debug, Deserialize)]
struct ToneEntry {
    #[serde(default)]
    bin: i64,
    #[serde(default)]
    count: i64,
}

pub struct ToneSource {
    client: SourceClient,
    timespan: String,
}

impl ToneSource {
    #[must_use]
    pub fn new(client: SourceClient, timespan: &str) -> Self {
        Self {
            client,
            timespan: timespan.to_owned(),
        }
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.client.max_concurrency()
    }

    /// Empty histogram stamped with this source's window and `today`.
    #[must_use]
    pub fn empty_chart(&self, today: NaiveDate) -> ToneChartDocument {
        ToneChartDocument::empty(&self.timespan, today)
    }

    /// Fetches the tone histogram for the exact phrase `title`.
    ///
    /// A response without a `tonechart` array yields an empty histogram.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from the fetch or decode.
    pub async fn fetch_tone_chart(
        &self,
        title: &str,
        today: NaiveDate,
    ) -> Result<ToneChartDocument, SourceError> {
        let phrase = format!("\"{title}\"");
        let url = self.client.endpoint(
            "",
            &[
                ("query", phrase.as_str()),
                ("mode", "tonechart"),
                ("format", "json"),
                ("timespan", self.timespan.as_str()),
            ],
        )?;
        let response: ToneResponse = self.client.get_json(&url).await?;

        let histogram = response
            .tonechart
            .into_iter()
            .map(|e| ToneBin {
                bin: e.bin,
                count: e.count,
            })
            .collect();
        Ok(ToneChartDocument::with_histogram(&self.timespan, today, histogram))
    }
}
