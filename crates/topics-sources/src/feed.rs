//! Featured-content feed: the daily "most read" article list.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::client::SourceClient;
use crate::error::SourceError;

/// One most-read entry, decoded and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedArticle {
    pub title: String,
    pub url: Option<String>,
    pub views: u64,
    /// Daily view counts, oldest first.
    pub view_history: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct FeaturedResponse {
    mostread: Option<MostRead>,
}

#[derive(Debug, Deserialize)]
struct MostRead {
    #[serde(default)]
    articles: Vec<FeedArticle>,
}

#[derive(Debug, Deserialize)]
struct FeedArticle {
    titles: Option<Titles>,
    #[serde(default)]
    views: u64,
    content_urls: Option<ContentUrls>,
    #[serde(default)]
    view_history: Vec<DailyViews>,
}

#[derive(Debug, Deserialize)]
struct Titles {
    normalized: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrls>,
}

#[derive(Debug, Deserialize)]
struct PageUrls {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyViews {
    #[serde(default)]
    views: u64,
}

/// `<lang>/featured/YYYY/MM/DD`, zero-padded.
#[must_use]
pub fn featured_path(lang: &str, date: NaiveDate) -> String {
    format!(
        "{lang}/featured/{:04}/{:02}/{:02}",
        date.year(),
        date.month(),
        date.day()
    )
}

pub struct FeedSource {
    client: SourceClient,
    lang: String,
}

impl FeedSource {
    #[must_use]
    pub fn new(client: SourceClient, lang: &str) -> Self {
        Self {
            client,
            lang: lang.to_owned(),
        }
    }

    /// Fetches the most-read list for `date`.
    ///
    /// Entries without a normalized title are dropped, a duplicate title keeps
    /// its first entry, and a feed with no `mostread` section yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from the fetch or decode.
    pub async fn fetch_most_read(&self, date: NaiveDate) -> Result<Vec<FeaturedArticle>, SourceError> {
        let url = self.client.endpoint(&featured_path(&self.lang, date), &[])?;
        let response: FeaturedResponse = self.client.get_json(&url).await?;
        Ok(into_articles(response))
    }
}

fn into_articles(response: FeaturedResponse) -> Vec<FeaturedArticle> {
    let Some(most_read) = response.mostread else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    most_read
        .articles
        .into_iter()
        .filter_map(|article| {
            let title = article.titles?.normalized?.trim().to_owned();
            if title.is_empty() || !seen.insert(title.clone()) {
                return None;
            }
            Some(FeaturedArticle {
                title,
                url: article
                    .content_urls
                    .and_then(|c| c.desktop)
                    .and_then(|d| d.page),
                views: article.views,
                view_history: article.view_history.into_iter().map(|d| d.views).collect(),
            })
        })
        .collect()
}
