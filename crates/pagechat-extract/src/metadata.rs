use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::snapshot::PageSnapshot;

/// Page metadata read from meta tags and the root element. Every field is
/// independent of noise removal; absent tags yield `None`, never errors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub word_count: usize,
}

/// Read metadata from a snapshot. Never fails.
pub fn read_metadata(snapshot: &PageSnapshot) -> PageMetadata {
    let html = &snapshot.html;
    PageMetadata {
        description: meta_content(html, "meta[name=\"description\"]"),
        author: meta_content(html, "meta[name=\"author\"]"),
        published_date: meta_content(
            html,
            "meta[name=\"article:published_time\"], meta[property=\"article:published_time\"]",
        ),
        language: root_language(html),
        word_count: body_word_count(html),
    }
}

fn meta_content(html: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    html.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

fn root_language(html: &Html) -> Option<String> {
    let selector = Selector::parse("html").ok()?;
    html.select(&selector)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::to_string)
}

/// Non-empty whitespace-separated tokens in the full body text, counted
/// before any noise removal.
fn body_word_count(html: &Html) -> usize {
    let Ok(selector) = Selector::parse("body") else {
        return 0;
    };
    html.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().split_whitespace().count())
        .unwrap_or(0)
}
