use scraper::{Html, Selector};

/// A page's document tree at one moment, plus the URL it was loaded from.
///
/// The tree is owned so the extractor can detach nodes while reading, but
/// every public operation leaves the document in its original state.
pub struct PageSnapshot {
    url: String,
    pub(crate) html: Html,
}

impl PageSnapshot {
    pub fn parse(html: &str, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: Html::parse_document(html),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The document title, or an empty string when the page has none.
    pub fn title(&self) -> String {
        let Ok(selector) = Selector::parse("title") else {
            return String::new();
        };
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    /// Serialized document, used to verify extraction left no trace.
    pub fn to_html(&self) -> String {
        self.html.html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_read_and_trimmed() {
        let snap = PageSnapshot::parse(
            "<html><head><title>  A Page  </title></head><body></body></html>",
            "https://example.com/a",
        );
        assert_eq!(snap.title(), "A Page");
        assert_eq!(snap.url(), "https://example.com/a");
    }

    #[test]
    fn missing_title_yields_empty_string() {
        let snap = PageSnapshot::parse("<html><body><p>x</p></body></html>", "u");
        assert_eq!(snap.title(), "");
    }
}
