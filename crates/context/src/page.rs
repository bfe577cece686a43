//! The page as handed to the pipeline: rendered markup, location, and an
//! optional server-supplied data bundle.

use serde::{Deserialize, Serialize};

/// Structured data the host page supplies alongside its markup.
///
/// When present, `categories` and `tags` are authoritative over anything
/// scraped from the document, and `extra` keys override extracted signal
/// fields in the match-service payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageData {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A rendered page presented to the pipeline. The markup is held as a plain
/// string so callers can construct one from any source: a live document
/// serialization, a fixture, or a file.
#[derive(Debug, Clone)]
pub struct PageView {
    pub html: String,
    pub url: String,
    pub referrer: String,
    pub data: Option<PageData>,
}

impl PageView {
    pub fn new(html: impl Into<String>, url: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            url: url.into(),
            referrer: referrer.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: PageData) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_data_extra_keys_flattened() {
        let data: PageData = serde_json::from_str(
            r#"{"categories":["tech"],"tags":["rust"],"sentiment":"positive"}"#,
        )
        .unwrap();
        assert_eq!(data.categories, vec!["tech"]);
        assert_eq!(data.extra["sentiment"], "positive");
    }
}
