//! Content-signal extraction from rendered page markup.
//!
//! Every resolver degrades independently to its fallback, so extraction as a
//! whole cannot fail: a page with no metadata still yields a usable snapshot.

use chrono::Utc;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::Arc;
use tracing::debug;

use adagent_core::types::{ContextSignals, Heading};

use crate::engagement::EngagementTracker;
use crate::page::PageView;

/// Character budget applied to the body excerpt when the caller does not
/// supply one.
pub const DEFAULT_BODY_EXCERPT_CHARS: usize = 500;

const MAX_HEADINGS: usize = 10;
const MAX_HEADING_CHARS: usize = 200;
const MAX_KEYWORDS: usize = 20;
const MAX_CATEGORIES: usize = 10;
const MAX_TAGS: usize = 20;

/// Content containers tried in order before falling back to the whole body.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    r#"[role="main"]"#,
    ".entry-content",
    ".post-content",
    ".content",
    "main",
    "#content",
];

/// Subtrees excluded from the body excerpt.
const STRIP_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

/// Extracts a `ContextSignals` snapshot from a page view.
///
/// Construct once per page load with the page's engagement tracker; calling
/// `extract` again yields the same content fields with fresh engagement
/// readings.
pub struct ContextExtractor {
    engagement: Arc<EngagementTracker>,
}

impl ContextExtractor {
    pub fn new(engagement: Arc<EngagementTracker>) -> Self {
        Self { engagement }
    }

    /// Extract all signals with the default body-excerpt budget.
    pub fn extract(&self, page: &PageView) -> ContextSignals {
        self.extract_with_budget(page, DEFAULT_BODY_EXCERPT_CHARS)
    }

    /// Extract all signals, truncating the body excerpt to `body_budget`
    /// characters.
    pub fn extract_with_budget(&self, page: &PageView, body_budget: usize) -> ContextSignals {
        let doc = Html::parse_document(&page.html);
        let engagement = self.engagement.snapshot();

        let (categories, tags) = match &page.data {
            // Server-supplied taxonomy is authoritative over DOM scraping.
            Some(data) => (data.categories.clone(), data.tags.clone()),
            None => (scrape_categories(&doc), scrape_tags(&doc)),
        };

        let signals = ContextSignals {
            title: page_title(&doc),
            description: meta_description(&doc),
            url: page.url.clone(),
            referrer: page.referrer.clone(),
            headings: headings(&doc),
            body_text: body_text(&doc, body_budget),
            keywords: keywords(&doc),
            publish_date: publish_date(&doc),
            author: author(&doc),
            categories,
            tags,
            page_type: page_type(&doc),
            language: language(&doc),
            device: engagement.device,
            time_on_page: engagement.time_on_page,
            scroll_depth: engagement.scroll_depth,
            pointer_detected: engagement.pointer_detected,
            viewport: engagement.viewport,
            extracted_at: Utc::now(),
        };

        debug!(
            headings = signals.headings.len(),
            keywords = signals.keywords.len(),
            body_chars = signals.body_text.len(),
            page_type = %signals.page_type,
            "context extracted"
        );

        signals
    }
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|s| doc.select(&s).next())
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    select_first(doc, selector)
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn page_title(doc: &Html) -> String {
    if let Some(og) = meta_content(doc, r#"meta[property="og:title"]"#) {
        return og;
    }
    select_first(doc, "title")
        .map(element_text)
        .unwrap_or_default()
}

fn meta_description(doc: &Html) -> String {
    meta_content(doc, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(doc, r#"meta[name="description"]"#))
        .unwrap_or_default()
}

fn headings(doc: &Html) -> Vec<Heading> {
    let Ok(selector) = Selector::parse("h1, h2, h3") else {
        return Vec::new();
    };

    doc.select(&selector)
        .filter_map(|el| {
            let text = element_text(el);
            if text.is_empty() {
                return None;
            }
            let level = el.value().name().as_bytes().get(1).copied().map_or(2, |b| b - b'0');
            Some(Heading {
                level,
                text: truncate_chars(&text, MAX_HEADING_CHARS),
            })
        })
        .take(MAX_HEADINGS)
        .collect()
}

/// Body excerpt: first matching content container, falling back to the whole
/// document, with non-content subtrees stripped and whitespace collapsed.
fn body_text(doc: &Html, budget: usize) -> String {
    let container = CONTENT_SELECTORS
        .iter()
        .find_map(|sel| select_first(doc, sel))
        .or_else(|| select_first(doc, "body"))
        .unwrap_or_else(|| doc.root_element());

    let mut raw = String::new();
    collect_text_stripped(*container, &mut raw);

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, budget)
}

fn collect_text_stripped(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&text);
                out.push(' ');
            }
            Node::Element(el) => {
                if !STRIP_TAGS.contains(&el.name()) {
                    collect_text_stripped(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Keywords: union of meta keywords, schema.org keyword properties, and news
/// keywords — case-folded, deduplicated, first-seen order, capped.
fn keywords(doc: &Html) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    let mut add_list = |raw: &str| {
        for keyword in raw.split(',') {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !found.contains(&keyword) {
                found.push(keyword);
            }
        }
    };

    if let Some(content) = meta_content(doc, r#"meta[name="keywords"]"#) {
        add_list(&content);
    }

    if let Ok(selector) = Selector::parse(r#"[itemprop="keywords"]"#) {
        for el in doc.select(&selector) {
            match el.value().attr("content") {
                Some(content) => add_list(content),
                None => add_list(&element_text(el)),
            }
        }
    }

    if let Some(content) = meta_content(doc, r#"meta[name="news_keywords"]"#) {
        add_list(&content);
    }

    found.truncate(MAX_KEYWORDS);
    found
}

fn publish_date(doc: &Html) -> Option<String> {
    if let Some(og) = meta_content(doc, r#"meta[property="article:published_time"]"#) {
        return Some(og);
    }

    if let Some(el) = select_first(doc, r#"[itemprop="datePublished"]"#) {
        let value = el
            .value()
            .attr("content")
            .or_else(|| el.value().attr("datetime"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| Some(element_text(el)).filter(|t| !t.is_empty()));
        if value.is_some() {
            return value;
        }
    }

    select_first(doc, "time[datetime]")
        .and_then(|el| el.value().attr("datetime"))
        .map(|v| v.to_string())
}

fn author(doc: &Html) -> Option<String> {
    if let Some(og) = meta_content(doc, r#"meta[property="article:author"]"#) {
        return Some(og);
    }

    if let Some(el) = select_first(doc, r#"[itemprop="author"]"#) {
        let name = Selector::parse(r#"[itemprop="name"]"#)
            .ok()
            .and_then(|s| el.select(&s).next())
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| element_text(el));
        if !name.is_empty() {
            return Some(name);
        }
    }

    meta_content(doc, r#"meta[name="author"]"#)
}

fn scrape_categories(doc: &Html) -> Vec<String> {
    collect_unique_text(
        doc,
        r#".category, [rel="category"], [itemprop="articleSection"]"#,
        MAX_CATEGORIES,
    )
}

fn scrape_tags(doc: &Html) -> Vec<String> {
    collect_unique_text(doc, r#".tag, [rel="tag"]"#, MAX_TAGS)
}

fn collect_unique_text(doc: &Html, selector: &str, cap: usize) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    let mut found: Vec<String> = Vec::new();
    for el in doc.select(&selector) {
        let text = element_text(el);
        if !text.is_empty() && !found.contains(&text) {
            found.push(text);
            if found.len() == cap {
                break;
            }
        }
    }
    found
}

fn page_type(doc: &Html) -> String {
    if let Some(og) = meta_content(doc, r#"meta[property="og:type"]"#) {
        return og;
    }

    let classes: Vec<String> = select_first(doc, "body")
        .and_then(|el| el.value().attr("class"))
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let has = |class: &str| classes.iter().any(|c| c == class);

    if has("single-post") || has("single") {
        "article".to_string()
    } else if has("home") || has("blog") {
        "website".to_string()
    } else if has("page") {
        "page".to_string()
    } else if has("archive") || has("category") {
        "archive".to_string()
    } else {
        "website".to_string()
    }
}

fn language(doc: &Html) -> String {
    if let Some(lang) = doc.root_element().value().attr("lang") {
        if !lang.trim().is_empty() {
            return lang.trim().to_string();
        }
    }

    meta_content(doc, r#"meta[http-equiv="content-language"]"#)
        .unwrap_or_else(|| "en".to_string())
}
