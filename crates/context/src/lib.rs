//! Page-signal extraction: content signals scraped from the rendered page
//! plus engagement signals accumulated over the page's lifetime.

pub mod engagement;
pub mod extractor;
pub mod page;

pub use engagement::EngagementTracker;
pub use extractor::ContextExtractor;
pub use page::{PageData, PageView};
