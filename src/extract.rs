//! Content-extraction collaborator contract.
//!
//! Page text lives outside this crate (a content script, a headless fetch,
//! whatever the embedding host has). The engine only ever sees the result
//! through this trait and must keep working when it has nothing to offer.

use crate::models::{PageAnalysis, TabDescriptor, TabId};

/// On-demand page analysis for a tab. Implementations return `None` whenever
/// the page is unreachable, still loading, or simply has no extractable text;
/// callers proceed with empty content in every such case.
pub trait ContentExtractor: Send {
    fn page_analysis(&self, id: TabId) -> Option<PageAnalysis>;
}

/// Extractor for hosts without content access. Always empty-handed.
pub struct NullExtractor;

impl ContentExtractor for NullExtractor {
    fn page_analysis(&self, _id: TabId) -> Option<PageAnalysis> {
        None
    }
}

/// Attach extracted content to a descriptor, when there is any. The
/// descriptor's own truncation bound applies.
pub fn enrich(descriptor: TabDescriptor, extractor: &dyn ContentExtractor) -> TabDescriptor {
    match extractor.page_analysis(descriptor.id) {
        Some(analysis) if !analysis.content.is_empty() => {
            descriptor.with_content(analysis.content)
        }
        _ => descriptor,
    }
}
