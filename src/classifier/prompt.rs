//! Classification prompt construction.

use crate::models::{CategorySet, TabDescriptor, ALL_CATEGORIES};

/// Content excerpt carried in the prompt. Oversized input is truncated here,
/// never rejected.
pub const CONTENT_EXCERPT_CHARS: usize = 800;

/// Build the single-shot classification prompt for one tab.
pub fn build_prompt(descriptor: &TabDescriptor, categories: &CategorySet) -> String {
    let names: Vec<&str> = ALL_CATEGORIES.iter().map(|c| c.as_str()).collect();
    let available = names.join(", ");

    let definitions: String = categories
        .definitions()
        .map(|d| format!("- {}: {}\n", d.category, d.description))
        .collect();

    let content = descriptor.content();
    let excerpt = match content.char_indices().nth(CONTENT_EXCERPT_CHARS) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    };

    format!(
        "Analyze this website and categorize it into ONE of these categories: {available}\n\
         \n\
         Website Information:\n\
         - URL: {url}\n\
         - Title: {title}\n\
         - Content Preview: {excerpt}\n\
         \n\
         Category Definitions:\n\
         {definitions}\
         \n\
         Instructions:\n\
         1. Consider the URL domain, page title, and content\n\
         2. Be specific about well-known platforms (e.g., youtube.com = entertainment, github.com = development)\n\
         3. Respond with ONLY the category name (e.g., \"social\", \"ai-tools\", \"development\")\n\
         4. If uncertain, use \"general\"\n\
         \n\
         Category:",
        url = descriptor.url,
        title = descriptor.title,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TabDescriptor, TabId};

    #[test]
    fn prompt_contains_tab_fields_and_categories() {
        let tab = TabDescriptor::new(TabId(1), "https://github.com/x", "My Repo")
            .with_content("readme text");
        let prompt = build_prompt(&tab, &CategorySet::defaults());
        assert!(prompt.contains("https://github.com/x"));
        assert!(prompt.contains("My Repo"));
        assert!(prompt.contains("readme text"));
        assert!(prompt.contains("ai-tools"));
        assert!(prompt.contains("work-productivity"));
    }

    #[test]
    fn oversized_content_is_truncated_not_rejected() {
        let tab = TabDescriptor::new(TabId(1), "https://x.com/", "t")
            .with_content("y".repeat(CONTENT_EXCERPT_CHARS + 400));
        let prompt = build_prompt(&tab, &CategorySet::defaults());
        // The excerpt stops at the limit; the prompt stays bounded.
        let excerpt_run = prompt.matches('y').count();
        assert_eq!(excerpt_run, CONTENT_EXCERPT_CHARS);
    }

    #[test]
    fn empty_content_is_fine() {
        let tab = TabDescriptor::new(TabId(1), "https://x.com/", "t");
        let prompt = build_prompt(&tab, &CategorySet::defaults());
        assert!(prompt.contains("Content Preview: \n"));
    }

    #[test]
    fn overridden_descriptions_reach_the_prompt() {
        use crate::models::{Category, CategoryOverride, CategorySet};
        let set = CategorySet::with_overrides(&[CategoryOverride {
            category: Category::General,
            color: None,
            description: Some("Everything else entirely".to_string()),
        }]);
        let tab = TabDescriptor::new(TabId(1), "https://x.com/", "t");
        assert!(build_prompt(&tab, &set).contains("Everything else entirely"));
    }
}
