//! Deterministic fallback classifier.
//!
//! Total and side-effect-free, so it is always safe as the last resort:
//! a curated well-known-domain table, then a keyword scan over url + title in
//! fixed priority order, then `general`. Table order is semantic — the first
//! match wins.

use crate::fingerprint::extract_domain;
use crate::models::{Category, TabDescriptor};

/// Well-known domains → category. Matched against the URL's host exactly or
/// as a parent-domain suffix, in order; more specific hosts must precede
/// their parent domains.
const DOMAIN_TABLE: &[(&str, Category)] = &[
    // Social media
    ("facebook.com", Category::Social),
    ("instagram.com", Category::Social),
    ("twitter.com", Category::Social),
    ("x.com", Category::Social),
    ("linkedin.com", Category::Social),
    ("tiktok.com", Category::Social),
    ("snapchat.com", Category::Social),
    ("reddit.com", Category::Social),
    ("pinterest.com", Category::Social),
    ("discord.com", Category::Social),
    ("telegram.org", Category::Social),
    ("whatsapp.com", Category::Social),
    // AI tools
    ("chat.openai.com", Category::AiTools),
    ("openai.com", Category::AiTools),
    ("claude.ai", Category::AiTools),
    ("anthropic.com", Category::AiTools),
    ("bard.google.com", Category::AiTools),
    ("gemini.google.com", Category::AiTools),
    ("copilot.microsoft.com", Category::AiTools),
    ("midjourney.com", Category::AiTools),
    ("stability.ai", Category::AiTools),
    ("huggingface.co", Category::AiTools),
    // Development
    ("github.com", Category::Development),
    ("gitlab.com", Category::Development),
    ("stackoverflow.com", Category::Development),
    ("codepen.io", Category::Development),
    ("replit.com", Category::Development),
    ("codesandbox.io", Category::Development),
    ("npmjs.com", Category::Development),
    ("pypi.org", Category::Development),
    ("developer.mozilla.org", Category::Development),
    // Entertainment
    ("youtube.com", Category::Entertainment),
    ("netflix.com", Category::Entertainment),
    ("spotify.com", Category::Entertainment),
    ("twitch.tv", Category::Entertainment),
    ("hulu.com", Category::Entertainment),
    ("disney.com", Category::Entertainment),
    ("primevideo.com", Category::Entertainment),
    ("steampowered.com", Category::Entertainment),
    // Shopping
    ("amazon.com", Category::Shopping),
    ("ebay.com", Category::Shopping),
    ("etsy.com", Category::Shopping),
    ("shopify.com", Category::Shopping),
    ("walmart.com", Category::Shopping),
    ("target.com", Category::Shopping),
    ("alibaba.com", Category::Shopping),
    // Work / productivity
    ("gmail.com", Category::WorkProductivity),
    ("outlook.com", Category::WorkProductivity),
    ("slack.com", Category::WorkProductivity),
    ("teams.microsoft.com", Category::WorkProductivity),
    ("zoom.us", Category::WorkProductivity),
    ("notion.so", Category::WorkProductivity),
    ("trello.com", Category::WorkProductivity),
    ("asana.com", Category::WorkProductivity),
    // Finance
    ("coinbase.com", Category::Finance),
    ("binance.com", Category::Finance),
    ("robinhood.com", Category::Finance),
    ("paypal.com", Category::Finance),
    ("stripe.com", Category::Finance),
    // News / information
    ("cnn.com", Category::NewsInformation),
    ("bbc.com", Category::NewsInformation),
    ("reuters.com", Category::NewsInformation),
    ("nytimes.com", Category::NewsInformation),
    ("theguardian.com", Category::NewsInformation),
    ("wikipedia.org", Category::NewsInformation),
];

/// Keyword tables scanned over `url + title`, in declared priority order —
/// the first category with any matching keyword wins.
const KEYWORD_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Social,
        &["social", "chat", "message", "friend", "follow", "like", "share"],
    ),
    (
        Category::Shopping,
        &["shop", "buy", "cart", "price", "product", "store", "order"],
    ),
    (
        Category::Entertainment,
        &["video", "music", "game", "movie", "stream", "watch"],
    ),
    (
        Category::Development,
        &["code", "programming", "developer", "api", "documentation"],
    ),
    (
        Category::WorkProductivity,
        &["email", "meeting", "calendar", "document", "office"],
    ),
    (
        Category::Finance,
        &["bank", "crypto", "trading", "investment", "money"],
    ),
    (
        Category::NewsInformation,
        &["news", "article", "blog", "information", "wiki"],
    ),
    (
        Category::EducationResearch,
        &["learn", "course", "tutorial", "education", "study"],
    ),
];

/// Classify without the network. Never fails.
pub fn classify(descriptor: &TabDescriptor) -> Category {
    let url = descriptor.url.to_lowercase();
    let host = extract_domain(&url);

    for (domain, category) in DOMAIN_TABLE {
        if host == *domain || host.ends_with(&format!(".{domain}")) {
            return *category;
        }
    }

    let text = format!("{} {}", url, descriptor.title.to_lowercase());
    for (category, keywords) in KEYWORD_TABLE {
        if keywords.iter().any(|kw| text.contains(kw)) {
            return *category;
        }
    }

    Category::General
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TabId;

    fn tab(url: &str, title: &str) -> TabDescriptor {
        TabDescriptor::new(TabId(1), url, title)
    }

    #[test]
    fn known_domains() {
        assert_eq!(classify(&tab("https://github.com/x", "X")), Category::Development);
        assert_eq!(
            classify(&tab("https://www.youtube.com/watch?v=1", "Video")),
            Category::Entertainment
        );
        assert_eq!(classify(&tab("https://claude.ai/chat", "Claude")), Category::AiTools);
        assert_eq!(classify(&tab("https://reddit.com/r/rust", "rust")), Category::Social);
        assert_eq!(classify(&tab("https://coinbase.com/", "Coinbase")), Category::Finance);
    }

    #[test]
    fn specific_host_beats_parent_domain() {
        // chat.openai.com is listed before openai.com; both are AiTools, but
        // order matters for any future split.
        assert_eq!(
            classify(&tab("https://chat.openai.com/", "ChatGPT")),
            Category::AiTools
        );
    }

    #[test]
    fn host_matching_is_not_substring_matching() {
        // netflix.com must not match the x.com table entry.
        assert_eq!(
            classify(&tab("https://netflix.com/browse", "Netflix")),
            Category::Entertainment
        );
    }

    #[test]
    fn subdomains_match_their_parent() {
        assert_eq!(
            classify(&tab("https://gist.github.com/snippet", "gist")),
            Category::Development
        );
    }

    #[test]
    fn keyword_fallback_when_domain_unknown() {
        assert_eq!(
            classify(&tab("https://unknown-site.io/learn-rust", "Rust tutorial")),
            Category::EducationResearch
        );
        assert_eq!(
            classify(&tab("https://some-site.io/", "Breaking news today")),
            Category::NewsInformation
        );
    }

    #[test]
    fn keyword_priority_order_wins() {
        // Contains both "shop" (shopping) and "video" (entertainment);
        // shopping is declared first.
        assert_eq!(
            classify(&tab("https://mysite.io/shop", "video equipment")),
            Category::Shopping
        );
    }

    #[test]
    fn unmatched_input_is_general() {
        assert_eq!(classify(&tab("https://example.org/", "Example Domain")), Category::General);
    }

    #[test]
    fn deterministic() {
        let t = tab("https://unknown-site.io/thing", "some title");
        let first = classify(&t);
        for _ in 0..10 {
            assert_eq!(classify(&t), first);
        }
    }

    #[test]
    fn total_over_garbage_input() {
        assert_eq!(classify(&tab("", "")), Category::General);
        assert_eq!(classify(&tab("not a url at all", "")), Category::General);
    }
}
