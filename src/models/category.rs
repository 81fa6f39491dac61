//! The closed category set and its display metadata.
//!
//! Categories are a fixed enumeration: every classification answer, cached
//! entry, and group label is one of these variants. Arbitrary model output is
//! mapped into the set by [`coerce_category`], which is total over its success
//! domain and unit-testable without any network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Category
// ═══════════════════════════════════════════════════════════

/// Semantic tab category. The wire and storage form is kebab-case
/// (`"ai-tools"`, `"work-productivity"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Social,
    AiTools,
    Development,
    WorkProductivity,
    Entertainment,
    Shopping,
    NewsInformation,
    EducationResearch,
    Finance,
    HealthWellness,
    General,
}

/// All categories, in prompt/display order.
pub const ALL_CATEGORIES: &[Category] = &[
    Category::Social,
    Category::AiTools,
    Category::Development,
    Category::WorkProductivity,
    Category::Entertainment,
    Category::Shopping,
    Category::NewsInformation,
    Category::EducationResearch,
    Category::Finance,
    Category::HealthWellness,
    Category::General,
];

impl Category {
    /// Stable kebab-case name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Social => "social",
            Category::AiTools => "ai-tools",
            Category::Development => "development",
            Category::WorkProductivity => "work-productivity",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::NewsInformation => "news-information",
            Category::EducationResearch => "education-research",
            Category::Finance => "finance",
            Category::HealthWellness => "health-wellness",
            Category::General => "general",
        }
    }

    /// Parse an exact kebab-case name.
    pub fn from_name(name: &str) -> Option<Category> {
        ALL_CATEGORIES.iter().copied().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerce an arbitrary classifier answer to the nearest known category.
///
/// Normalizes the input (lowercase, keep only `[a-z-]`), tries an exact name
/// match, then substring containment in either direction ("development tools"
/// matches `development`; "dev" matches nothing since containment runs against
/// full names). Returns `None` when nothing matches — the caller decides
/// whether that means `InvalidResponse` or a default.
pub fn coerce_category(raw: &str) -> Option<Category> {
    let normalized: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || *c == '-' || *c == ' ')
        .collect::<String>()
        .trim()
        .replace(' ', "-");

    if normalized.is_empty() {
        return None;
    }

    if let Some(exact) = Category::from_name(&normalized) {
        return Some(exact);
    }

    ALL_CATEGORIES
        .iter()
        .copied()
        .find(|c| normalized.contains(c.as_str()) || c.as_str().contains(normalized.as_str()))
}

// ═══════════════════════════════════════════════════════════
// Display metadata
// ═══════════════════════════════════════════════════════════

/// Native tab-group color palette (the grouping surface's closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

impl GroupColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
            GroupColor::Orange => "orange",
        }
    }
}

/// Display metadata for one category: native group color and the one-line
/// description fed to the classifier prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub category: Category,
    pub color: GroupColor,
    pub description: String,
}

/// Persisted user override for a category's display metadata. The category
/// name set itself is closed; only color and description can be overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOverride {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<GroupColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_definition(category: Category) -> CategoryDefinition {
    let (color, description) = match category {
        Category::Social => (GroupColor::Red, "Social media platforms and networking sites"),
        Category::AiTools => (
            GroupColor::Purple,
            "AI assistants, machine learning tools, and AI platforms",
        ),
        Category::Development => (
            GroupColor::Blue,
            "Programming, coding, development tools, and technical documentation",
        ),
        Category::WorkProductivity => (
            GroupColor::Green,
            "Office applications, project management, business tools",
        ),
        Category::Entertainment => (
            GroupColor::Orange,
            "Video streaming, gaming, music, and entertainment content",
        ),
        Category::Shopping => (GroupColor::Cyan, "E-commerce, online stores, product browsing"),
        Category::NewsInformation => (
            GroupColor::Grey,
            "News sites, blogs, informational content",
        ),
        Category::EducationResearch => (
            GroupColor::Pink,
            "Educational content, research papers, learning platforms",
        ),
        Category::Finance => (
            GroupColor::Yellow,
            "Banking, investment, cryptocurrency, financial services",
        ),
        Category::HealthWellness => (
            GroupColor::Green,
            "Health information, fitness, medical resources",
        ),
        Category::General => (GroupColor::Grey, "Uncategorized or general purpose content"),
    };
    CategoryDefinition {
        category,
        color,
        description: description.to_string(),
    }
}

/// The full category set with display metadata, user overrides merged in.
#[derive(Debug, Clone)]
pub struct CategorySet {
    definitions: BTreeMap<Category, CategoryDefinition>,
}

impl CategorySet {
    /// Built-in defaults for every category.
    pub fn defaults() -> Self {
        let definitions = ALL_CATEGORIES
            .iter()
            .map(|&c| (c, default_definition(c)))
            .collect();
        Self { definitions }
    }

    /// Merge persisted user overrides on top of the defaults.
    pub fn with_overrides(overrides: &[CategoryOverride]) -> Self {
        let mut set = Self::defaults();
        for ov in overrides {
            if let Some(def) = set.definitions.get_mut(&ov.category) {
                if let Some(color) = ov.color {
                    def.color = color;
                }
                if let Some(description) = &ov.description {
                    def.description = description.clone();
                }
            }
        }
        set
    }

    pub fn definition(&self, category: Category) -> &CategoryDefinition {
        // Every variant is present by construction.
        &self.definitions[&category]
    }

    pub fn definitions(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.definitions.values()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::defaults()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
