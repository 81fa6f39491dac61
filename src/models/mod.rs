pub mod category;
pub mod tab;

pub use category::{
    coerce_category, Category, CategoryDefinition, CategoryOverride, CategorySet, GroupColor,
    ALL_CATEGORIES,
};
pub use tab::{PageAnalysis, TabDescriptor, TabEvent, TabId, MAX_EXTRACTED_CONTENT_CHARS};
