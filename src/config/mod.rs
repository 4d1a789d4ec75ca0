//! Configuration module

mod site;

pub use site::FrontMatterStyle;
pub use site::HighlightConfig;
pub use site::ListingConfig;
pub use site::OrderBy;
pub use site::SiteConfig;
