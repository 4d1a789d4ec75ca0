//! Content module - reads, splits, decodes and renders posts

pub mod frontmatter;
pub mod loader;
mod markdown;
pub mod metadata;
mod post;
pub mod source;

pub use loader::{ContentLoader, Listing, ListingFailure};
pub use markdown::{MarkdownRenderer, Profile};
pub use metadata::{Author, PostMetadata};
pub use post::Post;
pub use source::{ContentSource, DocumentRef, FsSource, MemorySource};
