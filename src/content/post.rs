//! Post model

use serde::Serialize;

use super::metadata::PostMetadata;

/// A blog post ready for a template: metadata plus rendered HTML.
///
/// Built fresh for every request and dropped with the response.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    #[serde(flatten)]
    pub meta: PostMetadata,

    /// Rendered HTML; already safe to embed without escaping
    pub content: String,
}

impl Post {
    pub fn new(meta: PostMetadata, content: String) -> Self {
        Self { meta, content }
    }

    pub fn slug(&self) -> &str {
        &self.meta.slug
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }
}
