//! Content loader - assembles posts from a content source

use crate::config::{FrontMatterStyle, ListingConfig, OrderBy, SiteConfig};
use crate::error::{Error, Result};

use super::markdown::{MarkdownRenderer, Profile};
use super::source::{ContentSource, DocumentRef};
use super::{frontmatter, metadata, Post};

/// Result of assembling every document in a source
#[derive(Debug, Default)]
pub struct Listing {
    pub posts: Vec<Post>,
    pub failures: Vec<ListingFailure>,
}

/// A document that could not be turned into a post
#[derive(Debug)]
pub struct ListingFailure {
    pub id: String,
    pub error: Error,
}

/// Turns raw documents into [`Post`]s
pub struct ContentLoader<S> {
    source: S,
    renderer: MarkdownRenderer,
    front_matter: FrontMatterStyle,
    listing: ListingConfig,
}

impl<S: ContentSource> ContentLoader<S> {
    /// Create a loader with default front-matter and listing settings
    pub fn new(source: S, renderer: MarkdownRenderer) -> Self {
        Self {
            source,
            renderer,
            front_matter: FrontMatterStyle::default(),
            listing: ListingConfig::default(),
        }
    }

    /// Create a loader configured from the site configuration
    pub fn from_config(source: S, config: &SiteConfig) -> Self {
        let renderer = MarkdownRenderer::with_options(
            &config.highlight.theme,
            config.highlight.line_numbers,
        );
        Self::new(source, renderer)
            .with_front_matter(config.front_matter)
            .with_listing(config.listing.clone())
    }

    pub fn with_front_matter(mut self, style: FrontMatterStyle) -> Self {
        self.front_matter = style;
        self
    }

    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load and render a single post with the rich profile.
    ///
    /// `<slug>.md` directly under the root wins. Otherwise the post is the
    /// first listed document whose listing slug (its `Slug`, or its file stem
    /// when it has none) equals `slug`, so every index link resolves.
    pub fn load_post(&self, slug: &str) -> Result<Post> {
        let post = match self.source.read(slug) {
            Ok(raw) => self.assemble(slug, slug, &raw, Profile::Rich)?,
            Err(Error::NotFound(_)) => self.find_post(slug)?,
            Err(e) => return Err(e),
        };
        tracing::debug!("Rendered post {}", slug);
        Ok(post)
    }

    fn find_post(&self, slug: &str) -> Result<Post> {
        for doc in self.source.list()? {
            let raw = match self.source.read_document(&doc) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!("Skipping {} while resolving {}: {}", doc.id, slug, e);
                    continue;
                }
            };
            let (block, _) = frontmatter::split(&raw, self.front_matter);
            // Documents whose header does not decode are never listed
            let Ok(meta) = metadata::decode(block) else {
                continue;
            };
            let listed_as = if meta.slug.is_empty() {
                doc.stem.as_str()
            } else {
                meta.slug.as_str()
            };
            if listed_as == slug {
                return self.assemble(&doc.id, &doc.stem, &raw, Profile::Rich);
            }
        }
        Err(Error::NotFound(slug.to_string()))
    }

    /// Load every post for the index with the plain profile.
    ///
    /// Unless `skip_invalid` is set, the first failing document fails the
    /// whole listing.
    pub fn load_posts(&self) -> Result<Vec<Post>> {
        if self.listing.skip_invalid {
            let listing = self.load_listing()?;
            for failure in &listing.failures {
                tracing::warn!("Skipping {}: {}", failure.id, failure.error);
            }
            return Ok(listing.posts);
        }

        let mut posts = Vec::new();
        for doc in self.source.list()? {
            posts.push(self.load_document(&doc)?);
        }
        self.sort(&mut posts);
        Ok(posts)
    }

    /// Load every post, collecting per-document failures instead of stopping.
    ///
    /// Only a failure to enumerate the source is an error.
    pub fn load_listing(&self) -> Result<Listing> {
        let mut listing = Listing::default();
        for doc in self.source.list()? {
            match self.load_document(&doc) {
                Ok(post) => listing.posts.push(post),
                Err(error) => listing.failures.push(ListingFailure { id: doc.id, error }),
            }
        }
        self.sort(&mut listing.posts);
        Ok(listing)
    }

    fn load_document(&self, doc: &DocumentRef) -> Result<Post> {
        let raw = self.source.read_document(doc)?;
        self.assemble(&doc.id, &doc.stem, &raw, Profile::Plain)
    }

    /// Split, decode and render one document
    fn assemble(&self, id: &str, default_slug: &str, raw: &str, profile: Profile) -> Result<Post> {
        let (block, body) = frontmatter::split(raw, self.front_matter);
        let mut meta = metadata::decode(block).map_err(|e| e.with_source_id(id))?;
        if meta.slug.is_empty() {
            meta.slug = default_slug.to_string();
        }
        let content = self.renderer.render(body, profile)?;
        Ok(Post::new(meta, content))
    }

    fn sort(&self, posts: &mut [Post]) {
        match self.listing.order_by {
            OrderBy::Traversal => {}
            OrderBy::Order => posts.sort_by_key(|p| p.meta.order),
            OrderBy::Date => {
                posts.sort_by(|a, b| b.meta.parsed_date().cmp(&a.meta.parsed_date()))
            }
        }
    }
}
