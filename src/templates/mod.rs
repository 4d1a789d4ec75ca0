//! Page templates using the Tera template engine
//!
//! `index.html` and `post.html` (plus the `base.html` they extend) are
//! embedded in the binary. Any `*.html` file in the configured template
//! directory replaces the embedded template of the same name.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use walkdir::WalkDir;

use crate::content::Post;
use crate::error::{Error, Result};

pub const INDEX_TEMPLATE: &str = "index.html";
pub const POST_TEMPLATE: &str = "post.html";

const EMBEDDED: [(&str, &str); 3] = [
    ("base.html", include_str!("default/base.html")),
    (INDEX_TEMPLATE, include_str!("default/index.html")),
    (POST_TEMPLATE, include_str!("default/post.html")),
];

/// Site-wide values available to every template as `site`
#[derive(Debug, Clone, Serialize)]
pub struct SiteInfo {
    pub title: String,
}

/// Template renderer for the index and post views
pub struct TemplateRenderer {
    tera: Tera,
    dir: Option<PathBuf>,
}

impl TemplateRenderer {
    /// Create a renderer with only the embedded templates
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a renderer whose templates may be overridden from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::build(Some(dir.as_ref().to_path_buf()))
    }

    /// Re-read templates from disk
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::build(self.dir.clone())?;
        Ok(())
    }

    fn build(dir: Option<PathBuf>) -> Result<Self> {
        let mut sources: BTreeMap<String, String> = EMBEDDED
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_string()))
            .collect();

        if let Some(dir) = dir.as_deref().filter(|d| d.is_dir()) {
            for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().map_or(true, |ext| ext != "html")
                {
                    continue;
                }
                let name = path
                    .strip_prefix(dir)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/");
                let body = fs::read_to_string(path).map_err(|e| Error::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                tracing::debug!("Loaded template {}", name);
                sources.insert(name, body);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)?;

        Ok(Self { tera, dir })
    }

    /// Render the post listing
    pub fn render_index(&self, site: &SiteInfo, posts: &[Post]) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("posts", posts);
        Ok(self.tera.render(INDEX_TEMPLATE, &context)?)
    }

    /// Render a single post
    pub fn render_post(&self, site: &SiteInfo, post: &Post) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("post", post);
        Ok(self.tera.render(POST_TEMPLATE, &context)?)
    }
}
