//! mdblog: a minimal blog server
//!
//! Posts are Markdown files with optional YAML front-matter. Every request
//! re-reads the posts directory, splits off the front-matter, decodes it and
//! renders the body to HTML before handing the result to a Tera template.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod server;
pub mod templates;

pub use error::{Error, ErrorKind, Result};

use std::path::{Path, PathBuf};

use content::{ContentLoader, FsSource};
use templates::{SiteInfo, TemplateRenderer};

/// The main blog application
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown posts directory
    pub posts_dir: PathBuf,
    /// Static assets served under /static
    pub static_dir: PathBuf,
    /// Template override directory
    pub template_dir: PathBuf,
}

impl Blog {
    /// Create a new Blog instance from a directory, reading `_config.yml`
    /// when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a Blog from an already loaded configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let posts_dir = base_dir.join(&config.posts_dir);
        let static_dir = base_dir.join(&config.static_dir);
        let template_dir = base_dir.join(&config.template_dir);

        Self {
            config,
            base_dir,
            posts_dir,
            static_dir,
            template_dir,
        }
    }

    /// Content loader reading from the posts directory
    pub fn loader(&self) -> ContentLoader<FsSource> {
        ContentLoader::from_config(FsSource::new(&self.posts_dir), &self.config)
    }

    /// Templates, with overrides from the template directory
    pub fn templates(&self) -> Result<TemplateRenderer> {
        TemplateRenderer::load(&self.template_dir)
    }

    pub fn site_info(&self) -> SiteInfo {
        SiteInfo {
            title: self.config.title.clone(),
        }
    }
}
