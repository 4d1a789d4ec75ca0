//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site title handed to templates
    pub title: String,

    // Directories (relative paths resolve against the base directory)
    pub posts_dir: String,
    pub static_dir: String,
    pub template_dir: String,

    // Server
    pub ip: String,
    pub port: u16,

    // Content
    pub front_matter: FrontMatterStyle,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub listing: ListingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Blog".to_string(),

            posts_dir: "markdown".to_string(),
            static_dir: "static".to_string(),
            template_dir: "templates".to_string(),

            ip: "0.0.0.0".to_string(),
            port: 8080,

            front_matter: FrontMatterStyle::default(),
            highlight: HighlightConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        // An empty file means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// Which front-matter delimiter convention documents use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontMatterStyle {
    /// `---` on the first line, closed by the next `---` line
    #[default]
    Fenced,
    /// Everything before the first `\n---\n` is metadata
    Split,
}

/// Syntax highlighting for the rich rendering profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_numbers: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_numbers: false,
        }
    }
}

/// Index listing behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub order_by: OrderBy,
    /// Render the documents that parse and report the rest, instead of
    /// failing the whole index
    pub skip_invalid: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    /// Directory walk order
    #[default]
    Traversal,
    /// Ascending by the `Order` front-matter field
    Order,
    /// Newest `Date` first
    Date,
}
