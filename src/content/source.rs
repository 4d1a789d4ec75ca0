//! Where raw post text comes from

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File extensions treated as Markdown posts, in lookup order
pub const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// A document found while enumerating a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Stable identifier within the source (relative path for files)
    pub id: String,
    /// Slug derived from the file name, used when front-matter has none
    pub stem: String,
}

/// Read access to raw post documents
pub trait ContentSource: Send + Sync {
    /// Raw text of the post addressed by `slug`
    fn read(&self, slug: &str) -> Result<String>;

    /// Every document in the source, in traversal order
    fn list(&self) -> Result<Vec<DocumentRef>>;

    /// Raw text of a document returned by [`ContentSource::list`]
    fn read_document(&self, doc: &DocumentRef) -> Result<String>;
}

/// Posts stored as Markdown files under a root directory
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a listed document for streaming reads
    pub fn open(&self, doc: &DocumentRef) -> Result<BufReader<File>> {
        let path = self.root.join(&doc.id);
        File::open(&path)
            .map(BufReader::new)
            .map_err(|e| Error::from_io(&doc.id, &path, e))
    }
}

impl ContentSource for FsSource {
    fn read(&self, slug: &str) -> Result<String> {
        if !is_valid_slug(slug) {
            return Err(Error::NotFound(slug.to_string()));
        }

        for ext in MARKDOWN_EXTENSIONS {
            let path = self.root.join(format!("{}.{}", slug, ext));
            match fs::read_to_string(&path) {
                Ok(content) => return Ok(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::from_io(slug, &path, e)),
            }
        }

        Err(Error::NotFound(slug.to_string()))
    }

    fn list(&self) -> Result<Vec<DocumentRef>> {
        if !self.root.exists() {
            tracing::debug!("Posts directory {:?} does not exist", self.root);
            return Ok(Vec::new());
        }

        let mut docs = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                Error::Io {
                    path,
                    source: e.into(),
                }
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_markdown_file(path) {
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            docs.push(DocumentRef {
                id: relative.to_string_lossy().to_string(),
                stem,
            });
        }

        Ok(docs)
    }

    fn read_document(&self, doc: &DocumentRef) -> Result<String> {
        let path = self.root.join(&doc.id);
        fs::read_to_string(&path).map_err(|e| Error::from_io(&doc.id, &path, e))
    }
}

/// In-memory documents, kept in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    docs: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document addressed by `slug`
    pub fn with(mut self, slug: &str, content: &str) -> Self {
        self.insert(slug, content);
        self
    }

    pub fn insert(&mut self, slug: &str, content: &str) {
        match self.docs.iter_mut().find(|(id, _)| id == slug) {
            Some(existing) => existing.1 = content.to_string(),
            None => self.docs.push((slug.to_string(), content.to_string())),
        }
    }
}

impl ContentSource for MemorySource {
    fn read(&self, slug: &str) -> Result<String> {
        self.docs
            .iter()
            .find(|(id, _)| id == slug)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| Error::NotFound(slug.to_string()))
    }

    fn list(&self) -> Result<Vec<DocumentRef>> {
        Ok(self
            .docs
            .iter()
            .map(|(id, _)| DocumentRef {
                id: id.clone(),
                stem: id.clone(),
            })
            .collect())
    }

    fn read_document(&self, doc: &DocumentRef) -> Result<String> {
        self.read(&doc.id)
    }
}

/// Check if a file is a markdown file
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MARKDOWN_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// A slug must name a single file directly under the root
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.contains(['/', '\\', '\0'])
}
