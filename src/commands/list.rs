//! List posts

use anyhow::Result;

use crate::config::FrontMatterStyle;
use crate::content::{frontmatter, metadata, ContentSource, FsSource, PostMetadata};
use crate::Blog;

/// One line of `mdblog list` output
#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub meta: PostMetadata,
}

/// Read the front-matter of every post without rendering bodies
pub fn summaries(source: &FsSource, style: FrontMatterStyle) -> Result<Vec<PostSummary>> {
    let mut summaries = Vec::new();
    for doc in source.list()? {
        let block = match style {
            FrontMatterStyle::Fenced => {
                // Only the header is consumed; the body reader is dropped unread
                let (block, _body) = frontmatter::split_reader(source.open(&doc)?)?;
                block
            }
            FrontMatterStyle::Split => {
                let raw = source.read_document(&doc)?;
                frontmatter::split(&raw, style).0.to_string()
            }
        };
        let mut meta = metadata::decode(&block).map_err(|e| e.with_source_id(&doc.id))?;
        if meta.slug.is_empty() {
            meta.slug = doc.stem.clone();
        }
        summaries.push(PostSummary { id: doc.id, meta });
    }
    Ok(summaries)
}

/// List posts found in the posts directory
pub fn run(blog: &Blog) -> Result<()> {
    let source = FsSource::new(&blog.posts_dir);
    let posts = summaries(&source, blog.config.front_matter)?;

    println!("Posts ({}):", posts.len());
    for post in posts {
        let date = if post.meta.date.is_empty() {
            "----------".to_string()
        } else {
            post.meta.date.clone()
        };
        println!(
            "  {} - {} /posts/{} [{}]",
            date, post.meta.title, post.meta.slug, post.id
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_summaries_read_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.md"),
            "---\nTitle: Alpha\nDate: 2024-02-02\n---\n# Body is never rendered",
        )
        .unwrap();
        fs::write(dir.path().join("b.md"), "# No header").unwrap();

        let source = FsSource::new(dir.path());
        let mut posts = summaries(&source, FrontMatterStyle::Fenced).unwrap();
        posts.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].meta.title, "Alpha");
        assert_eq!(posts[0].meta.slug, "a");
        assert_eq!(posts[0].meta.date, "2024-02-02");
        assert_eq!(
            posts[1].meta,
            PostMetadata {
                slug: "b".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_summaries_report_malformed_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.md"), "---\nTitle: [oops\n---\n").unwrap();
        let err = summaries(&FsSource::new(dir.path()), FrontMatterStyle::Fenced).unwrap_err();
        assert!(err.to_string().contains("bad.md"));
    }

    #[test]
    fn test_summaries_follow_split_convention() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("legacy.md"), "Title: Legacy\n---\nBody").unwrap();
        let source = FsSource::new(dir.path());

        let posts = summaries(&source, FrontMatterStyle::Split).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].meta.title, "Legacy");
        assert_eq!(posts[0].meta.slug, "legacy");

        // The fenced reader sees no header in the same file
        let posts = summaries(&source, FrontMatterStyle::Fenced).unwrap();
        assert_eq!(posts[0].meta.title, "");
    }
}
