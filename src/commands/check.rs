//! Validate every post

use anyhow::Result;

use crate::Blog;

/// Render every post the way the index does and report failures
pub fn run(blog: &Blog) -> Result<()> {
    let listing = blog.loader().load_listing()?;

    println!("{} post(s) OK", listing.posts.len());
    if listing.failures.is_empty() {
        return Ok(());
    }

    println!("{} post(s) failed:", listing.failures.len());
    for failure in &listing.failures {
        println!("  {}: {}", failure.id, failure.error);
    }
    anyhow::bail!("{} post(s) failed to render", listing.failures.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;

    #[test]
    fn test_check_passes_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("markdown");
        fs::create_dir_all(&posts).unwrap();
        fs::write(posts.join("ok.md"), "---\nTitle: Fine\n---\nBody").unwrap();

        let blog = Blog::with_config(dir.path(), SiteConfig::default());
        assert!(run(&blog).is_ok());

        fs::write(posts.join("bad.md"), "---\nOrder: x\n---\nBody").unwrap();
        assert!(run(&blog).is_err());
    }
}
