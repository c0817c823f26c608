use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{archive_key, SummaryArchive};

pub struct LocalArchive {
    root: PathBuf,
}

impl LocalArchive {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl SummaryArchive for LocalArchive {
    async fn put_markdown(&self, broadcast_id: &str, markdown: &str) -> Result<String> {
        let path = self.root.join(archive_key(broadcast_id));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, markdown)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_markdown_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LocalArchive::new(dir.path().to_path_buf());

        let written = archive.put_markdown("b-7", "# Recap").await.unwrap();
        let content = tokio::fs::read_to_string(&written).await.unwrap();
        assert_eq!(content, "# Recap");
        assert!(written.ends_with("summaries/b-7.md"));
    }

    #[tokio::test]
    async fn test_overwrites_existing_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LocalArchive::new(dir.path().to_path_buf());

        archive.put_markdown("b-7", "old").await.unwrap();
        let written = archive.put_markdown("b-7", "new").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&written).await.unwrap(), "new");
    }
}
