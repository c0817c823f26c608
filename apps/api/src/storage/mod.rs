//! Markdown archive for generated summaries. Backend (local directory or S3)
//! is chosen from config at startup.

mod local;
mod s3;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::StorageBackend;
use crate::models::summary::BroadcastSummary;
use crate::summary::fallback::soft_fail;

pub use local::LocalArchive;
pub use s3::S3Archive;

#[async_trait]
pub trait SummaryArchive: Send + Sync {
    /// Stores `markdown` for `broadcast_id`, returning the key or path written.
    async fn put_markdown(&self, broadcast_id: &str, markdown: &str) -> Result<String>;
}

/// Relative object key for a broadcast's markdown. Bytes outside
/// `[A-Za-z0-9-]` are written as `_XX` hex, so distinct ids never share a key
/// and ids cannot escape the prefix.
pub fn archive_key(broadcast_id: &str) -> String {
    let mut safe = String::with_capacity(broadcast_id.len());
    for byte in broadcast_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            safe.push(byte as char);
        } else {
            safe.push_str(&format!("_{byte:02X}"));
        }
    }
    format!("summaries/{safe}.md")
}

pub async fn build_archive(backend: &StorageBackend) -> Arc<dyn SummaryArchive> {
    match backend {
        StorageBackend::Local { root } => {
            info!("Summary archive: local directory {}", root.display());
            Arc::new(LocalArchive::new(root.clone()))
        }
        StorageBackend::S3(s3_config) => {
            info!("Summary archive: s3://{}", s3_config.bucket);
            Arc::new(S3Archive::from_config(s3_config).await)
        }
    }
}

/// Archives the summary's markdown if it has any. Never fails the caller.
pub async fn archive_summary(archive: &dyn SummaryArchive, summary: &BroadcastSummary) {
    let Some(markdown) = summary.full_markdown.as_deref() else {
        return;
    };
    let stored = soft_fail(
        &format!("archiving summary for broadcast {}", summary.broadcast_id),
        None,
        async {
            archive
                .put_markdown(&summary.broadcast_id, markdown)
                .await
                .map(Some)
        },
    )
    .await;
    if let Some(key) = stored {
        info!("Archived summary markdown to {key}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_key_plain_id() {
        assert_eq!(archive_key("b-123"), "summaries/b-123.md");
    }

    #[test]
    fn test_archive_key_escapes_traversal() {
        assert_eq!(archive_key("../x"), "summaries/_2E_2E_2Fx.md");
    }

    #[test]
    fn test_archive_key_distinct_ids_do_not_collide() {
        assert_ne!(archive_key("b.1"), archive_key("b_1"));
        assert_ne!(archive_key("b_2E1"), archive_key("b.1"));
        assert_eq!(archive_key("b_1"), "summaries/b_5F1.md");
    }
}
