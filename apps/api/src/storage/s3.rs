use anyhow::Result;
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;

use super::{archive_key, SummaryArchive};
use crate::config::S3Config;

pub struct S3Archive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Archive {
    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn from_config(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "summary-api-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        Self {
            client: aws_sdk_s3::Client::new(&s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl SummaryArchive for S3Archive {
    async fn put_markdown(&self, broadcast_id: &str, markdown: &str) -> Result<String> {
        let key = archive_key(broadcast_id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(markdown.as_bytes().to_vec()))
            .content_type("text/markdown")
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}
