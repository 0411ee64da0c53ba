use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::AppError;

/// Where uploaded message media lands. The URL it returns is what message
/// payloads carry, so it must stay resolvable for the life of the message.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn store(&self, original_name: &str, data: Bytes) -> Result<String, AppError>;
}

/// Disk-backed storage under a single flat media root, served back out by
/// the media route.
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Keep letters, digits, dots, dashes and underscores; everything else
    /// becomes an underscore. Runs of dots collapse to one so the stored
    /// name never contains `..` and stays servable past the traversal
    /// guard on the media route. An empty name becomes "file".
    fn sanitize(original: &str) -> String {
        if original.is_empty() {
            return "file".to_string();
        }
        let mut name = String::with_capacity(original.len());
        for c in original.chars() {
            let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            };
            if c == '.' && name.ends_with('.') {
                continue;
            }
            name.push(c);
        }
        name
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn store(&self, original_name: &str, data: Bytes) -> Result<String, AppError> {
        let file_name = format!("{}-{}", Uuid::new_v4(), Self::sanitize(original_name));

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&file_name), &data).await?;

        Ok(format!(
            "{}/media/{}",
            self.base_url.trim_end_matches('/'),
            file_name
        ))
    }
}
