//! On-disk storage for product photos and receipt scans.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// URL prefix under which stored files are served. Items record paths
/// relative to the site root, e.g. `uploads/1718000000000-ab12cd34-receipt.jpg`.
pub const PUBLIC_PREFIX: &str = "uploads";

const MAX_NAME_LEN: usize = 100;

pub struct AttachmentStore {
    // ---
    dir: PathBuf,
}

impl AttachmentStore {
    // ---
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        // ---
        Self { dir: dir.into() }
    }

    /// Writes `bytes` under a fresh, collision-free name and returns the public path.
    ///
    /// The stored name is `<millis>-<random>-<sanitized original name>`.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String> {
        // ---
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.dir.display()))?;

        let unique = uuid::Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            &unique[..8],
            sanitize_file_name(original_name)
        );

        let target = self.dir.join(&file_name);
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write attachment {}", target.display()))?;

        tracing::debug!("Stored attachment {} ({} bytes)", file_name, bytes.len());

        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(original: &str) -> String {
    // ---
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let mut name: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        name = "upload".to_string();
    }
    name
}
