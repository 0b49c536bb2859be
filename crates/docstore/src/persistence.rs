//! Store persistence using JSON file storage
//!
//! The file holds every collection as `{ collection: { id: document } }`.

use crate::Document;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// On-disk layout: collection name, then document id
pub type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// Load all collections from a JSON file
pub async fn load_collections(path: &Path) -> Collections {
    match fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<Collections>(&contents) {
            Ok(collections) => {
                let count: usize = collections.values().map(BTreeMap::len).sum();
                tracing::info!("Loaded {} documents from {:?}", count, path);
                collections
            }
            Err(e) => {
                tracing::warn!("Failed to parse store file {:?}: {}", path, e);
                Collections::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No store file found at {:?}, starting fresh", path);
            Collections::new()
        }
        Err(e) => {
            tracing::warn!("Failed to read store file {:?}: {}", path, e);
            Collections::new()
        }
    }
}

/// Save all collections to a JSON file atomically
#[allow(clippy::missing_errors_doc)]
pub async fn save_collections(path: &Path, collections: &Collections) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(collections)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Write to temp file, then rename
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;

    tracing::debug!("Saved {} collections to {:?}", collections.len(), path);
    Ok(())
}
