use crate::{error::Result, Book, CatalogSnapshot};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes `data` as pretty JSON, replacing `path` only once the write is complete.
pub async fn save_json<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(data)?).await?;
    tokio::fs::rename(&tmp, path).await?;

    info!(path = %path.display(), "output written");
    Ok(())
}

pub async fn load_snapshot(path: &Path) -> Result<CatalogSnapshot> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub async fn load_books(path: &Path) -> Result<Vec<Book>> {
    Ok(load_snapshot(path).await?.books)
}

/// Number of book records in a scrape output file.
pub async fn count_records(path: &Path) -> Result<usize> {
    Ok(load_snapshot(path).await?.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".tmp");
    path.with_file_name(name)
}
