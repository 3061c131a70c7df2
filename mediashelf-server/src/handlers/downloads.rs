use axum::{extract::State, response::Json};
use mediashelf_core::{CollectionKind, INDEX_FILE_NAME};
use serde::Serialize;
use std::io;

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DownloadEntry {
    pub name: String,
    pub size: u64,
}

/// Lists the files offered in the downloads collection, by name.
pub async fn list_downloads_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<DownloadEntry>>> {
    let dir = CollectionKind::Downloads
        .spec()
        .collection_dir(state.synchronizer.root());

    let mut reader = match tokio::fs::read_dir(&dir).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Json(Vec::new()));
        }
        Err(err) => return Err(err.into()),
    };

    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == INDEX_FILE_NAME {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        entries.push(DownloadEntry {
            name,
            size: metadata.len(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(entries))
}
