use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{info, warn};

/// Disk-backed blob sink for uploaded material.
///
/// Blobs live at `{dir}/{room_id}/{material_id}.pdf`; the relative part is
/// the `location` recorded on the materials row.
pub struct MaterialStore {
    dir: PathBuf,
}

impl MaterialStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Material storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn location(room_id: &str, material_id: &str) -> String {
        format!("{}/{}.pdf", room_id, material_id)
    }

    pub fn path(&self, location: &str) -> PathBuf {
        self.dir.join(location)
    }

    /// Open a fresh blob file for writing.
    pub async fn create(&self, location: &str) -> Result<fs::File> {
        let path = self.path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::File::create(&path).await?)
    }

    /// Delete a blob. A missing file is fine: deletion is idempotent.
    pub async fn delete(&self, location: &str) -> Result<()> {
        match fs::remove_file(self.path(location)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", location);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete blobs with no backing row, skipping files younger than
    /// `grace` so an in-flight upload is never touched. Returns the number
    /// of files removed.
    pub async fn sweep_orphans(&self, live: &HashSet<String>, grace: Duration) -> Result<usize> {
        let mut removed = 0;
        let mut rooms = fs::read_dir(&self.dir).await?;
        while let Some(room) = rooms.next_entry().await? {
            if !room.file_type().await?.is_dir() {
                continue;
            }
            let room_name = room.file_name().to_string_lossy().into_owned();
            let mut files = fs::read_dir(room.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let location = format!("{}/{}", room_name, file.file_name().to_string_lossy());
                if live.contains(&location) {
                    continue;
                }
                let age = file
                    .metadata()
                    .await?
                    .modified()
                    .ok()
                    .and_then(|m| SystemTime::now().duration_since(m).ok());
                if age.is_some_and(|a| a >= grace) {
                    fs::remove_file(file.path()).await?;
                    info!("Removed orphaned blob {}", location);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
