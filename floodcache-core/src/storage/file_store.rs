use crate::error::{FloodError, Result};
use bytes::Bytes;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Bytes appended to a master file on every modification.
pub const MODIFICATION_MARKER: &[u8] = b"MODIFIED\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLocation {
    Master,
    Download,
}

/// Filenames found on disk at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInventory {
    pub masters: Vec<String>,
    pub downloads: Vec<String>,
}

/// FileStore keeps master copies in one directory and replicas in another.
pub struct FileStore {
    files_dir: PathBuf,
    downloads_dir: PathBuf,
}

impl FileStore {
    pub fn new(files_dir: PathBuf, downloads_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&files_dir)?;
        std::fs::create_dir_all(&downloads_dir)?;
        Ok(Self {
            files_dir,
            downloads_dir,
        })
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub async fn scan(&self) -> Result<LocalInventory> {
        Ok(LocalInventory {
            masters: list_regular_files(&self.files_dir).await?,
            downloads: list_regular_files(&self.downloads_dir).await?,
        })
    }

    /// Reads a file. `None` means the file is gone from disk.
    pub async fn read(&self, location: FileLocation, filename: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(location, filename)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Replaces a replica, writing through a uniquely named temporary file and a rename.
    ///
    /// Temporary files are hidden, so a crash mid-write never shows up in a scan.
    pub async fn write_download(&self, filename: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(FileLocation::Download, filename)?;
        let dir = self.downloads_dir.clone();
        let size = data.len();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(".")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&path).map_err(|error| error.error)?;
            Ok(())
        })
        .await
        .map_err(|error| FloodError::Internal(format!("replica write task failed: {}", error)))??;

        tracing::debug!("Stored replica {} ({} bytes)", filename, size);
        Ok(())
    }

    pub async fn append_master(&self, filename: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(FileLocation::Master, filename)?;
        let mut file = fs::OpenOptions::new().append(true).open(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    fn path_for(&self, location: FileLocation, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        let dir = match location {
            FileLocation::Master => &self.files_dir,
            FileLocation::Download => &self.downloads_dir,
        };
        Ok(dir.join(filename))
    }
}

/// Filenames are flat: no separators, no traversal, no hidden files.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(FloodError::InvalidRequest(
            "filename cannot be empty".to_string(),
        ));
    }

    if filename.starts_with('.') || filename.contains('/') || filename.contains('\\') {
        return Err(FloodError::InvalidRequest(format!(
            "invalid filename: {}",
            filename
        )));
    }

    Ok(())
}

async fn list_regular_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}
