use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::{
    clock::to_iso,
    models::{FileInfo, ShareRequest},
};

pub type ShareHandler = Arc<dyn Fn(&ShareRequest) + Send + Sync>;

/// File capabilities the attachment flow needs from the host platform.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn ensure_dir(&self, dir: &Path) -> io::Result<()>;
    /// `from` may be a plain path or a `file://` URI.
    async fn copy_file(&self, from: &str, to: &Path) -> io::Result<u64>;
    /// Deleting a file that is already gone succeeds.
    async fn delete_file(&self, path: &Path) -> io::Result<()>;
    async fn file_info(&self, path: &Path) -> io::Result<FileInfo>;
    /// Regular files directly inside `dir`; a missing directory is empty.
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
    fn can_share(&self) -> bool;
    async fn share_file(&self, request: &ShareRequest) -> io::Result<()>;
}

#[derive(Default)]
pub struct LocalFileSystem {
    share_handler: Option<ShareHandler>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_share_handler(handler: ShareHandler) -> Self {
        Self {
            share_handler: Some(handler),
        }
    }
}

fn uri_to_path(uri: &str) -> &Path {
    Path::new(uri.strip_prefix("file://").unwrap_or(uri))
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir).await
    }

    async fn copy_file(&self, from: &str, to: &Path) -> io::Result<u64> {
        let copied = fs::copy(uri_to_path(from), to).await?;
        debug!(to = %to.display(), bytes = copied, "file copied");
        Ok(copied)
    }

    async fn delete_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn file_info(&self, path: &Path) -> io::Result<FileInfo> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(FileInfo::default()),
            Err(error) => return Err(error),
        };

        Ok(FileInfo {
            exists: true,
            size: Some(metadata.len()),
            modified_at: metadata
                .modified()
                .ok()
                .map(|modified| to_iso(DateTime::<Utc>::from(modified))),
        })
    }

    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn can_share(&self) -> bool {
        self.share_handler.is_some()
    }

    async fn share_file(&self, request: &ShareRequest) -> io::Result<()> {
        let handler = self
            .share_handler
            .as_ref()
            .ok_or_else(|| io::Error::new(ErrorKind::Unsupported, "sharing not available"))?;
        handler(request);
        Ok(())
    }
}
