use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    aggregation::UploadedDocumentsView,
    clock::Clock,
    config::{Platform, RuntimeConfig},
    error::{AttachmentError, StoreError},
    models::{AttachOutcome, DocumentStatus, FileInfo, PickOutcome, ShareRequest},
    progress::ProgressRepository,
};

pub mod fs;
pub mod naming;
pub mod picker;

pub use fs::{FileSystem, LocalFileSystem, ShareHandler};
pub use naming::format_file_size;
pub use picker::{FilePicker, PresetPicker};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AttachmentPolicy {
    pub platform: Platform,
    pub documents_dir: PathBuf,
    pub max_file_size: u64,
}

impl AttachmentPolicy {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            platform: config.platform(),
            documents_dir: config.documents_dir(),
            max_file_size: config.max_file_size(),
        }
    }

    fn keeps_copies(&self) -> bool {
        self.platform == Platform::Native
    }
}

/// Keeps attached files and their progress records in step. A record only
/// ever points at a file that was fully copied; deleting files is best effort.
pub struct AttachmentService {
    fs: Arc<dyn FileSystem>,
    progress: Arc<ProgressRepository>,
    documents: Arc<UploadedDocumentsView>,
    clock: Arc<dyn Clock>,
    policy: AttachmentPolicy,
}

impl AttachmentService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        progress: Arc<ProgressRepository>,
        documents: Arc<UploadedDocumentsView>,
        clock: Arc<dyn Clock>,
        policy: AttachmentPolicy,
    ) -> Self {
        Self {
            fs,
            progress,
            documents,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &AttachmentPolicy {
        &self.policy
    }

    pub async fn attach(
        &self,
        country_id: &str,
        document_id: &str,
        picker: &dyn FilePicker,
    ) -> Result<AttachOutcome, AttachmentError> {
        if country_id.is_empty() || document_id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "countryId and documentId must not be empty".to_string(),
            )
            .into());
        }

        let file = match picker.pick().await? {
            PickOutcome::Cancelled => {
                debug!(country_id = %country_id, document_id = %document_id, "file pick cancelled");
                return Ok(AttachOutcome::Cancelled);
            }
            PickOutcome::Picked { file } => file,
        };

        let limit = self.policy.max_file_size;
        if let Some(size) = file.size.filter(|size| *size > limit) {
            return Err(AttachmentError::FileTooLarge {
                size,
                limit,
                limit_mb: limit / BYTES_PER_MB,
            });
        }
        if !naming::is_supported_file(&file.name, file.mime_type.as_deref()) {
            return Err(AttachmentError::UnsupportedType {
                name: file.name,
                mime_type: file.mime_type,
            });
        }

        let stored_path = if self.policy.keeps_copies() {
            let name = naming::stored_file_name(
                country_id,
                document_id,
                self.clock.now().timestamp_millis(),
                &file.name,
            );
            let destination = self.policy.documents_dir.join(name);
            self.fs
                .ensure_dir(&self.policy.documents_dir)
                .await
                .map_err(AttachmentError::Copy)?;
            if let Err(error) = self.fs.copy_file(&file.uri, &destination).await {
                self.delete_quietly(&destination).await;
                return Err(AttachmentError::Copy(error));
            }
            destination.to_string_lossy().into_owned()
        } else {
            file.uri.clone()
        };

        match self
            .progress
            .set_document_file(country_id, document_id, &file.name, &stored_path)
            .await
        {
            Ok(document) => {
                info!(
                    country_id = %country_id,
                    document_id = %document_id,
                    path = %stored_path,
                    "document attached"
                );
                Ok(AttachOutcome::Attached { document })
            }
            Err(error) => {
                if self.policy.keeps_copies() {
                    self.delete_quietly(Path::new(&stored_path)).await;
                }
                Err(error.into())
            }
        }
    }

    /// Removes the attachment from the per-country checklist. The file goes
    /// first; failing to delete it does not stop the record from clearing.
    pub async fn detach(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<DocumentStatus, AttachmentError> {
        if let Some(path) = self.stored_file_path(country_id, document_id).await? {
            self.delete_attachment_file(&path).await;
        }
        Ok(self
            .progress
            .remove_document_file(country_id, document_id)
            .await?)
    }

    /// Same as [`Self::detach`] but from the cross-country list; a document
    /// the record does not know about is left alone and yields `false`.
    pub async fn detach_uploaded(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<bool, AttachmentError> {
        if let Some(path) = self.stored_file_path(country_id, document_id).await? {
            self.delete_attachment_file(&path).await;
        }
        Ok(self
            .documents
            .remove_document(country_id, document_id)
            .await?)
    }

    pub async fn file_info(&self, path: &str) -> Result<FileInfo, AttachmentError> {
        if !self.policy.keeps_copies() {
            return Ok(FileInfo {
                exists: true,
                ..FileInfo::default()
            });
        }
        Ok(self.fs.file_info(Path::new(path)).await?)
    }

    /// Everything a share sheet needs for the stored file.
    pub async fn prepare_share(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<ShareRequest, AttachmentError> {
        let status = self.stored_status(country_id, document_id).await?;
        let (Some(file_name), Some(file_path)) = (
            status.as_ref().and_then(|status| status.uploaded_file_name.clone()),
            status.and_then(|status| status.uploaded_file_path),
        ) else {
            return Err(AttachmentError::NotFound {
                country_id: country_id.to_string(),
                document_id: document_id.to_string(),
            });
        };

        if !self.file_info(&file_path).await?.exists {
            return Err(AttachmentError::FileMissing(file_path));
        }

        Ok(ShareRequest {
            mime_type: naming::mime_type_for(&file_name).to_string(),
            uti: naming::uti_for(&file_name).to_string(),
            display_name: file_name,
            path: file_path,
        })
    }

    pub async fn share(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<ShareRequest, AttachmentError> {
        if !self.fs.can_share() {
            return Err(AttachmentError::ShareUnavailable);
        }
        let request = self.prepare_share(country_id, document_id).await?;
        self.fs.share_file(&request).await?;
        Ok(request)
    }

    /// Deletes every file in the documents directory that no record points
    /// at. Refuses to run when any record is unreadable. Returns the number
    /// of files deleted.
    pub async fn cleanup_orphaned_files(&self) -> Result<usize, AttachmentError> {
        if !self.policy.keeps_copies() {
            return Ok(0);
        }

        let live: HashSet<String> = self.documents.live_file_paths().await?.into_iter().collect();
        let files = self.fs.list_dir(&self.policy.documents_dir).await?;

        let mut deleted = 0;
        for file in files {
            if live.contains(file.to_string_lossy().as_ref()) {
                continue;
            }
            match self.fs.delete_file(&file).await {
                Ok(()) => deleted += 1,
                Err(error) => {
                    warn!(path = %file.display(), error = %error, "failed to delete orphaned file");
                }
            }
        }

        info!(deleted, "orphaned files cleaned up");
        Ok(deleted)
    }

    async fn stored_status(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<Option<DocumentStatus>, StoreError> {
        Ok(self
            .progress
            .fetch_progress(country_id)
            .await?
            .and_then(|progress| progress.document(document_id).cloned()))
    }

    /// The path alone identifies the file; older records may lack a timestamp.
    async fn stored_file_path(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .stored_status(country_id, document_id)
            .await?
            .and_then(|status| status.uploaded_file_path))
    }

    async fn delete_attachment_file(&self, path: &str) {
        if self.policy.keeps_copies() {
            self.delete_quietly(Path::new(path)).await;
        }
    }

    async fn delete_quietly(&self, path: &Path) {
        if let Err(error) = self.fs.delete_file(path).await {
            warn!(path = %path.display(), error = %error, "failed to delete attachment file");
        }
    }
}
