use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::{
    catalog,
    clock::parse_iso,
    error::StoreError,
    kv::{keys, keys_with_prefix, KeyValueStore},
    models::{CountryProgress, UploadedDocument},
    progress::ProgressRepository,
};

/// Flattened, newest-first list of every attached file across all countries.
/// Rebuilt from the per-country records on every load.
pub struct UploadedDocumentsView {
    store: Arc<dyn KeyValueStore>,
    progress: Arc<ProgressRepository>,
    documents: RwLock<Vec<UploadedDocument>>,
}

impl UploadedDocumentsView {
    pub fn new(store: Arc<dyn KeyValueStore>, progress: Arc<ProgressRepository>) -> Self {
        Self {
            store,
            progress,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Best effort: unreadable records are skipped, and a failed key listing
    /// keeps the previous list.
    pub async fn load_all_documents(&self) -> Vec<UploadedDocument> {
        let records = match self.read_records().await {
            Ok(records) => records,
            Err(error) => {
                warn!(error = %error, "failed to list progress records");
                return self.snapshot();
            }
        };

        let mut documents = Vec::new();
        for (key, record) in records {
            match record {
                Ok(progress) => documents.extend(uploaded_documents(progress)),
                Err(error) => {
                    warn!(key = %key, error = %error, "skipping unreadable progress record");
                }
            }
        }
        sort_newest_first(&mut documents);

        debug!(count = documents.len(), "uploaded documents loaded");
        *self.documents.write().expect("documents view poisoned") = documents.clone();
        documents
    }

    pub fn snapshot(&self) -> Vec<UploadedDocument> {
        self.documents
            .read()
            .expect("documents view poisoned")
            .clone()
    }

    /// Clears one attachment straight from storage, then rebuilds the list.
    /// Returns `false` when the record or document does not exist.
    pub async fn remove_document(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<bool, StoreError> {
        let removed = self
            .progress
            .detach_if_present(country_id, document_id)
            .await?;
        if removed {
            self.load_all_documents().await;
        }
        Ok(removed)
    }

    /// Every path still referenced by a record. Fails if any record cannot be
    /// read, since its references would be unknown.
    pub async fn live_file_paths(&self) -> Result<Vec<String>, StoreError> {
        let mut paths = Vec::new();
        for (_, record) in self.read_records().await? {
            paths.extend(
                record?
                    .documents
                    .into_iter()
                    .filter_map(|status| status.uploaded_file_path),
            );
        }
        Ok(paths)
    }

    pub fn clear(&self) {
        self.documents
            .write()
            .expect("documents view poisoned")
            .clear();
    }

    async fn read_records(
        &self,
    ) -> Result<Vec<(String, Result<CountryProgress, StoreError>)>, StoreError> {
        let progress_keys = keys_with_prefix(self.store.as_ref(), keys::PROGRESS_PREFIX).await?;
        let reads = progress_keys.into_iter().map(|key| async move {
            let record = self.read_record(&key).await;
            (key, record)
        });

        Ok(join_all(reads)
            .await
            .into_iter()
            .filter_map(|(key, record)| match record {
                Ok(Some(progress)) => Some((key, Ok(progress))),
                Ok(None) => None,
                Err(error) => Some((key, Err(error))),
            })
            .collect())
    }

    async fn read_record(&self, key: &str) -> Result<Option<CountryProgress>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }
}

fn uploaded_documents(progress: CountryProgress) -> impl Iterator<Item = UploadedDocument> {
    let country_name = catalog::country(&progress.country_id).map(|country| country.name.to_string());
    let country_id = progress.country_id;

    progress
        .documents
        .into_iter()
        .filter(|status| status.has_attachment())
        .map(move |status| UploadedDocument {
            country_id: country_id.clone(),
            country_name: country_name.clone(),
            status,
        })
}

/// Descending by `uploadedAt`; missing or unparsable timestamps sort last.
fn sort_newest_first(documents: &mut [UploadedDocument]) {
    documents.sort_by_key(|document| {
        std::cmp::Reverse(
            document
                .status
                .uploaded_at
                .as_deref()
                .and_then(parse_iso)
                .map(|uploaded_at| uploaded_at.timestamp_millis()),
        )
    });
}
