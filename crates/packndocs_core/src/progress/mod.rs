use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::{
    catalog,
    clock::{to_iso, Clock},
    error::StoreError,
    kv::{keys, keys_with_prefix, KeyValueStore},
    models::{Attachment, CountryProgress, DocumentStatus, DocumentStatusPatch, ProgressSummary},
};

pub mod locks;

use locks::KeyedLocks;

/// Owns the `packndocs_progress_<countryId>` keyspace.
///
/// Every read-modify-write of a record runs under that country's lock and
/// starts from the durable copy, so back-to-back mutations of one country never
/// lose updates. The loaded view is only replaced after the write commits.
pub struct ProgressRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    loaded: RwLock<HashMap<String, CountryProgress>>,
}

impl ProgressRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Stored record for `country_id`, or a fresh empty one. Read failures are
    /// logged and reported as "no data yet".
    ///
    /// Holds the country lock, so the loaded view never goes back to a record
    /// older than one a concurrent mutation already committed.
    pub async fn load_progress(&self, country_id: &str) -> CountryProgress {
        if country_id.is_empty() {
            return self.fresh(country_id);
        }

        let _guard = self.locks.lock(country_id).await;
        match self.fetch_progress(country_id).await {
            Ok(stored) => {
                let progress = stored.unwrap_or_else(|| self.fresh(country_id));
                self.remember(progress.clone());
                progress
            }
            Err(error) => {
                warn!(country_id = %country_id, error = %error, "failed to load progress");
                self.fresh(country_id)
            }
        }
    }

    /// Raw durable read; `None` when the country has never been written.
    pub async fn fetch_progress(
        &self,
        country_id: &str,
    ) -> Result<Option<CountryProgress>, StoreError> {
        let key = keys::progress_key(country_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode { key, source })
    }

    pub async fn update_document_status(
        &self,
        country_id: &str,
        document_id: &str,
        patch: DocumentStatusPatch,
    ) -> Result<DocumentStatus, StoreError> {
        self.mutate(country_id, document_id, |_| patch).await
    }

    pub async fn toggle_document_complete(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<DocumentStatus, StoreError> {
        self.mutate(country_id, document_id, |current| {
            let completed = current.is_some_and(|status| status.completed);
            DocumentStatusPatch::completed(!completed)
        })
        .await
    }

    pub async fn set_document_file(
        &self,
        country_id: &str,
        document_id: &str,
        file_name: &str,
        file_path: &str,
    ) -> Result<DocumentStatus, StoreError> {
        let attachment = Attachment {
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            uploaded_at: to_iso(self.clock.now()),
        };
        self.mutate(country_id, document_id, |_| {
            DocumentStatusPatch::attach(attachment)
        })
        .await
    }

    /// Clears the attachment fields only; deleting the file is the caller's job.
    pub async fn remove_document_file(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<DocumentStatus, StoreError> {
        self.mutate(country_id, document_id, |_| DocumentStatusPatch::detach())
            .await
    }

    /// Detaches `document_id` only if the stored record already lists it.
    /// Returns whether anything was written.
    pub async fn detach_if_present(
        &self,
        country_id: &str,
        document_id: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.locks.lock(country_id).await;
        let Some(mut progress) = self.fetch_progress(country_id).await? else {
            return Ok(false);
        };
        if progress.document(document_id).is_none() {
            return Ok(false);
        }

        progress.apply(document_id, &DocumentStatusPatch::detach());
        progress.last_updated = to_iso(self.clock.now());
        self.persist(&progress).await?;
        self.remember(progress);
        Ok(true)
    }

    pub fn get_document_status(&self, country_id: &str, document_id: &str) -> Option<DocumentStatus> {
        let loaded = self.loaded.read().expect("progress cache poisoned");
        loaded
            .get(country_id)
            .and_then(|progress| progress.document(document_id))
            .cloned()
    }

    pub fn get_completed_count(&self, country_id: &str) -> usize {
        let loaded = self.loaded.read().expect("progress cache poisoned");
        loaded
            .get(country_id)
            .map(CountryProgress::completed_count)
            .unwrap_or_default()
    }

    /// Progress against the country's catalog; percentage is of required documents.
    pub fn progress_summary(&self, country_id: &str) -> ProgressSummary {
        let requirements = catalog::documents_for_country(country_id);
        let loaded = self.loaded.read().expect("progress cache poisoned");
        let progress = loaded.get(country_id);
        let is_done = |document_id: &str| {
            progress
                .and_then(|progress| progress.document(document_id))
                .is_some_and(|status| status.completed)
        };

        let required = requirements.iter().filter(|doc| doc.required).count();
        let completed = requirements.iter().filter(|doc| is_done(doc.id)).count();
        let completed_required = requirements
            .iter()
            .filter(|doc| doc.required && is_done(doc.id))
            .count();
        let percentage = if required == 0 {
            0
        } else {
            ((completed_required * 100 + required / 2) / required).min(100) as u8
        };

        ProgressSummary {
            total: requirements.len(),
            required,
            completed,
            completed_required,
            percentage,
        }
    }

    pub async fn clear_progress(&self, country_id: &str) -> Result<(), StoreError> {
        let _guard = self.locks.lock(country_id).await;
        self.store.remove(&keys::progress_key(country_id)).await?;
        self.loaded
            .write()
            .expect("progress cache poisoned")
            .remove(country_id);
        debug!(country_id = %country_id, "progress cleared");
        Ok(())
    }

    /// Locks every country that currently has a stored record, in key order.
    /// No mutation of those countries can interleave until the guards drop.
    pub async fn lock_stored_countries(&self) -> Result<Vec<OwnedMutexGuard<()>>, StoreError> {
        let stored = keys_with_prefix(self.store.as_ref(), keys::PROGRESS_PREFIX).await?;
        let mut guards = Vec::with_capacity(stored.len());
        for key in &stored {
            if let Some(country_id) = keys::country_id_from_progress_key(key) {
                guards.push(self.locks.lock(country_id).await);
            }
        }
        Ok(guards)
    }

    /// Drops every loaded record; used after the whole namespace was wiped.
    pub fn forget_all(&self) {
        self.loaded.write().expect("progress cache poisoned").clear();
    }

    async fn mutate<F>(
        &self,
        country_id: &str,
        document_id: &str,
        build_patch: F,
    ) -> Result<DocumentStatus, StoreError>
    where
        F: FnOnce(Option<&DocumentStatus>) -> DocumentStatusPatch + Send,
    {
        if country_id.is_empty() || document_id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "countryId and documentId must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.lock(country_id).await;
        let mut progress = self
            .fetch_progress(country_id)
            .await?
            .unwrap_or_else(|| self.fresh(country_id));

        let patch = build_patch(progress.document(document_id));
        let status = progress.apply(document_id, &patch);
        progress.last_updated = to_iso(self.clock.now());

        self.persist(&progress).await?;
        self.remember(progress);

        debug!(
            country_id = %country_id,
            document_id = %document_id,
            completed = status.completed,
            attached = status.has_attachment(),
            "document status updated"
        );
        Ok(status)
    }

    async fn persist(&self, progress: &CountryProgress) -> Result<(), StoreError> {
        let key = keys::progress_key(&progress.country_id);
        let serialized = serde_json::to_string(progress).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.store.set(&key, &serialized).await
    }

    fn remember(&self, progress: CountryProgress) {
        self.loaded
            .write()
            .expect("progress cache poisoned")
            .insert(progress.country_id.clone(), progress);
    }

    fn fresh(&self, country_id: &str) -> CountryProgress {
        CountryProgress::empty(country_id, to_iso(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        kv::{memory::StallingStore, MemoryKeyValueStore},
    };
    use async_trait::async_trait;
    use std::time::Duration;

    fn repository() -> (Arc<MemoryKeyValueStore>, ProgressRepository) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let repo = ProgressRepository::new(store.clone(), Arc::new(SystemClock));
        (store, repo)
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disk unplugged".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk unplugged".to_string()))
        }
        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk unplugged".to_string()))
        }
        async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("disk unplugged".to_string()))
        }
        async fn remove_many(&self, _keys: &[String]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk unplugged".to_string()))
        }
    }

    #[tokio::test]
    async fn unknown_country_loads_as_empty_record() {
        let (store, repo) = repository();
        let progress = repo.load_progress("germany").await;

        assert_eq!(progress.country_id, "germany");
        assert!(progress.documents.is_empty());
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_twice_restores_previous_value() {
        let (_store, repo) = repository();

        let first = repo.toggle_document_complete("germany", "passport").await.unwrap();
        assert_eq!(first, DocumentStatus {
            completed: true,
            ..DocumentStatus::new("passport")
        });

        let second = repo.toggle_document_complete("germany", "passport").await.unwrap();
        assert!(!second.completed);
        assert_eq!(repo.get_document_status("germany", "passport"), Some(second));
    }

    #[tokio::test]
    async fn set_file_then_remove_file() {
        let (_store, repo) = repository();
        repo.load_progress("germany").await;
        let before = repo.get_completed_count("germany");

        repo.set_document_file(
            "germany",
            "insurance",
            "policy.pdf",
            "/app/docs/germany_insurance_171.pdf",
        )
        .await
        .unwrap();

        let status = repo.get_document_status("germany", "insurance").unwrap();
        assert!(status.completed);
        assert_eq!(status.uploaded_file_name.as_deref(), Some("policy.pdf"));
        assert_eq!(
            status.uploaded_file_path.as_deref(),
            Some("/app/docs/germany_insurance_171.pdf")
        );
        assert!(status.uploaded_at.is_some());
        assert_eq!(repo.get_completed_count("germany"), before + 1);

        repo.remove_document_file("germany", "insurance").await.unwrap();
        let status = repo.get_document_status("germany", "insurance").unwrap();
        assert!(!status.completed);
        assert!(!status.has_attachment());
        assert!(status.uploaded_file_name.is_none());
        assert!(status.uploaded_at.is_none());
    }

    #[tokio::test]
    async fn stored_record_round_trips() {
        let (store, repo) = repository();
        repo.toggle_document_complete("usa", "ds160").await.unwrap();
        repo.set_document_file("usa", "photo", "me.png", "/docs/usa_photo_1.png")
            .await
            .unwrap();
        let written = repo.fetch_progress("usa").await.unwrap().unwrap();

        let reloaded = ProgressRepository::new(store, Arc::new(SystemClock));
        assert_eq!(reloaded.load_progress("usa").await, written);
    }

    #[tokio::test]
    async fn concurrent_updates_of_one_country_are_not_lost() {
        let (_store, repo) = repository();
        let repo = Arc::new(repo);

        let mut tasks = Vec::new();
        for index in 0..16 {
            let repo = Arc::clone(&repo);
            tasks.push(tokio::spawn(async move {
                repo.toggle_document_complete("germany", &format!("doc_{index}"))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = repo.fetch_progress("germany").await.unwrap().unwrap();
        assert_eq!(stored.documents.len(), 16);
        assert_eq!(stored.completed_count(), 16);
    }

    #[tokio::test]
    async fn slow_load_does_not_hide_a_concurrent_toggle() {
        let store = Arc::new(StallingStore::new(Duration::from_millis(200)));
        let repo = Arc::new(ProgressRepository::new(store.clone(), Arc::new(SystemClock)));

        store.stall_next_get();
        let load = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.load_progress("germany").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = repo.toggle_document_complete("germany", "passport").await.unwrap();
        assert!(status.completed);
        load.await.unwrap();

        assert_eq!(repo.get_document_status("germany", "passport"), Some(status));
        assert_eq!(repo.get_completed_count("germany"), 1);
        let stored = repo.fetch_progress("germany").await.unwrap().unwrap();
        assert_eq!(stored.completed_count(), 1);
    }

    #[tokio::test]
    async fn stored_countries_are_locked_until_guards_drop() {
        let (_store, repo) = repository();
        let repo = Arc::new(repo);
        repo.toggle_document_complete("germany", "passport").await.unwrap();

        let guards = repo.lock_stored_countries().await.unwrap();
        assert_eq!(guards.len(), 1);
        let toggle = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.toggle_document_complete("germany", "photo").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!toggle.is_finished());

        drop(guards);
        assert!(toggle.await.unwrap().unwrap().completed);
    }

    #[tokio::test]
    async fn clear_progress_forgets_record() {
        let (store, repo) = repository();
        repo.toggle_document_complete("germany", "passport").await.unwrap();
        repo.clear_progress("germany").await.unwrap();

        assert!(store.get("packndocs_progress_germany").await.unwrap().is_none());
        assert_eq!(repo.get_document_status("germany", "passport"), None);
        assert!(repo.load_progress("germany").await.documents.is_empty());
    }

    #[tokio::test]
    async fn corrupt_record_loads_as_empty() {
        let store = Arc::new(MemoryKeyValueStore::with_entries([(
            "packndocs_progress_germany",
            "{broken",
        )]));
        let repo = ProgressRepository::new(store, Arc::new(SystemClock));

        assert!(repo.load_progress("germany").await.documents.is_empty());
        assert!(matches!(
            repo.fetch_progress("germany").await,
            Err(StoreError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn failed_write_leaves_loaded_view_untouched() {
        let repo = ProgressRepository::new(Arc::new(BrokenStore), Arc::new(SystemClock));

        let progress = repo.load_progress("germany").await;
        assert!(progress.documents.is_empty());

        let result = repo.toggle_document_complete("germany", "passport").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(repo.get_document_status("germany", "passport"), None);
        assert_eq!(repo.get_completed_count("germany"), 0);
    }

    #[tokio::test]
    async fn empty_ids_are_rejected_on_write() {
        let (_store, repo) = repository();
        let result = repo.toggle_document_complete("", "passport").await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn detach_if_present_skips_unknown_documents() {
        let (store, repo) = repository();
        assert!(!repo.detach_if_present("germany", "passport").await.unwrap());
        assert!(store.list_keys().await.unwrap().is_empty());

        repo.set_document_file("germany", "passport", "p.pdf", "/docs/p.pdf")
            .await
            .unwrap();
        assert!(!repo.detach_if_present("germany", "photo").await.unwrap());
        assert!(repo.detach_if_present("germany", "passport").await.unwrap());
        assert!(!repo.get_document_status("germany", "passport").unwrap().completed);
    }

    #[tokio::test]
    async fn summary_counts_required_documents() {
        let (_store, repo) = repository();
        for document_id in ["passport", "photo", "travel_itinerary"] {
            repo.toggle_document_complete("germany", document_id).await.unwrap();
        }
        repo.toggle_document_complete("germany", "not_in_catalog").await.unwrap();

        let summary = repo.progress_summary("germany");
        assert_eq!(summary.total, 10);
        assert_eq!(summary.required, 8);
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.completed_required, 2);
        assert_eq!(summary.percentage, 25);
        assert_eq!(repo.get_completed_count("germany"), 4);
    }
}
