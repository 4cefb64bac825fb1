use std::sync::Arc;

use serde::Serialize;

use crate::{
    aggregation::UploadedDocumentsView,
    attachment::{AttachmentPolicy, AttachmentService, FileSystem},
    clock::Clock,
    error::StoreError,
    kv::KeyValueStore,
    models::AppPreferences,
    preferences::PreferenceStore,
    progress::ProgressRepository,
};

/// Where the host should send the user on launch.
#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SetupStage {
    Onboarding,
    TargetSelect,
    Ready,
}

impl SetupStage {
    pub fn of(preferences: &AppPreferences) -> Self {
        if !preferences.has_onboarded {
            Self::Onboarding
        } else if preferences.target_region.is_none() {
            Self::TargetSelect
        } else {
            Self::Ready
        }
    }
}

/// Every long-lived service, wired once per process over one shared store.
pub struct AppServices {
    pub progress: Arc<ProgressRepository>,
    pub documents: Arc<UploadedDocumentsView>,
    pub preferences: Arc<PreferenceStore>,
    pub attachments: Arc<AttachmentService>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        policy: AttachmentPolicy,
    ) -> Self {
        let progress = Arc::new(ProgressRepository::new(store.clone(), clock.clone()));
        let documents = Arc::new(UploadedDocumentsView::new(store.clone(), progress.clone()));
        let preferences = Arc::new(PreferenceStore::new(store));
        let attachments = Arc::new(AttachmentService::new(
            fs,
            progress.clone(),
            documents.clone(),
            clock,
            policy,
        ));

        Self {
            progress,
            documents,
            preferences,
            attachments,
        }
    }

    /// Wipes the whole `packndocs_` namespace and every in-memory view of it.
    /// Countries with a stored record stay locked until the wipe is done, so
    /// an in-flight mutation either lands before it or starts after it.
    /// Copied files stay on disk until the next orphan cleanup.
    pub async fn clear_all_data(&self) -> Result<usize, StoreError> {
        let _held = self.progress.lock_stored_countries().await?;
        let removed = self.preferences.clear_all_data().await?;
        self.progress.forget_all();
        self.documents.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attachment::LocalFileSystem,
        clock::SystemClock,
        config::Platform,
        kv::{memory::StallingStore, MemoryKeyValueStore},
        models::TargetRegion,
    };
    use std::time::Duration;

    fn services() -> AppServices {
        services_over(Arc::new(MemoryKeyValueStore::new()))
    }

    fn services_over(store: Arc<dyn KeyValueStore>) -> AppServices {
        AppServices::new(
            store,
            Arc::new(LocalFileSystem::new()),
            Arc::new(SystemClock),
            AttachmentPolicy {
                platform: Platform::Web,
                documents_dir: "/unused".into(),
                max_file_size: 1024,
            },
        )
    }

    #[test]
    fn setup_stage_follows_preferences() {
        let mut preferences = AppPreferences::default();
        assert_eq!(SetupStage::of(&preferences), SetupStage::Onboarding);
        preferences.has_onboarded = true;
        assert_eq!(SetupStage::of(&preferences), SetupStage::TargetSelect);
        preferences.target_region = Some(TargetRegion::Gb);
        assert_eq!(SetupStage::of(&preferences), SetupStage::Ready);
    }

    #[tokio::test]
    async fn clear_all_data_resets_every_view() {
        let services = services();
        services.preferences.set_has_onboarded(true).await.unwrap();
        services
            .progress
            .set_document_file("germany", "passport", "p.pdf", "blob:p")
            .await
            .unwrap();
        services
            .progress
            .toggle_document_complete("usa", "photo")
            .await
            .unwrap();
        assert_eq!(services.documents.load_all_documents().await.len(), 1);

        assert_eq!(services.clear_all_data().await.unwrap(), 3);

        assert_eq!(services.progress.get_completed_count("germany"), 0);
        assert!(services.documents.snapshot().is_empty());
        assert_eq!(services.preferences.snapshot(), AppPreferences::default());
        for country_id in ["germany", "usa"] {
            let progress = services.progress.load_progress(country_id).await;
            assert!(progress.documents.is_empty());
        }
    }

    #[tokio::test]
    async fn clear_all_data_waits_for_in_flight_mutation() {
        let store = Arc::new(StallingStore::new(Duration::from_millis(200)));
        let services = services_over(store.clone());
        services
            .progress
            .toggle_document_complete("germany", "passport")
            .await
            .unwrap();

        store.stall_next_get();
        let toggle = {
            let progress = Arc::clone(&services.progress);
            tokio::spawn(async move { progress.toggle_document_complete("germany", "photo").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(services.clear_all_data().await.unwrap(), 1);
        toggle.await.unwrap().unwrap();

        assert!(store.get("packndocs_progress_germany").await.unwrap().is_none());
        assert_eq!(services.progress.get_completed_count("germany"), 0);
    }
}
