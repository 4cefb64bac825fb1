use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::{
    catalog,
    error::StoreError,
    kv::{keys, KeyValueStore},
    models::{AppPreferences, TargetRegion, TravelTimeline, VisaPurpose},
};

/// Global scalars (onboarding flag, region, country, purpose, timeline), one
/// key each. Setters commit the write before the snapshot changes.
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
    snapshot: RwLock<AppPreferences>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(AppPreferences::default()),
        }
    }

    /// Reloads every scalar. On failure the previous snapshot is kept.
    pub async fn load(&self) -> AppPreferences {
        match self.try_load().await {
            Ok(preferences) => preferences,
            Err(error) => {
                warn!(error = %error, "failed to load preferences");
                self.snapshot()
            }
        }
    }

    pub async fn try_load(&self) -> Result<AppPreferences, StoreError> {
        let (has_onboarded, target_region, selected_country, visa_purpose, travel_timeline) = tokio::try_join!(
            self.store.get(keys::HAS_ONBOARDED),
            self.store.get(keys::TARGET_REGION),
            self.store.get(keys::SELECTED_COUNTRY),
            self.store.get(keys::VISA_PURPOSE),
            self.store.get(keys::TRAVEL_TIMELINE),
        )?;

        let preferences = AppPreferences {
            has_onboarded: has_onboarded.as_deref() == Some("true"),
            target_region: parse_stored(keys::TARGET_REGION, target_region, TargetRegion::parse),
            selected_country_id: selected_country.filter(|id| !id.is_empty()),
            visa_purpose: parse_stored(keys::VISA_PURPOSE, visa_purpose, VisaPurpose::parse),
            travel_timeline: parse_stored(
                keys::TRAVEL_TIMELINE,
                travel_timeline,
                TravelTimeline::parse,
            ),
        };

        *self.snapshot.write().expect("preferences poisoned") = preferences.clone();
        debug!(has_onboarded = preferences.has_onboarded, "preferences loaded");
        Ok(preferences)
    }

    pub fn snapshot(&self) -> AppPreferences {
        self.snapshot.read().expect("preferences poisoned").clone()
    }

    pub async fn set_has_onboarded(&self, value: bool) -> Result<(), StoreError> {
        self.store
            .set(keys::HAS_ONBOARDED, if value { "true" } else { "false" })
            .await?;
        self.update(|preferences| preferences.has_onboarded = value);
        Ok(())
    }

    pub async fn set_target_region(&self, region: Option<TargetRegion>) -> Result<(), StoreError> {
        self.write_optional(keys::TARGET_REGION, region.map(TargetRegion::as_str))
            .await?;
        self.update(|preferences| preferences.target_region = region);
        Ok(())
    }

    /// An empty id is treated like `None`.
    pub async fn set_selected_country(&self, country_id: Option<&str>) -> Result<(), StoreError> {
        let country_id = country_id.filter(|id| !id.is_empty());
        self.write_optional(keys::SELECTED_COUNTRY, country_id).await?;
        self.update(|preferences| preferences.selected_country_id = country_id.map(str::to_string));
        Ok(())
    }

    pub async fn set_visa_purpose(&self, purpose: Option<VisaPurpose>) -> Result<(), StoreError> {
        self.write_optional(keys::VISA_PURPOSE, purpose.map(VisaPurpose::as_str))
            .await?;
        self.update(|preferences| preferences.visa_purpose = purpose);
        Ok(())
    }

    pub async fn set_travel_timeline(
        &self,
        timeline: Option<TravelTimeline>,
    ) -> Result<(), StoreError> {
        self.write_optional(keys::TRAVEL_TIMELINE, timeline.map(TravelTimeline::as_str))
            .await?;
        self.update(|preferences| preferences.travel_timeline = timeline);
        Ok(())
    }

    /// Finishes the setup wizard: region, country, purpose and timeline, in that
    /// order. The country must belong to the region.
    pub async fn complete_setup(
        &self,
        region: TargetRegion,
        country_id: &str,
        purpose: VisaPurpose,
        timeline: TravelTimeline,
    ) -> Result<AppPreferences, StoreError> {
        if !catalog::country_in_region(country_id, region) {
            return Err(StoreError::InvalidArgument(format!(
                "country {country_id} is not part of region {}",
                region.as_str()
            )));
        }

        self.set_target_region(Some(region)).await?;
        self.set_selected_country(Some(country_id)).await?;
        self.set_visa_purpose(Some(purpose)).await?;
        self.set_travel_timeline(Some(timeline)).await?;
        info!(region = region.as_str(), country_id = %country_id, "setup completed");
        Ok(self.snapshot())
    }

    /// Removes every `packndocs_` key, progress records included, and resets
    /// the snapshot. Returns how many keys were removed.
    pub async fn clear_all_data(&self) -> Result<usize, StoreError> {
        let app_keys: Vec<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| keys::is_app_key(key))
            .collect();

        self.store.remove_many(&app_keys).await?;
        *self.snapshot.write().expect("preferences poisoned") = AppPreferences::default();
        info!(removed = app_keys.len(), "all app data cleared");
        Ok(app_keys.len())
    }

    async fn write_optional(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(value) => self.store.set(key, value).await,
            None => self.store.remove(key).await,
        }
    }

    fn update(&self, change: impl FnOnce(&mut AppPreferences)) {
        let mut snapshot = self.snapshot.write().expect("preferences poisoned");
        change(&mut *snapshot);
    }
}

fn parse_stored<T>(key: &str, raw: Option<String>, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = raw.filter(|value| !value.is_empty())?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(key = %key, value = %raw, "ignoring unknown stored preference");
    }
    parsed
}
