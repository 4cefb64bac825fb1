use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::{
    attachment::{
        naming::{format_file_size, SUPPORTED_EXTENSIONS, SUPPORTED_MIME_TYPES},
        AttachmentPolicy, FileSystem, LocalFileSystem, PresetPicker,
    },
    catalog,
    clock::{Clock, SystemClock},
    config::{RuntimeConfig, StorageBackend},
    error::{AttachmentError, StoreError},
    events,
    kv::{JsonFileKeyValueStore, KeyValueStore, MemoryKeyValueStore},
    models::{
        AttachOutcome, DocumentStatusPatch, PickOutcome, ShareRequest, TargetRegion,
        TravelTimeline, VisaPurpose, VisaType,
    },
    services::{AppServices, SetupStage},
};

type SharedCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;
type CallbackSlot = Arc<Mutex<Option<SharedCallback>>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeError {
    pub code: String,
    pub message: String,
}

impl InvokeError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for InvokeError {
    fn from(error: StoreError) -> Self {
        let code = match error {
            StoreError::InvalidArgument(_) => "invalid_payload",
            _ => "storage_failure",
        };
        Self::new(code, error.to_string())
    }
}

impl From<AttachmentError> for InvokeError {
    fn from(error: AttachmentError) -> Self {
        let code = match error {
            AttachmentError::Store(store) => return store.into(),
            AttachmentError::FileTooLarge { .. } => "file_too_large",
            AttachmentError::UnsupportedType { .. } => "unsupported_file_type",
            AttachmentError::Copy(_) => "copy_failed",
            AttachmentError::NotFound { .. } | AttachmentError::FileMissing(_) => "not_found",
            AttachmentError::ShareUnavailable => "share_unavailable",
            AttachmentError::Picker(_) | AttachmentError::Io(_) => "internal",
        };
        Self::new(code, error.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<InvokeError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountryInput {
    country_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentInput {
    country_id: String,
    document_id: String,
}

/// JSON command surface over [`AppServices`]. Owns its own async executor so
/// hosts can call it synchronously from any non-async thread.
pub struct Runtime {
    config: RuntimeConfig,
    services: AppServices,
    executor: tokio::runtime::Runtime,
    callback: CallbackSlot,
}

impl Runtime {
    pub fn new(config_json: &str) -> anyhow::Result<Self> {
        let config = RuntimeConfig::from_json(config_json)?;
        let store: Arc<dyn KeyValueStore> = match config.storage() {
            StorageBackend::File => {
                let store = JsonFileKeyValueStore::new(config.store_path());
                debug!(path = %store.path().display(), "using file store");
                Arc::new(store)
            }
            StorageBackend::Memory => Arc::new(MemoryKeyValueStore::new()),
        };

        let callback = CallbackSlot::default();
        let share_slot = Arc::clone(&callback);
        let fs = LocalFileSystem::with_share_handler(Arc::new(move |request: &ShareRequest| {
            emit(&share_slot, events::EVENT_DOCUMENT_SHARE, &json!(request));
        }));

        Self::assemble(config, store, Arc::new(fs), Arc::new(SystemClock), callback)
    }

    /// Builds a runtime over caller-supplied adapters.
    pub fn from_parts(
        config: RuntimeConfig,
        store: Arc<dyn KeyValueStore>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        Self::assemble(config, store, fs, clock, CallbackSlot::default())
    }

    fn assemble(
        config: RuntimeConfig,
        store: Arc<dyn KeyValueStore>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        callback: CallbackSlot,
    ) -> anyhow::Result<Self> {
        let executor = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("packndocs-core")
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let services = AppServices::new(store, fs, clock, AttachmentPolicy::from_config(&config));
        let preferences = executor.block_on(services.preferences.load());
        info!(
            platform = ?config.platform(),
            storage = ?config.storage(),
            stage = ?SetupStage::of(&preferences),
            "runtime ready"
        );

        Ok(Self {
            config,
            services,
            executor,
            callback,
        })
    }

    pub fn services(&self) -> &AppServices {
        &self.services
    }

    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let mut guard = self.callback.lock().expect("callback mutex poisoned");
        *guard = Some(Arc::new(callback));
    }

    pub fn clear_event_callback(&self) {
        let mut guard = self.callback.lock().expect("callback mutex poisoned");
        *guard = None;
    }

    pub fn invoke_json(&self, request_json: &str) -> String {
        let parsed = serde_json::from_str::<InvokeRequest>(request_json);
        let response = match parsed {
            Ok(request) => self.executor.block_on(self.dispatch(request)),
            Err(error) => Err(InvokeError::new(
                "invalid_request",
                format!("invalid request JSON: {error}"),
            )),
        };

        let payload = match response {
            Ok(data) => InvokeResponse {
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(error) => InvokeResponse {
                ok: false,
                data: None,
                error: Some(error),
            },
        };

        serde_json::to_string(&payload).unwrap_or_else(|_| {
            r#"{"ok":false,"error":{"code":"internal","message":"failed to serialize response"}}"#
                .to_string()
        })
    }

    async fn dispatch(&self, request: InvokeRequest) -> Result<Value, InvokeError> {
        let result = self.route(&request.command, request.payload).await;
        if let Err(failure) = &result {
            error!(
                command = %request.command,
                code = %failure.code,
                message = %failure.message,
                "command failed"
            );
        }
        result
    }

    async fn route(&self, command: &str, payload: Value) -> Result<Value, InvokeError> {
        match command {
            "get_bootstrap_state" => self.get_bootstrap_state().await,
            "get_preferences" => to_json(self.services.preferences.snapshot()),
            "set_has_onboarded" => self.set_has_onboarded(payload).await,
            "set_target_region" => self.set_target_region(payload).await,
            "set_selected_country" => self.set_selected_country(payload).await,
            "set_visa_purpose" => self.set_visa_purpose(payload).await,
            "set_travel_timeline" => self.set_travel_timeline(payload).await,
            "complete_setup" => self.complete_setup(payload).await,
            "clear_all_data" => self.clear_all_data().await,
            "list_countries" => list_countries(payload),
            "list_documents" => list_documents(payload),
            "load_progress" => {
                let input: CountryInput = parse_payload(payload)?;
                to_json(self.services.progress.load_progress(&input.country_id).await)
            }
            "update_document_status" => self.update_document_status(payload).await,
            "toggle_document_complete" => {
                let input: DocumentInput = parse_payload(payload)?;
                let status = self
                    .services
                    .progress
                    .toggle_document_complete(&input.country_id, &input.document_id)
                    .await?;
                self.emit_progress_changed(&input.country_id);
                to_json(status)
            }
            "set_document_file" => self.set_document_file(payload).await,
            "remove_document_file" => {
                let input: DocumentInput = parse_payload(payload)?;
                let status = self
                    .services
                    .progress
                    .remove_document_file(&input.country_id, &input.document_id)
                    .await?;
                self.emit_documents_changed(&input.country_id);
                to_json(status)
            }
            "get_document_status" => {
                let input: DocumentInput = parse_payload(payload)?;
                to_json(
                    self.services
                        .progress
                        .get_document_status(&input.country_id, &input.document_id),
                )
            }
            "get_completed_count" => {
                let input: CountryInput = parse_payload(payload)?;
                let count = self.services.progress.get_completed_count(&input.country_id);
                Ok(json!({ "countryId": input.country_id, "count": count }))
            }
            "get_progress_summary" => {
                let input: CountryInput = parse_payload(payload)?;
                to_json(self.services.progress.progress_summary(&input.country_id))
            }
            "clear_progress" => {
                let input: CountryInput = parse_payload(payload)?;
                self.services
                    .progress
                    .clear_progress(&input.country_id)
                    .await?;
                self.emit_documents_changed(&input.country_id);
                Ok(json!({ "cleared": true }))
            }
            "load_all_documents" => to_json(self.services.documents.load_all_documents().await),
            "remove_uploaded_document" => {
                let input: DocumentInput = parse_payload(payload)?;
                let removed = self
                    .services
                    .attachments
                    .detach_uploaded(&input.country_id, &input.document_id)
                    .await?;
                if removed {
                    self.emit_documents_changed(&input.country_id);
                }
                Ok(json!({ "removed": removed }))
            }
            "attach_document" => self.attach_document(payload).await,
            "detach_document" => {
                let input: DocumentInput = parse_payload(payload)?;
                let status = self
                    .services
                    .attachments
                    .detach(&input.country_id, &input.document_id)
                    .await?;
                self.emit_documents_changed(&input.country_id);
                to_json(status)
            }
            "share_document" => {
                let input: DocumentInput = parse_payload(payload)?;
                to_json(
                    self.services
                        .attachments
                        .share(&input.country_id, &input.document_id)
                        .await?,
                )
            }
            "get_file_info" => {
                #[derive(Deserialize)]
                struct Input {
                    path: String,
                }
                let input: Input = parse_payload(payload)?;
                to_json(self.services.attachments.file_info(&input.path).await?)
            }
            "cleanup_orphaned_files" => {
                let deleted = self.services.attachments.cleanup_orphaned_files().await?;
                Ok(json!({ "deleted": deleted }))
            }
            _ => Err(InvokeError::new(
                "unknown_command",
                format!("unsupported command: {command}"),
            )),
        }
    }

    async fn get_bootstrap_state(&self) -> Result<Value, InvokeError> {
        let preferences = self.services.preferences.load().await;
        let policy = self.services.attachments.policy();
        Ok(json!({
            "platform": self.config.platform(),
            "setupStage": SetupStage::of(&preferences),
            "preferences": preferences,
            "documentsDir": policy.documents_dir.to_string_lossy(),
            "maxFileSize": policy.max_file_size,
            "maxFileSizeLabel": format_file_size(policy.max_file_size),
            "supportedMimeTypes": SUPPORTED_MIME_TYPES,
            "supportedExtensions": SUPPORTED_EXTENSIONS,
        }))
    }

    async fn set_has_onboarded(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        struct Input {
            value: bool,
        }
        let input: Input = parse_payload(payload)?;
        self.services
            .preferences
            .set_has_onboarded(input.value)
            .await?;
        self.preferences_changed()
    }

    async fn set_target_region(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        struct Input {
            #[serde(default)]
            region: Option<TargetRegion>,
        }
        let input: Input = parse_payload(payload)?;
        self.services
            .preferences
            .set_target_region(input.region)
            .await?;
        self.preferences_changed()
    }

    async fn set_selected_country(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            #[serde(default)]
            country_id: Option<String>,
        }
        let input: Input = parse_payload(payload)?;
        self.services
            .preferences
            .set_selected_country(input.country_id.as_deref())
            .await?;
        self.preferences_changed()
    }

    async fn set_visa_purpose(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        struct Input {
            #[serde(default)]
            purpose: Option<VisaPurpose>,
        }
        let input: Input = parse_payload(payload)?;
        self.services
            .preferences
            .set_visa_purpose(input.purpose)
            .await?;
        self.preferences_changed()
    }

    async fn set_travel_timeline(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        struct Input {
            #[serde(default)]
            timeline: Option<TravelTimeline>,
        }
        let input: Input = parse_payload(payload)?;
        self.services
            .preferences
            .set_travel_timeline(input.timeline)
            .await?;
        self.preferences_changed()
    }

    async fn complete_setup(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            region: TargetRegion,
            country_id: String,
            visa_purpose: VisaPurpose,
            travel_timeline: TravelTimeline,
        }
        let input: Input = parse_payload(payload)?;
        self.services
            .preferences
            .complete_setup(
                input.region,
                &input.country_id,
                input.visa_purpose,
                input.travel_timeline,
            )
            .await?;
        self.preferences_changed()
    }

    async fn clear_all_data(&self) -> Result<Value, InvokeError> {
        let removed = self.services.clear_all_data().await?;
        self.emit_event(events::EVENT_DOCUMENTS_CHANGED, &json!({}));
        self.preferences_changed()?;
        Ok(json!({ "removed": removed }))
    }

    async fn update_document_status(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            country_id: String,
            document_id: String,
            patch: DocumentStatusPatch,
        }
        let input: Input = parse_payload(payload)?;
        let touches_attachment = input.patch.attachment.is_some();
        let status = self
            .services
            .progress
            .update_document_status(&input.country_id, &input.document_id, input.patch)
            .await?;

        if touches_attachment {
            self.emit_documents_changed(&input.country_id);
        } else {
            self.emit_progress_changed(&input.country_id);
        }
        to_json(status)
    }

    async fn set_document_file(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            country_id: String,
            document_id: String,
            file_name: String,
            file_path: String,
        }
        let input: Input = parse_payload(payload)?;
        let status = self
            .services
            .progress
            .set_document_file(
                &input.country_id,
                &input.document_id,
                &input.file_name,
                &input.file_path,
            )
            .await?;
        self.emit_documents_changed(&input.country_id);
        to_json(status)
    }

    async fn attach_document(&self, payload: Value) -> Result<Value, InvokeError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            country_id: String,
            document_id: String,
            pick: PickOutcome,
        }
        let input: Input = parse_payload(payload)?;
        let outcome = self
            .services
            .attachments
            .attach(
                &input.country_id,
                &input.document_id,
                &PresetPicker(input.pick),
            )
            .await?;

        if matches!(outcome, AttachOutcome::Attached { .. }) {
            self.emit_documents_changed(&input.country_id);
        }
        to_json(outcome)
    }

    fn preferences_changed(&self) -> Result<Value, InvokeError> {
        let snapshot = to_json(self.services.preferences.snapshot())?;
        self.emit_event(events::EVENT_PREFERENCES_CHANGED, &snapshot);
        Ok(snapshot)
    }

    fn emit_progress_changed(&self, country_id: &str) {
        self.emit_event(
            events::EVENT_PROGRESS_CHANGED,
            &json!({ "countryId": country_id }),
        );
    }

    /// Attachment changes move both the checklist and the cross-country list.
    fn emit_documents_changed(&self, country_id: &str) {
        self.emit_progress_changed(country_id);
        self.emit_event(
            events::EVENT_DOCUMENTS_CHANGED,
            &json!({ "countryId": country_id }),
        );
    }

    fn emit_event(&self, event: &str, payload: &Value) {
        emit(&self.callback, event, payload);
    }
}

fn emit(slot: &CallbackSlot, event: &str, payload: &Value) {
    let callback = {
        let guard = slot.lock().expect("callback mutex poisoned");
        guard.clone()
    };
    if let Some(callback) = callback {
        let event_payload = json!({
            "event": event,
            "payload": payload
        });
        callback(event, &event_payload);
    }
}

fn list_countries(payload: Value) -> Result<Value, InvokeError> {
    #[derive(Deserialize)]
    struct Input {
        #[serde(default)]
        region: Option<TargetRegion>,
    }
    let input: Input = parse_payload(payload)?;
    match input.region {
        Some(region) => to_json(catalog::countries_in(region)),
        None => to_json(catalog::COUNTRIES),
    }
}

fn list_documents(payload: Value) -> Result<Value, InvokeError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Input {
        #[serde(default)]
        country_id: Option<String>,
        #[serde(default)]
        visa_type: Option<VisaType>,
        #[serde(default)]
        required: Option<bool>,
    }
    let input: Input = parse_payload(payload)?;
    let visa_type = match (input.country_id, input.visa_type) {
        (Some(country_id), _) => {
            catalog::country(&country_id)
                .ok_or_else(|| {
                    InvokeError::new("not_found", format!("unknown country: {country_id}"))
                })?
                .visa_type
        }
        (None, Some(visa_type)) => visa_type,
        (None, None) => {
            return Err(InvokeError::new(
                "invalid_payload",
                "countryId or visaType is required",
            ))
        }
    };

    match input.required {
        Some(true) => to_json(catalog::required_documents(visa_type)),
        Some(false) => to_json(catalog::optional_documents(visa_type)),
        None => to_json(catalog::documents_for(visa_type)),
    }
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, InvokeError> {
    let payload = if payload.is_null() { json!({}) } else { payload };
    serde_json::from_value(payload).map_err(invalid_payload)
}

fn to_json<T: Serialize>(value: T) -> Result<Value, InvokeError> {
    serde_json::to_value(value).map_err(|error| InvokeError::new("internal", error.to_string()))
}

fn invalid_payload(error: serde_json::Error) -> InvokeError {
    InvokeError::new("invalid_payload", error.to_string())
}
