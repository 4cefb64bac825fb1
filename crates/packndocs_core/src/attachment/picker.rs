use async_trait::async_trait;

use crate::{error::AttachmentError, models::PickOutcome};

/// The host's document picker. Dismissing it is `PickOutcome::Cancelled`,
/// not an error.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self) -> Result<PickOutcome, AttachmentError>;
}

/// Picker whose result was already obtained by the host UI before the call
/// reached the core.
#[derive(Debug, Clone)]
pub struct PresetPicker(pub PickOutcome);

#[async_trait]
impl FilePicker for PresetPicker {
    async fn pick(&self) -> Result<PickOutcome, AttachmentError> {
        Ok(self.0.clone())
    }
}
