pub const EVENT_PROGRESS_CHANGED: &str = "progress://changed";
pub const EVENT_DOCUMENTS_CHANGED: &str = "documents://changed";
pub const EVENT_PREFERENCES_CHANGED: &str = "preferences://changed";
pub const EVENT_DOCUMENT_SHARE: &str = "document://share";
