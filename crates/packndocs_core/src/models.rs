use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub document_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl DocumentStatus {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            completed: false,
            uploaded_file_name: None,
            uploaded_file_path: None,
            uploaded_at: None,
        }
    }

    pub fn has_attachment(&self) -> bool {
        self.uploaded_file_name.is_some() && self.uploaded_file_path.is_some()
    }

    /// Applies `patch` field by field; absent fields leave the current value alone.
    pub fn apply(&mut self, patch: &DocumentStatusPatch) {
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }

        match &patch.attachment {
            Some(AttachmentPatch::Set(attachment)) => {
                self.uploaded_file_name = Some(attachment.file_name.clone());
                self.uploaded_file_path = Some(attachment.file_path.clone());
                self.uploaded_at = Some(attachment.uploaded_at.clone());
            }
            Some(AttachmentPatch::Clear) => {
                self.uploaded_file_name = None;
                self.uploaded_file_path = None;
                self.uploaded_at = None;
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub file_path: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AttachmentPatch {
    Set(Attachment),
    Clear,
}

/// Partial update for one `DocumentStatus`. The three attachment fields only
/// travel together, so a patch can never leave them half set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusPatch {
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub attachment: Option<AttachmentPatch>,
}

impl DocumentStatusPatch {
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            attachment: None,
        }
    }

    pub fn attach(attachment: Attachment) -> Self {
        Self {
            completed: Some(true),
            attachment: Some(AttachmentPatch::Set(attachment)),
        }
    }

    pub fn detach() -> Self {
        Self {
            completed: Some(false),
            attachment: Some(AttachmentPatch::Clear),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryProgress {
    pub country_id: String,
    #[serde(default)]
    pub documents: Vec<DocumentStatus>,
    pub last_updated: String,
}

impl CountryProgress {
    pub fn empty(country_id: impl Into<String>, now: String) -> Self {
        Self {
            country_id: country_id.into(),
            documents: Vec::new(),
            last_updated: now,
        }
    }

    pub fn document(&self, document_id: &str) -> Option<&DocumentStatus> {
        self.documents
            .iter()
            .find(|status| status.document_id == document_id)
    }

    pub fn completed_count(&self) -> usize {
        self.documents.iter().filter(|status| status.completed).count()
    }

    /// Merges `patch` into the status for `document_id`, inserting a
    /// `completed = false` status first when the document is new.
    pub fn apply(&mut self, document_id: &str, patch: &DocumentStatusPatch) -> DocumentStatus {
        let index = match self
            .documents
            .iter()
            .position(|status| status.document_id == document_id)
        {
            Some(index) => index,
            None => {
                self.documents.push(DocumentStatus::new(document_id));
                self.documents.len() - 1
            }
        };

        let status = &mut self.documents[index];
        status.apply(patch);
        status.clone()
    }
}

/// One attached file in the cross-country library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub country_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total: usize,
    pub required: usize,
    pub completed: usize,
    pub completed_required: usize,
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetRegion {
    Eu,
    Us,
    Gb,
}

impl TargetRegion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eu => "eu",
            Self::Us => "us",
            Self::Gb => "gb",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "eu" => Some(Self::Eu),
            "us" => Some(Self::Us),
            "gb" => Some(Self::Gb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisaType {
    Schengen,
    UsVisa,
    UkVisa,
    EuVisa,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VisaPurpose {
    Tourism,
    Business,
    FamilyVisit,
    Education,
    Transit,
    Other,
}

impl VisaPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tourism => "tourism",
            Self::Business => "business",
            Self::FamilyVisit => "family_visit",
            Self::Education => "education",
            Self::Transit => "transit",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tourism" => Some(Self::Tourism),
            "business" => Some(Self::Business),
            "family_visit" => Some(Self::FamilyVisit),
            "education" => Some(Self::Education),
            "transit" => Some(Self::Transit),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TravelTimeline {
    WithinOneMonth,
    OneToThreeMonths,
    ThreeToSixMonths,
    MoreThanSixMonths,
    Undecided,
}

impl TravelTimeline {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithinOneMonth => "within_one_month",
            Self::OneToThreeMonths => "one_to_three_months",
            Self::ThreeToSixMonths => "three_to_six_months",
            Self::MoreThanSixMonths => "more_than_six_months",
            Self::Undecided => "undecided",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "within_one_month" => Some(Self::WithinOneMonth),
            "one_to_three_months" => Some(Self::OneToThreeMonths),
            "three_to_six_months" => Some(Self::ThreeToSixMonths),
            "more_than_six_months" => Some(Self::MoreThanSixMonths),
            "undecided" => Some(Self::Undecided),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPreferences {
    #[serde(default)]
    pub has_onboarded: bool,
    #[serde(default)]
    pub target_region: Option<TargetRegion>,
    #[serde(default)]
    pub selected_country_id: Option<String>,
    #[serde(default)]
    pub visa_purpose: Option<VisaPurpose>,
    #[serde(default)]
    pub travel_timeline: Option<TravelTimeline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedFile {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PickOutcome {
    Cancelled,
    Picked { file: PickedFile },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttachOutcome {
    Cancelled,
    Attached { document: DocumentStatus },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub path: String,
    pub mime_type: String,
    pub uti: String,
    pub display_name: String,
}
