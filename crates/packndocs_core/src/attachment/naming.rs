pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "doc", "docx"];

const DEFAULT_EXTENSION: &str = "pdf";

/// `{countryId}_{documentId}_{unixMillis}.{ext}`; re-uploads never collide.
pub fn stored_file_name(
    country_id: &str,
    document_id: &str,
    unix_millis: i64,
    picked_name: &str,
) -> String {
    let extension = extension_of(picked_name)
        .map(|extension| sanitize(&extension))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!(
        "{}_{}_{unix_millis}.{extension}",
        sanitize(country_id),
        sanitize(document_id)
    )
}

/// Lower-cased text after the last dot, if there is any.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    (!extension.is_empty()).then(|| extension.to_ascii_lowercase())
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

pub fn mime_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Uniform type identifier the iOS share sheet expects.
pub fn uti_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "com.adobe.pdf",
        Some("jpg" | "jpeg") => "public.jpeg",
        Some("png") => "public.png",
        Some("doc") => "com.microsoft.word.doc",
        Some("docx") => "org.openxmlformats.wordprocessingml.document",
        _ => "public.data",
    }
}

pub fn is_supported_mime(mime_type: &str) -> bool {
    SUPPORTED_MIME_TYPES
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(mime_type))
}

/// A reported mime type decides; without one the extension has to be known.
pub fn is_supported_file(file_name: &str, mime_type: Option<&str>) -> bool {
    match mime_type.map(str::trim).filter(|mime_type| !mime_type.is_empty()) {
        Some(mime_type) => is_supported_mime(mime_type),
        None => extension_of(file_name)
            .is_some_and(|extension| SUPPORTED_EXTENSIONS.contains(&extension.as_str())),
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
