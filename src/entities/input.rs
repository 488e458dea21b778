use std::path::Path;

use tracing::{debug, warn};

use crate::error::PharmaGuardError;

pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["text/vcf", "text/plain"];
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// A variant file chosen by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub media_type: Option<String>,
    pub contents: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, media_type: Option<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: contents.len() as u64,
            media_type: media_type
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            contents,
        }
    }

    /// Reads a file from disk, inferring the media type from its extension unless one
    /// is given.
    ///
    /// Files longer than `max_upload_bytes` are not read: the result carries the on-disk
    /// size with empty contents, so validation rejects it as too large. A path that does
    /// not exist is a missing file.
    pub async fn from_path(
        path: &Path,
        media_type: Option<String>,
        max_upload_bytes: u64,
    ) -> Result<Self, PharmaGuardError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "VCF file not found");
                return Err(PharmaGuardError::MissingFile);
            }
            Err(err) => return Err(err.into()),
        };
        if !metadata.is_file() {
            warn!(path = %path.display(), "VCF path is not a regular file");
            return Err(PharmaGuardError::MissingFile);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.vcf".to_string());
        let media_type = media_type.or_else(|| Some(media_type_for_path(path).to_string()));

        if metadata.len() > max_upload_bytes {
            debug!(
                path = %path.display(),
                size = metadata.len(),
                max = max_upload_bytes,
                "Skipping read of oversized file"
            );
            let mut file = Self::new(name, media_type, Vec::new());
            file.size = metadata.len();
            return Ok(file);
        }

        let contents = tokio::fs::read(path).await?;
        Ok(Self::new(name, media_type, contents))
    }
}

pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "vcf" => "text/vcf",
        "txt" => "text/plain",
        _ => FALLBACK_MEDIA_TYPE,
    }
}

/// Lower-cased `type/subtype` without parameters; `None` when blank.
pub(crate) fn media_type_essence(raw: &str) -> Option<String> {
    let essence = raw.split(';').next().unwrap_or_default().trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

fn is_accepted_media_type(media_type: &str) -> bool {
    media_type_essence(media_type)
        .is_none_or(|essence| ACCEPTED_MEDIA_TYPES.contains(&essence.as_str()))
}

/// Splits comma-separated drug text into trimmed, non-empty names.
pub fn split_drug_text(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Input that passed validation. Drug names keep their duplicates and casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    pub file: UploadedFile,
    pub drugs: Vec<String>,
}

/// Validates the file and drug text; checks run in presence, size, type, drugs order.
pub fn validate(
    file: Option<UploadedFile>,
    drug_text: &str,
    max_upload_bytes: u64,
) -> Result<ValidatedInput, PharmaGuardError> {
    let Some(file) = file else {
        return Err(PharmaGuardError::MissingFile);
    };
    if file.size > max_upload_bytes {
        return Err(PharmaGuardError::FileTooLarge {
            size: file.size,
            max: max_upload_bytes,
        });
    }
    if let Some(media_type) = file.media_type.as_deref()
        && !is_accepted_media_type(media_type)
    {
        return Err(PharmaGuardError::UnsupportedFileType(media_type.to_string()));
    }

    let drugs = split_drug_text(drug_text);
    if drugs.is_empty() {
        return Err(PharmaGuardError::EmptyDrugList);
    }

    Ok(ValidatedInput { file, drugs })
}
