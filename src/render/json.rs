use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::entities::result::AnalysisResult;
use crate::error::PharmaGuardError;
use crate::utils::download::{sanitize_file_component, save_export};

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, PharmaGuardError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// A result serialized for download; `contents` doubles as the copy payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub file_name: String,
    pub contents: String,
}

impl ExportPayload {
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, PharmaGuardError> {
        save_export(dir, &self.file_name, &self.contents).await
    }
}

/// `pharmaguard_result_<drug>_<1-based index>.json`
pub fn export_file_name(result: &AnalysisResult, index: usize) -> String {
    format!(
        "pharmaguard_result_{}_{}.json",
        sanitize_file_component(&result.drug),
        index + 1
    )
}

pub fn copy_payload(result: &AnalysisResult) -> Result<String, PharmaGuardError> {
    to_pretty(result)
}

pub fn export(result: &AnalysisResult, index: usize) -> Result<ExportPayload, PharmaGuardError> {
    Ok(ExportPayload {
        file_name: export_file_name(result, index),
        contents: copy_payload(result)?,
    })
}
