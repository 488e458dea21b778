use serde::{Deserialize, Serialize};

use crate::error::PharmaGuardError;
use crate::utils::serde::OneOrMany;

/// One drug's analysis outcome as returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub patient_id: String,
    pub drug: String,
    pub timestamp: String,
    pub risk_assessment: RiskAssessment,
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    pub clinical_recommendation: ClinicalRecommendation,
    pub llm_generated_explanation: LlmExplanation,
    pub quality_metrics: QualityMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_label: String,
    pub confidence_score: f64,
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacogenomicProfile {
    pub primary_gene: String,
    pub diplotype: String,
    pub phenotype: String,
    #[serde(default)]
    pub detected_variants: Vec<DetectedVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedVariant {
    /// `null` when the VCF ID column was `.` and no `RS` INFO key was present.
    #[serde(default)]
    pub rsid: Option<String>,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chromosome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_allele: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genotype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_significance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosing_adjustment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_drugs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmExplanation {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biological_mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_significance: Option<String>,
    #[serde(default)]
    pub variant_citations: Vec<String>,
    #[serde(default)]
    pub evidence_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub vcf_parsing_success: bool,
    pub variants_analyzed: u64,
    pub pgx_variants_found: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_quality: Option<String>,
}

/// Coarse metabolizer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phenotype {
    Poor,
    Intermediate,
    Normal,
    Rapid,
    UltraRapid,
    Unknown,
}

impl Phenotype {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "PM" => Self::Poor,
            "IM" => Self::Intermediate,
            "NM" => Self::Normal,
            "RM" => Self::Rapid,
            "URM" => Self::UltraRapid,
            _ => Self::Unknown,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Poor => "Poor Metabolizer",
            Self::Intermediate => "Intermediate Metabolizer",
            Self::Normal => "Normal Metabolizer",
            Self::Rapid => "Rapid Metabolizer",
            Self::UltraRapid => "Ultra-Rapid Metabolizer",
            Self::Unknown => "Unknown Metabolizer Status",
        }
    }
}

/// Success body of `POST /api/analyze`.
#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeResponse {
    #[serde(default)]
    pub success: Option<bool>,
    pub results: OneOrMany<serde_json::Value>,
}

/// Failure body of `POST /api/analyze`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), PharmaGuardError> {
        if self.drug.trim().is_empty() {
            return Err(PharmaGuardError::MalformedResponse(
                "result is missing a drug name".into(),
            ));
        }
        crate::utils::date::parse_timestamp(&self.timestamp)?;

        let score = self.risk_assessment.confidence_score;
        if !(0.0..=1.0).contains(&score) {
            return Err(PharmaGuardError::MalformedResponse(format!(
                "confidence score {score} for {} is outside [0, 1]",
                self.drug
            )));
        }
        Ok(())
    }
}

/// Parses a success body and normalizes the single/array shapes into a sequence.
pub(crate) fn parse_results(body: &[u8]) -> Result<Vec<AnalysisResult>, PharmaGuardError> {
    let parsed: AnalyzeResponse = serde_json::from_slice(body).map_err(|err| {
        PharmaGuardError::MalformedResponse(format!("could not parse results ({err})"))
    })?;
    if parsed.success == Some(false) {
        return Err(PharmaGuardError::MalformedResponse(
            "service reported success=false with HTTP success status".into(),
        ));
    }

    let raw = parsed.results.into_vec();
    if raw.is_empty() {
        return Err(PharmaGuardError::MalformedResponse(
            "service returned no results".into(),
        ));
    }

    let mut results = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        let result = decode_result(index, value)?;
        result.validate()?;
        results.push(result);
    }
    Ok(results)
}

/// Decodes one result, naming the offending field path on failure.
fn decode_result(
    index: usize,
    value: serde_json::Value,
) -> Result<AnalysisResult, PharmaGuardError> {
    serde_path_to_error::deserialize::<_, AnalysisResult>(value).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        PharmaGuardError::MalformedResponse(format!(
            "result {} does not match the result schema at {path}: {}",
            index + 1,
            err.into_inner()
        ))
    })
}

/// Extracts the service-reported message from a failure body, if any.
pub(crate) fn parse_error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()?
        .error
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}
