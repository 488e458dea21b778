use std::borrow::Cow;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::entities::result::{AnalysisResult, parse_error_message, parse_results};
use crate::entities::submission::{AnalysisRequest, AnalysisService};
use crate::error::PharmaGuardError;

const ANALYZE_PATH: &str = "api/analyze";
const HEALTH_PATH: &str = "api/health";
const FILE_FIELD: &str = "vcf_file";
const DRUGS_FIELD: &str = "drugs";
const GENERIC_FAILURE: &str = "Analysis failed";

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Clone)]
pub struct PharmaGuardClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
}

impl PharmaGuardClient {
    pub fn new(config: &Config) -> Result<Self, PharmaGuardError> {
        Ok(Self {
            client: crate::sources::http_client(config)?,
            base: config.backend_url.clone(),
        })
    }

    #[cfg(test)]
    fn new_for_test(base: String) -> Result<Self, PharmaGuardError> {
        Self::new(&Config::default().with_backend_url(Some(base)))
    }

    pub fn base(&self) -> &str {
        self.base.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn multipart_form(request: &AnalysisRequest) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(request.file.contents.clone())
            .file_name(request.file.name.clone());
        let part = match request.file.media_type.as_deref() {
            Some(media_type) => match part.mime_str(media_type) {
                Ok(part) => part,
                Err(err) => {
                    warn!(media_type, error = %err, "Invalid media type; sending file untyped");
                    reqwest::multipart::Part::bytes(request.file.contents.clone())
                        .file_name(request.file.name.clone())
                }
            },
            None => part,
        };

        reqwest::multipart::Form::new()
            .part(FILE_FIELD, part)
            .text(DRUGS_FIELD, request.drugs_field())
    }

    /// Posts the file and drug list; exactly one attempt.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Vec<AnalysisResult>, PharmaGuardError> {
        let url = self.endpoint(ANALYZE_PATH);
        let resp = self
            .client
            .post(&url)
            .multipart(Self::multipart_form(request))
            .send()
            .await
            .map_err(PharmaGuardError::transport)?;

        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp).await?;
        debug!(
            generation = request.generation,
            status = %status,
            bytes = bytes.len(),
            "Analysis service responded"
        );

        if !status.is_success() {
            let message = parse_error_message(&bytes).unwrap_or_else(|| {
                warn!(
                    status = %status,
                    body = %crate::sources::body_excerpt(&bytes),
                    "Failure response carried no error message"
                );
                GENERIC_FAILURE.to_string()
            });
            return Err(PharmaGuardError::ServerReported(message));
        }

        crate::sources::ensure_json_content_type(content_type.as_ref(), &bytes)?;
        parse_results(&bytes)
    }

    pub async fn health(&self) -> Result<HealthStatus, PharmaGuardError> {
        let url = self.endpoint(HEALTH_PATH);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(PharmaGuardError::transport)?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp).await?;

        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(PharmaGuardError::ServerReported(format!(
                "HTTP {status}: {excerpt}"
            )));
        }

        crate::sources::ensure_json_content_type(content_type.as_ref(), &bytes)?;
        serde_json::from_slice(&bytes).map_err(|err| {
            PharmaGuardError::MalformedResponse(format!("could not parse health status ({err})"))
        })
    }
}

#[async_trait::async_trait]
impl AnalysisService for PharmaGuardClient {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Vec<AnalysisResult>, PharmaGuardError> {
        PharmaGuardClient::analyze(self, request).await
    }
}
