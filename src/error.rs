#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PharmaGuardError {
    #[error("Please upload a VCF file")]
    MissingFile,

    #[error("File size exceeds {} MB limit ({size} bytes)", *max as f64 / 1024.0 / 1024.0)]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid file type '{0}'. Please upload a .vcf file")]
    UnsupportedFileType(String),

    #[error("Please enter at least one drug name")]
    EmptyDrugList,

    #[error("{0}")]
    ServerReported(String),

    #[error("Unable to reach the analysis service ({reason}). Check that it is running and try again.")]
    Transport {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Unexpected response from the analysis service: {0}")]
    MalformedResponse(String),

    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the submission state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingFile,
    FileTooLarge,
    UnsupportedFileType,
    EmptyDrugList,
    ServerReportedError,
    TransportError,
    MalformedResponse,
    Internal,
}

impl PharmaGuardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFile => ErrorKind::MissingFile,
            Self::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Self::UnsupportedFileType(_) => ErrorKind::UnsupportedFileType,
            Self::EmptyDrugList => ErrorKind::EmptyDrugList,
            Self::ServerReported(_) => ErrorKind::ServerReportedError,
            Self::Transport { .. } => ErrorKind::TransportError,
            Self::MalformedResponse(_) | Self::Json(_) => ErrorKind::MalformedResponse,
            Self::HttpClientInit(_)
            | Self::InvalidArgument(_)
            | Self::Template(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn transport(source: reqwest::Error) -> Self {
        let reason = if source.is_timeout() {
            "request timed out"
        } else if source.is_connect() {
            "connection failed"
        } else {
            "no response"
        };
        Self::Transport {
            reason: reason.to_string(),
            source: Some(source),
        }
    }
}
