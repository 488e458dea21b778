use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::error::PharmaGuardError;
use crate::sources::pharmaguard::PharmaGuardClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub check: String,
    pub status: String,
    pub latency: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# PharmaGuard Health Check\n\n");
        out.push_str("| Check | Status | Latency |\n");
        out.push_str("|-------|--------|---------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.check, row.status, row.latency
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} checks healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

async fn check_service(client: &PharmaGuardClient) -> HealthRow {
    let start = Instant::now();
    let check = format!("Analysis service ({})", client.base());
    match client.health().await {
        Ok(health) => {
            let elapsed = start.elapsed().as_millis();
            let healthy = health.status.eq_ignore_ascii_case("healthy")
                || health.status.eq_ignore_ascii_case("ok");
            let check = match health.service {
                Some(service) => format!("{service} ({})", client.base()),
                None => check,
            };
            HealthRow {
                check,
                status: if healthy { "ok".into() } else { health.status },
                latency: format!("{elapsed}ms"),
            }
        }
        Err(err) => {
            let reason = match err {
                PharmaGuardError::Transport { reason, .. } => reason,
                PharmaGuardError::ServerReported(message) => message,
                other => other.to_string(),
            };
            HealthRow {
                check,
                status: "error".into(),
                latency: reason,
            }
        }
    }
}

async fn check_export_dir(dir: &Path) -> HealthRow {
    let start = Instant::now();
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let probe = dir.join(format!(".pharmaguard-healthcheck-{suffix}.tmp"));

    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&probe, b"ok").await?;
        match tokio::fs::remove_file(&probe).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
    .await;

    match result {
        Ok(()) => HealthRow {
            check: format!("Export dir ({})", dir.display()),
            status: "ok".into(),
            latency: format!("{}ms", start.elapsed().as_millis()),
        },
        Err(err) => HealthRow {
            check: format!("Export dir ({})", dir.display()),
            status: "error".into(),
            latency: format!("{:?}", err.kind()),
        },
    }
}

/// Checks the analysis service health endpoint and, unless `service_only`, the export
/// directory.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be created.
pub async fn check(
    config: &Config,
    export_dir: &Path,
    service_only: bool,
) -> Result<HealthReport, PharmaGuardError> {
    let client = PharmaGuardClient::new(config)?;

    let mut rows = vec![check_service(&client).await];
    if !service_only {
        rows.push(check_export_dir(export_dir).await);
    }
    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}
