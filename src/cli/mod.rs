//! Command-line surface: argument parsing and command dispatch.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;
use crate::entities::input::UploadedFile;
use crate::entities::selection::{self, DrugSelection, QUICK_PICK_DRUGS};
use crate::entities::submission::{Orchestrator, SubmissionState};
use crate::render::view::{ResultsView, Section, parse_section_toggle};
use crate::sources::pharmaguard::PharmaGuardClient;

pub mod health;

#[derive(Parser, Debug)]
#[command(
    name = "pharmaguard",
    version,
    about = "Pharmacogenomic risk assessment: submit a VCF file and drug list, review the risk report"
)]
pub struct Cli {
    /// Analysis service base URL (overrides PHARMAGUARD_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Print JSON instead of markdown
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a VCF file and drug list for risk analysis
    Analyze {
        /// Patient VCF file
        vcf: PathBuf,

        /// Comma-separated drug names (e.g. "codeine, warfarin")
        #[arg(short, long, default_value = "")]
        drugs: String,

        /// Toggle a quick-pick drug in the list (repeatable)
        #[arg(short, long = "pick")]
        picks: Vec<String>,

        /// Media type to declare for the file (default: inferred from extension)
        #[arg(long)]
        media_type: Option<String>,

        /// Expand every section of every result
        #[arg(long)]
        expand_all: bool,

        /// Toggle one result section, e.g. "2:recommendation" (repeatable)
        #[arg(long = "toggle", value_parser = parse_section_toggle)]
        toggles: Vec<(usize, Section)>,

        /// Write one pharmaguard_result_<drug>_<n>.json per result
        #[arg(long)]
        export: bool,

        /// Directory for exported files (default: the downloads directory)
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// List the quick-pick drug vocabulary
    Drugs {
        /// Drug text to mark selections against
        #[arg(long, default_value = "")]
        selected: String,
    },

    /// Check the analysis service and export directory
    Health {
        /// Only check the analysis service
        #[arg(long)]
        service_only: bool,
    },
}

/// Applies quick-pick toggles on top of the free-text drug list.
fn drug_text_with_picks(drugs: &str, picks: &[String]) -> String {
    if picks.is_empty() {
        return drugs.to_string();
    }
    picks
        .iter()
        .fold(drugs.to_string(), |text, pick| selection::toggle(&text, pick))
}

/// Section flags shape the markdown view only; JSON output carries every field.
fn view_flags_ignored(json: bool, expand_all: bool, toggles: &[(usize, Section)]) -> bool {
    json && (expand_all || !toggles.is_empty())
}

/// Runs a parsed command with configuration read from the environment.
///
/// # Errors
///
/// Returns an error when input validation, the analysis request, rendering, or export fails.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let config = Config::from_env().with_backend_url(cli.backend_url.clone());
    run_with_config(cli, config).await
}

pub async fn run_with_config(cli: Cli, config: Config) -> anyhow::Result<String> {
    let json = cli.json;
    match cli.command {
        Commands::Analyze {
            vcf,
            drugs,
            picks,
            media_type,
            expand_all,
            toggles,
            export,
            export_dir,
        } => {
            let drug_text = drug_text_with_picks(&drugs, &picks);
            let file = UploadedFile::from_path(&vcf, media_type, config.max_upload_bytes).await?;
            let client = PharmaGuardClient::new(&config)?;
            let mut orchestrator = Orchestrator::new(config.max_upload_bytes);

            let state = orchestrator
                .submit(&client, Some(file), &drug_text)
                .await
                .map_err(|message| anyhow!(message))?;
            let results = match state {
                SubmissionState::Succeeded(results) => results,
                SubmissionState::Failed(detail) => return Err(anyhow!(detail.message.clone())),
                other => return Err(anyhow!("Analysis did not complete (state: {other:?})")),
            };

            if view_flags_ignored(json, expand_all, &toggles) {
                warn!("--expand-all and --toggle only affect markdown output; ignored with --json");
            }
            let mut output = if json {
                match results.as_slice() {
                    [single] => crate::render::json::copy_payload(single)?,
                    many => crate::render::json::to_pretty(&many)?,
                }
            } else {
                let mut view = ResultsView::new(results);
                if expand_all {
                    view.expand_all();
                }
                for (index, section) in toggles {
                    if !view.toggle(index, section) {
                        warn!(result = index + 1, "No such result to toggle");
                    }
                }
                crate::render::markdown::results_markdown(&view)?
            };

            if export || export_dir.is_some() {
                let dir = export_dir.unwrap_or_else(crate::utils::download::default_export_dir);
                let mut saved = Vec::with_capacity(results.len());
                for (index, result) in results.iter().enumerate() {
                    let path = crate::render::json::export(result, index)?.save(&dir).await?;
                    info!(path = %path.display(), drug = %result.drug, "Exported result");
                    saved.push(path);
                }
                if !json {
                    output.push_str("\nExported:\n");
                    for path in &saved {
                        output.push_str(&format!("- {}\n", path.display()));
                    }
                }
            }
            Ok(output)
        }
        Commands::Drugs { selected } => {
            let selection = DrugSelection::parse(&selected);
            if json {
                let payload = serde_json::json!({
                    "supported": QUICK_PICK_DRUGS,
                    "selected": selection.names(),
                    "text": selection.to_text(),
                });
                return Ok(crate::render::json::to_pretty(&payload)?);
            }
            Ok(crate::render::markdown::drugs_markdown(&selection)?)
        }
        Commands::Health { service_only } => {
            let dir = crate::utils::download::default_export_dir();
            let report = health::check(&config, &dir, service_only).await?;
            if json {
                return Ok(crate::render::json::to_pretty(&report)?);
            }
            Ok(report.to_markdown())
        }
    }
}
