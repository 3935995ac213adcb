//! linear-transition - move Linear issues between workflow states and manage
//! their labels from a CI step.
//!
//! # Environment Variables
//!
//! - `INPUT_API_KEY` - Linear API key or OAuth token (required)
//! - `INPUT_TEAM_KEY` - Comma-separated team keys (required)
//! - `INPUT_ISSUE_IDENTIFIERS` / `INPUT_FILTER_LABEL` - issue selection, one is required
//! - `INPUT_TRANSITION_TO`, `INPUT_TRANSITION_FROM`, `INPUT_ADD_LABELS`, `INPUT_REMOVE_LABELS`
//! - `RUST_LOG` - log filter (default `linear_transition=info`)
//!
//! # Examples
//!
//! ```bash
//! linear-transition --api-key "$LINEAR_API_KEY" --team-key ENG \
//!     --issue-identifiers ENG-12,ENG-14 \
//!     --transition-to Done --transition-from "In Review" \
//!     --add-labels "version/v1.4.0" --remove-labels "version/v*"
//! ```

use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use linear_transition::{Inputs, LinearClient, Runner};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linear_transition=info")),
        )
        .init();

    let inputs = Inputs::parse();

    match run(&inputs).await {
        Ok(()) => {
            info!("Linear transition completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(inputs: &Inputs) -> Result<()> {
    let groups = inputs.request_groups()?;
    if groups.is_empty() {
        warn!("No issue identifiers match the configured teams. Nothing to do");
        return Ok(());
    }

    let client = LinearClient::with_url(&inputs.api_key, &inputs.api_url)?;
    let runner = Runner::new(&client);

    let results = runner.run_groups(&groups).await;
    let total = results.len();
    let mut failed = 0;

    for (team_key, result) in results {
        match result {
            Ok(report) => {
                info!(
                    team = %team_key,
                    issues = report.issues,
                    updated = report.updated(),
                    labels_added = report.labels_added,
                    labels_removed = report.labels_removed,
                    "Request group finished"
                );
                if !report.is_success() {
                    failed += 1;
                }
            }
            Err(e) => {
                error!(team = %team_key, "{e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {total} request group(s) failed");
    }

    Ok(())
}
