use std::path::PathBuf;
use std::sync::Arc;

use action_flow::RunState;
use anyhow::{bail, Context, Result};
use clap::Args;
use formfill_cli::mapping::{load_rows, select_rows, Mapping};
use formfill_cli::report::{RowReport, RunSummary};
use formfill_cli::{Config, FillEngine};
use formfill_core_types::MonitorOutcome;
use page_port::PageDom;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::runtime::launch_page;
use super::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Mapping file (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub mapping: PathBuf,

    /// CSV file with one row per submission
    #[arg(long, value_name = "FILE")]
    pub rows: PathBuf,

    /// Only fill this row (1-based)
    #[arg(long)]
    pub row: Option<usize>,

    /// Do not wait for the mapping's success signal
    #[arg(long)]
    pub no_monitor: bool,
}

pub async fn cmd_run(args: RunArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let mapping = Mapping::load(&args.mapping)?;
    mapping
        .validate()
        .with_context(|| format!("validating {}", args.mapping.display()))?;
    let rows = select_rows(load_rows(&args.rows)?, args.row)?;
    if rows.is_empty() {
        bail!("{} contains no rows", args.rows.display());
    }

    let (runtime, page) = launch_page(config).await?;
    let page: Arc<dyn PageDom> = page;
    let engine = FillEngine::new(page, config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let watch_success = mapping.success.clone().filter(|_| !args.no_monitor);
    let mut summary = RunSummary::new(&mapping.name);
    for (number, row) in rows {
        info!(row = number, url = %mapping.target_url, "filling row");
        if let Err(err) = runtime.navigate(&mapping.target_url).await {
            runtime.close().await;
            return Err(err).with_context(|| format!("loading form for row {}", number));
        }

        // Watch from before the submit so the baseline is the form page.
        let pending = match &watch_success {
            Some(success) => Some(engine.watch_success(success.clone()).await.1),
            None => None,
        };

        let report = engine
            .run_fill_with_cancel(&mapping.steps, &row, &cancel)
            .await;

        let monitor = match pending {
            Some(outcome) if report.result.success => Some(outcome.await.unwrap_or_else(|_| {
                MonitorOutcome::failure("monitor stopped before reporting")
            })),
            Some(_) => {
                engine.stop_success_monitor();
                None
            }
            None => None,
        };

        summary.push(RowReport {
            row: number,
            result: report.result,
            monitor,
        });
        if report.state == RunState::Cancelled {
            warn!(row = number, "run cancelled; remaining rows skipped");
            break;
        }
    }
    runtime.close().await;

    match output {
        OutputFormat::Human => print!("{}", summary.render_human()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if !summary.all_passed() {
        bail!(
            "{} of {} rows failed",
            summary.failed_rows(),
            summary.rows.len()
        );
    }
    Ok(())
}
