use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_adapter::ChromiumRuntime;
use formfill_cli::Config;
use page_port::{ScriptPage, ScriptRuntime};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level`; logs go to
/// stderr so stdout stays free for results and bridge frames.
pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

/// Launch Chromium and wrap its tab as a script-backed page.
pub async fn launch_page(config: &Config) -> Result<(Arc<ChromiumRuntime>, Arc<ScriptPage>)> {
    let runtime = Arc::new(
        ChromiumRuntime::launch(&config.browser)
            .await
            .context("Failed to launch browser")?,
    );
    let script_runtime: Arc<dyn ScriptRuntime> = runtime.clone();
    let page = Arc::new(ScriptPage::new(script_runtime));
    page.watch_mutations(config.monitor.poll_interval());
    Ok((runtime, page))
}
