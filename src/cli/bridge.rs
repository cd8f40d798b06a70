use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use formfill_cli::bridge::serve;
use formfill_cli::{Config, FillEngine};
use page_port::PageDom;
use tokio::io::BufReader;

use super::runtime::launch_page;

#[derive(Args, Clone, Debug)]
pub struct BridgeArgs {
    /// Page to open before serving requests
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn cmd_bridge(args: BridgeArgs, config: &Config) -> Result<()> {
    let (runtime, page) = launch_page(config).await?;
    if let Some(url) = &args.url {
        if let Err(err) = runtime.navigate(url).await {
            runtime.close().await;
            return Err(err).with_context(|| format!("opening {}", url));
        }
    }

    let page: Arc<dyn PageDom> = page;
    let engine = Arc::new(FillEngine::new(page, config));
    let served = serve(
        engine,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await;
    runtime.close().await;
    served.context("bridge failed")
}
