use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rangedl::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.to_config();
    config.validate()?;

    let _log_guard = rangedl::logging::init(&args.log_file)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();

        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling downloads");
                on_ctrl_c.cancel();
            }
        });

        rangedl::commands::run_downloads(args.urls(), args.download_dir.clone(), config, cancel)
            .await
            .map(|_| ())
    })
}
