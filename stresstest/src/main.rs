//! This is a stresstest binary which generates synthetic load against mounted shares.
//!
//! It reads the same share and stress settings as the health checker from a YAML file and runs the
//! configured stress workload against each share in turn, printing a report per share.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::path::PathBuf;

use anyhow::Context;
use argh::FromArgs;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

mod config;

/// Stresstester for mounted storage shares
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the yaml configuration file
    #[argh(option, short = 'c')]
    pub config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();

    let config_file = std::fs::File::open(args.config).context("failed to open config file")?;
    let config: Config =
        serde_yaml::from_reader(config_file).context("failed to parse config YAML")?;

    if !config.stress.enabled {
        anyhow::bail!("stress is disabled in the configuration, set `stress.enabled: true`");
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    for share in &config.shares {
        let report = stresstest::run(share, &config.stress, cancel.clone())
            .await
            .with_context(|| format!("stress run for share `{}` failed", share.share_name))?;
        print_share(share, &report);

        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(())
}

fn print_share(share: &sharehealth_types::ShareConfig, report: &stresstest::StressReport) {
    use yansi::Paint;

    println!();
    println!(
        "{} {} ({})",
        "## Share".bold(),
        share.share_name.as_str().bold().blue(),
        share.share_path.display()
    );
    stresstest::print_report(report);
}
