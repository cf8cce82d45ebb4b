use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::state::State;
use crate::{healthcheck, observability, runner, web};

/// Share health checker and Prometheus exporter.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Check(CheckCommand),
    Healthcheck(HealthcheckCommand),
    Version(VersionCommand),
}

/// serve metrics and run health checks on the configured interval
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// check every configured share once and print a report
///
/// Exits with a non-zero status if any share failed its checks.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "check")]
struct CheckCommand {
    /// stress each share before checking it, if stress is enabled in the configuration
    #[argh(switch)]
    with_stress: bool,
}

/// perform a healthcheck against the running sharehealth web server
///
/// This command checks if the server is available on the configured host and port. This is used
/// for Docker healthchecks.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "healthcheck")]
struct HealthcheckCommand {}

/// print the sharehealth version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("sharehealth {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    if matches!(args.command, Command::Run(_) | Command::Check(_)) {
        config.validate()?;
    }

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(RunCommand {}) => web::server(config).await,
            Command::Check(CheckCommand { with_stress }) => check(config, with_stress).await,
            Command::Healthcheck(HealthcheckCommand {}) => healthcheck::healthcheck(config).await,
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}

async fn check(config: Config, with_stress: bool) -> Result<()> {
    let state = State::new(config);
    let results = runner::run_all(&state, with_stress).await;

    let failed = results.iter().filter(|result| !result.success).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} shares failed their checks", results.len());
    }

    Ok(())
}
