#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use downshiftarr::cli::{Cli, parse_args};
use downshiftarr::media_server::PlexConnector;
use downshiftarr::monitor::{MonitoringService, TautulliClient};
use downshiftarr::observability::{init_logging, parse_level};
use downshiftarr::{Config, DownshiftError, Enforcer, InputEvent};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::process::ExitCode;
use tracing::Level;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Help, version and unreadable argument lists print and exit 0 like any
    // other non-enforcing invocation.
    let (cli, parse_error) = match parse_args(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("downshiftarr: {e}");
            return ExitCode::FAILURE;
        }
    };
    let level = cli
        .log_level
        .as_deref()
        .and_then(parse_level)
        .or_else(|| parse_level(&config.logging.level))
        .unwrap_or(Level::INFO);
    init_logging(level);
    if let Some(e) = parse_error {
        tracing::warn!(error = %e.kind(), "Ignoring unrecognised arguments");
    }

    // Policy outcomes all exit 0; only a panic escaping enforcement is an
    // invocation error.
    match AssertUnwindSafe(run(&cli, &config)).catch_unwind().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => {
            tracing::error!("Unhandled panic during enforcement");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> downshiftarr::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.enforcement.dry_run = true;
    }
    if let Some(level) = cli.log_level.as_deref()
        && parse_level(level).is_none()
    {
        return Err(DownshiftError::Other(anyhow::anyhow!(
            "invalid --log-level '{level}'"
        )));
    }
    Ok(config)
}

async fn run(cli: &Cli, config: &Config) {
    let event = InputEvent::from_cli(cli);
    tracing::info!(
        rating_key = event.rating_key.as_deref().unwrap_or("-"),
        user = event.username.as_deref().unwrap_or("-"),
        machine = event.machine_id.as_deref().unwrap_or("-"),
        session_key = event.session_key.as_deref().unwrap_or("-"),
        decision = event.video_decision.as_deref().unwrap_or("-"),
        config = ?config.config_path,
        "Event received"
    );

    let connector = PlexConnector::new(&config.plex);
    let direct = connector.direct_terminator();
    let tautulli = config
        .tautulli
        .is_configured()
        .then(|| TautulliClient::new(&config.tautulli));
    let monitor = tautulli.as_ref().map(|t| t as &dyn MonitoringService);

    Enforcer::new(config, &connector, monitor, &direct)
        .enforce(&event)
        .await;
}
