use std::process::ExitCode;
use std::time::Duration;

use shared::Event;
use taxi_dash_shell::commands::{parse_command, HELP};
use taxi_dash_shell::{LogRenderer, ReqwestTransport, Shell, ShellConfig, ShellError, ShellHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "taxi-dash failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ShellError> {
    let config = match std::env::args().nth(1) {
        Some(path) => ShellConfig::from_file(path)?,
        None => ShellConfig::from_env()?,
    };
    tracing::info!(
        base_url = %config.base_url,
        poll_interval_ms = config.settings.poll_interval_ms,
        request_timeout_ms = config.request_timeout_ms,
        "configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let shell = Shell::new(ReqwestTransport::new(&config)?, LogRenderer::default());
        let handle = shell.handle();
        handle.send(Event::Mounted {
            settings: config.settings.clone(),
        })?;

        tokio::spawn(read_commands(handle.clone()));
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                handle.shutdown();
            }
        });

        tracing::info!("{HELP}");
        shell.run().await;
        Ok::<(), ShellError>(())
    });

    // the stdin reader may be parked in a blocking read
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn read_commands(handle: ShellHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Ok(Some(event)) => {
                    if handle.send(event).is_err() {
                        break;
                    }
                }
                Ok(None) => tracing::info!("{HELP}"),
                Err(err) => tracing::warn!("{err}"),
            },
            Ok(None) => {
                tracing::debug!("stdin closed");
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stdin");
                break;
            }
        }
    }
}
