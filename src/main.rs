use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use snaphound::{CancelHandle, JsonLinesSink, SnapHound, telemetry};
use snaphound_search::cli::Cli;
use snaphound_search::dispatch::{DispatchError, EXIT_USAGE, USAGE, dispatch, exit_code};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init();

    let engine_args = cli.engine.clone();
    let outcome = dispatch(
        cli.priority_paths_json.as_deref(),
        cli.paths_json.as_deref(),
        |paths, priority_paths| {
            let options = engine_args.to_options()?;
            let engine =
                SnapHound::with_options(paths, priority_paths, options, JsonLinesSink::stdout())?;
            cancel_on_interrupt(engine.cancel_handle());
            Ok(engine)
        },
    )
    .await;

    match outcome {
        Ok(summary) => {
            if cli.engine.summary {
                let json = serde_json::to_string_pretty(&summary)?;
                println!("{json}");
            }
            Ok(ExitCode::from(exit_code(&summary)))
        }
        Err(DispatchError::MissingArguments) => {
            println!("{USAGE}");
            Ok(ExitCode::from(EXIT_USAGE))
        }
        Err(err) => Err(err.into()),
    }
}

fn cancel_on_interrupt(handle: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling search");
            handle.cancel();
        }
    });
}
