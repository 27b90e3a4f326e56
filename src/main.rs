//! limatmpl CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use limatmpl::cli::{Cli, CommandDispatcher, Output, StdOutput};
use limatmpl::config::Settings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sends library logs to stderr so stdout stays clean for `copy ... -`.
///
/// `--debug` wins over `RUST_LOG`; without either only `info` and above is shown.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("limatmpl=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("limatmpl=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("limatmpl starting with args: {:?}", cli);

    let mut settings = Settings::from_env();
    cli.apply(&mut settings);

    let mut out = StdOutput;
    let dispatcher = CommandDispatcher::new(settings);
    match dispatcher.dispatch(&cli, &mut out) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            out.error(&format!("Error: {}", e));
            ExitCode::from(1)
        }
    }
}
