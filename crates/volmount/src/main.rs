//! volmount CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{fmt, prelude::*};

use volmount::cli::{Cli, Outcome};

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let usage_error = err.use_stderr();
            err.print()?;
            return Ok(if usage_error {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            });
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(cli.log_filter())
        .init();

    let Some(volume) = cli.volume.as_ref() else {
        eprintln!("No volume id specified");
        return Ok(ExitCode::from(EXIT_USAGE));
    };

    match cli.execute(volume).await {
        Ok(Outcome::Mounted(mountpoint)) => {
            println!("{}", mountpoint.display());
            Ok(ExitCode::SUCCESS)
        }
        Ok(Outcome::Unmounted | Outcome::NotMounted) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}
