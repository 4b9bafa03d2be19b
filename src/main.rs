use clap::error::ErrorKind;
use clap::Parser;
use dip_core::error::DIP_SUCCESS;
use dip_ui::{bad_command, exit_status, run, Cli};
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(DIP_SUCCESS);
        }
        Err(e) => {
            let err = bad_command(&e);
            eprint!("{err}");
            std::process::exit(err.status_code());
        }
    };

    init_tracing(cli.debug);
    tracing::debug!("CLI arguments parsed, invoking run");

    let status = match run(cli).await {
        Ok(status) => {
            tracing::debug!(status, "CLI completed");
            status
        }
        Err(e) => {
            tracing::debug!(error = ?e, "CLI exited with error");
            eprintln!("{e}");
            exit_status(&e)
        }
    };
    std::process::exit(status);
}
