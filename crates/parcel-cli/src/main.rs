use parcel_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable ({e:#}); logging to stderr");
    }

    if let Err(err) = Cli::run_from_args().await {
        eprintln!("parcel error: {:#}", err);
        std::process::exit(1);
    }
}
