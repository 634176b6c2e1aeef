use std::process::ExitCode;

use registration_cli::cli::Cli;
use registration_cli::logger;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logger::setup_logger();

    Cli::execute().await
}
