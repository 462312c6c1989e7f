#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    gofile_dl::cli::run().await
}
