use clap::Parser;
use dashchat::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dashchat::cli::run(Cli::parse()).await
}
