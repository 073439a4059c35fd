mod cli;
mod orchestrator;
mod output;
mod statistics;

use std::process::ExitCode;

use clap::Parser;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    match orchestrator::run(args).await {
        Ok(scores) => {
            statistics::print_summary(&scores);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("vqmeter: {error}");
            ExitCode::FAILURE
        }
    }
}
