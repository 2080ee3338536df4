pub mod protocol;
pub mod actors;
pub mod agent_service;
pub mod agentic_loop;
pub mod api_keys;
pub mod app_state;
pub mod cli;
pub mod commands;
pub mod error;
pub mod llm;
pub mod log_store;
pub mod logging;
pub mod markdown;
pub mod paths;
pub mod settings;
pub mod sql_chain;
pub mod step_extractor;
pub mod system_prompt;
pub mod tools;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::CliArgs;

/// Parse the command line, answer the question and exit with the run status
pub fn run() {
    let args = CliArgs::parse();

    // The activity log already covers info-level progress on stderr
    logging::init_tracing("warn");
    logging::install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[Launch] Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(cli::run_cli(args));
    drop(runtime);

    if let Err(e) = outcome {
        tracing::error!("[Launch] {}", e);
        std::process::exit(1);
    }
}
