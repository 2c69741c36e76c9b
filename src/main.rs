//! Main binary for running Lox conformance fixtures

use clap::Parser;
use console::style;
use std::process;

use lox_tests::{config::TestConfig, harness::LoxHarness, reporting::Reporter};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match TestConfig::try_parse() {
        Ok(config) => config,
        // --help and --version are reported through the same error type
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if config.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let harness = match LoxHarness::new(config) {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("Failed to create test harness: {}", e);
            process::exit(1);
        }
    };

    let mut reporter = Reporter::stdout()
        .with_relay(!harness.config().quiet)
        .with_verbose(harness.config().verbose);

    match harness.run_all(&mut reporter).await {
        Ok(result) => process::exit(result.exit_code()),
        Err(e) => {
            eprintln!("{}", style(format!("Test run aborted: {}", e)).for_stderr().red().bold());
            process::exit(1);
        }
    }
}
