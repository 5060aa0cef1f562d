use ::log::{debug, error};
use anyhow::{Context, Result};
use layer_harness::gapi::vulkan::config::HarnessConfig;
use layer_harness::info_success;
use layer_harness::log::log::init_log;
use layer_harness::validation::cases::BUILTIN_CASES;
use layer_harness::validation::framework::LayerTest;
use layer_harness::validation::runner::run_all;
use std::env;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("Oops! Something went wrong: {}", err);
            for cause in err.chain().skip(1) {
                error!("Caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // The logger comes first so a bad config is still reported.
    let config = HarnessConfig::from_env();
    let level = config
        .as_ref()
        .map_or(HarnessConfig::default().log_level, |config| config.log_level);
    init_log(level)?;
    let config = config.context("Invalid harness configuration")?;
    debug!("{config:#?}");

    let filter = env::args().nth(1);
    debug!("Creating layer test fixture...");
    let framework = LayerTest::new(&config).context("Failed to initialise the layer test fixture")?;
    info_success!("Fixture created!");

    let summary = run_all(&framework, BUILTIN_CASES, filter.as_deref());
    summary.log();
    Ok(summary.exit_code())
}
