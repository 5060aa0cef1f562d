//! Runs a static list of cases against one framework and tallies the outcome.

use crate::validation::framework::RenderFramework;
use crate::{info_success, warn_warning};
use log::{error, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// The device lacks something the case needs.
    Skipped(String),
}

pub struct TestCase {
    pub name: &'static str,
    pub run: fn(&dyn RenderFramework) -> anyhow::Result<Outcome>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

impl Summary {
    /// Skips do not fail the run.
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() { 0 } else { 1 }
    }

    pub fn log(&self) {
        info!(
            "{} passed, {} skipped, {} failed",
            self.passed.len(),
            self.skipped.len(),
            self.failed.len()
        );
        for name in &self.failed {
            error!("[  FAILED  ] {name}");
        }
    }
}

/// Runs every case whose name contains `filter` (all of them when `None`), in order.
///
/// The monitor is reset after each case so a failure cannot leak expectations into the
/// next one.
pub fn run_all(
    framework: &dyn RenderFramework,
    cases: &[TestCase],
    filter: Option<&str>,
) -> Summary {
    let mut summary = Summary::default();
    for case in cases
        .iter()
        .filter(|case| filter.is_none_or(|f| case.name.contains(f)))
    {
        info!("[ RUN      ] {}", case.name);
        match (case.run)(framework) {
            Ok(Outcome::Passed) => {
                info_success!("[       OK ] {}", case.name);
                summary.passed.push(case.name);
            }
            Ok(Outcome::Skipped(reason)) => {
                warn_warning!("[  SKIPPED ] {}: {reason}", case.name);
                summary.skipped.push(case.name);
            }
            Err(err) => {
                error!("[  FAILED  ] {}: {err}", case.name);
                for cause in err.chain().skip(1) {
                    error!("Caused by: {cause}");
                }
                summary.failed.push(case.name);
            }
        }
        framework.monitor().reset();
    }
    summary
}
