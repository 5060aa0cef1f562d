//! Expectation oracle shared between a test and the driver's debug callback.
//!
//! A test installs the messages it expects, triggers some Vulkan work, and then asks
//! for a verdict. The driver may call [`ErrorMonitor::check_for_desired_msg`] from any
//! thread in the meantime, so every piece of state lives behind one mutex.

use crate::gapi::vulkan::core::debug::CallbackRecord;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use vulkanalia::vk;

pub const MISSING_PREFIX: &str = "[ MISSING_MSG ]";
pub const UNEXPECTED_PREFIX: &str = "[ UNEXPECTED_ERR ]";
pub const POSITIVE_FAIL_PREFIX: &str = "[ POSITIVE_FAIL ]";

/// Called with every debug-utils record before it is matched.
pub type UtilsHook = Arc<dyn Fn(&CallbackRecord) + Send + Sync>;

/// Why a verdict failed.
///
/// Every variant keeps the unexpected messages too, so a report shows the whole picture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerdictError {
    #[error("did not receive {} expected message(s)", .missing.len())]
    Missing {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("received {} unexpected message(s)", .unexpected.len())]
    Unexpected { unexpected: Vec<String> },
    #[error("expected success but {} message(s) matched", .matched.len())]
    PositiveViolation {
        matched: Vec<String>,
        unexpected: Vec<String>,
    },
}

impl VerdictError {
    /// Report lines in output order: missing, then matched on a positive test, then unexpected.
    pub fn report_lines(&self) -> Vec<String> {
        self.primary_lines()
            .chain(
                self.unexpected()
                    .iter()
                    .map(|msg| format!("{UNEXPECTED_PREFIX} '{msg}'")),
            )
            .collect()
    }

    pub fn unexpected(&self) -> &[String] {
        match self {
            Self::Missing { unexpected, .. }
            | Self::Unexpected { unexpected }
            | Self::PositiveViolation { unexpected, .. } => unexpected,
        }
    }

    fn primary_lines(&self) -> impl Iterator<Item = String> + '_ {
        let (primary, prefix) = match self {
            Self::Missing { missing, .. } => (missing.as_slice(), MISSING_PREFIX),
            Self::Unexpected { .. } => (&[][..], ""),
            Self::PositiveViolation { matched, .. } => (matched.as_slice(), POSITIVE_FAIL_PREFIX),
        };
        primary.iter().map(move |msg| format!("{prefix} '{msg}'"))
    }

    /// The unexpected messages are left to [`dump_other_msgs`].
    fn log(&self) {
        error!("Verdict failed: {self}");
        for line in self.primary_lines() {
            error!("{line}");
        }
    }
}

fn dump_other_msgs(other: &[String]) {
    if !other.is_empty() {
        error!("Other error messages logged for this test were:");
        for msg in other {
            error!("     {msg}");
        }
    }
}

struct MonitorState {
    message_flags: vk::DebugReportFlagsEXT,
    /// Insertion-ordered multiset; an empty entry is the expect-success sentinel.
    desired: Vec<String>,
    ignore: Vec<String>,
    other: Vec<String>,
    /// Messages that satisfied an expectation since the last reset.
    seen: Vec<String>,
    found: bool,
    bailout: Option<Arc<AtomicBool>>,
}

impl MonitorState {
    fn fresh() -> Self {
        Self {
            message_flags: vk::DebugReportFlagsEXT::ERROR,
            desired: Vec::new(),
            ignore: Vec::new(),
            other: Vec::new(),
            seen: Vec::new(),
            found: false,
            bailout: None,
        }
    }
}

pub struct ErrorMonitor {
    state: Mutex<MonitorState>,
    utils_hook: Mutex<Option<UtilsHook>>,
}

impl Default for ErrorMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ErrorMonitor")
            .field("message_flags", &state.message_flags)
            .field("desired", &state.desired)
            .field("ignore", &state.ignore)
            .field("other", &state.other)
            .field("found", &state.found)
            .finish()
    }
}

impl ErrorMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState::fresh()),
            utils_hook: Mutex::new(None),
        }
    }

    /// Back to the freshly constructed state: ERROR mask, no expectations, no bailout.
    ///
    /// The debug-utils hook survives; it belongs to the fixture, not to one assertion.
    pub fn reset(&self) {
        *self.state.lock() = MonitorState::fresh();
    }

    /// Expects one message containing `msg` at any severity in `flags`.
    ///
    /// Duplicates are kept: expecting the same text twice needs two matching messages.
    pub fn set_desired_failure_msg(&self, flags: vk::DebugReportFlagsEXT, msg: &str) {
        let mut state = self.state.lock();
        state.desired.push(msg.to_owned());
        state.message_flags |= flags;
    }

    pub fn set_desired_failure_msgs<I, S>(&self, flags: vk::DebugReportFlagsEXT, msgs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        for msg in msgs {
            state.desired.push(msg.as_ref().to_owned());
        }
        state.message_flags |= flags;
    }

    /// Marks the next operation as a positive test: any message passing `flags` is a failure.
    ///
    /// Unlike [`Self::set_desired_failure_msg`] this replaces the severity mask, so the
    /// last call wins when it is stacked.
    pub fn expect_success(&self, flags: vk::DebugReportFlagsEXT) {
        let mut state = self.state.lock();
        state.desired.push(String::new());
        state.message_flags = flags;
    }

    /// Messages containing `msg` are dropped before any expectation sees them.
    pub fn set_unexpected_error(&self, msg: &str) {
        self.state.lock().ignore.push(msg.to_owned());
    }

    /// Shares a flag the monitor raises on every observed message.
    pub fn set_bailout(&self, bailout: Option<Arc<AtomicBool>>) {
        self.state.lock().bailout = bailout;
    }

    pub fn set_utils_hook(&self, hook: Option<UtilsHook>) {
        *self.utils_hook.lock() = hook;
    }

    pub(crate) fn utils_hook(&self) -> Option<UtilsHook> {
        self.utils_hook.lock().clone()
    }

    /// Records `msg` as a match without going through the expectation list.
    pub fn set_error(&self, msg: &str) {
        let mut state = self.state.lock();
        state.found = true;
        state.seen.push(msg.to_owned());
    }

    /// Matches one incoming message. Returns `true` when an expectation took it.
    ///
    /// Never fails: problems only show up in [`Self::verify_found`] and
    /// [`Self::verify_not_found`].
    pub fn check_for_desired_msg(&self, msg: &str) -> bool {
        let mut state = self.state.lock();
        if let Some(bailout) = &state.bailout {
            bailout.store(true, Ordering::SeqCst);
        }

        if state.ignore.iter().any(|ignored| msg.contains(ignored.as_str())) {
            debug!("Ignored: {msg}");
            return false;
        }

        let hit = state
            .desired
            .iter()
            .position(|desired| desired.is_empty() || msg.contains(desired.as_str()));
        match hit {
            Some(index) => {
                if !state.desired[index].is_empty() {
                    state.desired.remove(index);
                }
                state.found = true;
                state.seen.push(msg.to_owned());
                true
            }
            None => {
                warn!("Unexpected: {msg}");
                state.other.push(msg.to_owned());
                false
            }
        }
    }

    pub fn message_flags(&self) -> vk::DebugReportFlagsEXT {
        self.state.lock().message_flags
    }

    pub fn any_desired_msg_found(&self) -> bool {
        self.state.lock().found
    }

    pub fn all_desired_msgs_found(&self) -> bool {
        self.state.lock().desired.is_empty()
    }

    pub fn other_failure_msgs(&self) -> Vec<String> {
        self.state.lock().other.clone()
    }

    pub fn desired_failure_msgs(&self) -> Vec<String> {
        self.state.lock().desired.clone()
    }

    /// Logs the messages no expectation took so far.
    pub fn dump_failure_msgs(&self) {
        dump_other_msgs(&self.state.lock().other);
    }

    fn report(verdict: &Result<(), VerdictError>) {
        if let Err(err) = verdict {
            err.log();
            dump_other_msgs(err.unexpected());
        }
    }

    /// Passes when every expectation matched and nothing else arrived. Always resets.
    pub fn verify_found(&self) -> Result<(), VerdictError> {
        let verdict = {
            let mut state = self.state.lock();
            let state = std::mem::replace(&mut *state, MonitorState::fresh());
            if !state.desired.is_empty() {
                Err(VerdictError::Missing {
                    missing: state.desired,
                    unexpected: state.other,
                })
            } else if !state.other.is_empty() {
                Err(VerdictError::Unexpected {
                    unexpected: state.other,
                })
            } else {
                Ok(())
            }
        };
        Self::report(&verdict);
        verdict
    }

    /// Passes when nothing matched and nothing else arrived. Always resets.
    pub fn verify_not_found(&self) -> Result<(), VerdictError> {
        let verdict = {
            let mut state = self.state.lock();
            let state = std::mem::replace(&mut *state, MonitorState::fresh());
            if state.found {
                Err(VerdictError::PositiveViolation {
                    matched: state.seen,
                    unexpected: state.other,
                })
            } else if !state.other.is_empty() {
                Err(VerdictError::Unexpected {
                    unexpected: state.other,
                })
            } else {
                Ok(())
            }
        };
        Self::report(&verdict);
        verdict
    }
}
