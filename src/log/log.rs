use env_logger::fmt::{Color, Formatter};
use env_logger::Builder;
use log::{Level, LevelFilter, Record};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

const SUCCESS_TINT: (u8, u8, u8) = (0, 255, 0); // pure green
const WARNING_TINT: (u8, u8, u8) = (255, 255, 0); // pure yellow

/// Targets that get their own tint on top of the level color.
pub const SUCCESS_TARGET: &str = "success";
pub const WARNING_TARGET: &str = "warning";
/// Target used for every message the validation layers hand to the monitor.
pub const LAYER_TARGET: &str = "layer";

/// 50 / 50 blend of two RGB colors
#[inline]
fn blend((r1, g1, b1): (u8, u8, u8), (r2, g2, b2): (u8, u8, u8)) -> (u8, u8, u8) {
    (
        ((r1 as u16 + r2 as u16) / 2) as u8,
        ((g1 as u16 + g2 as u16) / 2) as u8,
        ((b1 as u16 + b2 as u16) / 2) as u8,
    )
}

/// Base color for each standard log level
#[inline]
fn base_rgb(level: Level) -> (u8, u8, u8) {
    match level {
        Level::Error => (255, 0, 0),     // red
        Level::Warn => (255, 255, 0),    // yellow
        Level::Info => (255, 255, 255),  // white
        Level::Debug => (200, 200, 255), // blue
        Level::Trace => (220, 220, 220), // grey
    }
}

#[inline]
fn target_rgb(target: &str, level: Level) -> (u8, u8, u8) {
    match target {
        SUCCESS_TARGET => blend(base_rgb(level), SUCCESS_TINT),
        WARNING_TARGET | LAYER_TARGET => blend(base_rgb(level), WARNING_TINT),
        _ => base_rgb(level),
    }
}

/// Relative `src/...:line:1` location so terminals and IDEs turn it into a link.
fn clickable_location(record: &Record) -> String {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut full = PathBuf::from(record.file().unwrap_or("unknown"));
    if full.is_relative() {
        full = env::current_dir().unwrap_or_default().join(full);
    }
    let rel = full
        .strip_prefix(manifest_dir)
        .unwrap_or(&full)
        .to_string_lossy()
        .replace('\\', "/");
    format!("\n{rel}:{}:1", record.line().unwrap_or(0))
}

/// Installs the global logger.
///
/// `default_level` applies to every target unless `RUST_LOG` says otherwise.
/// Calling it twice is harmless: the second registration is reported as an error
/// and the first logger stays in place.
pub fn init_log(default_level: LevelFilter) -> anyhow::Result<()> {
    Builder::new()
        .format(|buf: &mut Formatter, record: &Record| {
            let mut style = buf.style();
            let rgb = target_rgb(record.target(), record.level());
            style.set_color(Color::Rgb(rgb.0, rgb.1, rgb.2));

            match record.level() {
                Level::Error | Level::Warn => style.set_bold(true),
                Level::Trace => style.set_dimmed(true),
                _ => style.set_bold(false),
            };

            // The location part carries no ANSI codes so it stays clickable.
            writeln!(
                buf,
                "[{} {}] {}  {}",
                chrono::Local::now().format("%H:%M:%S"),
                style.value(record.level()),
                style.value(record.args()),
                clickable_location(record)
            )
        })
        .filter_level(default_level)
        .parse_default_env()
        .try_init()
        .map_err(Into::into)
}

#[macro_export]
macro_rules! info_success {
    ($($arg:tt)*) => {
        ::log::info!(target: "success", "[SUCCESS] {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! debug_success {
    ($($arg:tt)*) => {
        ::log::debug!(target: "success", "[SUCCESS] {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_success {
    ($($arg:tt)*) => {
        ::log::trace!(target: "success", "[SUCCESS] {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn_warning
{ ($($arg:tt)*) => { ::log::warn! (target: "warning",  "[WARNING] {}",  format!($($arg)*)); }; }
