//! Logging bootstrap and event macros, grounded on
//! `empath_common::logging`: a `tracing_subscriber::Registry` with a
//! `fmt` layer, a custom microsecond timer, and a target filter so only
//! this workspace's events are rendered.
//!
//! Library crates log with plain `tracing::{debug,info,warn,error}!`.
//! Only the binary crate calls [`init`].

use chrono::Utc;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    filter::FilterFn, fmt::time::FormatTime, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt, Layer,
};

struct MicrosTime;

impl FormatTime for MicrosTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        w.write_fmt(format_args!("{}", Utc::now().timestamp_micros()))
    }
}

/// Span-and-event wrapper the rest of the macro family builds on.
#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!(target: "sendkit", $level, $span);
        let _enter = span.enter();
        $crate::tracing::event!(target: "sendkit", $level, $($msg),*)
    }};
}

/// An event tagged `outgoing`: provider sends, retries, escalations.
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };
    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

/// An event tagged `incoming`: enqueue, pause/resume, producer calls.
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };
    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

/// An event tagged `internal`: anything that isn't on the producer or
/// provider boundary (alert evaluation, pattern mining, bookkeeping).
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };
    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

/// Re-exported so the macros above can refer to `$crate::tracing`
/// without every caller depending on the `tracing` crate directly.
pub use tracing;

/// Install the global subscriber. Reads `SENDKIT_LOG_LEVEL`
/// (`error`/`warn`/`info`/`trace`), defaulting to `trace` in debug
/// builds and `info` in release, same as the teacher's bootstrap.
pub fn init() {
    let level = if let Ok(level) = std::env::var("SENDKIT_LOG_LEVEL") {
        match level.to_ascii_lowercase().as_str() {
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::ERROR,
        }
    } else if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::Registry::default()
        .with(
            (if cfg!(debug_assertions) {
                tracing_subscriber::fmt::layer()
            } else {
                tracing_subscriber::fmt::layer().with_file(false).with_line_number(false)
            })
            .compact()
            .with_ansi(true)
            .with_timer(MicrosTime)
            .with_target(false)
            .with_level(true)
            .with_filter(level)
            .with_filter(FilterFn::new(|metadata| metadata.target().starts_with("sendkit"))),
        )
        .init();
}
