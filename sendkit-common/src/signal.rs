//! Coordinated shutdown broadcast, copied in spirit from
//! `empath_common::Signal`.

/// Broadcast to every long-running loop (worker, monitor timer, HTTP
/// server) to coordinate graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
