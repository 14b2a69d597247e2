//! Queue Monitor (spec §4.G): a read-only sampling plane that aggregates
//! queue depths, processor throughput, limiter utilization, and provider
//! health into alerts, an aggregate status, and a text metrics export.

pub mod alerts;
pub mod export;
pub mod health;
pub mod sampler;
pub mod server;

pub use alerts::{Alert, AlertTable, Rule, Severity};
pub use export::TextExporter;
pub use health::{aggregate, ComponentHealth, Status};
pub use sampler::{DomainUtilization, Monitor, MonitorConfig, Sample};
pub use server::{MonitorServer, MonitorServerError};
