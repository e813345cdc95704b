pub mod host_executor;

pub use host_executor::{probe_program, Capability, HostConfig, HostExecutor};
