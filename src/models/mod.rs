//! Record types exchanged with the fleet API.

pub mod machine;

pub use machine::{Machine, MachineDraft, MachineMetrics, MachineStatus, MachineStatusReport};
