//! Core orchestration: probes, pipeline composition, port allocation,
//! external-collaborator controllers, session password, and the Supervisor
//! that ties them together.

pub mod controllers;
pub mod password;
pub mod pipeline;
pub mod ports;
pub mod probes;
pub mod supervisor;
pub mod xtrabackup;

pub use controllers::{FirewallController, IptablesFirewall, MariaDbReplication, ReplicationController};
pub use password::SessionPassword;
pub use ports::PortAllocator;
pub use supervisor::Supervisor;
