//! Remote reachability.
//!
//! The processor only reads `is_available`; the sync worker subscribes to
//! `observe` to drain when connectivity comes back. `WatchConnectivity` can be
//! driven by the host directly or by a `ConnectivityProbe`.

mod monitor;
mod probe;

pub use monitor::{ConnectivityMonitor, WatchConnectivity};
pub use probe::ConnectivityProbe;
