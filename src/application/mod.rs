//! Application layer - the scan loop and session reporting

pub mod scan_loop;
pub mod stats;

pub use scan_loop::{LoopState, ScanLoop};
pub use stats::SessionStats;
