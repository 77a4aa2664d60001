pub mod hold_reaper;
pub mod recovery_worker;

pub use hold_reaper::run_hold_reaper;
pub use recovery_worker::run_recovery_worker;
