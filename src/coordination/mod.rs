pub mod shutdown;

pub use shutdown::{listen_for_signals, ShutdownSignal, ShutdownTrigger};
