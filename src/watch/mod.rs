//! Long-running mailbox watch: initial sync, then IDLE with periodic re-arm.

pub mod clock;
pub mod engine;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::engine::{WatchEngine, WatchSettings, WatchState, WatchStats};
