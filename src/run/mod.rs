pub mod logger;
pub mod watch;

pub use logger::{RunLogger, TracingLogger};
pub use watch::{
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIME_LIMIT_SECS, RunWatch, TriggerOptions, WatchState,
};
