use std::error::Error as StdError;
use std::fmt;

mod config;
mod flag_set;
mod page;
mod poller;
mod runtime_state;
mod storage;

pub use config::{
    DEFAULT_FLAG_NAMESPACE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMER_STEP_LIMIT,
    DEFAULT_TRACE_LOG_LIMIT, PageConfig,
};
pub use flag_set::{FLAG_MARKER, FlagSet};
pub use page::Page;
pub use poller::{PollHandle, PollOptions, PollStatus};
pub use runtime_state::PendingTimer;
pub use storage::{KeyValueStore, Storage, StorageKind, StoredValue, read_value, write_value};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Config(String),
    Timer(String),
    Callback(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Timer(msg) => write!(f, "timer error: {msg}"),
            Self::Callback(msg) => write!(f, "callback error: {msg}"),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests;
