use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_POLL_INTERVAL_MS: i64 = 200;
pub const DEFAULT_TIMER_STEP_LIMIT: usize = 10_000;
pub const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;
pub const DEFAULT_FLAG_NAMESPACE: &str = "eux";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Turns on tracing and the debug-only `Page::log` output.
    pub debug: bool,

    /// Interval used by `Page::poll_default` and for non-positive intervals.
    pub default_poll_interval_ms: i64,

    pub timer_step_limit: usize,
    pub trace_log_limit: usize,
    pub trace_to_log: bool,
    pub flag_namespace: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timer_step_limit: DEFAULT_TIMER_STEP_LIMIT,
            trace_log_limit: DEFAULT_TRACE_LOG_LIMIT,
            trace_to_log: true,
            flag_namespace: DEFAULT_FLAG_NAMESPACE.to_string(),
        }
    }
}

impl PageConfig {
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| Error::Config(format!("invalid page config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timer_step_limit == 0 {
            return Err(Error::Config("timer_step_limit requires at least 1 step".into()));
        }
        if self.trace_log_limit == 0 {
            return Err(Error::Config("trace_log_limit requires at least 1 entry".into()));
        }
        if self.default_poll_interval_ms <= 0 {
            return Err(Error::Config(format!(
                "default_poll_interval_ms must be positive (got {})",
                self.default_poll_interval_ms
            )));
        }
        Ok(())
    }
}
