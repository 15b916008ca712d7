use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::config::PageConfig;
use crate::page::Page;
use crate::poller::PollStatus;
use crate::Result;

pub(crate) type TimerCallback = Box<dyn FnOnce(&mut Page) -> Result<()>>;
pub(crate) type PollPredicate = Box<dyn FnMut(&mut Page) -> Result<bool>>;
pub(crate) type PollCallback = Box<dyn FnOnce(&mut Page) -> Result<()>>;

pub(crate) enum TimerJob {
    Callback(TimerCallback),
    Poll(u64),
}

impl fmt::Debug for TimerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Poll(id) => write!(f, "Poll({id})"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) job: TimerJob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
}

#[derive(Debug)]
pub(crate) struct SchedulerState {
    pub(crate) task_queue: Vec<ScheduledTask>,
    pub(crate) now_ms: i64,
    pub(crate) timer_step_limit: usize,
    pub(crate) next_timer_id: i64,
    pub(crate) next_task_order: i64,
}

impl SchedulerState {
    pub(crate) fn new(timer_step_limit: usize) -> Self {
        Self {
            task_queue: Vec::new(),
            now_ms: 0,
            timer_step_limit,
            next_timer_id: 1,
            next_task_order: 0,
        }
    }

    pub(crate) fn allocate_timer_id(&mut self) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        id
    }

    pub(crate) fn allocate_task_order(&mut self) -> i64 {
        let order = self.next_task_order;
        self.next_task_order += 1;
        order
    }

    pub(crate) fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }
}

pub(crate) struct PollTask {
    pub(crate) predicate: PollPredicate,
    pub(crate) on_done: Option<PollCallback>,
    pub(crate) interval_ms: i64,
    pub(crate) attempts: u32,
    pub(crate) max_attempts: Option<u32>,
    pub(crate) timer_id: Option<i64>,
}

impl fmt::Debug for PollTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollTask")
            .field("interval_ms", &self.interval_ms)
            .field("attempts", &self.attempts)
            .field("max_attempts", &self.max_attempts)
            .field("timer_id", &self.timer_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub(crate) struct PollerState {
    pub(crate) next_poll_id: u64,
    pub(crate) waiting: HashMap<u64, PollTask>,
    // Finished statuses stay here for the life of the page.
    pub(crate) statuses: HashMap<u64, PollStatus>,
    pub(crate) pending_count: usize,
    // Polls whose predicate is running, innermost last.
    pub(crate) running: Vec<RunningPoll>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RunningPoll {
    pub(crate) id: u64,
    pub(crate) canceled: bool,
}

impl PollerState {
    pub(crate) fn allocate_poll_id(&mut self) -> u64 {
        self.next_poll_id += 1;
        self.next_poll_id
    }

    pub(crate) fn mark_running_canceled(&mut self, poll_id: u64) -> bool {
        match self.running.iter_mut().find(|running| running.id == poll_id) {
            Some(running) => {
                running.canceled = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all_running(&mut self) {
        for running in &mut self.running {
            running.canceled = true;
        }
    }
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) timers: bool,
    pub(crate) polls: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_log: bool,
}

impl TraceState {
    pub(crate) fn from_config(config: &PageConfig) -> Self {
        Self {
            enabled: config.debug,
            timers: true,
            polls: true,
            logs: VecDeque::new(),
            log_limit: config.trace_log_limit,
            to_log: config.trace_to_log,
        }
    }

    pub(crate) fn push(&mut self, line: String) {
        if !self.enabled {
            return;
        }
        if self.to_log {
            log::debug!(target: "page_state", "{line}");
        }
        while self.logs.len() >= self.log_limit {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }
}
