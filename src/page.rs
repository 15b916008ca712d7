use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PageConfig;
use crate::flag_set::FlagSet;
use crate::runtime_state::{
    PendingTimer, PollerState, ScheduledTask, SchedulerState, TimerJob, TraceState,
};
use crate::storage::{Storage, StorageKind};
use crate::{Error, Result};

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Queued work runs only inside `advance_time`, `advance_time_to`, `flush`
/// and the `run_*` calls.
#[derive(Debug)]
pub struct Page {
    pub(crate) page_id: u64,
    pub(crate) config: PageConfig,
    pub(crate) local_storage: Storage,
    pub(crate) session_storage: Storage,
    pub(crate) scheduler: SchedulerState,
    pub(crate) poller: PollerState,
    pub(crate) trace_state: TraceState,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self::build(PageConfig::default(), Storage::new(StorageKind::Local))
    }

    pub fn with_config(config: PageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Storage::new(StorageKind::Local)))
    }

    pub fn with_seeded_storage(
        config: PageConfig,
        local: &[(&str, &str)],
        session: &[(&str, &str)],
    ) -> Result<Self> {
        let page = Self::with_config(config)?;
        page.seed_storage(StorageKind::Local, local);
        page.seed_storage(StorageKind::Session, session);
        Ok(page)
    }

    fn build(config: PageConfig, local_storage: Storage) -> Self {
        Self {
            page_id: NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed),
            scheduler: SchedulerState::new(config.timer_step_limit),
            poller: PollerState::default(),
            trace_state: TraceState::from_config(&config),
            local_storage,
            session_storage: Storage::new(StorageKind::Session),
            config,
        }
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn local_storage(&self) -> Storage {
        self.local_storage.clone()
    }

    pub fn session_storage(&self) -> Storage {
        self.session_storage.clone()
    }

    pub fn storage(&self, kind: StorageKind) -> Storage {
        match kind {
            StorageKind::Local => self.local_storage(),
            StorageKind::Session => self.session_storage(),
        }
    }

    pub fn seed_storage(&self, kind: StorageKind, pairs: &[(&str, &str)]) {
        if pairs.is_empty() {
            return;
        }
        self.storage(kind).seed(pairs);
    }

    pub fn flags(&self, namespace: &str) -> FlagSet<Storage> {
        self.flags_in(StorageKind::Session, namespace)
    }

    pub fn flags_in(&self, kind: StorageKind, namespace: &str) -> FlagSet<Storage> {
        FlagSet::open(self.storage(kind), namespace)
    }

    pub fn default_flags(&self) -> FlagSet<Storage> {
        self.flags(&self.config.flag_namespace)
    }

    /// A new tab: local storage is shared, session storage and the clock start fresh.
    pub fn open_tab(&self) -> Page {
        let mut tab = Self::build(self.config.clone(), self.local_storage.clone());
        tab.trace_state.enabled = self.trace_state.enabled;
        tab
    }

    /// Tears down every pending timer and poll. Both storage areas survive.
    pub fn reload(&mut self) -> usize {
        let torn_down = self.clear_all_timers();
        self.trace_line(format!("[page] reload torn_down={torn_down}"));
        torn_down
    }

    pub fn log(&mut self, message: &str) {
        if !self.config.debug {
            return;
        }
        log::info!(target: "page_state", "{message}");
        self.trace_line(format!("[log] {message}"));
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace_state.enabled = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_state.logs.drain(..).collect()
    }

    pub fn set_trace_to_log(&mut self, enabled: bool) {
        self.trace_state.to_log = enabled;
    }

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.trace_state.timers = enabled;
    }

    pub fn set_trace_polls(&mut self, enabled: bool) {
        self.trace_state.polls = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config("set_trace_log_limit requires at least 1 entry".into()));
        }
        self.trace_state.log_limit = max_entries;
        while self.trace_state.logs.len() > max_entries {
            self.trace_state.logs.pop_front();
        }
        Ok(())
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Config("set_timer_step_limit requires at least 1 step".into()));
        }
        self.scheduler.timer_step_limit = max_steps;
        Ok(())
    }

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn set_timeout(
        &mut self,
        delay_ms: i64,
        callback: impl FnOnce(&mut Page) -> Result<()> + 'static,
    ) -> i64 {
        self.schedule_task(delay_ms, TimerJob::Callback(Box::new(callback)))
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        let Some(idx) = self
            .scheduler
            .task_queue
            .iter()
            .position(|task| task.id == timer_id)
        else {
            return false;
        };
        let task = self.scheduler.task_queue.remove(idx);
        self.trace_timer_line(format!("[timer] clear id={timer_id}"));
        if let TimerJob::Poll(poll_id) = task.job {
            self.drop_waiting_poll(poll_id);
        }
        true
    }

    pub fn clear_all_timers(&mut self) -> usize {
        let cleared = self.scheduler.task_queue.len();
        let tasks = std::mem::take(&mut self.scheduler.task_queue);
        for task in tasks {
            if let TimerJob::Poll(poll_id) = task.job {
                self.drop_waiting_poll(poll_id);
            }
        }
        self.poller.cancel_all_running();
        self.trace_timer_line(format!("[timer] clear_all cleared={cleared}"));
        cleared
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .scheduler
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Timer(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        let target = from.saturating_add(delta_ms);
        let ran = self.advance_clock_to(target)?;
        self.trace_timer_line(format!(
            "[timer] advance delta_ms={delta_ms} from={from} to={target} ran_due={ran}"
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.scheduler.now_ms {
            return Err(Error::Timer(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.scheduler.now_ms
            )));
        }
        let from = self.scheduler.now_ms;
        let ran = self.advance_clock_to(target_ms)?;
        self.trace_timer_line(format!(
            "[timer] advance_to from={from} to={target_ms} ran_due={ran}"
        ));
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let from = self.scheduler.now_ms;
        let ran = self.run_timer_queue(None, true)?;
        self.trace_timer_line(format!(
            "[timer] flush from={from} to={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(())
    }

    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.scheduler.next_task_index(None) else {
            self.trace_timer_line("[timer] run_next none".into());
            return Ok(false);
        };

        let task = self.scheduler.task_queue.remove(next_idx);
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_timer_task(task)?;
        Ok(true)
    }

    pub fn run_next_due_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.scheduler.next_task_index(Some(self.scheduler.now_ms)) else {
            self.trace_timer_line("[timer] run_next_due none".into());
            return Ok(false);
        };

        let task = self.scheduler.task_queue.remove(next_idx);
        self.execute_timer_task(task)?;
        Ok(true)
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] run_due now_ms={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(ran)
    }

    pub(crate) fn schedule_task(&mut self, delay_ms: i64, job: TimerJob) -> i64 {
        let delay_ms = delay_ms.max(0);
        let due_at = self.scheduler.now_ms.saturating_add(delay_ms);
        let id = self.scheduler.allocate_timer_id();
        let order = self.scheduler.allocate_task_order();
        self.trace_timer_line(format!(
            "[timer] schedule id={id} due_at={due_at} delay_ms={delay_ms} job={job:?}"
        ));
        self.scheduler.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            job,
        });
        id
    }

    // Tasks run at their own due time so work they queue is measured from
    // there, then the clock settles on the target.
    fn advance_clock_to(&mut self, target_ms: i64) -> Result<usize> {
        let ran = self.run_timer_queue(Some(target_ms), true)?;
        self.scheduler.now_ms = target_ms;
        Ok(ran)
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.scheduler.next_task_index(due_limit) {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(self.timer_step_limit_error(steps, due_limit));
            }
            let task = self.scheduler.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.scheduler.now_ms {
                self.scheduler.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn timer_step_limit_error(&self, steps: usize, due_limit: Option<i64>) -> Error {
        let due_limit_desc = due_limit
            .map(|value| value.to_string())
            .unwrap_or_else(|| "none".into());

        let next_task_desc = self
            .scheduler
            .next_task_index(due_limit)
            .and_then(|idx| self.scheduler.task_queue.get(idx))
            .map(|task| {
                format!(
                    "id={},due_at={},order={},job={:?}",
                    task.id, task.due_at, task.order, task.job
                )
            })
            .unwrap_or_else(|| "none".into());

        Error::Timer(format!(
            "timer queue exceeded max task steps (possible unbounded poll): limit={}, steps={steps}, now_ms={}, due_limit={due_limit_desc}, pending_tasks={}, next_task={next_task_desc}",
            self.scheduler.timer_step_limit,
            self.scheduler.now_ms,
            self.scheduler.task_queue.len(),
        ))
    }

    fn execute_timer_task(&mut self, task: ScheduledTask) -> Result<()> {
        self.trace_timer_line(format!(
            "[timer] run id={} due_at={} now_ms={}",
            task.id, task.due_at, self.scheduler.now_ms
        ));
        match task.job {
            TimerJob::Callback(callback) => callback(self),
            TimerJob::Poll(poll_id) => self.resume_poll(poll_id),
        }
    }

    pub(crate) fn trace_timer_line(&mut self, line: String) {
        if self.trace_state.enabled && self.trace_state.timers {
            self.trace_line(line);
        }
    }

    pub(crate) fn trace_poll_line(&mut self, line: String) {
        if self.trace_state.enabled && self.trace_state.polls {
            self.trace_line(line);
        }
    }

    fn trace_line(&mut self, line: String) {
        self.trace_state.push(line);
    }
}
