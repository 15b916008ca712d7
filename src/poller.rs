use crate::page::Page;
use crate::runtime_state::{PollTask, RunningPoll, TimerJob};
use crate::Result;

/// Only meaningful on the page that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollHandle {
    page_id: u64,
    id: u64,
}

impl PollHandle {
    pub fn id(self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Done,
    Cancelled,
    Exhausted,
    Failed,
}

/// The default polls forever at the page's default interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOptions {
    pub interval_ms: i64,
    pub max_attempts: Option<u32>,
}

impl PollOptions {
    pub fn every(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            max_attempts: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Page {
    pub fn poll(
        &mut self,
        predicate: impl FnMut(&mut Page) -> Result<bool> + 'static,
        on_done: impl FnOnce(&mut Page) -> Result<()> + 'static,
        interval_ms: i64,
    ) -> Result<PollHandle> {
        self.poll_with(predicate, on_done, PollOptions::every(interval_ms))
    }

    pub fn poll_default(
        &mut self,
        predicate: impl FnMut(&mut Page) -> Result<bool> + 'static,
        on_done: impl FnOnce(&mut Page) -> Result<()> + 'static,
    ) -> Result<PollHandle> {
        self.poll_with(predicate, on_done, PollOptions::default())
    }

    pub fn poll_with(
        &mut self,
        predicate: impl FnMut(&mut Page) -> Result<bool> + 'static,
        on_done: impl FnOnce(&mut Page) -> Result<()> + 'static,
        options: PollOptions,
    ) -> Result<PollHandle> {
        let interval_ms = if options.interval_ms > 0 {
            options.interval_ms
        } else {
            self.config.default_poll_interval_ms
        };
        let poll_id = self.poller.allocate_poll_id();
        self.poller.statuses.insert(poll_id, PollStatus::Pending);
        self.poller.pending_count += 1;
        self.trace_poll_line(format!(
            "[poll] start id={poll_id} interval_ms={interval_ms} max_attempts={}",
            options
                .max_attempts
                .map(|value| value.to_string())
                .unwrap_or_else(|| "none".into())
        ));

        let task = PollTask {
            predicate: Box::new(predicate),
            on_done: Some(Box::new(on_done)),
            interval_ms,
            attempts: 0,
            max_attempts: options.max_attempts,
            timer_id: None,
        };
        self.evaluate_poll(poll_id, task)?;
        Ok(PollHandle {
            page_id: self.page_id,
            id: poll_id,
        })
    }

    /// Returns false once the poll has finished or when `handle` came from
    /// another page.
    pub fn cancel_poll(&mut self, handle: PollHandle) -> bool {
        if handle.page_id != self.page_id {
            return false;
        }
        let poll_id = handle.id;
        if self.poller.mark_running_canceled(poll_id) {
            return true;
        }
        let Some(task) = self.poller.waiting.remove(&poll_id) else {
            return false;
        };
        if let Some(timer_id) = task.timer_id {
            self.scheduler.task_queue.retain(|queued| queued.id != timer_id);
        }
        self.finish_poll(poll_id, PollStatus::Cancelled, task.attempts);
        true
    }

    pub fn poll_status(&self, handle: PollHandle) -> Option<PollStatus> {
        if handle.page_id != self.page_id {
            return None;
        }
        self.poller.statuses.get(&handle.id).copied()
    }

    pub fn active_poll_count(&self) -> usize {
        self.poller.pending_count
    }

    pub(crate) fn resume_poll(&mut self, poll_id: u64) -> Result<()> {
        let Some(mut task) = self.poller.waiting.remove(&poll_id) else {
            return Ok(());
        };
        task.timer_id = None;
        self.evaluate_poll(poll_id, task)
    }

    // Called when the poll's timer is removed from the queue by someone else.
    pub(crate) fn drop_waiting_poll(&mut self, poll_id: u64) {
        if let Some(task) = self.poller.waiting.remove(&poll_id) {
            self.finish_poll(poll_id, PollStatus::Cancelled, task.attempts);
        }
    }

    fn evaluate_poll(&mut self, poll_id: u64, mut task: PollTask) -> Result<()> {
        task.attempts = task.attempts.saturating_add(1);
        self.poller.running.push(RunningPoll {
            id: poll_id,
            canceled: false,
        });
        let outcome = (task.predicate)(self);
        let canceled = self
            .poller
            .running
            .pop()
            .is_some_and(|running| running.canceled);

        let ready = match outcome {
            Ok(ready) => ready,
            Err(err) => {
                self.finish_poll(poll_id, PollStatus::Failed, task.attempts);
                return Err(err);
            }
        };
        if canceled {
            self.finish_poll(poll_id, PollStatus::Cancelled, task.attempts);
            return Ok(());
        }

        if ready {
            self.finish_poll(poll_id, PollStatus::Done, task.attempts);
            if let Some(on_done) = task.on_done.take() {
                on_done(self)?;
            }
            return Ok(());
        }

        if task
            .max_attempts
            .is_some_and(|max_attempts| task.attempts >= max_attempts)
        {
            self.finish_poll(poll_id, PollStatus::Exhausted, task.attempts);
            return Ok(());
        }

        let timer_id = self.schedule_task(task.interval_ms, TimerJob::Poll(poll_id));
        self.trace_poll_line(format!(
            "[poll] retry id={poll_id} attempts={} timer_id={timer_id}",
            task.attempts
        ));
        task.timer_id = Some(timer_id);
        self.poller.waiting.insert(poll_id, task);
        Ok(())
    }

    fn finish_poll(&mut self, poll_id: u64, status: PollStatus, attempts: u32) {
        if self.poller.statuses.insert(poll_id, status) == Some(PollStatus::Pending) {
            self.poller.pending_count = self.poller.pending_count.saturating_sub(1);
        }
        let label = match status {
            PollStatus::Pending => "pending",
            PollStatus::Done => "done",
            PollStatus::Cancelled => "cancelled",
            PollStatus::Exhausted => "exhausted",
            PollStatus::Failed => "failed",
        };
        self.trace_poll_line(format!("[poll] {label} id={poll_id} attempts={attempts}"));
    }
}
