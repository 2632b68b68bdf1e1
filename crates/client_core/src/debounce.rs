use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time::Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Coalesces a burst of values into the last one.
///
/// Each [`Debouncer::push`] cancels the pending delivery and schedules a new
/// one, so a value reaches the sink only after `delay` passes with no newer
/// input.
pub struct Debouncer<T> {
    delay: Duration,
    sink: UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, sink: UnboundedSender<T>) -> Self {
        Self {
            delay,
            sink,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn push(&mut self, value: T) {
        self.cancel();
        let sink = self.sink.clone();
        let deadline = Instant::now() + self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = sink.send(value);
        }));
    }

    /// Drops the pending value, if any. Returns whether one was dropped.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
