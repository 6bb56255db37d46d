use crate::telemetry::LogManager;
use std::fmt::Debug;
use std::time::Duration;

/// Timer the driver must arm; only the most recent token is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTimer {
    pub token: u64,
    pub delay: Duration,
}

/// One recompute request for a committed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecomputeTicket<T> {
    pub epoch: u64,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution<T> {
    /// False when the ticket predates the last `cancel`; its result must be discarded.
    pub apply: bool,
    /// Queued follow-up carrying the latest committed value.
    pub next: Option<RecomputeTicket<T>>,
}

/// Separates a fast-moving control from the expensive recompute it drives.
///
/// `slider` follows every input immediately; `committed` only moves once a
/// settle timer elapses untouched. Recomputes never overlap: a commit while
/// one is in flight is queued and coalesced into a single follow-up.
pub struct DebouncePipeline<T> {
    slider: T,
    committed: Option<T>,
    delay: Duration,
    timer_token: u64,
    armed: bool,
    epoch: u64,
    in_flight: bool,
    queued: bool,
    logger: LogManager,
}

impl<T: Copy + PartialEq + Debug> DebouncePipeline<T> {
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            slider: initial,
            committed: None,
            delay,
            timer_token: 0,
            armed: false,
            epoch: 0,
            in_flight: false,
            queued: false,
            logger: LogManager::new("debounce"),
        }
    }

    pub fn slider_value(&self) -> T {
        self.slider
    }

    pub fn committed_value(&self) -> Option<T> {
        self.committed
    }

    pub fn is_pending(&self) -> bool {
        self.armed
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Records the input and (re)arms the settle timer.
    pub fn on_slider_change(&mut self, value: T) -> SettleTimer {
        self.slider = value;
        self.timer_token += 1;
        self.armed = true;
        SettleTimer {
            token: self.timer_token,
            delay: self.delay,
        }
    }

    pub fn on_timer(&mut self, token: u64) -> Option<RecomputeTicket<T>> {
        if !self.armed || token != self.timer_token {
            return None;
        }
        self.armed = false;
        self.committed = Some(self.slider);
        self.logger
            .trace(&format!("settled on {:?}", self.slider));
        self.request()
    }

    /// Commits `value` without waiting, cancelling any pending timer.
    pub fn commit_now(&mut self, value: T) -> Option<RecomputeTicket<T>> {
        self.slider = value;
        self.timer_token += 1;
        self.armed = false;
        self.committed = Some(value);
        self.request()
    }

    fn request(&mut self) -> Option<RecomputeTicket<T>> {
        let value = self.committed?;
        if self.in_flight {
            self.queued = true;
            return None;
        }
        self.in_flight = true;
        Some(RecomputeTicket {
            epoch: self.epoch,
            value,
        })
    }

    /// Marks `ticket` as resolved. An identical value that just succeeded is
    /// not recomputed again.
    pub fn resolve(&mut self, ticket: RecomputeTicket<T>, succeeded: bool) -> Resolution<T> {
        self.in_flight = false;
        let apply = ticket.epoch == self.epoch;
        let mut next = None;
        if self.queued {
            self.queued = false;
            let current = self.committed == Some(ticket.value);
            if !(apply && succeeded && current) {
                next = self.request();
            }
        }
        Resolution { apply, next }
    }

    /// Drops the pending timer and any queued commit; the result of an
    /// in-flight recompute will come back with `apply == false`.
    pub fn cancel(&mut self) {
        self.epoch += 1;
        self.timer_token += 1;
        self.armed = false;
        self.queued = false;
        self.committed = None;
    }
}
