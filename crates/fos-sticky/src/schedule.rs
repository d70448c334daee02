//! Pass scheduling
//!
//! Scroll events go through a debounce and then a leading+trailing throttle.
//! One-shot timers cover the delayed work (ready-state passes, restoring the
//! stylesheet, settings refreshes). The scheduler only keeps deadlines; the
//! caller drives it with [`PassScheduler::poll`].

use crate::config::SchedulerTiming;
use std::time::{Duration, Instant};

/// Where a scroll event came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollSource {
    /// The page scroller
    Document,
    /// An inner scroll container
    Element {
        client_height: f64,
        scroll_top: f64,
        scroll_height: f64,
    },
}

/// Work that came due
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Throttled scroll pass for the latest event
    ScrollPass(ScrollSource),
    /// Forced exploration pass
    ExplorePass,
    /// Forced exploration pass once the viewport stops changing
    ResizePass,
    /// End of a temporary show
    RestoreStylesheet,
    /// Ask the service for settings again
    RefreshSettings(&'static str),
}

#[derive(Debug, Clone)]
pub struct PassScheduler {
    debounce: Duration,
    throttle: Duration,
    /// Pending debounced call and the event it carries
    debounced: Option<(Instant, ScrollSource)>,
    last_invoke: Option<Instant>,
    trailing: Option<(Instant, ScrollSource)>,
    timers: Vec<(Instant, Task)>,
}

impl PassScheduler {
    pub fn new(timing: &SchedulerTiming) -> Self {
        Self {
            debounce: timing.debounce(),
            throttle: timing.throttle(),
            debounced: None,
            last_invoke: None,
            trailing: None,
            timers: Vec::new(),
        }
    }

    /// Record a scroll event; restarts the debounce window
    pub fn on_scroll(&mut self, now: Instant, source: ScrollSource) {
        self.debounced = Some((now + self.debounce, source));
    }

    /// Run `task` once at `at`
    pub fn schedule(&mut self, at: Instant, task: Task) {
        self.timers.push((at, task));
    }

    /// Like [`Self::schedule`], but a pending run of the same task is dropped
    pub fn reschedule(&mut self, at: Instant, task: Task) {
        self.timers.retain(|(_, pending)| *pending != task);
        self.timers.push((at, task));
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounced
            .map(|(at, _)| at)
            .into_iter()
            .chain(self.trailing.map(|(at, _)| at))
            .chain(self.timers.iter().map(|(at, _)| *at))
            .min()
    }

    /// Drop pending passes and page timers; settings refreshes stay
    pub fn cancel_passes(&mut self) {
        self.debounced = None;
        self.trailing = None;
        self.timers.retain(|(_, task)| matches!(task, Task::RefreshSettings(_)));
    }

    /// Tasks due at `now`, in deadline order
    pub fn poll(&mut self, now: Instant) -> Vec<Task> {
        let mut due = Vec::new();
        while let Some(at) = self.next_deadline().filter(|&at| at <= now) {
            if let Some((_, source)) = self.debounced.take_if(|(t, _)| *t == at) {
                self.throttled_call(at, source, &mut due);
            } else if let Some((_, source)) = self.trailing.take_if(|(t, _)| *t == at) {
                self.last_invoke = Some(at);
                due.push(Task::ScrollPass(source));
            } else if let Some(pos) = self.timers.iter().position(|(t, _)| *t == at) {
                due.push(self.timers.remove(pos).1);
            }
        }
        due
    }

    fn throttled_call(&mut self, at: Instant, source: ScrollSource, due: &mut Vec<Task>) {
        match self.last_invoke {
            Some(last) if at < last + self.throttle => {
                self.trailing = Some((last + self.throttle, source));
            }
            _ => {
                self.last_invoke = Some(at);
                due.push(Task::ScrollPass(source));
            }
        }
    }
}
