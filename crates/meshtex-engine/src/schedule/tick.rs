use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Cooperative, single-threaded deferral queue.
///
/// `defer` queues a callback for the next [`run_tick`](Self::run_tick).
/// Callbacks queued while a tick runs wait for the following tick, so a
/// callback that re-defers itself can never starve the caller.
#[derive(Clone, Default)]
pub struct TickLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
    ticks: Rc<Cell<u64>>,
}

impl TickLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Runs the callbacks queued before this call. Returns how many ran.
    pub fn run_tick(&self) -> usize {
        let batch = self.queue.borrow().len();
        for _ in 0..batch {
            // The borrow ends before the task runs; tasks may defer more work.
            let task = self.queue.borrow_mut().pop_front();
            if let Some(task) = task {
                task();
            }
        }
        self.ticks.set(self.ticks.get() + 1);
        batch
    }

    /// Runs ticks until the queue is empty or `max_ticks` ran. Returns the
    /// number of ticks run.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut ran = 0;
        while ran < max_ticks && self.pending() > 0 {
            self.run_tick();
            ran += 1;
        }
        ran
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Ticks run so far, across all clones.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.ticks.get()
    }
}

impl fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickLoop")
            .field("pending", &self.pending())
            .field("ticks", &self.tick_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_fifo_order() {
        let ticks = TickLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            ticks.defer(move || log.borrow_mut().push(i));
        }
        assert_eq!(ticks.run_tick(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(ticks.pending(), 0);
    }

    #[test]
    fn work_deferred_during_tick_waits_for_next() {
        let ticks = TickLoop::new();
        let hits = Rc::new(Cell::new(0));

        let inner_ticks = ticks.clone();
        let inner_hits = hits.clone();
        ticks.defer(move || {
            inner_hits.set(inner_hits.get() + 1);
            let h = inner_hits.clone();
            inner_ticks.defer(move || h.set(h.get() + 10));
        });

        assert_eq!(ticks.run_tick(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(ticks.pending(), 1);

        assert_eq!(ticks.run_tick(), 1);
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn run_until_idle_is_bounded() {
        let ticks = TickLoop::new();
        fn forever(t: TickLoop) {
            let next = t.clone();
            t.defer(move || forever(next));
        }
        forever(ticks.clone());
        assert_eq!(ticks.run_until_idle(5), 5);
        assert_eq!(ticks.pending(), 1);
        assert_eq!(ticks.tick_count(), 5);
    }
}
