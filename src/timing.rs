use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo_timers::callback::Timeout;

/// Runs the most recent scheduled callback once `delay_ms` passes without a
/// newer call.
#[derive(Clone)]
pub struct Debouncer {
    delay_ms: u32,
    pending: Rc<RefCell<Option<Timeout>>>,
}

impl Debouncer {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn call<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        // Replacing the handle drops (and clears) the previous timer.
        let timeout = Timeout::new(self.delay_ms, callback);
        *self.pending.borrow_mut() = Some(timeout);
    }

    pub fn cancel(&self) {
        self.pending.borrow_mut().take();
    }
}

/// Coalesces bursts of requests into one unit of work per animation frame.
#[derive(Clone, Default)]
pub struct FrameGate {
    ticking: Rc<Cell<bool>>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the caller should schedule a frame.
    pub fn try_acquire(&self) -> bool {
        !self.ticking.replace(true)
    }

    pub fn release(&self) {
        self.ticking.set(false);
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking.get()
    }
}
