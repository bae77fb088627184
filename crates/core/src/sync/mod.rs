//! Two-phase handoff between the update and render loops.
//!
//! ```text
//!   Update (slot i)                      Render (slot i)
//!   wait render_done[i]  <-------------  raise render_done[i]
//!   write slot i                         ^
//!   raise update_done[i] ------------->  wait update_done[i]
//!                                        trigger redraw
//! ```
//!
//! Each side walks slots 0, 1, 0, 1, ... independently. `render_done` starts
//! raised so the first write of each slot proceeds immediately. Signals are
//! auto-reset: a successful wait consumes the signal.

use parking_lot::{Condvar, Mutex};

/// Number of frame slots.
pub const SLOT_COUNT: usize = 2;

#[derive(Debug, Default)]
struct SignalState {
    raised: bool,
    closed: bool,
}

/// Auto-reset binary signal that can be closed to release every waiter.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl Signal {
    pub fn new(raised: bool) -> Self {
        Self {
            state: Mutex::new(SignalState {
                raised,
                closed: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until the signal is raised and consumes it. Returns `false`
    /// if the signal was closed instead.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while !state.raised && !state.closed {
            self.condvar.wait(&mut state);
        }
        if state.closed {
            return false;
        }
        state.raised = false;
        true
    }

    pub fn raise(&self) {
        let mut state = self.state.lock();
        state.raised = true;
        self.condvar.notify_one();
    }

    /// Wakes every waiter; subsequent waits return `false` until reset.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.condvar.notify_all();
    }

    pub fn reset(&self, raised: bool) {
        let mut state = self.state.lock();
        state.raised = raised;
        state.closed = false;
    }

    pub fn is_raised(&self) -> bool {
        self.state.lock().raised
    }
}

/// The pair of signals per slot that hands slot ownership back and forth.
#[derive(Debug)]
pub struct Handoff {
    update_done: [Signal; SLOT_COUNT],
    render_done: [Signal; SLOT_COUNT],
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Handoff {
    pub fn new() -> Self {
        Self {
            update_done: [Signal::new(false), Signal::new(false)],
            render_done: [Signal::new(true), Signal::new(true)],
        }
    }

    /// Update side: waits until render has released `slot`.
    pub fn acquire_for_write(&self, slot: usize) -> bool {
        self.render_done[slot].wait()
    }

    /// Update side: hands the freshly written `slot` to render.
    pub fn publish(&self, slot: usize) {
        self.update_done[slot].raise();
    }

    /// Render side: waits until update has published `slot`.
    pub fn acquire_for_read(&self, slot: usize) -> bool {
        self.update_done[slot].wait()
    }

    /// Render side: gives `slot` back to update.
    pub fn release(&self, slot: usize) {
        self.render_done[slot].raise();
    }

    /// Releases both loops from any wait so they can observe shutdown.
    pub fn close(&self) {
        for signal in self.update_done.iter().chain(&self.render_done) {
            signal.close();
        }
    }

    /// Restores the initial state: every slot owned by update.
    pub fn reset(&self) {
        for signal in &self.update_done {
            signal.reset(false);
        }
        for signal in &self.render_done {
            signal.reset(true);
        }
    }
}
