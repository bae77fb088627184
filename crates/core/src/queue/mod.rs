use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use crate::{animation::RotationRequest, cube::FaceSelection};

/// Pending rotation requests shared between producers (input handling,
/// solvers, replays) and the update loop.
///
/// The handle is cheap to clone. Interactive input is disabled while any
/// request is queued and re-enabled when the update loop completes the last
/// one.
#[derive(Clone, Default)]
pub struct RotationQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    pending: Mutex<VecDeque<Arc<RotationRequest>>>,
    input_enabled: AtomicBool,
    selection: Mutex<Option<FaceSelection>>,
}

impl Default for QueueShared {
    fn default() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            input_enabled: AtomicBool::new(true),
            selection: Mutex::new(None),
        }
    }
}

impl RotationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request. The request cannot be modified afterwards.
    pub fn push(&self, request: RotationRequest) {
        let mut pending = self.shared.pending.lock();
        pending.push_back(Arc::new(request));
        self.shared.input_enabled.store(false, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.pending.lock().is_empty()
    }

    /// Whether interactive moves may be started by the host.
    pub fn input_enabled(&self) -> bool {
        self.shared.input_enabled.load(Ordering::Acquire)
    }

    pub fn select(&self, selection: FaceSelection) {
        *self.shared.selection.lock() = Some(selection);
    }

    pub fn selection(&self) -> Option<FaceSelection> {
        *self.shared.selection.lock()
    }

    pub(crate) fn clear_selection(&self) {
        *self.shared.selection.lock() = None;
    }

    /// Head of the queue, without removing it.
    pub(crate) fn front(&self) -> Option<Arc<RotationRequest>> {
        self.shared.pending.lock().front().cloned()
    }

    /// Removes the finished head request and returns how many remain. Input
    /// is re-enabled when nothing is left.
    pub(crate) fn complete_front(&self) -> usize {
        let mut pending = self.shared.pending.lock();
        pending.pop_front();
        if pending.is_empty() {
            self.shared.input_enabled.store(true, Ordering::Release);
        }
        pending.len()
    }
}

impl std::fmt::Debug for RotationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationQueue")
            .field("pending", &self.len())
            .field("input_enabled", &self.input_enabled())
            .finish()
    }
}
