use std::{mem, sync::Arc};

use parking_lot::Mutex;

use crate::{animation::LayerRotationState, config::Viewport, sync::SLOT_COUNT};

/// Turns the cube's current geometry, including in-flight layer angles, into
/// drawable faces for one frame. Only ever called from the update loop.
pub trait Projection<C>: Send + 'static {
    type Face: Send + Sync + 'static;

    fn project<'a>(
        &'a self,
        cube: &'a C,
        rotation: &'a LayerRotationState,
        viewport: Viewport,
    ) -> impl Iterator<Item = Self::Face> + 'a;
}

/// The host's repaint trigger, called from the render loop once per frame.
/// Implementations must not block indefinitely.
pub trait RedrawHost: Send + 'static {
    fn request_redraw(&mut self);
}

impl<F> RedrawHost for F
where
    F: FnMut() + Send + 'static,
{
    fn request_redraw(&mut self) {
        self()
    }
}

/// One frame's worth of drawable faces.
#[derive(Debug, Clone)]
pub struct Frame<F> {
    sequence: u64,
    faces: Vec<F>,
}

impl<F> Default for Frame<F> {
    fn default() -> Self {
        Self {
            sequence: 0,
            faces: Vec::new(),
        }
    }
}

impl<F> Frame<F> {
    /// Number of the update tick that produced this frame. Zero means the
    /// slot has never been written.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn faces(&self) -> &[F] {
        &self.faces
    }
}

/// A slot's current frame plus retired frames that a host snapshot was still
/// holding when the slot was last refilled.
#[derive(Debug)]
struct Slot<F> {
    frame: Arc<Frame<F>>,
    retired: Vec<Arc<Frame<F>>>,
}

impl<F> Slot<F> {
    fn new() -> Self {
        Self {
            frame: Arc::new(Frame::default()),
            retired: Vec::new(),
        }
    }

    /// Refills the slot's frame in place. If the host still holds the
    /// current frame it is retired and the first retired frame nobody shares
    /// any more takes its place, so steady state never allocates.
    fn write(&mut self, sequence: u64, faces: impl IntoIterator<Item = F>) {
        if Arc::get_mut(&mut self.frame).is_none() {
            let replacement = match self
                .retired
                .iter_mut()
                .position(|frame| Arc::get_mut(frame).is_some())
            {
                Some(index) => self.retired.swap_remove(index),
                None => Arc::new(Frame::default()),
            };
            let shared = mem::replace(&mut self.frame, replacement);
            self.retired.push(shared);
        }

        match Arc::get_mut(&mut self.frame) {
            Some(frame) => {
                frame.sequence = sequence;
                frame.faces.clear();
                frame.faces.extend(faces);
            }
            None => {
                self.frame = Arc::new(Frame {
                    sequence,
                    faces: faces.into_iter().collect(),
                })
            }
        }
    }
}

/// The two frame slots. Which loop owns a slot is decided by the handoff
/// signals alone; the per-slot mutex is never contended because the update
/// loop only touches the slot it was handed and the render loop only the
/// other one. The host never sees a slot, only the immutable snapshot the
/// render loop last presented.
#[derive(Debug)]
pub struct DoubleBuffer<F> {
    slots: [Mutex<Slot<F>>; SLOT_COUNT],
    presented: Mutex<Option<Arc<Frame<F>>>>,
    sequences: Mutex<[u64; SLOT_COUNT]>,
}

impl<F> Default for DoubleBuffer<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> DoubleBuffer<F> {
    pub fn new() -> Self {
        Self {
            slots: [Mutex::new(Slot::new()), Mutex::new(Slot::new())],
            presented: Mutex::new(None),
            sequences: Mutex::new([0; SLOT_COUNT]),
        }
    }

    /// Overwrites `slot` in place, reusing its allocation.
    pub(crate) fn fill(&self, slot: usize, sequence: u64, faces: impl IntoIterator<Item = F>) {
        self.slots[slot].lock().write(sequence, faces);
        self.sequences.lock()[slot] = sequence;
    }

    /// Publishes `slot` as the frame the host should paint from.
    pub(crate) fn present(&self, slot: usize) {
        let frame = Arc::clone(&self.slots[slot].lock().frame);
        *self.presented.lock() = Some(frame);
    }

    /// The frame most recently handed to the host, if any. Holding the
    /// snapshot never blocks the pipeline.
    pub fn presented(&self) -> Option<Arc<Frame<F>>> {
        self.presented.lock().clone()
    }

    /// Sequence numbers of both slots as of the last completed write.
    pub fn sequences(&self) -> [u64; SLOT_COUNT] {
        *self.sequences.lock()
    }
}

/// Cloneable read access to the pipeline's frames for the host.
pub struct FrameReader<F> {
    buffer: Arc<DoubleBuffer<F>>,
}

impl<F> Clone for FrameReader<F> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<F> FrameReader<F> {
    pub(crate) fn new(buffer: Arc<DoubleBuffer<F>>) -> Self {
        Self { buffer }
    }

    /// Runs `paint` against the currently presented frame. Returns `None`
    /// before the first frame has been rendered. The pipeline keeps running
    /// while `paint` does.
    pub fn with_presented<R>(&self, paint: impl FnOnce(&Frame<F>) -> R) -> Option<R> {
        self.buffer.presented().map(|frame| paint(&frame))
    }

    /// Snapshot of the presented frame for hosts that paint later.
    pub fn presented(&self) -> Option<Arc<Frame<F>>> {
        self.buffer.presented()
    }

    pub fn sequences(&self) -> [u64; SLOT_COUNT] {
        self.buffer.sequences()
    }
}

impl<F> std::fmt::Debug for FrameReader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("sequences", &self.sequences())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current<F>(buffer: &DoubleBuffer<F>, slot: usize) -> Arc<Frame<F>> {
        Arc::clone(&buffer.slots[slot].lock().frame)
    }

    #[test]
    fn fill_reuses_slot_allocation() {
        let buffer = DoubleBuffer::new();
        buffer.fill(0, 1, 0..64);
        let (address, capacity) = {
            let frame = current(&buffer, 0);
            (Arc::as_ptr(&frame), frame.faces.capacity())
        };

        buffer.fill(0, 3, 0..8);
        let frame = current(&buffer, 0);
        assert_eq!(Arc::as_ptr(&frame), address);
        assert_eq!(frame.sequence(), 3);
        assert_eq!(frame.faces(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(frame.faces.capacity(), capacity);
    }

    #[test]
    fn held_snapshot_survives_refill() {
        let buffer = Arc::new(DoubleBuffer::new());
        let reader = FrameReader::new(Arc::clone(&buffer));
        buffer.fill(0, 1, ["old"]);
        buffer.present(0);

        let held = reader.presented().unwrap();
        buffer.fill(0, 3, ["new"]);
        assert_eq!(held.sequence(), 1);
        assert_eq!(held.faces(), &["old"]);
        assert_eq!(current(&buffer, 0).faces(), &["new"]);
        assert_eq!(buffer.sequences(), [3, 0]);
    }

    #[test]
    fn retired_frames_are_recycled() {
        let buffer = DoubleBuffer::new();
        buffer.fill(1, 2, 0..4);
        buffer.present(1);
        let first = Arc::as_ptr(&current(&buffer, 1));

        // The presented snapshot pins the first frame, so the slot moves on.
        buffer.fill(1, 4, 0..4);
        let second = Arc::as_ptr(&current(&buffer, 1));
        assert_ne!(first, second);

        buffer.present(1);
        buffer.fill(1, 6, 0..4);
        assert_eq!(Arc::as_ptr(&current(&buffer, 1)), first);
        assert_eq!(buffer.slots[1].lock().retired.len(), 1);
    }

    #[test]
    fn reading_inside_paint_does_not_block() {
        let buffer = Arc::new(DoubleBuffer::new());
        let reader = FrameReader::new(Arc::clone(&buffer));
        buffer.fill(0, 1, [1u8]);
        buffer.present(0);

        let seen = reader.with_presented(|frame| {
            buffer.fill(1, 2, [2]);
            buffer.fill(0, 3, [3]);
            (frame.sequence(), reader.sequences(), reader.presented().map(|f| f.sequence()))
        });
        assert_eq!(seen, Some((1, [3, 2], Some(1))));
    }

    #[test]
    fn nothing_presented_initially() {
        let buffer: DoubleBuffer<u8> = DoubleBuffer::new();
        assert!(buffer.presented().is_none());
        assert_eq!(buffer.sequences(), [0, 0]);
    }

    #[test]
    fn reader_sees_presented_slot() {
        let buffer = Arc::new(DoubleBuffer::new());
        let reader = FrameReader::new(Arc::clone(&buffer));
        assert_eq!(reader.with_presented(|frame| frame.sequence()), None);

        buffer.fill(0, 1, ["a"]);
        buffer.fill(1, 2, ["b", "c"]);
        buffer.present(1);
        assert_eq!(reader.with_presented(|frame| frame.faces().len()), Some(2));
        assert_eq!(reader.sequences(), [1, 2]);
    }

    #[test]
    fn closures_are_redraw_hosts() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let mut host: Box<dyn RedrawHost> = {
            let count = Arc::clone(&count);
            Box::new(move || {
                count.fetch_add(1, Ordering::Relaxed);
            })
        };
        host.request_redraw();
        host.request_redraw();
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }
}
