use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Length of the rolling window the FPS estimate covers.
const WINDOW_MS: f64 = 1000.0;

/// Remaining wait below which pacing switches from sleeping to spinning.
const SPIN_THRESHOLD: Duration = Duration::from_micros(1000);
const SPIN_TAIL: Duration = Duration::from_micros(500);

/// Durations of the most recent frames, used for the rolling FPS estimate.
#[derive(Debug, Clone, Default)]
pub struct FrameTimeHistory {
    frame_times_ms: VecDeque<f64>,
    fps: f64,
}

impl FrameTimeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the duration of one frame and returns the updated estimate.
    ///
    /// Frames that fit completely into the last second are counted whole.
    /// The oldest retained frame straddles the window edge and contributes
    /// the fraction of it that still falls inside; anything older is dropped.
    pub fn record(&mut self, elapsed_ms: f64) -> f64 {
        self.frame_times_ms.push_back(elapsed_ms.max(0.0));

        let mut counted = 0usize;
        let mut window = 0.0;
        for frame in self.frame_times_ms.iter().rev() {
            if window + frame > WINDOW_MS {
                break;
            }
            window += frame;
            counted += 1;
        }

        let outside = self.frame_times_ms.len() - counted;
        if outside > 1 {
            self.frame_times_ms.drain(..outside - 1);
        }

        let partial = match self.frame_times_ms.front() {
            Some(&oldest) if oldest > 0.0 => (WINDOW_MS - window) / oldest,
            _ => 0.0,
        };
        self.fps = counted as f64 + partial;
        self.fps
    }

    /// Current estimate; zero until the first frame has been recorded.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn len(&self) -> usize {
        self.frame_times_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_times_ms.is_empty()
    }

    pub fn clear(&mut self) {
        self.frame_times_ms.clear();
        self.fps = 0.0;
    }
}

/// Minimum time one frame has to take to stay at or below `max_fps`.
pub fn min_frame_interval(max_fps: f64) -> Duration {
    if !max_fps.is_finite() || max_fps <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((1_000_000_000.0 / max_fps).round() as u64)
}

/// Frame pacing for the render loop: a grace window handed to the host after
/// each redraw, then a wait until the frame interval is used up.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    grace: Duration,
}

impl FramePacer {
    pub fn new(grace_window_ms: f64) -> Self {
        let grace = if grace_window_ms.is_finite() && grace_window_ms > 0.0 {
            Duration::from_nanos((grace_window_ms * 1_000_000.0).round() as u64)
        } else {
            Duration::ZERO
        };
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Blocks until the grace window has passed and at least the minimum
    /// frame interval has elapsed since `frame_start`.
    pub fn pace(&self, frame_start: Instant, max_fps: f64) {
        wait_until(Instant::now() + self.grace);
        wait_until(frame_start + min_frame_interval(max_fps));
    }
}

/// Sleeps for the bulk of the wait, then spins for sub-millisecond accuracy.
fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if deadline <= now {
        return;
    }

    let remaining = deadline - now;
    if remaining > SPIN_THRESHOLD {
        thread::sleep(remaining - SPIN_TAIL);
    }

    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// `f64` stored in an [`AtomicU64`] as its bit pattern.
#[derive(Debug, Default)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_reports_zero() {
        let history = FrameTimeHistory::new();
        assert_eq!(history.fps(), 0.0);
        assert!(history.is_empty());
    }

    #[test]
    fn steady_frames_give_exact_rate() {
        let mut history = FrameTimeHistory::new();
        let mut fps = 0.0;
        for _ in 0..10 {
            fps = history.record(100.0);
        }
        assert!((fps - 10.0).abs() < 1e-9, "fps was {fps}");

        for _ in 0..25 {
            fps = history.record(100.0);
        }
        assert!((fps - 10.0).abs() < 1e-9, "fps was {fps}");
        assert_eq!(history.len(), 11);
    }

    #[test]
    fn single_frame_extrapolates() {
        let mut history = FrameTimeHistory::new();
        assert!((history.record(16.0) - 62.5).abs() < 1e-9);
    }

    #[test]
    fn slow_frames_count_fractionally() {
        let mut history = FrameTimeHistory::new();
        assert!((history.record(2000.0) - 0.5).abs() < 1e-9);
        assert!((history.record(2000.0) - 0.5).abs() < 1e-9);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn partial_oldest_frame_is_weighted() {
        let mut history = FrameTimeHistory::new();
        history.record(400.0);
        history.record(300.0);
        // 300 + 300 + 400 fill the window exactly.
        let fps = history.record(300.0);
        assert!((fps - 3.0).abs() < 1e-9, "fps was {fps}");
        // 300 + 300 + 300 fit, the 400ms frame is retained as the partial one.
        let fps = history.record(300.0);
        assert!((fps - 3.25).abs() < 1e-9, "fps was {fps}");
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn zero_length_frames_do_not_divide_by_zero() {
        let mut history = FrameTimeHistory::new();
        let fps = history.record(0.0);
        assert!(fps.is_finite());
        assert_eq!(fps, 1.0);
    }

    #[test]
    fn clear_resets_estimate() {
        let mut history = FrameTimeHistory::new();
        history.record(50.0);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.fps(), 0.0);
    }

    #[test]
    fn frame_interval_from_fps() {
        assert_eq!(min_frame_interval(100.0), Duration::from_millis(10));
        assert_eq!(min_frame_interval(0.0), Duration::ZERO);
        assert_eq!(min_frame_interval(f64::INFINITY), Duration::ZERO);
    }

    #[test]
    fn pacer_waits_for_frame_interval() {
        let pacer = FramePacer::new(0.0);
        let start = Instant::now();
        pacer.pace(start, 200.0);
        assert!(start.elapsed() >= Duration::from_millis(5));

        let pacer = FramePacer::new(3.0);
        assert_eq!(pacer.grace(), Duration::from_millis(3));
        let start = Instant::now();
        pacer.pace(start, f64::INFINITY);
        assert!(start.elapsed() >= Duration::from_millis(3));
    }

    #[test]
    fn atomic_f64_round_trips() {
        let value = AtomicF64::new(0.0);
        value.store(59.75);
        assert_eq!(value.load(), 59.75);
    }
}
