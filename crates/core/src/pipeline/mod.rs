//! The two-thread update/render pipeline.
//!
//! The update loop advances queued rotation animations and projects the cube
//! into a frame slot; the render loop triggers a host redraw for each
//! published slot, paces itself to the configured FPS cap and feeds its FPS
//! estimate back to the update loop, which uses it to size animation steps.

use std::{
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use parking_lot::Mutex;

use crate::{
    animation::{Animator, RotationRequest},
    config::{PipelineConfig, Screen, Viewport},
    cube::{Algorithm, CubeModel},
    queue::RotationQueue,
    render::{DoubleBuffer, FrameReader, Projection, RedrawHost},
    sync::Handoff,
    timing::{AtomicF64, FramePacer, FrameTimeHistory},
    CubeAnimError, Result,
};

/// State both loops and the controller can see.
struct Shared<F> {
    running: AtomicBool,
    fps: AtomicF64,
    max_fps: AtomicF64,
    viewport: Mutex<Viewport>,
    buffer: Arc<DoubleBuffer<F>>,
    handoff: Handoff,
}

/// Everything the update thread owns while it runs.
struct UpdateWorker<C, P> {
    animator: Animator,
    projection: P,
    cube: Arc<Mutex<C>>,
    queue: RotationQueue,
    sequence: u64,
    /// Slot the next frame is written to.
    slot: usize,
}

impl<C, P> UpdateWorker<C, P>
where
    C: CubeModel,
    P: Projection<C>,
{
    fn run(mut self, shared: Arc<Shared<P::Face>>) -> Self {
        while shared.running.load(Ordering::Acquire) {
            if !shared.handoff.acquire_for_write(self.slot) {
                break;
            }

            let fps = shared.fps.load();
            let viewport = *shared.viewport.lock();
            {
                let mut cube = self.cube.lock();
                self.animator.tick(&self.queue, fps, &mut *cube);
                self.sequence += 1;
                let faces = self
                    .projection
                    .project(&*cube, self.animator.rotation(), viewport);
                shared.buffer.fill(self.slot, self.sequence, faces);
            }

            shared.handoff.publish(self.slot);
            self.slot ^= 1;
        }

        tracing::debug!(frames = self.sequence, "update loop exited");
        self
    }
}

/// Everything the render thread owns while it runs.
struct RenderWorker {
    history: FrameTimeHistory,
    pacer: FramePacer,
    host: Box<dyn RedrawHost>,
}

impl RenderWorker {
    fn run<F>(mut self, shared: Arc<Shared<F>>, mut slot: usize) -> Self {
        let mut frames = 0u64;
        while shared.running.load(Ordering::Acquire) {
            let frame_start = Instant::now();
            if !shared.handoff.acquire_for_read(slot) {
                break;
            }

            shared.buffer.present(slot);
            self.host.request_redraw();
            shared.handoff.release(slot);
            slot ^= 1;
            frames += 1;

            self.pacer.pace(frame_start, shared.max_fps.load());
            let elapsed_ms = frame_start.elapsed().as_secs_f64() * 1000.0;
            shared.fps.store(self.history.record(elapsed_ms));
        }

        tracing::debug!(frames, fps = self.history.fps(), "render loop exited");
        self
    }
}

enum Lifecycle<C, P> {
    Idle {
        update: UpdateWorker<C, P>,
        render: RenderWorker,
    },
    Running {
        update: JoinHandle<UpdateWorker<C, P>>,
        render: JoinHandle<RenderWorker>,
    },
    Aborted,
    /// A thread failed to spawn or panicked and took its worker with it.
    Failed {
        reason: String,
    },
}

/// Animates a cube on two dedicated threads and hands finished frames to a
/// host through a double buffer.
///
/// Rotation requests can be queued from any thread through
/// [`RenderPipeline::queue`]. The cube model is mutated only by the update
/// thread, and only when a request has finished animating.
pub struct RenderPipeline<C, P>
where
    C: CubeModel,
    P: Projection<C>,
{
    shared: Arc<Shared<P::Face>>,
    cube: Arc<Mutex<C>>,
    queue: RotationQueue,
    lifecycle: Lifecycle<C, P>,
}

impl<C, P> RenderPipeline<C, P>
where
    C: CubeModel,
    P: Projection<C>,
{
    /// Creates a stopped pipeline. Both frame slots are allocated here and
    /// reused for the lifetime of the pipeline.
    pub fn new(cube: C, projection: P, host: impl RedrawHost, config: &PipelineConfig) -> Self {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            fps: AtomicF64::new(0.0),
            max_fps: AtomicF64::new(config.max_fps),
            viewport: Mutex::new(config.viewport),
            buffer: Arc::new(DoubleBuffer::new()),
            handoff: Handoff::new(),
        });
        let cube = Arc::new(Mutex::new(cube));
        let queue = RotationQueue::new();

        let update = UpdateWorker {
            animator: Animator::new(),
            projection,
            cube: Arc::clone(&cube),
            queue: queue.clone(),
            sequence: 0,
            slot: 0,
        };
        let render = RenderWorker {
            history: FrameTimeHistory::new(),
            pacer: FramePacer::new(config.grace_window_ms),
            host: Box::new(host),
        };

        Self {
            shared,
            cube,
            queue,
            lifecycle: Lifecycle::Idle { update, render },
        }
    }

    /// Spawns the update and render threads. Does nothing if they are
    /// already running; fails once the pipeline has been aborted or has lost
    /// a worker.
    pub fn start(&mut self) -> Result<()> {
        let placeholder = Lifecycle::Failed {
            reason: "start was interrupted".into(),
        };
        let (update, render) = match mem::replace(&mut self.lifecycle, placeholder) {
            Lifecycle::Idle { update, render } => (update, render),
            running @ Lifecycle::Running { .. } => {
                self.lifecycle = running;
                return Ok(());
            }
            Lifecycle::Aborted => {
                self.lifecycle = Lifecycle::Aborted;
                tracing::warn!("refusing to start an aborted render pipeline");
                return Err(CubeAnimError::Aborted);
            }
            Lifecycle::Failed { reason } => {
                tracing::warn!(%reason, "refusing to start a failed render pipeline");
                self.lifecycle = Lifecycle::Failed {
                    reason: reason.clone(),
                };
                return Err(CubeAnimError::WorkerLost(reason));
            }
        };

        self.shared.handoff.reset();
        self.shared.running.store(true, Ordering::Release);
        let start_slot = update.slot;

        let update_shared = Arc::clone(&self.shared);
        let update = match thread::Builder::new()
            .name("cube-update".into())
            .spawn(move || update.run(update_shared))
        {
            Ok(handle) => handle,
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(self.fail(format!("could not spawn the update thread: {err}")));
            }
        };

        let render_shared = Arc::clone(&self.shared);
        let render = match thread::Builder::new()
            .name("cube-render".into())
            .spawn(move || render.run(render_shared, start_slot))
        {
            Ok(handle) => handle,
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.handoff.close();
                let _ = update.join();
                return Err(self.fail(format!("could not spawn the render thread: {err}")));
            }
        };

        tracing::debug!(slot = start_slot, "render pipeline started");
        self.lifecycle = Lifecycle::Running { update, render };
        Ok(())
    }

    /// Asks both loops to finish their current handoff leg, waits for them
    /// and resets the FPS estimate. Does nothing if the pipeline is not
    /// running.
    pub fn stop(&mut self) {
        let (update, render) = match mem::replace(&mut self.lifecycle, Lifecycle::Aborted) {
            Lifecycle::Running { update, render } => (update, render),
            other => {
                self.lifecycle = other;
                return;
            }
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.handoff.close();

        match (update.join(), render.join()) {
            (Ok(update), Ok(mut render)) => {
                render.history.clear();
                self.lifecycle = Lifecycle::Idle { update, render };
            }
            (update, _) => {
                let thread = if update.is_err() { "update" } else { "render" };
                self.fail(format!("the {thread} thread panicked"));
            }
        }

        self.shared.fps.store(0.0);
        self.shared.handoff.reset();
        tracing::debug!("render pipeline stopped");
    }

    fn fail(&mut self, reason: String) -> CubeAnimError {
        tracing::error!(%reason, "render pipeline lost a worker");
        self.lifecycle = Lifecycle::Failed {
            reason: reason.clone(),
        };
        CubeAnimError::WorkerLost(reason)
    }

    /// Stops both loops without waiting for them. The pipeline cannot be
    /// started again afterwards.
    pub fn abort(&mut self) {
        if !self.is_running() {
            return;
        }

        self.shared.running.store(false, Ordering::Release);
        self.shared.handoff.close();
        // Dropping the join handles detaches both threads.
        self.lifecycle = Lifecycle::Aborted;
        tracing::warn!("render pipeline aborted");
    }

    /// Whether the update and render threads are alive.
    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// Whether [`RenderPipeline::abort`] has been called on a running
    /// pipeline. An aborted pipeline never runs again.
    pub fn is_aborted(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Aborted)
    }

    /// Why the pipeline can no longer start, if a thread failed to spawn or
    /// panicked.
    pub fn failure(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Failed { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Handle for producers that queue rotations from other threads.
    pub fn queue(&self) -> RotationQueue {
        self.queue.clone()
    }

    /// Queues one rotation request behind any pending ones and disables
    /// interactive input until the queue drains.
    pub fn enqueue(&self, request: RotationRequest) {
        self.queue.push(request);
    }

    /// Queues every move of `algorithm` as its own request, in order.
    pub fn enqueue_algorithm(&self, algorithm: &Algorithm, duration_ms: u64) {
        for mv in &algorithm.moves {
            self.queue.push(RotationRequest::single(*mv, duration_ms));
        }
    }

    /// Whether the host may accept interactive moves right now.
    pub fn input_enabled(&self) -> bool {
        self.queue.input_enabled()
    }

    /// Read access to the frame the render loop last presented, for the
    /// host's paint handler.
    pub fn frames(&self) -> FrameReader<P::Face> {
        FrameReader::new(Arc::clone(&self.shared.buffer))
    }

    /// Reads the cube's true state.
    pub fn with_cube<R>(&self, read: impl FnOnce(&C) -> R) -> R {
        read(&self.cube.lock())
    }

    /// Rolling FPS estimate of the render loop; zero while stopped.
    pub fn fps(&self) -> f64 {
        self.shared.fps.load()
    }

    /// Frame rate cap the render loop paces itself to.
    pub fn max_fps(&self) -> f64 {
        self.shared.max_fps.load()
    }

    /// Changes the frame rate cap; the render loop picks it up on its next
    /// frame. A cap of zero or less disables pacing.
    pub fn set_max_fps(&self, max_fps: f64) {
        self.shared.max_fps.store(max_fps);
    }

    /// Screen geometry and zoom handed to the projection.
    pub fn viewport(&self) -> Viewport {
        *self.shared.viewport.lock()
    }

    /// Replaces the viewport used from the next update tick on.
    pub fn set_viewport(&self, viewport: Viewport) {
        *self.shared.viewport.lock() = viewport;
    }

    /// Fits the drawing area to `screen`, recomputing the zoom factor.
    pub fn set_drawing_area(&self, screen: Screen) {
        self.set_viewport(Viewport::fit(screen));
    }

    /// Changes only the zoom factor, keeping the drawing area.
    pub fn set_zoom(&self, zoom: f64) {
        self.shared.viewport.lock().zoom = zoom;
    }
}

impl<C, P> Drop for RenderPipeline<C, P>
where
    C: CubeModel,
    P: Projection<C>,
{
    fn drop(&mut self) {
        self.stop();
    }
}

impl<C, P> std::fmt::Debug for RenderPipeline<C, P>
where
    C: CubeModel,
    P: Projection<C>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("running", &self.is_running())
            .field("aborted", &self.is_aborted())
            .field("failure", &self.failure())
            .field("fps", &self.fps())
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicU64,
        time::Duration,
    };

    use super::*;
    use crate::{
        animation::LayerRotationState,
        cube::{Layer, LayerMove},
    };

    #[derive(Default)]
    struct RecordingCube {
        applied: Vec<LayerMove>,
    }

    impl CubeModel for RecordingCube {
        fn rotate_layer(&mut self, mv: LayerMove) {
            self.applied.push(mv);
        }
    }

    /// Emits one face per in-flight layer, tagged with its angle.
    struct AngleProjection;

    impl Projection<RecordingCube> for AngleProjection {
        type Face = (Layer, f64);

        fn project<'a>(
            &'a self,
            _cube: &'a RecordingCube,
            rotation: &'a LayerRotationState,
            _viewport: Viewport,
        ) -> impl Iterator<Item = Self::Face> + 'a {
            rotation.iter()
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            max_fps: 1000.0,
            grace_window_ms: 0.0,
            ..PipelineConfig::default()
        }
    }

    fn pipeline() -> (RenderPipeline<RecordingCube, AngleProjection>, Arc<AtomicU64>) {
        let redraws = Arc::new(AtomicU64::new(0));
        let host = {
            let redraws = Arc::clone(&redraws);
            move || {
                redraws.fetch_add(1, Ordering::Relaxed);
            }
        };
        let pipeline = RenderPipeline::new(
            RecordingCube::default(),
            AngleProjection,
            host,
            &fast_config(),
        );
        (pipeline, redraws)
    }

    fn idle_history_len<P: Projection<RecordingCube>>(
        pipeline: &RenderPipeline<RecordingCube, P>,
    ) -> Option<usize> {
        match &pipeline.lifecycle {
            Lifecycle::Idle { render, .. } => Some(render.history.len()),
            _ => None,
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn animates_queued_rotation_exactly_once() {
        let (mut pipeline, redraws) = pipeline();
        let mv = LayerMove::new(Layer::Right, false, false);
        pipeline.enqueue(RotationRequest::single(mv, 50));
        assert!(!pipeline.input_enabled());

        pipeline.start().unwrap();
        assert!(wait_for(|| pipeline.queue().is_empty()));
        assert!(pipeline.input_enabled());
        pipeline.stop();

        assert_eq!(pipeline.with_cube(|cube| cube.applied.clone()), vec![mv]);
        assert!(redraws.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn plays_algorithms_in_order() {
        let (mut pipeline, _) = pipeline();
        let algorithm: Algorithm = "R U R' U'".parse().unwrap();
        pipeline.enqueue_algorithm(&algorithm, 10);

        pipeline.start().unwrap();
        assert!(wait_for(|| pipeline.queue().is_empty()));
        pipeline.stop();

        assert_eq!(
            pipeline.with_cube(|cube| cube.applied.clone()),
            algorithm.moves
        );
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (mut pipeline, _) = pipeline();
        pipeline.stop();
        assert!(!pipeline.is_running());

        pipeline.start().unwrap();
        pipeline.start().unwrap();
        assert!(pipeline.is_running());

        pipeline.stop();
        pipeline.stop();
        assert!(!pipeline.is_running());
        assert!(!pipeline.is_aborted());
    }

    #[test]
    fn restart_resets_timing_and_resumes() {
        let (mut pipeline, redraws) = pipeline();
        assert_eq!(idle_history_len(&pipeline), Some(0));
        pipeline.start().unwrap();
        assert_eq!(idle_history_len(&pipeline), None);
        assert!(wait_for(|| pipeline.fps() > 0.0));
        pipeline.stop();
        assert_eq!(pipeline.fps(), 0.0);
        assert_eq!(idle_history_len(&pipeline), Some(0));

        let before = redraws.load(Ordering::Relaxed);
        pipeline.start().unwrap();
        assert!(wait_for(|| redraws.load(Ordering::Relaxed) > before + 5));
        assert!(wait_for(|| pipeline.fps() > 0.0));
        pipeline.stop();
        assert_eq!(pipeline.fps(), 0.0);
        assert_eq!(idle_history_len(&pipeline), Some(0));
    }

    #[test]
    fn long_host_paint_does_not_stall_pipeline() {
        let (mut pipeline, redraws) = pipeline();
        let frames = pipeline.frames();
        pipeline.start().unwrap();
        assert!(wait_for(|| frames.presented().is_some()));

        let (painted, redraws_during_paint, [first, second]) = frames
            .with_presented(|frame| {
                let before = redraws.load(Ordering::Relaxed);
                thread::sleep(Duration::from_millis(300));
                (
                    frame.sequence(),
                    redraws.load(Ordering::Relaxed) - before,
                    frames.sequences(),
                )
            })
            .unwrap();
        assert!(redraws_during_paint > 10, "only {redraws_during_paint} redraws");
        assert!(first.max(second) > painted + 10);

        let stopping = Instant::now();
        pipeline.stop();
        assert!(stopping.elapsed() < Duration::from_secs(1));
        assert!(!pipeline.is_running());
    }

    #[test]
    fn stop_releases_update_waiting_on_slow_host() {
        let redraws = Arc::new(AtomicU64::new(0));
        let host = {
            let redraws = Arc::clone(&redraws);
            move || {
                thread::sleep(Duration::from_millis(50));
                redraws.fetch_add(1, Ordering::Relaxed);
            }
        };
        let mut pipeline = RenderPipeline::new(
            RecordingCube::default(),
            AngleProjection,
            host,
            &fast_config(),
        );
        let frames = pipeline.frames();

        pipeline.start().unwrap();
        assert!(wait_for(|| redraws.load(Ordering::Relaxed) >= 2));
        let stopping = Instant::now();
        pipeline.stop();
        assert!(stopping.elapsed() < Duration::from_secs(1));

        let [first, second] = frames.sequences();
        assert_eq!(first.abs_diff(second), 1);
        pipeline.start().unwrap();
        assert!(wait_for(|| redraws.load(Ordering::Relaxed) >= 4));
        pipeline.stop();
    }

    /// Refuses to draw a layer mid-turn, so the update thread panics on the
    /// first tick that advances a rotation.
    struct RestingOnlyProjection;

    impl Projection<RecordingCube> for RestingOnlyProjection {
        type Face = ();

        fn project<'a>(
            &'a self,
            _cube: &'a RecordingCube,
            rotation: &'a LayerRotationState,
            _viewport: Viewport,
        ) -> impl Iterator<Item = Self::Face> + 'a {
            assert!(rotation.is_at_rest(), "cannot draw a turning layer");
            std::iter::empty()
        }
    }

    #[test]
    fn panicked_worker_reports_failure_on_restart() {
        let mut pipeline = RenderPipeline::new(
            RecordingCube::default(),
            RestingOnlyProjection,
            || {},
            &fast_config(),
        );
        pipeline.enqueue(RotationRequest::single(
            LayerMove::new(Layer::Front, true, false),
            100,
        ));
        pipeline.start().unwrap();
        assert!(wait_for(|| matches!(
            &pipeline.lifecycle,
            Lifecycle::Running { update, .. } if update.is_finished()
        )));

        pipeline.stop();
        assert!(!pipeline.is_running());
        assert!(!pipeline.is_aborted());
        assert_eq!(pipeline.failure(), Some("the update thread panicked"));
        assert_eq!(pipeline.fps(), 0.0);

        match pipeline.start() {
            Err(CubeAnimError::WorkerLost(reason)) => {
                assert_eq!(reason, "the update thread panicked")
            }
            other => panic!("expected a lost worker, got {other:?}"),
        }
        assert!(pipeline.failure().is_some());
    }

    #[test]
    fn slots_stay_within_one_frame() {
        let (mut pipeline, _) = pipeline();
        let frames = pipeline.frames();
        pipeline.enqueue(RotationRequest::single(
            LayerMove::new(Layer::Top, true, true),
            200,
        ));

        for round in 0..2 {
            pipeline.start().unwrap();
            assert!(wait_for(|| frames.sequences().iter().all(|seq| *seq > 0)));
            for _ in 0..200 {
                let [first, second] = frames.sequences();
                assert!(first.abs_diff(second) <= 1, "round {round}: {first} vs {second}");
            }
            pipeline.stop();

            let [first, second] = frames.sequences();
            assert_eq!(first.abs_diff(second), 1);
        }
    }

    #[test]
    fn presented_frame_is_readable_by_host() {
        let (mut pipeline, _) = pipeline();
        let frames = pipeline.frames();
        assert!(frames.with_presented(|frame| frame.sequence()).is_none());

        pipeline.start().unwrap();
        assert!(wait_for(|| frames
            .with_presented(|frame| frame.sequence() > 0)
            .unwrap_or(false)));
        pipeline.stop();
    }

    #[test]
    fn abort_is_terminal() {
        let (mut pipeline, _) = pipeline();
        pipeline.abort();
        assert!(!pipeline.is_aborted());

        pipeline.start().unwrap();
        pipeline.abort();
        assert!(!pipeline.is_running());
        assert!(pipeline.is_aborted());

        assert!(matches!(pipeline.start(), Err(CubeAnimError::Aborted)));
        pipeline.stop();
        assert!(pipeline.is_aborted());
    }

    #[test]
    fn settings_can_change_while_stopped_or_running() {
        let (mut pipeline, _) = pipeline();
        pipeline.set_drawing_area(Screen::new(800, 800));
        assert_eq!(pipeline.viewport().zoom, 6.0);

        pipeline.start().unwrap();
        pipeline.set_zoom(2.0);
        pipeline.set_max_fps(250.0);
        assert_eq!(pipeline.viewport().zoom, 2.0);
        assert_eq!(pipeline.max_fps(), 250.0);
        pipeline.stop();
    }
}
