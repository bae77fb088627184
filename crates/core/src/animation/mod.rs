//! Rotation requests and the per-tick animation state machine.
//!
//! A [`RotationRequest`] is a batch of layer moves that animate together.
//! The [`Animator`] owns the in-flight angles ([`LayerRotationState`]) and
//! advances the request at the head of a [`RotationQueue`] by one step per
//! update tick. The cube model is only touched once every move of the batch
//! has reached its target.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    cube::{CubeModel, Layer, LayerMove},
    queue::RotationQueue,
};

/// Float slack allowed when testing whether an accumulated angle has reached
/// its target.
const ANGLE_EPSILON: f64 = 1e-9;

/// One move within a batch together with the signed angle, in degrees, the
/// layer has to turn through. Positive targets turn clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimatedLayerMove {
    pub layer_move: LayerMove,
    pub target: f64,
}

impl AnimatedLayerMove {
    /// Quarter turns animate through 90 degrees and half turns through 180.
    pub fn new(layer_move: LayerMove) -> Self {
        let magnitude = if layer_move.twice { 180.0 } else { 90.0 };
        let target = if layer_move.clockwise {
            magnitude
        } else {
            -magnitude
        };
        Self { layer_move, target }
    }

    pub fn layer(&self) -> Layer {
        self.layer_move.layer
    }

    /// Sign-aware target test: a clockwise turn only completes by growing
    /// past its target, a counter-clockwise one only by shrinking below it.
    pub fn is_reached(&self, accumulated: f64) -> bool {
        if self.target > 0.0 {
            accumulated >= self.target - ANGLE_EPSILON
        } else if self.target < 0.0 {
            accumulated <= self.target + ANGLE_EPSILON
        } else {
            true
        }
    }
}

/// Batch of simultaneous layer moves sharing one duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRequest {
    moves: Vec<AnimatedLayerMove>,
    duration_ms: u64,
}

impl RotationRequest {
    pub fn new(moves: Vec<AnimatedLayerMove>, duration_ms: u64) -> Self {
        Self { moves, duration_ms }
    }

    pub fn single(layer_move: LayerMove, duration_ms: u64) -> Self {
        Self::batch([layer_move], duration_ms)
    }

    pub fn batch(moves: impl IntoIterator<Item = LayerMove>, duration_ms: u64) -> Self {
        Self::new(
            moves.into_iter().map(AnimatedLayerMove::new).collect(),
            duration_ms,
        )
    }

    pub fn moves(&self) -> &[AnimatedLayerMove] {
        &self.moves
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Angle added to each move per tick at the given frame rate. Returns
    /// `None` while no usable FPS estimate exists.
    pub fn step(&self, target: f64, fps: f64) -> Option<f64> {
        if !fps.is_finite() || fps <= 0.0 {
            return None;
        }
        if self.duration_ms == 0 {
            return Some(target);
        }
        let frames = (self.duration_ms as f64 / 1000.0) * fps;
        Some(target / frames)
    }
}

/// Accumulated in-flight angle of every layer, in degrees. Layers without an
/// animating move report zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerRotationState {
    angles: HashMap<Layer, f64>,
}

impl LayerRotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self, layer: Layer) -> f64 {
        self.angles.get(&layer).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, layer: Layer, delta: f64) {
        *self.angles.entry(layer).or_insert(0.0) += delta;
    }

    pub fn reset(&mut self) {
        self.angles.clear();
    }

    pub fn is_at_rest(&self) -> bool {
        self.angles.values().all(|angle| *angle == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Layer, f64)> + '_ {
        self.angles.iter().map(|(layer, angle)| (*layer, *angle))
    }
}

/// What a single [`Animator::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing queued.
    Idle,
    /// A request is queued but no FPS estimate is available yet.
    Waiting,
    /// The head request advanced and is still in progress.
    Advanced,
    /// The head request finished and was applied to the cube.
    Finished { remaining: usize },
}

/// Drives the head-of-queue request one step per tick.
#[derive(Debug, Default)]
pub struct Animator {
    rotation: LayerRotationState,
    current: Option<Arc<RotationRequest>>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotation(&self) -> &LayerRotationState {
        &self.rotation
    }

    /// Advances the head request using the render loop's current FPS. When
    /// every move has reached its target the angles are reset, the moves are
    /// applied to `cube` and the request leaves the queue.
    pub fn tick<C: CubeModel + ?Sized>(
        &mut self,
        queue: &RotationQueue,
        fps: f64,
        cube: &mut C,
    ) -> TickOutcome {
        if self.current.is_none() {
            self.current = queue.front();
        }
        let Some(request) = self.current.clone() else {
            return TickOutcome::Idle;
        };

        for mv in request.moves() {
            match request.step(mv.target, fps) {
                Some(step) => self.rotation.add(mv.layer(), step),
                None => return TickOutcome::Waiting,
            }
        }

        let finished = request
            .moves()
            .iter()
            .all(|mv| mv.is_reached(self.rotation.angle(mv.layer())));
        if !finished {
            return TickOutcome::Advanced;
        }

        self.current = None;
        self.rotation.reset();
        for mv in request.moves() {
            cube.rotate_layer(mv.layer_move);
        }
        queue.clear_selection();
        let remaining = queue.complete_front();
        tracing::trace!(moves = request.moves().len(), remaining, "rotation finished");

        TickOutcome::Finished { remaining }
    }
}
