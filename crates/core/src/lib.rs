//! Core library for the Cube Animator.
//!
//! The crate animates layer rotations of a 3x3 puzzle cube on a pair of
//! dedicated threads: an update loop that advances queued rotations and
//! projects the cube into one of two frame slots, and a render loop that
//! hands each finished slot to the host and measures the achieved frame
//! rate. The cube model, the projection and the host's repaint are supplied
//! by the caller through the [`CubeModel`], [`Projection`] and
//! [`RedrawHost`] traits.

pub mod animation;
pub mod config;
pub mod cube;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod render;
pub mod sync;
pub mod timing;

pub use animation::{AnimatedLayerMove, Animator, LayerRotationState, RotationRequest, TickOutcome};
pub use config::{AnimationConfig, AppConfig, PipelineConfig, Screen, Viewport};
pub use cube::{Algorithm, Axis, CubeModel, FaceSelection, Layer, LayerMove};
pub use error::{CubeAnimError, Result};
pub use pipeline::RenderPipeline;
pub use queue::RotationQueue;
pub use render::{DoubleBuffer, Frame, FrameReader, Projection, RedrawHost};
pub use sync::{Handoff, Signal};
pub use timing::{FramePacer, FrameTimeHistory};
