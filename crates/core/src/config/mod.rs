use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// FPS cap used when nothing else is configured. High enough to be effectively
/// uncapped.
pub const DEFAULT_MAX_FPS: f64 = 10_000.0;

/// Time handed back to the host after every redraw so its UI thread can
/// interleave other work.
pub const DEFAULT_GRACE_WINDOW_MS: f64 = 20.0;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub animation: AnimationConfig,
}

impl AppConfig {
    /// Parses a configuration from JSON. Missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Settings consumed by the update/render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound for the render loop's frame rate.
    pub max_fps: f64,
    /// Pause after each redraw, in milliseconds.
    pub grace_window_ms: f64,
    pub viewport: Viewport,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_fps: DEFAULT_MAX_FPS,
            grace_window_ms: DEFAULT_GRACE_WINDOW_MS,
            viewport: Viewport::default(),
        }
    }
}

/// Configuration of queued animations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Duration of one quarter or half turn, in milliseconds.
    pub move_duration_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            move_duration_ms: 300,
        }
    }
}

/// Screen rectangle the projection draws into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Screen {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Screen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(400, 400)
    }
}

/// Screen geometry plus zoom factor handed to the projection every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub screen: Screen,
    pub zoom: f64,
}

impl Viewport {
    /// Builds a viewport for `screen`, scaling the zoom with the shorter side
    /// and centring a square drawing region.
    pub fn fit(screen: Screen) -> Self {
        let min = screen.width.min(screen.height);
        let zoom = 3.0 * (f64::from(min) / 400.0);

        let mut centred = screen;
        if screen.width > screen.height {
            centred.x = centred.x.saturating_add(half_difference(screen.width, screen.height));
        } else if screen.height > screen.width {
            centred.y = centred.y.saturating_add(half_difference(screen.height, screen.width));
        }
        centred.width = min;
        centred.height = min;

        Self {
            screen: centred,
            zoom,
        }
    }

    /// Centre of the drawing region in screen coordinates.
    pub fn centre(&self) -> (f64, f64) {
        (
            f64::from(self.screen.x) + f64::from(self.screen.width) / 2.0,
            f64::from(self.screen.y) + f64::from(self.screen.height) / 2.0,
        )
    }
}

fn half_difference(long: u32, short: u32) -> i32 {
    i32::try_from((long - short) / 2).unwrap_or(i32::MAX)
}

impl Default for Viewport {
    fn default() -> Self {
        Self::fit(Screen::default())
    }
}
