//! Headless stand-ins for the host's collaborators: a cube model that keeps
//! the applied move history and a simple isometric projection of the 27
//! cubies.

use cube_animator_core::{
    Algorithm, Axis, CubeModel, Layer, LayerMove, LayerRotationState, Projection, Viewport,
};
use rand::Rng;

/// Pixels per cubie at zoom 1.0.
const CUBIE_SPACING: f64 = 20.0;

/// Cube model that only remembers which moves were applied.
#[derive(Debug, Default)]
pub struct MoveLog {
    moves: Vec<LayerMove>,
}

impl MoveLog {
    pub fn moves(&self) -> &[LayerMove] {
        &self.moves
    }
}

impl CubeModel for MoveLog {
    fn rotate_layer(&mut self, mv: LayerMove) {
        self.moves.push(mv);
    }
}

/// A projected cubie: its position in the cube and where it lands on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubieSprite {
    pub position: [i8; 3],
    pub centre: (f64, f64),
    pub depth: f64,
    pub size: f64,
}

/// Projects cubie centres isometrically, turning cubies of animating layers
/// by the layer's in-flight angle.
#[derive(Debug, Default)]
pub struct IsometricProjection;

impl Projection<MoveLog> for IsometricProjection {
    type Face = CubieSprite;

    fn project<'a>(
        &'a self,
        _cube: &'a MoveLog,
        rotation: &'a LayerRotationState,
        viewport: Viewport,
    ) -> impl Iterator<Item = Self::Face> + 'a {
        let (cx, cy) = viewport.centre();
        let scale = viewport.zoom * CUBIE_SPACING;
        let (sin30, cos30) = 30f64.to_radians().sin_cos();

        cubie_positions().map(move |position| {
            let mut point = position.map(f64::from);
            for (layer, angle) in rotation.iter() {
                if angle != 0.0 && layer.contains(position) {
                    point = rotate(point, layer.axis(), -angle * handedness(layer));
                }
            }

            let [x, y, z] = point;
            CubieSprite {
                position,
                centre: (
                    cx + (x - z) * cos30 * scale,
                    cy + ((x + z) * sin30 - y) * scale,
                ),
                depth: x + y + z,
                size: scale,
            }
        })
    }
}

/// Position of the cubie drawn last in painter's order, i.e. nearest to the
/// viewer.
pub fn front_cubie(sprites: &[CubieSprite]) -> Option<[i8; 3]> {
    sprites
        .iter()
        .max_by(|a, b| a.depth.total_cmp(&b.depth))
        .map(|sprite| sprite.position)
}

/// Horizontal extent of the drawing in pixels, including sprite size.
pub fn extent(sprites: &[CubieSprite]) -> f64 {
    let (min, max) = sprites.iter().fold((f64::MAX, f64::MIN), |(min, max), sprite| {
        (
            min.min(sprite.centre.0 - sprite.size / 2.0),
            max.max(sprite.centre.0 + sprite.size / 2.0),
        )
    });
    if sprites.is_empty() {
        0.0
    } else {
        max - min
    }
}

fn cubie_positions() -> impl Iterator<Item = [i8; 3]> {
    (-1..=1).flat_map(|x| (-1..=1).flat_map(move |y| (-1..=1).map(move |z| [x, y, z])))
}

/// Clockwise is defined looking at a layer's outer face, so layers on the
/// negative side of an axis turn the other way in world space. Middle layers
/// follow L, D and F respectively.
fn handedness(layer: Layer) -> f64 {
    match layer {
        Layer::Top | Layer::Front | Layer::MiddleSlice | Layer::Right => 1.0,
        Layer::Middle | Layer::Bottom | Layer::Back | Layer::Left | Layer::MiddleSliceSides => -1.0,
    }
}

fn rotate([x, y, z]: [f64; 3], axis: Axis, degrees: f64) -> [f64; 3] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    match axis {
        Axis::X => [x, y * cos - z * sin, y * sin + z * cos],
        Axis::Y => [x * cos + z * sin, y, -x * sin + z * cos],
        Axis::Z => [x * cos - y * sin, x * sin + y * cos, z],
    }
}

/// Random sequence of `count` moves that never turns the same layer twice in
/// a row.
pub fn scramble(count: usize, rng: &mut impl Rng) -> Algorithm {
    let mut moves: Vec<LayerMove> = Vec::with_capacity(count);
    while moves.len() < count {
        let layer = Layer::ALL[rng.gen_range(0..Layer::ALL.len())];
        if moves.last().is_some_and(|last| last.layer == layer) {
            continue;
        }
        moves.push(LayerMove::new(layer, rng.gen_bool(0.5), rng.gen_bool(0.25)));
    }
    Algorithm::new(moves)
}
