use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{CubeAnimError, Result};

/// A rotatable slice of the cube. The discriminants are the flag codes the
/// cube model uses to address positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Top = 1,
    Middle = 2,
    Bottom = 4,
    Front = 8,
    MiddleSlice = 16,
    Back = 32,
    Left = 64,
    MiddleSliceSides = 128,
    Right = 256,
}

/// World axis a layer turns around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Layer {
    pub const ALL: [Layer; 9] = [
        Layer::Top,
        Layer::Middle,
        Layer::Bottom,
        Layer::Front,
        Layer::MiddleSlice,
        Layer::Back,
        Layer::Left,
        Layer::MiddleSliceSides,
        Layer::Right,
    ];

    pub fn flag(self) -> u16 {
        self as u16
    }

    pub fn axis(self) -> Axis {
        match self {
            Layer::Top | Layer::Middle | Layer::Bottom => Axis::Y,
            Layer::Front | Layer::MiddleSlice | Layer::Back => Axis::Z,
            Layer::Left | Layer::MiddleSliceSides | Layer::Right => Axis::X,
        }
    }

    /// Coordinate of the layer along its axis, in cubie units (-1, 0 or 1).
    pub fn coordinate(self) -> i8 {
        match self {
            Layer::Top | Layer::Front | Layer::Right => 1,
            Layer::Middle | Layer::MiddleSlice | Layer::MiddleSliceSides => 0,
            Layer::Bottom | Layer::Back | Layer::Left => -1,
        }
    }

    /// Returns true if the cubie at `(x, y, z)` belongs to this layer.
    pub fn contains(self, position: [i8; 3]) -> bool {
        let value = match self.axis() {
            Axis::X => position[0],
            Axis::Y => position[1],
            Axis::Z => position[2],
        };
        value == self.coordinate()
    }

    fn notation(self) -> char {
        match self {
            Layer::Top => 'U',
            Layer::Middle => 'E',
            Layer::Bottom => 'D',
            Layer::Front => 'F',
            Layer::MiddleSlice => 'S',
            Layer::Back => 'B',
            Layer::Left => 'L',
            Layer::MiddleSliceSides => 'M',
            Layer::Right => 'R',
        }
    }

    fn from_notation(symbol: char) -> Option<Self> {
        Layer::ALL
            .into_iter()
            .find(|layer| layer.notation() == symbol)
    }
}

/// A single true rotation of one layer, as applied to the cube model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMove {
    pub layer: Layer,
    /// Clockwise when looking at the layer's outer face.
    pub clockwise: bool,
    /// Half turn instead of a quarter turn.
    pub twice: bool,
}

impl LayerMove {
    pub fn new(layer: Layer, clockwise: bool, twice: bool) -> Self {
        Self {
            layer,
            clockwise,
            twice,
        }
    }

    pub fn inverse(self) -> Self {
        Self {
            clockwise: !self.clockwise,
            ..self
        }
    }
}

impl fmt::Display for LayerMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.layer.notation())?;
        if self.twice {
            write!(f, "2")?;
        }
        if !self.clockwise {
            write!(f, "'")?;
        }
        Ok(())
    }
}

impl FromStr for LayerMove {
    type Err = CubeAnimError;

    /// Parses `R`, `R'`, `R2` and `R2'` style notation.
    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        let layer = chars
            .next()
            .and_then(Layer::from_notation)
            .ok_or_else(|| CubeAnimError::InvalidMove(s.to_string()))?;

        let mut twice = false;
        let mut clockwise = true;
        for modifier in chars {
            match modifier {
                '2' if !twice && clockwise => twice = true,
                '\'' if clockwise => clockwise = false,
                _ => return Err(CubeAnimError::InvalidMove(s.to_string())),
            }
        }

        Ok(Self::new(layer, clockwise, twice))
    }
}

/// Ordered list of moves, typically produced by a solver or a scramble.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    pub moves: Vec<LayerMove>,
}

impl Algorithm {
    pub fn new(moves: Vec<LayerMove>) -> Self {
        Self { moves }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// The algorithm that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            moves: self.moves.iter().rev().map(|mv| mv.inverse()).collect(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, mv) in self.moves.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{mv}")?;
        }
        Ok(())
    }
}

impl FromStr for Algorithm {
    type Err = CubeAnimError;

    fn from_str(s: &str) -> Result<Self> {
        let moves = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<LayerMove>>>()?;
        Ok(Self { moves })
    }
}

/// The cube's true state. Implementations own the combinatorial model; the
/// animation pipeline only ever calls [`CubeModel::rotate_layer`], and only
/// once a rotation has finished animating.
pub trait CubeModel: Send + 'static {
    fn rotate_layer(&mut self, mv: LayerMove);
}

/// The face of a cubie a user has picked, kept while a drag gesture is in
/// progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSelection {
    /// Cubie position in `(x, y, z)` cubie units.
    pub position: [i8; 3],
    /// Layer whose outer face was picked.
    pub face: Layer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modifiers() {
        assert_eq!(
            "R".parse::<LayerMove>().unwrap(),
            LayerMove::new(Layer::Right, true, false)
        );
        assert_eq!(
            "U'".parse::<LayerMove>().unwrap(),
            LayerMove::new(Layer::Top, false, false)
        );
        assert_eq!(
            "M2".parse::<LayerMove>().unwrap(),
            LayerMove::new(Layer::MiddleSliceSides, true, true)
        );
        assert_eq!(
            "F2'".parse::<LayerMove>().unwrap(),
            LayerMove::new(Layer::Front, false, true)
        );
    }

    #[test]
    fn rejects_unknown_moves() {
        for bad in ["", "X", "R3", "R''", "R'2"] {
            let err = bad.parse::<LayerMove>().unwrap_err();
            assert!(matches!(err, CubeAnimError::InvalidMove(_)), "{bad}");
        }
    }

    #[test]
    fn algorithm_display_matches_input() {
        let algorithm: Algorithm = "R U R' U' F2 E S' B2'".parse().unwrap();
        assert_eq!(algorithm.len(), 8);
        assert_eq!(algorithm.to_string(), "R U R' U' F2 E S' B2'");
        assert_eq!(algorithm.inverse().to_string(), "B2 S E' F2' U R U' R'");
    }

    #[test]
    fn layers_partition_each_axis() {
        let corner = [1, 1, 1];
        let touching: Vec<Layer> = Layer::ALL
            .into_iter()
            .filter(|layer| layer.contains(corner))
            .collect();
        assert_eq!(touching, vec![Layer::Top, Layer::Front, Layer::Right]);

        let core = [0, 0, 0];
        assert!(Layer::Middle.contains(core));
        assert!(Layer::MiddleSlice.contains(core));
        assert!(Layer::MiddleSliceSides.contains(core));
        assert_eq!(Layer::Right.flag(), 256);
    }
}
