use strum::VariantArray;

// NB: hex adjacency on the rhombus, drawn with rows shifted right as they
// go down:
//   a1  b1  c1
//     a2  b2  c2
//       a3  b3  c3
// so (x, y) touches the four orthogonal neighbors plus (x+1, y-1) and
// (x-1, y+1).
#[derive(Copy, Clone, VariantArray, Eq, PartialEq, Hash, Debug)]
pub(crate) enum HexStep {
    Up,
    UpRight,
    Right,
    Down,
    DownLeft,
    Left,
}

impl HexStep {
    /// Signed displacement of this step.
    pub(crate) fn offset(&self) -> (isize, isize) {
        match self {
            Self::Up => (0, -1),
            Self::UpRight => (1, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::DownLeft => (-1, 1),
            Self::Left => (-1, 0),
        }
    }
}
