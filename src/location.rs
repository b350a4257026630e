use ndarray::Ix;

pub(crate) type Coord = usize;

/// A location `(x, y)` on the interior of a board. `Location(0, 0)` is the
/// top-left corner; `x` runs left to right, `y` top to bottom. Rows are
/// drawn shifted right as they descend, which is why the two hex diagonals
/// are `(+1, -1)` and `(-1, +1)` and not the square ones.
#[derive(Clone, Eq, Hash, Copy, PartialEq, Ord, PartialOrd, Debug)]
pub struct Location(pub Coord, pub Coord);

impl Location {
    /// Row-major index into a cell array.
    pub(crate) fn as_index(&self) -> (Ix, Ix) {
        (self.1, self.0)
    }

    /// Apply a signed displacement, staying on a `width` by `height`
    /// board; steps that leave it yield `None`.
    pub(crate) fn offset_within(
        self,
        (dx, dy): (isize, isize),
        width: Coord,
        height: Coord,
    ) -> Option<Location> {
        let x = self.0.checked_add_signed(dx)?;
        let y = self.1.checked_add_signed(dy)?;
        (x < width && y < height).then_some(Location(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_respect_the_board() {
        let corner = Location(0, 0);
        assert_eq!(corner.offset_within((1, 0), 3, 3), Some(Location(1, 0)));
        assert_eq!(corner.offset_within((-1, 0), 3, 3), None);
        assert_eq!(corner.offset_within((0, -1), 3, 3), None);
        assert_eq!(Location(2, 2).offset_within((1, -1), 3, 3), None);
        assert_eq!(Location(1, 2).offset_within((1, -1), 3, 3), Some(Location(2, 1)));
    }
}
