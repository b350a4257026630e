use std::fmt::{Display, Formatter};
use std::ops::IndexMut;

use ndarray::{Array2, AssignElem};
use strum::VariantArray;
use thiserror::Error;

use crate::bitset::Bitset;
use crate::cell::{Cell, CellState, Color};
use crate::location::Location;
use crate::shape::HexStep;

/// Largest supported board side; bounded by the bitset width.
pub const MAX_BOARD_DIM: usize = 13;

/// Reasons a board cannot be constructed.
#[derive(Copy, Clone, Debug, Error)]
pub enum BoardError {
    #[error("board dimensions {0}x{1} outside 1..={MAX_BOARD_DIM}")]
    InvalidDims(usize, usize),
}

/// The static topology of a Hex board: dimensions plus the adjacency of
/// every cell, including the four edge cells. Row 0 adjoins
/// [`Cell::NORTH`], the last row [`Cell::SOUTH`], column 0 [`Cell::WEST`]
/// and the last column [`Cell::EAST`]. Edges are not adjacent to each other.
#[derive(Clone)]
pub struct Board {
    width: usize,
    height: usize,
    nbs: Vec<Bitset>,
    interior: Bitset,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Result<Board, BoardError> {
        if !(1..=MAX_BOARD_DIM).contains(&width) || !(1..=MAX_BOARD_DIM).contains(&height) {
            return Err(BoardError::InvalidDims(width, height));
        }

        let cell_count = Cell::FIRST_INTERIOR + width * height;
        let mut nbs = vec![Bitset::EMPTY; cell_count];
        let mut interior = Bitset::EMPTY;

        let cell_of = |location: Location| {
            Cell::from_index(Cell::FIRST_INTERIOR + location.1 * width + location.0)
        };

        for y in 0..height {
            for x in 0..width {
                let location = Location(x, y);
                let cell = cell_of(location);
                interior.set(cell);

                for step in HexStep::VARIANTS {
                    if let Some(target) = location.offset_within(step.offset(), width, height) {
                        nbs[cell.index()].set(cell_of(target));
                    }
                }

                let mut touch = |edge: Cell| {
                    nbs[cell.index()].set(edge);
                    nbs[edge.index()].set(cell);
                };
                if y == 0 {
                    touch(Cell::NORTH);
                }
                if y == height - 1 {
                    touch(Cell::SOUTH);
                }
                if x == 0 {
                    touch(Cell::WEST);
                }
                if x == width - 1 {
                    touch(Cell::EAST);
                }
            }
        }

        Ok(Board {
            width,
            height,
            nbs,
            interior,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Interior cells plus the four edges.
    pub fn cell_count(&self) -> usize {
        Cell::FIRST_INTERIOR + self.width * self.height
    }

    pub fn cell(&self, location: Location) -> Cell {
        debug_assert!(location.0 < self.width && location.1 < self.height);
        Cell::from_index(Cell::FIRST_INTERIOR + location.1 * self.width + location.0)
    }

    pub fn location(&self, cell: Cell) -> Location {
        debug_assert!(!cell.is_edge());
        let i = cell.index() - Cell::FIRST_INTERIOR;
        Location(i % self.width, i / self.width)
    }

    /// Parse a cell name like `b2` (column letter, 1-based row).
    pub fn cell_named(&self, name: &str) -> Option<Cell> {
        let mut chars = name.chars();
        let col = chars.next()?;
        if !col.is_ascii_lowercase() {
            return None;
        }
        let x = col as usize - 'a' as usize;
        let y = chars.as_str().parse::<usize>().ok()?.checked_sub(1)?;
        (x < self.width && y < self.height).then(|| self.cell(Location(x, y)))
    }

    /// Neighbors of a cell, including edge cells.
    #[inline]
    pub fn nbs(&self, cell: Cell) -> Bitset {
        self.nbs[cell.index()]
    }

    /// All interior cells.
    pub fn interior(&self) -> Bitset {
        self.interior
    }
}

/// A board plus the stones on it.
#[derive(Clone)]
pub struct Position {
    board: Board,
    cells: Array2<CellState>,
    black: Bitset,
    white: Bitset,
}

impl Position {
    pub fn new(board: Board) -> Position {
        // row major
        let cells =
            Array2::from_shape_simple_fn((board.height, board.width), CellState::default);
        Position {
            board,
            cells,
            black: Bitset::EMPTY,
            white: Bitset::EMPTY,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Put a stone on an empty interior cell.
    pub fn place(&mut self, cell: Cell, color: Color) {
        debug_assert!(!cell.is_edge());
        debug_assert!(self.state(cell).is_empty());
        let location = self.board.location(cell);
        self.cells
            .index_mut(location.as_index())
            .assign_elem(CellState::from(color));
        match color {
            Color::Black => self.black.set(cell),
            Color::White => self.white.set(cell),
        }
    }

    /// The contents of a cell; edge cells report their owning color.
    pub fn state(&self, cell: Cell) -> CellState {
        match cell.edge_color() {
            Some(color) => CellState::from(color),
            None => self.cells[self.board.location(cell).as_index()],
        }
    }

    #[inline]
    pub fn is_empty(&self, cell: Cell) -> bool {
        !cell.is_edge() && self.state(cell).is_empty()
    }

    /// Interior stones of one color.
    pub fn stones(&self, color: Color) -> Bitset {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }

    /// All empty interior cells.
    pub fn empty(&self) -> Bitset {
        self.board.interior - self.black - self.white
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for y in 0..self.board.height {
            for _ in 0..y {
                f.write_str(" ")?;
            }
            for x in 0..self.board.width {
                let state = self.cells[Location(x, y).as_index()];
                let glyph = match state {
                    CellState::Black => 'x',
                    CellState::White => 'o',
                    CellState::Empty => '.',
                };
                write!(f, "{glyph} ")?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}
