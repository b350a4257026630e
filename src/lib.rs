//! An incremental virtual-connection engine for the game of Hex.
//!
//! The engine proves strategic connections between stone groups of one
//! color and keeps the proven set repaired as stones land on the board.
//! Build a [`Board`] and [`Position`], derive [`Groups`] and a
//! [`PatternState`], then let a [`VCBuilder`] populate a [`VCSet`] either
//! from scratch or incrementally, journaling into a [`ChangeLog`] for
//! rollback.

pub use bitset::{Bitset, BitsetIter, BITSET_BITS};
pub use board::{Board, BoardError, Position, MAX_BOARD_DIM};
pub use builder::{Statistics, VCBuilder, VCBuilderParam};
pub use cell::{Cell, CellState, Color};
pub use changelog::ChangeLog;
pub use groups::{Group, Groups};
pub use list::{AddResult, VCList};
pub use location::Location;
pub use pattern::{PatternError, PatternLibrary, PatternState};
pub use set::VCSet;
pub use vc::{VcRule, VcType, VC};

pub(crate) mod bitset;
pub(crate) mod board;
pub(crate) mod builder;
pub(crate) mod cell;
pub(crate) mod changelog;
pub(crate) mod combine;
pub(crate) mod groups;
pub(crate) mod list;
pub(crate) mod location;
pub(crate) mod pattern;
pub(crate) mod set;
pub(crate) mod shape;
pub(crate) mod vc;
mod tests;
