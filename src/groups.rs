use petgraph::unionfind::UnionFind;
use strum::VariantArray;

use crate::bitset::Bitset;
use crate::board::Position;
use crate::cell::{Cell, CellState, Color};

/// A maximal chain of same-colored stones (or a lone empty cell, or an edge
/// with everything attached to it), named by its captain.
#[derive(Clone, Debug)]
pub struct Group {
    captain: Cell,
    color: CellState,
    members: Bitset,
    nbs: Bitset,
}

impl Group {
    /// The canonical representative: the lowest cell id in the chain, which
    /// is the edge itself whenever an edge belongs to the chain.
    pub fn captain(&self) -> Cell {
        self.captain
    }

    pub fn color(&self) -> CellState {
        self.color
    }

    pub fn members(&self) -> Bitset {
        self.members
    }

    /// Cells adjacent to the chain, members excluded.
    pub fn nbs(&self) -> Bitset {
        self.nbs
    }
}

/// The partition of a position into groups.
///
/// Every cell belongs to exactly one group: stones chain with same-colored
/// neighbors and their color's edges, empty cells stand alone. A position
/// is won for a color once its two edges share a captain.
#[derive(Clone, Debug)]
pub struct Groups {
    captain_of: Vec<Cell>,
    slot_of: Vec<usize>,
    groups: Vec<Group>,
}

impl Groups {
    pub fn compute(position: &Position) -> Groups {
        let board = position.board();
        let n = board.cell_count();
        let mut uf = UnionFind::<usize>::new(n);

        for color in Color::VARIANTS {
            let state = CellState::from(*color);
            for cell in position.stones(*color).iter() {
                for nb in board.nbs(cell).iter() {
                    if position.state(nb) == state {
                        uf.union(cell.index(), nb.index());
                    }
                }
            }
        }

        // ascending scan puts the lowest id first in each component
        let mut captain_of = vec![Cell::NORTH; n];
        let mut slot_of = vec![usize::MAX; n];
        let mut groups: Vec<Group> = Vec::new();
        for i in 0..n {
            let root = uf.find(i);
            if slot_of[root] == usize::MAX {
                slot_of[root] = groups.len();
                groups.push(Group {
                    captain: Cell::from_index(i),
                    color: position.state(Cell::from_index(i)),
                    members: Bitset::EMPTY,
                    nbs: Bitset::EMPTY,
                });
            }
            let slot = slot_of[root];
            captain_of[i] = groups[slot].captain;
            groups[slot].members.set(Cell::from_index(i));
        }

        for group in groups.iter_mut() {
            let mut nbs = Bitset::EMPTY;
            for member in group.members.iter() {
                nbs |= board.nbs(member);
            }
            group.nbs = nbs - group.members;
        }

        // address groups by captain rather than by union-find root
        let mut by_captain = vec![usize::MAX; n];
        for (slot, group) in groups.iter().enumerate() {
            by_captain[group.captain.index()] = slot;
        }
        for i in 0..n {
            slot_of[i] = by_captain[captain_of[i].index()];
        }

        Groups {
            captain_of,
            slot_of,
            groups,
        }
    }

    #[inline]
    pub fn captain_of(&self, cell: Cell) -> Cell {
        self.captain_of[cell.index()]
    }

    #[inline]
    pub fn is_captain(&self, cell: Cell) -> bool {
        self.captain_of[cell.index()] == cell
    }

    /// The group containing `cell`.
    pub fn group(&self, cell: Cell) -> &Group {
        &self.groups[self.slot_of[cell.index()]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Groups that are not the given color, i.e. the other color's own and
    /// empty groups.
    pub fn iter_not(&self, color: Color) -> impl Iterator<Item = &Group> {
        let excluded = CellState::from(color);
        self.groups.iter().filter(move |g| g.color != excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    fn position_with(stones: &[(&str, Color)]) -> Position {
        let board = Board::new(3, 3).unwrap();
        let mut position = Position::new(board);
        for (name, color) in stones {
            let cell = position.board().cell_named(name).unwrap();
            position.place(cell, *color);
        }
        position
    }

    #[test]
    fn empty_cells_are_singletons() {
        let position = position_with(&[]);
        let groups = Groups::compute(&position);
        let a1 = position.board().cell_named("a1").unwrap();
        assert!(groups.is_captain(a1));
        assert_eq!(groups.group(a1).members().count(), 1);
        // 9 empty cells + 4 edges
        assert_eq!(groups.iter().count(), 13);
    }

    #[test]
    fn adjacent_stones_chain() {
        let position = position_with(&[("b2", Color::Black), ("c2", Color::Black)]);
        let groups = Groups::compute(&position);
        let b2 = position.board().cell_named("b2").unwrap();
        let c2 = position.board().cell_named("c2").unwrap();
        assert_eq!(groups.captain_of(b2), groups.captain_of(c2));
        assert_eq!(groups.captain_of(b2), b2.min(c2));
        assert_eq!(groups.group(b2).members().count(), 2);
    }

    #[test]
    fn stones_chain_with_their_edge() {
        let position = position_with(&[("b1", Color::Black)]);
        let groups = Groups::compute(&position);
        let b1 = position.board().cell_named("b1").unwrap();
        assert_eq!(groups.captain_of(b1), Cell::NORTH);
        assert!(groups.group(b1).members().test(Cell::NORTH));
        // white stones do not chain with black edges
        let position = position_with(&[("b1", Color::White)]);
        let groups = Groups::compute(&position);
        let b1 = position.board().cell_named("b1").unwrap();
        assert_eq!(groups.captain_of(b1), b1);
    }

    #[test]
    fn winning_chain_merges_both_edges() {
        let position = position_with(&[
            ("b1", Color::Black),
            ("b2", Color::Black),
            ("b3", Color::Black),
        ]);
        let groups = Groups::compute(&position);
        assert_eq!(groups.captain_of(Cell::SOUTH), Cell::NORTH);
    }

    #[test]
    fn group_nbs_excludes_members() {
        let position = position_with(&[("b2", Color::Black), ("c2", Color::Black)]);
        let groups = Groups::compute(&position);
        let b2 = position.board().cell_named("b2").unwrap();
        let nbs = groups.group(b2).nbs();
        assert!(!nbs.test(b2));
        assert!(nbs.test(position.board().cell_named("b1").unwrap()));
        assert!(nbs.test(Cell::EAST));
    }
}
