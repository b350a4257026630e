#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::bitset::Bitset;
    use crate::board::{Board, Position};
    use crate::cell::{Cell, CellState, Color};
    use crate::changelog::ChangeLog;
    use crate::groups::Groups;
    use crate::pattern::{PatternLibrary, PatternState};
    use crate::set::VCSet;
    use crate::vc::VcType;
    use crate::{VCBuilder, VCBuilderParam};

    fn position(width: usize, height: usize, stones: &[(&str, Color)]) -> Position {
        let board = Board::new(width, height).unwrap();
        let mut position = Position::new(board);
        for (name, color) in stones {
            let cell = position.board().cell_named(name).unwrap();
            position.place(cell, *color);
        }
        position
    }

    fn build(
        position: &Position,
        color: Color,
        param: VCBuilderParam,
    ) -> (VCSet, VCBuilder) {
        let groups = Groups::compute(position);
        let patterns = PatternState::new(position);
        let mut builder = VCBuilder::with_library(param, PatternLibrary::empty());
        let mut set = VCSet::new(color);
        builder.build_static(&mut set, &groups, &patterns);
        (set, builder)
    }

    fn cell(position: &Position, name: &str) -> Cell {
        position.board().cell_named(name).unwrap()
    }

    fn carrier_of(position: &Position, names: &[&str]) -> Bitset {
        names.iter().map(|n| cell(position, n)).collect()
    }

    /// Ordered dump of every non-empty list, for exact-equality checks.
    fn snapshot(set: &VCSet) -> Vec<((Cell, Cell), VcType, Vec<(Bitset, Option<Cell>, bool)>)> {
        let mut out = Vec::new();
        for ty in [VcType::Full, VcType::Semi] {
            let mut pairs: Vec<(Cell, Cell)> =
                set.pairs(ty).map(|(x, y)| (x.min(y), x.max(y))).collect();
            pairs.sort();
            for (x, y) in pairs {
                let list = set.get(ty, x, y).unwrap();
                out.push((
                    (x, y),
                    ty,
                    list.iter()
                        .map(|vc| (vc.carrier(), vc.key(), vc.processed()))
                        .collect(),
                ));
            }
        }
        out
    }

    /// Lists between cells the opponent has since occupied are stale and
    /// never consulted; every check skips them.
    fn is_stale(set: &VCSet, position: &Position, x: Cell, y: Cell) -> bool {
        let opponent = CellState::from(set.color().other());
        position.state(x) == opponent || position.state(y) == opponent
    }

    /// The quantified invariants that hold at every quiescent state.
    fn check_invariants(set: &VCSet, position: &Position) {
        let empty = position.empty();
        for ty in [VcType::Full, VcType::Semi] {
            for list in set.lists(ty) {
                let (x, y) = (list.x(), list.y());
                if is_stale(set, position, x, y) {
                    continue;
                }
                let mut hard = Bitset::UNIVERSE;
                let mut soft = Bitset::UNIVERSE;
                for (i, vc) in list.iter().enumerate() {
                    assert_eq!((vc.x(), vc.y()), (x, y));
                    assert_eq!(vc.vc_type(), ty);
                    assert!(!vc.carrier().test(x) && !vc.carrier().test(y));
                    assert!(
                        vc.carrier().is_subset_of(&empty),
                        "carrier contains occupied cells"
                    );
                    if ty == VcType::Semi {
                        assert!(vc.carrier().test(vc.key().unwrap()));
                    } else {
                        assert_eq!(vc.key(), None);
                        // every full has fired its closure by quiescence
                        assert!(vc.processed(), "unprocessed full at rest");
                    }
                    for other in list.iter().skip(i + 1) {
                        assert!(
                            !vc.carrier().is_subset_of(&other.carrier())
                                && !other.carrier().is_subset_of(&vc.carrier()),
                            "dominance violated between carriers"
                        );
                    }
                    hard &= vc.carrier();
                }
                for vc in list.iter_soft() {
                    soft &= vc.carrier();
                }
                assert_eq!(list.hard_intersection(), hard);
                assert_eq!(list.soft_intersection(), soft);
            }
        }
    }

    // ------------------------------------------------------------------
    // static build scenarios, 3x3 board

    #[test]
    fn empty_board_edge_adjacency() {
        let position = position(3, 3, &[]);
        let (set, builder) = build(&position, Color::Black, VCBuilderParam::default());

        for name in ["a1", "b1", "c1"] {
            let list = set.get(VcType::Full, Cell::NORTH, cell(&position, name)).unwrap();
            assert!(list.iter().any(|vc| vc.carrier().none()));
        }
        for name in ["a3", "b3", "c3"] {
            let list = set.get(VcType::Full, Cell::SOUTH, cell(&position, name)).unwrap();
            assert!(list.iter().any(|vc| vc.carrier().none()));
        }
        // the empty board connects nobody's edges outright
        assert!(!set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        assert!(builder.statistics(Color::Black).base_successes > 0);
        check_invariants(&set, &position);
    }

    #[test]
    fn lone_center_stone_reaches_both_edges() {
        let position = position(3, 3, &[("b2", Color::Black)]);
        let (set, _) = build(&position, Color::Black, VCBuilderParam::default());

        let b2 = cell(&position, "b2");
        // b2 is not adjacent to either edge; both connections ride bridges
        let norths = set.get(VcType::Full, Cell::NORTH, b2).unwrap();
        assert!(norths
            .iter()
            .any(|vc| vc.carrier() == carrier_of(&position, &["b1", "c1"])));
        let souths = set.get(VcType::Full, b2, Cell::SOUTH).unwrap();
        assert!(souths
            .iter()
            .any(|vc| vc.carrier() == carrier_of(&position, &["a3", "b3"])));
        // and the and-rule chains them through the stone
        assert!(set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        check_invariants(&set, &position);
    }

    #[test]
    fn middle_row_wins_outright() {
        let position = position(
            3,
            3,
            &[("a2", Color::Black), ("b2", Color::Black), ("c2", Color::Black)],
        );
        let (set, _) = build(&position, Color::Black, VCBuilderParam::default());
        assert!(set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        check_invariants(&set, &position);
    }

    #[test]
    fn abort_on_winning_connection_still_reports_the_win() {
        let position = position(
            3,
            3,
            &[("a2", Color::Black), ("b2", Color::Black), ("c2", Color::Black)],
        );
        let param = VCBuilderParam {
            abort_on_winning_connection: true,
            ..Default::default()
        };
        let (set, _) = build(&position, Color::Black, param);
        assert!(set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
    }

    #[test]
    fn bridge_between_stones() {
        let position = position(3, 3, &[("a1", Color::Black), ("b2", Color::Black)]);
        let (set, _) = build(&position, Color::Black, VCBuilderParam::default());

        let a1 = cell(&position, "a1");
        let b2 = cell(&position, "b2");
        let list = set.get(VcType::Full, a1, b2).unwrap();
        assert!(list
            .iter()
            .any(|vc| vc.carrier() == carrier_of(&position, &["b1", "a2"])));
        check_invariants(&set, &position);
    }

    #[test]
    fn white_connects_its_own_edges() {
        let position = position(3, 3, &[("b2", Color::White)]);
        let (set, _) = build(&position, Color::White, VCBuilderParam::default());
        let b2 = cell(&position, "b2");
        assert!(set.exists(Cell::EAST, b2, VcType::Full));
        assert!(set.exists(b2, Cell::WEST, VcType::Full));
        assert!(set.exists(Cell::EAST, Cell::WEST, VcType::Full));
        assert!(!set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        check_invariants(&set, &position);
    }

    #[test]
    fn adjacent_stones_form_one_group() {
        let position = position(3, 3, &[("b2", Color::Black), ("c2", Color::Black)]);
        let (set, _) = build(&position, Color::Black, VCBuilderParam::default());
        let groups = Groups::compute(&position);
        let b2 = cell(&position, "b2");
        let captain = groups.captain_of(b2);
        assert_eq!(captain, b2);
        // base connections run from the captain to the group's neighbors
        let b1 = cell(&position, "b1");
        let list = set.get(VcType::Full, captain, b1).unwrap();
        assert!(list.iter().any(|vc| vc.carrier().none()));
        check_invariants(&set, &position);
    }

    #[test]
    fn enhanced_or_finds_the_same_wins() {
        let moves = [("b2", Color::Black)];
        let position = position(3, 3, &moves);
        let param = VCBuilderParam {
            max_ors: 16,
            ..Default::default()
        };
        let (set, _) = build(&position, Color::Black, param);
        let b2 = cell(&position, "b2");
        assert!(set.exists(Cell::NORTH, b2, VcType::Full));
        assert!(set.exists(b2, Cell::SOUTH, VcType::Full));
        assert!(set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        check_invariants(&set, &position);
    }

    #[test]
    fn and_over_edge_only_widens_the_set() {
        let position = position(3, 3, &[("b2", Color::Black)]);
        let param = VCBuilderParam {
            and_over_edge: true,
            ..Default::default()
        };
        let (set, _) = build(&position, Color::Black, param);
        assert!(set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        check_invariants(&set, &position);
    }

    // ------------------------------------------------------------------
    // incremental builds

    fn rebuild_incremental(
        builder: &mut VCBuilder,
        set: &mut VCSet,
        before: &Position,
        moves: &[(&str, Color)],
        log: Option<&mut ChangeLog>,
    ) -> Position {
        let old_groups = Groups::compute(before);
        let mut after = before.clone();
        let mut added = [Bitset::EMPTY, Bitset::EMPTY];
        for (name, color) in moves {
            let cell = after.board().cell_named(name).unwrap();
            after.place(cell, *color);
            added[color.index()].set(cell);
        }
        let groups = Groups::compute(&after);
        let patterns = PatternState::new(&after);
        builder.build_incremental(set, &old_groups, &groups, &patterns, &added, log);
        after
    }

    #[test]
    fn playing_a_key_upgrades_semis() {
        let before = position(3, 3, &[]);
        let (mut set, mut builder) = build(&before, Color::Black, VCBuilderParam::default());
        let b3 = cell(&before, "b3");
        // statically, north reaches b3 only through the semi keyed by b2
        assert!(set.exists(Cell::NORTH, b3, VcType::Semi));
        assert!(!set.exists(Cell::NORTH, b3, VcType::Full));

        let after =
            rebuild_incremental(&mut builder, &mut set, &before, &[("b2", Color::Black)], None);

        assert!(builder.statistics(Color::Black).upgraded > 0);
        assert!(set.exists(Cell::NORTH, b3, VcType::Full));
        assert!(set.exists(Cell::NORTH, Cell::SOUTH, VcType::Full));
        // the played stone is gone from every carrier
        let b2 = cell(&after, "b2");
        for ty in [VcType::Full, VcType::Semi] {
            for list in set.lists(ty) {
                assert!(list.iter().all(|vc| !vc.carrier().test(b2)));
            }
        }
        check_invariants(&set, &after);
    }

    #[test]
    fn incremental_reaches_the_static_conclusions() {
        let before = position(3, 3, &[]);
        let (mut set, mut builder) = build(&before, Color::Black, VCBuilderParam::default());
        let after =
            rebuild_incremental(&mut builder, &mut set, &before, &[("b2", Color::Black)], None);

        let (fresh, _) = build(&after, Color::Black, VCBuilderParam::default());
        let b1 = cell(&after, "b1");
        let b2 = cell(&after, "b2");
        let b3 = cell(&after, "b3");
        for (x, y) in [
            (Cell::NORTH, Cell::SOUTH),
            (Cell::NORTH, b2),
            (b2, Cell::SOUTH),
            (Cell::NORTH, b3),
            (b1, b3),
        ] {
            assert!(set.exists(x, y, VcType::Full), "{x:?}-{y:?} after repair");
            assert!(fresh.exists(x, y, VcType::Full), "{x:?}-{y:?} from scratch");
        }
        // the upgraded connection carries the same minimal carrier the
        // static build finds
        let carrier = carrier_of(&after, &["b1", "c1"]);
        for built in [&set, &fresh] {
            assert!(built
                .get(VcType::Full, Cell::NORTH, b3)
                .unwrap()
                .iter()
                .any(|vc| vc.carrier() == carrier));
        }
    }

    #[test]
    fn opponent_stone_kills_touched_connections() {
        let before = position(3, 3, &[("a1", Color::Black), ("b2", Color::Black)]);
        let (mut set, mut builder) = build(&before, Color::Black, VCBuilderParam::default());
        let a1 = cell(&before, "a1");
        let b2 = cell(&before, "b2");
        let bridge = carrier_of(&before, &["b1", "a2"]);
        assert!(set
            .get(VcType::Full, a1, b2)
            .unwrap()
            .iter()
            .any(|vc| vc.carrier() == bridge));

        let after =
            rebuild_incremental(&mut builder, &mut set, &before, &[("a2", Color::White)], None);

        let stats = builder.statistics(Color::Black);
        assert!(stats.killed0 + stats.killed1 >= 1);
        let a2 = cell(&after, "a2");
        for ty in [VcType::Full, VcType::Semi] {
            for list in set.lists(ty) {
                if is_stale(&set, &after, list.x(), list.y()) {
                    continue;
                }
                assert!(list.iter().all(|vc| !vc.carrier().test(a2)));
            }
        }
        // the bridge died with its carrier; the stone still reaches north
        // through the untouched b1/c1 side
        assert!(!set.exists(a1, b2, VcType::Full));
        assert!(set.exists(Cell::NORTH, b2, VcType::Full));
        check_invariants(&set, &after);
    }

    #[test]
    fn rollback_restores_the_exact_set() {
        let before = position(3, 3, &[]);
        let (mut set, mut builder) = build(&before, Color::Black, VCBuilderParam::default());
        let reference = snapshot(&set);

        let mut log = ChangeLog::new();
        rebuild_incremental(
            &mut builder,
            &mut set,
            &before,
            &[("b2", Color::Black)],
            Some(&mut log),
        );
        assert_ne!(snapshot(&set), reference);

        set.revert(&mut log);
        assert!(log.is_empty());
        assert_eq!(snapshot(&set), reference);
    }

    #[test]
    fn both_colors_may_arrive_at_once() {
        let before = position(3, 3, &[]);
        let (mut set, mut builder) = build(&before, Color::Black, VCBuilderParam::default());
        let after = rebuild_incremental(
            &mut builder,
            &mut set,
            &before,
            &[("b2", Color::Black), ("c2", Color::White)],
            None,
        );
        let b2 = cell(&after, "b2");
        let c2 = cell(&after, "c2");
        for ty in [VcType::Full, VcType::Semi] {
            for list in set.lists(ty) {
                if is_stale(&set, &after, list.x(), list.y()) {
                    continue;
                }
                assert!(list
                    .iter()
                    .all(|vc| !vc.carrier().test(b2) && !vc.carrier().test(c2)));
            }
        }
        check_invariants(&set, &after);
    }

    // ------------------------------------------------------------------
    // whole-library smoke test

    #[test]
    fn builtin_library_build() {
        let board = Board::new(5, 5).unwrap();
        let mut position = Position::new(board);
        for (name, color) in [
            ("c3", Color::Black),
            ("b4", Color::White),
            ("d2", Color::Black),
        ] {
            let cell = position.board().cell_named(name).unwrap();
            position.place(cell, color);
        }
        let groups = Groups::compute(&position);
        let patterns = PatternState::new(&position);
        let mut builder = VCBuilder::new(VCBuilderParam::default()).unwrap();
        let mut set = VCSet::new(Color::Black);
        builder.build_static(&mut set, &groups, &patterns);
        assert!(set.pairs(VcType::Full).count() > 0);
        check_invariants(&set, &position);
    }

    // ------------------------------------------------------------------
    // randomized invariants

    fn arb_moves() -> impl Strategy<Value = Vec<(usize, bool)>> {
        proptest::collection::vec((0usize..16, any::<bool>()), 0..10)
    }

    fn apply_moves(moves: &[(usize, bool)]) -> Position {
        let board = Board::new(4, 4).unwrap();
        let mut position = Position::new(board);
        for &(index, black) in moves {
            let cell = Cell::from_index(Cell::FIRST_INTERIOR + index);
            if position.is_empty(cell) {
                position.place(cell, if black { Color::Black } else { Color::White });
            }
        }
        position
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn random_positions_uphold_invariants(moves in arb_moves(), black in any::<bool>()) {
            let position = apply_moves(&moves);
            let color = if black { Color::Black } else { Color::White };
            let (set, _) = build(&position, color, VCBuilderParam::default());
            check_invariants(&set, &position);
        }

        #[test]
        fn random_positions_uphold_invariants_with_enhanced_or(moves in arb_moves()) {
            let position = apply_moves(&moves);
            let param = VCBuilderParam { max_ors: 16, ..Default::default() };
            let (set, _) = build(&position, Color::Black, param);
            check_invariants(&set, &position);
        }

        #[test]
        fn static_build_is_idempotent(moves in arb_moves()) {
            let position = apply_moves(&moves);
            let groups = Groups::compute(&position);
            let patterns = PatternState::new(&position);
            let mut builder = VCBuilder::with_library(
                VCBuilderParam::default(),
                PatternLibrary::empty(),
            );
            let mut set = VCSet::new(Color::Black);
            builder.build_static(&mut set, &groups, &patterns);
            let first = snapshot(&set);
            builder.build_static(&mut set, &groups, &patterns);
            prop_assert_eq!(snapshot(&set), first);
        }
    }
}
