use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

use itertools::Itertools;
use log::debug;
use unordered_pair::UnorderedPair;

use crate::bitset::{Bitset, BITSET_BITS};
use crate::board::Position;
use crate::cell::{Cell, CellState, Color};
use crate::changelog::{ChangeLog, Journal};
use crate::combine::{OrCombiner, OrRule, ENHANCED_OR_THRESHOLD};
use crate::groups::Groups;
use crate::pattern::{vc_patterns, PatternError, PatternLibrary, PatternState, VcPattern};
use crate::set::VCSet;
use crate::vc::{VcRule, VcType, VC};

/// Tuning knobs of a [`VCBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct VCBuilderParam {
    /// OR-rule depth bound; at 16 and above the partition-refinement
    /// combiner replaces subset enumeration.
    pub max_ors: usize,
    /// Allow AND-closure through edge cells.
    pub and_over_edge: bool,
    /// Seed the set with bridge templates.
    pub use_patterns: bool,
    /// Include bridge templates with no edge endpoint.
    pub use_non_edge_patterns: bool,
    /// Greedy rather than plain union when synthesizing a full from an
    /// entire semi list.
    pub use_greedy_union: bool,
    /// Stop the search as soon as a full between the color's two edges
    /// exists.
    pub abort_on_winning_connection: bool,
}

impl Default for VCBuilderParam {
    fn default() -> Self {
        Self {
            max_ors: 4,
            and_over_edge: false,
            use_patterns: true,
            use_non_edge_patterns: true,
            use_greedy_union: true,
            abort_on_winning_connection: false,
        }
    }
}

/// Derivation counters, kept per color across builds.
#[derive(Clone, Copy, Default, Debug)]
pub struct Statistics {
    pub base_attempts: u64,
    pub base_successes: u64,
    pub pattern_attempts: u64,
    pub pattern_successes: u64,
    pub and_full_attempts: u64,
    pub and_full_successes: u64,
    pub and_semi_attempts: u64,
    pub and_semi_successes: u64,
    pub or_attempts: u64,
    pub or_successes: u64,
    pub do_ors: u64,
    pub good_ors: u64,
    pub shrunk0: u64,
    pub shrunk1: u64,
    pub upgraded: u64,
    pub killed0: u64,
    pub killed1: u64,
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[\nbase={}/{}\npat={}/{}\nand-f={}/{}\nand-s={}/{}\nor={}/{}\ndoOr()={}/{}\ns0/s1/u1={}/{}/{}\nkilled0/1={}/{}\n]",
            self.base_successes,
            self.base_attempts,
            self.pattern_successes,
            self.pattern_attempts,
            self.and_full_successes,
            self.and_full_attempts,
            self.and_semi_successes,
            self.and_semi_attempts,
            self.or_successes,
            self.or_attempts,
            self.good_ors,
            self.do_ors,
            self.shrunk0,
            self.shrunk1,
            self.upgraded,
            self.killed0,
            self.killed1,
        )
    }
}

/// FIFO of fulls whose AND-closure is pending. An append-only vector with
/// a head cursor: clearing keeps the capacity, and the hot path never
/// allocates per element.
#[derive(Default)]
struct FullQueue {
    head: usize,
    items: Vec<VC>,
}

impl FullQueue {
    fn push(&mut self, vc: VC) {
        self.items.push(vc);
    }

    fn pop(&mut self) -> Option<VC> {
        let vc = self.items.get(self.head).copied();
        self.head += vc.is_some() as usize;
        vc
    }

    fn is_empty(&self) -> bool {
        self.head == self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }
}

/// FIFO of endpoint pairs whose semi list may admit an OR-combination.
///
/// A pair is present at most once between push and pop; the guard is a
/// dense boolean matrix indexed by the normalized pair, which the fixed
/// point search relies on for termination.
struct SemiQueue {
    head: usize,
    items: Vec<(Cell, Cell)>,
    seen: Vec<bool>,
}

impl Default for SemiQueue {
    fn default() -> Self {
        Self {
            head: 0,
            items: Vec::new(),
            seen: vec![false; BITSET_BITS * BITSET_BITS],
        }
    }
}

impl SemiQueue {
    fn slot(x: Cell, y: Cell) -> usize {
        let a = x.min(y);
        let b = x.max(y);
        a.index() * BITSET_BITS + b.index()
    }

    fn push(&mut self, x: Cell, y: Cell) {
        let slot = Self::slot(x, y);
        if !self.seen[slot] {
            self.seen[slot] = true;
            self.items.push((x.min(y), x.max(y)));
        }
    }

    fn pop(&mut self) -> Option<(Cell, Cell)> {
        let pair = self.items.get(self.head).copied();
        if let Some((x, y)) = pair {
            self.seen[Self::slot(x, y)] = false;
            self.head += 1;
        }
        pair
    }

    fn is_empty(&self) -> bool {
        self.head == self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
        self.seen.fill(false);
    }
}

/// Batch and incremental construction of a [`VCSet`].
///
/// A builder is created once, with its captured-set pattern library, and
/// then reused across positions and colors. For a fresh position call
/// [`build_static`](VCBuilder::build_static); after playing one or two
/// stones call [`build_incremental`](VCBuilder::build_incremental) against
/// the set built for the previous position. All scratch storage is owned
/// here and reused between calls.
pub struct VCBuilder {
    param: VCBuilderParam,
    library: PatternLibrary,
    color: Color,
    stats: [Statistics; 2],
    fulls_queue: FullQueue,
    semis_queue: SemiQueue,
    nbs: Vec<Bitset>,
    captured: Vec<Bitset>,
    or_rule: OrRule,
    set_mem: Vec<Bitset>,
    and_snapshot: Vec<VC>,
    pattern_cache: [Option<((usize, usize), Vec<VcPattern>)>; 2],
}

impl VCBuilder {
    /// A builder with the captured-set library shipped in the crate.
    pub fn new(param: VCBuilderParam) -> Result<VCBuilder, PatternError> {
        Ok(VCBuilder::with_library(param, PatternLibrary::builtin()?))
    }

    /// A builder loading its captured-set library from a pattern file.
    pub fn from_pattern_file(
        param: VCBuilderParam,
        path: impl AsRef<Path>,
    ) -> Result<VCBuilder, PatternError> {
        Ok(VCBuilder::with_library(param, PatternLibrary::load(path)?))
    }

    pub fn with_library(param: VCBuilderParam, library: PatternLibrary) -> VCBuilder {
        VCBuilder {
            param,
            library,
            color: Color::Black,
            stats: [Statistics::default(); 2],
            fulls_queue: FullQueue::default(),
            semis_queue: SemiQueue::default(),
            nbs: Vec::new(),
            captured: Vec::new(),
            or_rule: OrRule::default(),
            set_mem: Vec::new(),
            and_snapshot: Vec::new(),
            pattern_cache: [None, None],
        }
    }

    pub fn param(&self) -> &VCBuilderParam {
        &self.param
    }

    pub fn param_mut(&mut self) -> &mut VCBuilderParam {
        &mut self.param
    }

    pub fn statistics(&self, color: Color) -> &Statistics {
        &self.stats[color.index()]
    }

    /// Build the connection set of `con.color()` from scratch.
    ///
    /// `groups` and `patterns` must describe the same position.
    pub fn build_static(&mut self, con: &mut VCSet, groups: &Groups, patterns: &PatternState<'_>) {
        let start = Instant::now();
        let position = patterns.position();
        self.color = con.color();
        self.stats[self.color.index()] = Statistics::default();
        con.clear();
        self.fulls_queue.clear();
        self.semis_queue.clear();
        let cells = position.board().cell_count();
        self.nbs.clear();
        self.nbs.resize(cells, Bitset::EMPTY);

        let mut log = Journal::none();
        self.compute_captured_sets(position, patterns);
        self.add_base_vcs(con, position, groups, &mut log);
        if self.param.use_patterns {
            self.add_pattern_vcs(con, position, groups, &mut log);
        }
        self.do_search(con, groups, position, &mut log);

        debug!("{:.3}s to build vcs", start.elapsed().as_secs_f64());
    }

    /// Repair the connection set after `added` stones were played.
    ///
    /// `con` must hold the state built before the stones were placed;
    /// `old_groups` describes that earlier position, `groups` and
    /// `patterns` the current one. Stones of both colors may be added but
    /// the two sets must be disjoint. When a changelog is supplied a mark
    /// is pushed first and every mutation is journaled, so
    /// [`VCSet::revert`](crate::VCSet::revert) undoes exactly this build.
    pub fn build_incremental(
        &mut self,
        con: &mut VCSet,
        old_groups: &Groups,
        groups: &Groups,
        patterns: &PatternState<'_>,
        added: &[Bitset; 2],
        log: Option<&mut ChangeLog>,
    ) {
        debug_assert!((added[0] & added[1]).none());
        let start = Instant::now();
        let position = patterns.position();
        self.color = con.color();
        self.fulls_queue.clear();
        self.semis_queue.clear();
        // the merge phase already records neighbors via push_full
        let cells = position.board().cell_count();
        self.nbs.clear();
        self.nbs.resize(cells, Bitset::EMPTY);

        let mut log = Journal(log);
        if let Some(inner) = log.0.as_deref_mut() {
            inner.mark();
        }

        self.compute_captured_sets(position, patterns);
        self.merge(con, old_groups, groups, position, added, &mut log);
        if self.param.use_patterns {
            self.add_pattern_vcs(con, position, groups, &mut log);
        }
        self.rebuild_nbs(con, groups, position.board().cell_count());
        self.do_search(con, groups, position, &mut log);

        debug!(
            "{:.3}s to build vcs incrementally",
            start.elapsed().as_secs_f64()
        );
    }

    // ------------------------------------------------------------------
    // seeding

    fn compute_captured_sets(&mut self, position: &Position, patterns: &PatternState<'_>) {
        self.captured.clear();
        self.captured
            .resize(position.board().cell_count(), Bitset::EMPTY);
        for probe in position.empty().iter() {
            if let Some(bits) = patterns.match_captured(&self.library, probe, self.color) {
                self.captured[probe.index()] = bits;
            }
        }
    }

    /// The fulls defined by plain adjacency: every own or empty group to
    /// each of its empty neighbors, with an empty carrier.
    fn add_base_vcs(
        &mut self,
        con: &mut VCSet,
        position: &Position,
        groups: &Groups,
        log: &mut Journal<'_>,
    ) {
        let ci = self.color.index();
        let empty = position.empty();
        for group in groups.iter_not(self.color.other()) {
            let captain = group.captain();
            for y in (group.nbs() & empty).iter() {
                let vc = VC::full(captain, y, Bitset::EMPTY, VcRule::Base);
                self.stats[ci].base_attempts += 1;
                if con.add(vc, log).is_success() {
                    self.stats[ci].base_successes += 1;
                    self.push_full(&vc, groups);
                }
            }
        }
    }

    /// Seed fulls from the bridge templates of the current board.
    fn add_pattern_vcs(
        &mut self,
        con: &mut VCSet,
        position: &Position,
        groups: &Groups,
        log: &mut Journal<'_>,
    ) {
        let ci = self.color.index();
        let board = position.board();
        let dims = (board.width(), board.height());
        if self.pattern_cache[ci].as_ref().map(|(d, _)| *d) != Some(dims) {
            self.pattern_cache[ci] = Some((dims, vc_patterns(board, self.color)));
        }
        let cache = self.pattern_cache[ci].take();

        let opponent = CellState::from(self.color.other());
        let opponent_stones = position.stones(self.color.other());
        let empty = position.empty();
        for pattern in cache.as_ref().map(|(_, p)| p.as_slice()).unwrap_or(&[]) {
            if !self.param.use_non_edge_patterns && !pattern.is_edge_pattern() {
                continue;
            }
            if position.state(pattern.x) == opponent || position.state(pattern.y) == opponent {
                continue;
            }
            if (pattern.carrier & opponent_stones).any() {
                continue;
            }
            let vc = VC::full(pattern.x, pattern.y, pattern.carrier & empty, VcRule::Pattern);
            self.stats[ci].pattern_attempts += 1;
            if con.add(vc, log).is_success() {
                self.stats[ci].pattern_successes += 1;
                self.push_full(&vc, groups);
            }
        }

        self.pattern_cache[ci] = cache;
    }

    // ------------------------------------------------------------------
    // incremental merge

    /// Update the set to the new board state in one pass: kill connections
    /// touched by opponent stones, then resize and re-home connections
    /// touched by own stones or absorbed into merged groups.
    fn merge(
        &mut self,
        con: &mut VCSet,
        old_groups: &Groups,
        groups: &Groups,
        position: &Position,
        added: &[Bitset; 2],
        log: &mut Journal<'_>,
    ) {
        // Killing must look at the old grouping: with stones of both
        // colors arriving, two of our groups may be about to merge, and
        // their lists must lose opponent-touched connections first.
        self.kill_containing(con, old_groups, position, added[self.color.other().index()], log);

        let own = added[self.color.index()];
        let mut affected = own;
        for x in own.iter() {
            for y in position.board().nbs(x).iter() {
                let group = old_groups.group(y);
                if group.color() == CellState::from(self.color) {
                    affected.set(group.captain());
                }
            }
        }
        self.merge_and_shrink(con, groups, position, affected, own, log);
    }

    /// Remove every connection whose carrier meets `mask`, walking the
    /// endpoint pairs of the old grouping.
    fn kill_containing(
        &mut self,
        con: &mut VCSet,
        old_groups: &Groups,
        position: &Position,
        mask: Bitset,
        log: &mut Journal<'_>,
    ) {
        let ci = self.color.index();
        let opponent = CellState::from(self.color.other());
        let captains = old_groups
            .iter_not(self.color.other())
            .map(|g| g.captain())
            // skip old groups the opponent now occupies
            .filter(|&c| position.state(c) != opponent)
            .collect_vec();
        for (&x, &y) in captains.iter().tuple_combinations() {
            if let Some(list) = con.existing_mut(VcType::Full, x, y) {
                self.stats[ci].killed0 += list.remove_all_containing(mask, log).len() as u64;
            }
            if let Some(list) = con.existing_mut(VcType::Semi, x, y) {
                self.stats[ci].killed1 += list.remove_all_containing(mask, log).len() as u64;
            }
        }
    }

    fn merge_and_shrink(
        &mut self,
        con: &mut VCSet,
        groups: &Groups,
        position: &Position,
        affected: Bitset,
        added: Bitset,
        log: &mut Journal<'_>,
    ) {
        let opponent = CellState::from(self.color.other());
        let mut candidates = vec![self.color.edge1(), self.color.edge2()];
        candidates.extend(
            position
                .board()
                .interior()
                .iter()
                .filter(|&c| position.state(c) != opponent),
        );

        for (&x, &y) in candidates.iter().tuple_combinations() {
            if !groups.is_captain(x) && !affected.test(x) {
                continue;
            }
            if !groups.is_captain(y) && !affected.test(y) {
                continue;
            }
            let cx = groups.captain_of(x);
            let cy = groups.captain_of(y);
            // a cell recently played next to group x now shares its
            // captain; connections into (captain, captain) are dead weight
            if cx != cy {
                self.merge_and_shrink_pair(con, groups, added, x, y, cx, cy, log);
            }
        }
    }

    /// Move the lists keyed by `(xin, yin)` onto `(xout, yout)`, dropping
    /// played cells from every carrier and upgrading semis whose key was
    /// played.
    ///
    /// Shrinking can leave semis in the out-list that are carrier
    /// supersets of a full; they are rare and not purged.
    #[allow(clippy::too_many_arguments)]
    fn merge_and_shrink_pair(
        &mut self,
        con: &mut VCSet,
        groups: &Groups,
        added: Bitset,
        xin: Cell,
        yin: Cell,
        xout: Cell,
        yout: Cell,
        log: &mut Journal<'_>,
    ) {
        debug_assert!(xin != yin);
        debug_assert!(xout != yout);
        let ci = self.color.index();
        let doing_merge = UnorderedPair(xin, yin) != UnorderedPair(xout, yout);

        // fulls: survivors move wholesale, removed ones shrink
        let removed = match con.existing_mut(VcType::Full, xin, yin) {
            Some(list) => list.remove_all_containing(added, log),
            None => Vec::new(),
        };
        if doing_merge {
            // survivors are restated between the new captains and keep
            // their processed flags; pushing them refreshes the neighbor
            // table even when the closure skips them
            let survivors = con
                .get(VcType::Full, xin, yin)
                .map(|l| {
                    l.iter()
                        .map(|vc| VC::with_endpoints(vc, xout, yout))
                        .collect_vec()
                })
                .unwrap_or_default();
            if !survivors.is_empty() {
                con.list_mut(VcType::Full, xout, yout)
                    .append_from(&survivors, log);
                for vc in &survivors {
                    self.push_full(vc, groups);
                }
            }
        }
        for vc in &removed {
            let shrunk = VC::shrink_full(vc, added, xout, yout);
            if con.list_mut(VcType::Full, xout, yout).add(shrunk, log).is_success() {
                self.stats[ci].shrunk0 += 1;
                self.push_full(&shrunk, groups);
            }
        }

        // semis: same dance, except keys that were just played upgrade
        let removed = match con.existing_mut(VcType::Semi, xin, yin) {
            Some(list) => list.remove_all_containing(added, log),
            None => Vec::new(),
        };
        if doing_merge {
            let survivors = con
                .get(VcType::Semi, xin, yin)
                .map(|l| {
                    l.iter()
                        .map(|vc| VC::with_endpoints(vc, xout, yout))
                        .collect_vec()
                })
                .unwrap_or_default();
            if !survivors.is_empty() {
                con.list_mut(VcType::Semi, xout, yout)
                    .append_from(&survivors, log);
            }
        }
        let mut was_shrink = false;
        for vc in removed.iter().filter(|vc| vc.key().is_some_and(|k| !added.test(k))) {
            let shrunk = VC::shrink_semi(vc, added, xout, yout);
            if con.list_mut(VcType::Semi, xout, yout).add(shrunk, log).is_success() {
                was_shrink = true;
                self.stats[ci].shrunk1 += 1;
            }
        }
        if doing_merge || was_shrink {
            self.semis_queue.push(xout, yout);
        }

        // upgrades come after all shrinking so the upgraded full can purge
        // every semi superset from the out-list
        for vc in removed.iter().filter(|vc| vc.key().is_some_and(|k| added.test(k))) {
            let upgraded = VC::upgrade_semi(vc, added, xout, yout);
            if con.list_mut(VcType::Full, xout, yout).add(upgraded, log).is_success() {
                con.list_mut(VcType::Semi, xout, yout)
                    .remove_supersets_of(upgraded.carrier(), log);
                self.stats[ci].upgraded += 1;
                self.push_full(&upgraded, groups);
            }
        }
    }

    fn rebuild_nbs(&mut self, con: &VCSet, groups: &Groups, cells: usize) {
        self.nbs.clear();
        self.nbs.resize(cells, Bitset::EMPTY);
        let captains = groups
            .iter_not(self.color.other())
            .map(|g| g.captain())
            .collect_vec();
        for (&x, &y) in captains.iter().tuple_combinations() {
            if con.exists(x, y, VcType::Full) {
                self.nbs[x.index()].set(y);
                self.nbs[y.index()].set(x);
            }
        }
    }

    // ------------------------------------------------------------------
    // fixed point

    /// Drain both queues, fulls first; each full fires the AND-closure,
    /// each endpoint pair the OR-combination.
    fn do_search(
        &mut self,
        con: &mut VCSet,
        groups: &Groups,
        position: &Position,
        log: &mut Journal<'_>,
    ) {
        loop {
            if let Some(vc) = self.fulls_queue.pop() {
                self.process_fulls(con, &vc, groups, position, log);
            } else if let Some((x, y)) = self.semis_queue.pop() {
                self.process_semis(con, x, y, groups, log);
            } else {
                break;
            }
            if self.param.abort_on_winning_connection
                && con.exists(self.color.edge1(), self.color.edge2(), VcType::Full)
            {
                debug!("aborted on winning connection");
                return;
            }
        }
        debug_assert!(self.fulls_queue.is_empty() && self.semis_queue.is_empty());
    }

    fn process_fulls(
        &mut self,
        con: &mut VCSet,
        vc: &VC,
        groups: &Groups,
        position: &Position,
        log: &mut Journal<'_>,
    ) {
        // the queued value may have been dominated away since it was pushed
        let current = match con.get(VcType::Full, vc.x(), vc.y()) {
            Some(list) => match list.find(vc) {
                Some(slot) if !list.vc(slot).processed() => *list.vc(slot),
                _ => return,
            },
            None => return,
        };
        self.and_closure(con, &current, groups, position, log);
        if let Some(list) = con.existing_mut(VcType::Full, vc.x(), vc.y()) {
            if let Some(slot) = list.find(vc) {
                list.mark_processed(slot, log);
            }
        }
    }

    /// Try to AND `vc` with every processed full between a neighboring
    /// group `z` and either endpoint. This is the hot path of the build.
    fn and_closure(
        &mut self,
        con: &mut VCSet,
        vc: &VC,
        groups: &Groups,
        position: &Position,
        log: &mut Journal<'_>,
    ) {
        let endpoints = [groups.captain_of(vc.x()), groups.captain_of(vc.y())];
        debug_assert!(endpoints
            .iter()
            .all(|&p| position.state(p) != CellState::from(self.color.other())));
        let vc_captured =
            self.captured[endpoints[0].index()] | self.captured[endpoints[1].index()];

        for i in 0..2 {
            if !self.param.and_over_edge && endpoints[i].is_edge() {
                continue;
            }
            let over = endpoints[i];
            let to = endpoints[1 - i];
            for z in self.nbs[over.index()].iter() {
                debug_assert_eq!(z, groups.captain_of(z));
                if z == endpoints[0] || z == endpoints[1] {
                    continue;
                }
                if vc.carrier().test(z) {
                    continue;
                }
                let captured = vc_captured | self.captured[z.index()];
                let uncaptured = !captured;
                let Some(list) = con.get(VcType::Full, z, over) else {
                    continue;
                };
                // cheap pruning: nothing in the propagated head of the
                // list can be disjoint from vc's carrier
                if (list.soft_intersection() & vc.carrier() & uncaptured).any() {
                    continue;
                }
                let create_full = !position.state(over).is_empty();
                self.and_snapshot.clear();
                self.and_snapshot
                    .extend(list.iter_soft().filter(|a| a.processed()).copied());
                self.do_and(con, z, over, to, create_full, vc, captured, groups, log);
            }
        }
    }

    /// Compare `vc` against the snapshot of processed fulls between
    /// `from` and `over`, emitting a connection between `from` and `to`
    /// whenever the overlap vanishes, hides in the captured sets, or
    /// shrinks to a single key cell.
    #[allow(clippy::too_many_arguments)]
    fn do_and(
        &mut self,
        con: &mut VCSet,
        from: Cell,
        over: Cell,
        to: Cell,
        create_full: bool,
        vc: &VC,
        captured: Bitset,
        groups: &Groups,
        log: &mut Journal<'_>,
    ) {
        let ci = self.color.index();
        for slot in 0..self.and_snapshot.len() {
            let a = self.and_snapshot[slot];
            if a.carrier().test(to) {
                continue;
            }
            let inter = a.carrier() & vc.carrier();

            if inter.none() {
                if create_full {
                    self.stats[ci].and_full_attempts += 1;
                    let new = VC::and_full(from, to, &a, vc, Bitset::EMPTY);
                    if self.add_new_full(con, new, groups, log) {
                        self.stats[ci].and_full_successes += 1;
                    }
                } else {
                    self.stats[ci].and_semi_attempts += 1;
                    let new = VC::and_semi(from, to, &a, vc, Bitset::EMPTY, over);
                    if self.add_new_semi(con, new, log) {
                        self.stats[ci].and_semi_successes += 1;
                    }
                }
                continue;
            }

            if create_full && inter.count() == 1 {
                // a lone overlap cell still yields a semi keyed by it
                let key = inter.first_set().expect("overlap is a singleton");
                self.stats[ci].and_semi_attempts += 1;
                let new = VC::and_semi(from, to, &a, vc, Bitset::EMPTY, key);
                if self.add_new_semi(con, new, log) {
                    self.stats[ci].and_semi_successes += 1;
                }
            }

            if inter.is_subset_of(&captured) {
                if create_full {
                    self.stats[ci].and_full_attempts += 1;
                    let new = VC::and_full(from, to, &a, vc, captured);
                    if self.add_new_full(con, new, groups, log) {
                        self.stats[ci].and_full_successes += 1;
                    }
                } else {
                    self.stats[ci].and_semi_attempts += 1;
                    let new = VC::and_semi(from, to, &a, vc, captured, over);
                    if self.add_new_semi(con, new, log) {
                        self.stats[ci].and_semi_successes += 1;
                    }
                }
                continue;
            }

            if create_full {
                let rest = inter - captured;
                if rest.count() == 1 {
                    let key = rest.first_set().expect("leftover is a singleton");
                    self.stats[ci].and_semi_attempts += 1;
                    let new = VC::and_semi(from, to, &a, vc, captured, key);
                    if self.add_new_semi(con, new, log) {
                        self.stats[ci].and_semi_successes += 1;
                    }
                }
            }
        }
    }

    /// Combine the semis between `x` and `y` into fulls, then mark them
    /// processed. When the propagated head produced nothing but the whole
    /// list's intersection is empty, one full is synthesized from the
    /// union of the entire list.
    fn process_semis(
        &mut self,
        con: &mut VCSet,
        x: Cell,
        y: Cell,
        groups: &Groups,
        log: &mut Journal<'_>,
    ) {
        let ci = self.color.index();
        let x_cap = self.captured[x.index()];
        let y_cap = self.captured[y.index()];
        let captured = x_cap | y_cap;
        let uncaptured = !captured;

        let mut added: Vec<VC> = Vec::new();
        {
            let (fulls, semis) = con.pair_mut(x, y);
            // a non-captured cell common to every carrier blocks any union
            if (semis.hard_intersection() & uncaptured).any() {
                return;
            }

            if self.param.max_ors >= ENHANCED_OR_THRESHOLD {
                self.stats[ci].do_ors += 1;
                let combiner = OrCombiner::new(
                    x_cap,
                    y_cap,
                    fulls,
                    &mut added,
                    log,
                    &mut self.stats[ci],
                    &mut self.set_mem,
                );
                if combiner.run(semis) {
                    self.stats[ci].good_ors += 1;
                }
                for slot in 0..semis.len() {
                    semis.mark_processed(slot, log);
                }
            } else {
                for slot in 0..semis.soft_len() {
                    if semis.vc(slot).processed() {
                        continue;
                    }
                    self.stats[ci].do_ors += 1;
                    let seed = *semis.vc(slot);
                    let produced = self.or_rule.run(
                        &seed,
                        semis,
                        fulls,
                        &mut added,
                        self.param.max_ors,
                        x_cap,
                        y_cap,
                        log,
                        &mut self.stats[ci],
                    );
                    if produced > 0 {
                        self.stats[ci].good_ors += 1;
                    }
                    semis.mark_processed(slot, log);
                }
                if fulls.is_empty() {
                    let mut carrier = if self.param.use_greedy_union {
                        semis.greedy_union()
                    } else {
                        semis.union()
                    };
                    carrier |= captured;
                    carrier.reset(x);
                    carrier.reset(y);
                    let vc = VC::full(x, y, carrier, VcRule::All);
                    fulls.add(vc, log);
                    added.push(vc);
                    // no semi can be a superset of this union, so nothing
                    // to purge
                }
            }
        }

        for vc in &added {
            self.push_full(vc, groups);
        }
    }

    // ------------------------------------------------------------------
    // insertion helpers

    /// Add a freshly derived full; on success evict dominated semis on the
    /// same endpoints and queue the full for closure.
    fn add_new_full(
        &mut self,
        con: &mut VCSet,
        vc: VC,
        groups: &Groups,
        log: &mut Journal<'_>,
    ) -> bool {
        debug_assert_eq!(vc.vc_type(), VcType::Full);
        if con.add(vc, log).is_success() {
            if let Some(semis) = con.existing_mut(VcType::Semi, vc.x(), vc.y()) {
                semis.remove_supersets_of(vc.carrier(), log);
            }
            self.push_full(&vc, groups);
            true
        } else {
            false
        }
    }

    /// Add a freshly derived semi unless a full between the endpoints
    /// already dominates it; on success queue the endpoint pair.
    fn add_new_semi(&mut self, con: &mut VCSet, vc: VC, log: &mut Journal<'_>) -> bool {
        debug_assert_eq!(vc.vc_type(), VcType::Semi);
        if con
            .get(VcType::Full, vc.x(), vc.y())
            .is_some_and(|fulls| fulls.is_superset_of_any(vc.carrier()))
        {
            return false;
        }
        if con.add(vc, log).is_success() {
            self.semis_queue.push(vc.x(), vc.y());
            true
        } else {
            false
        }
    }

    fn push_full(&mut self, vc: &VC, groups: &Groups) {
        self.fulls_queue.push(*vc);
        let x = groups.captain_of(vc.x());
        let y = groups.captain_of(vc.y());
        self.nbs[x.index()].set(y);
        self.nbs[y.index()].set(x);
    }
}
