use crate::bitset::Bitset;
use crate::builder::Statistics;
use crate::cell::Cell;
use crate::changelog::Journal;
use crate::list::{AddResult, VCList};
use crate::vc::{VcRule, VC};

/// Depth bound at or above which the partition-refinement combiner takes
/// over from subset enumeration.
pub(crate) const ENHANCED_OR_THRESHOLD: usize = 16;

/// Bounded OR: depth-first enumeration of subsets of the processed semis,
/// seeded with one unprocessed semi.
///
/// Subsets are built up incrementally with a running AND and OR per level;
/// a full is emitted when the AND empties (or sinks into the captured
/// sets), and a semi that fails to shrink the AND is skipped. A
/// tail-intersection table prunes branches whose remaining semis cannot
/// empty the AND. Scratch buffers live here and are reused across calls.
#[derive(Default)]
pub(crate) struct OrRule {
    semi: Vec<VC>,
    tail: Vec<Bitset>,
}

impl OrRule {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run(
        &mut self,
        seed: &VC,
        semis: &VCList,
        fulls: &mut VCList,
        added: &mut Vec<VC>,
        max_ors: usize,
        x_cap: Bitset,
        y_cap: Bitset,
        log: &mut Journal<'_>,
        stats: &mut Statistics,
    ) -> usize {
        if semis.is_empty() {
            return 0;
        }
        // only processed semis take part; the seed is not among them
        self.semi.clear();
        self.semi
            .extend(semis.iter_soft().filter(|vc| vc.processed()).copied());
        if self.semi.is_empty() {
            return 0;
        }

        // tail[i] is the intersection of semi[i..]
        let n = self.semi.len();
        self.tail.resize(n, Bitset::EMPTY);
        self.tail[n - 1] = self.semi[n - 1].carrier();
        for i in (0..n - 1).rev() {
            self.tail[i] = self.semi[i].carrier() & self.tail[i + 1];
        }

        debug_assert!(max_ors < ENHANCED_OR_THRESHOLD);
        let max_depth = max_ors.saturating_sub(1);
        let captured = x_cap | y_cap;
        let uncaptured = !captured;

        let mut index = [0usize; ENHANCED_OR_THRESHOLD];
        let mut ors = [Bitset::EMPTY; ENHANCED_OR_THRESHOLD];
        let mut ands = [Bitset::EMPTY; ENHANCED_OR_THRESHOLD];
        ors[0] = seed.carrier();
        ands[0] = seed.carrier();
        index[1] = 0;
        let mut d = 1;
        let mut count = 0;
        loop {
            let mut i = index[d];
            // the current subset cannot reach an empty intersection with
            // what remains of the list, so backtrack
            if i < n && (ands[d - 1] & self.tail[i] & uncaptured).any() {
                i = n;
            }
            if i == n {
                if d == 1 {
                    break;
                }
                d -= 1;
                index[d] += 1;
                continue;
            }
            ands[d] = ands[d - 1] & self.semi[i].carrier();
            ors[d] = ors[d - 1] | self.semi[i].carrier();
            if ands[d].none() {
                let vc = VC::full(fulls.x(), fulls.y(), ors[d], VcRule::Or);
                stats.or_attempts += 1;
                if fulls.add(vc, log).is_success() {
                    count += 1;
                    stats.or_successes += 1;
                    added.push(vc);
                }
                index[d] += 1;
            } else if ands[d].is_subset_of(&captured) {
                // the leftover intersection sits inside the captured sets,
                // so widen the carrier by whichever sets it touches
                let mut carrier = ors[d];
                if (ands[d] & x_cap).any() {
                    carrier |= x_cap;
                }
                if (ands[d] & y_cap).any() {
                    carrier |= y_cap;
                }
                carrier.reset(fulls.x());
                carrier.reset(fulls.y());
                let vc = VC::full(fulls.x(), fulls.y(), carrier, VcRule::Or);
                stats.or_attempts += 1;
                if fulls.add(vc, log).is_success() {
                    count += 1;
                    stats.or_successes += 1;
                    added.push(vc);
                }
                index[d] += 1;
            } else if ands[d] == ands[d - 1] {
                // does not shrink the intersection, skip it
                index[d] += 1;
            } else if d < max_depth {
                d += 1;
                index[d] = i + 1;
            } else {
                index[d] += 1;
            }
        }
        count
    }
}

/// Enhanced OR: recursive partition refinement over the whole semi list.
///
/// The scratch vector holds four ranges per recursion level: unprocessed
/// new semis, processed old semis, already-formed fulls, and the fulls
/// emitted at this level. Each level picks the smallest allowed set among
/// the formed fulls; when it is empty a full covers every refinement,
/// otherwise one of its cells is forbidden and the three ranges are
/// filtered and recursed on. Whenever the whole list's intersection is
/// empty at least one full is produced.
pub(crate) struct OrCombiner<'a, 'log> {
    x: Cell,
    y: Cell,
    x_cap: Bitset,
    y_cap: Bitset,
    fulls: &'a mut VCList,
    added: &'a mut Vec<VC>,
    log: &'a mut Journal<'log>,
    stats: &'a mut Statistics,
    mem: &'a mut Vec<Bitset>,
}

impl<'a, 'log> OrCombiner<'a, 'log> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        x_cap: Bitset,
        y_cap: Bitset,
        fulls: &'a mut VCList,
        added: &'a mut Vec<VC>,
        log: &'a mut Journal<'log>,
        stats: &'a mut Statistics,
        mem: &'a mut Vec<Bitset>,
    ) -> OrCombiner<'a, 'log> {
        OrCombiner {
            x: fulls.x(),
            y: fulls.y(),
            x_cap,
            y_cap,
            fulls,
            added,
            log,
            stats,
            mem,
        }
    }

    /// Returns whether any full was produced.
    pub(crate) fn run(mut self, semis: &VCList) -> bool {
        self.mem.clear();

        let mut new_count = 0;
        for vc in semis.iter().filter(|vc| !vc.processed()) {
            self.mem.push(vc.carrier());
            new_count += 1;
        }
        if new_count == 0 {
            return false;
        }
        let mut old_count = 0;
        for vc in semis.iter().filter(|vc| vc.processed()) {
            self.mem.push(vc.carrier());
            old_count += 1;
        }
        let mut filtered_count = 0;
        for vc in self.fulls.iter() {
            self.mem.push(vc.carrier());
            filtered_count += 1;
        }

        self.search(Bitset::EMPTY, true, true, 0, new_count, old_count, filtered_count) > 0
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        forbidden: Bitset,
        capture_x: bool,
        capture_y: bool,
        new_semis: usize,
        new_semis_count: usize,
        old_semis_count: usize,
        filtered_count: usize,
    ) -> usize {
        // a refinement can run out of new semis; the universe intersection
        // then fails the captured-subset test below and backs out
        let old_semis = new_semis + new_semis_count;

        let i_new = self.intersect(new_semis, new_semis_count);
        let i_old = self.intersect(old_semis, old_semis_count);
        let inter = i_new & i_old;
        let mut captured = Bitset::EMPTY;
        if capture_x {
            captured |= self.x_cap;
        }
        if capture_y {
            captured |= self.y_cap;
        }

        if !inter.is_subset_of(&captured) {
            self.mem.truncate(new_semis);
            return 0;
        }

        let filtered = old_semis + old_semis_count;
        let new_conn = filtered + filtered_count;
        let mut filtered_count = filtered_count;
        let mut new_conn_count = 0;

        if filtered_count == 0 {
            let mut min_captured = Bitset::EMPTY;
            if (inter & self.x_cap).any() {
                min_captured |= self.x_cap;
            }
            if (inter & self.y_cap).any() {
                min_captured |= self.y_cap;
            }
            let union = self.emit(new_semis, new_semis_count + old_semis_count, min_captured);
            self.mem.push(union);
            filtered_count += 1;
            new_conn_count += 1;
        }

        let mut forbidden = forbidden | i_new;

        loop {
            let mut min_size = usize::MAX;
            let mut allowed = Bitset::EMPTY;
            for k in 0..filtered_count {
                let candidate = self.mem[filtered + k] - forbidden;
                let size = candidate.count();
                if size < min_size {
                    min_size = size;
                    allowed = candidate;
                }
            }

            if min_size == 0 {
                for k in 0..new_conn_count {
                    self.mem[new_semis + k] = self.mem[new_conn + k];
                }
                self.mem.truncate(new_semis + new_conn_count);
                return new_conn_count;
            }

            let a = allowed.first_set().expect("allowed set is non-empty");
            forbidden.set(a);

            let rec_new_semis = filtered + filtered_count;
            let rec_new_count = self.filter(new_semis, new_semis_count, a);
            let rec_old_count = self.filter(old_semis, old_semis_count, a);
            let rec_filtered_count = self.filter(filtered, filtered_count, a);
            let produced = self.search(
                forbidden,
                capture_x && !self.x_cap.test(a),
                capture_y && !self.y_cap.test(a),
                rec_new_semis,
                rec_new_count,
                rec_old_count,
                rec_filtered_count,
            );
            filtered_count += produced;
            new_conn_count += produced;
        }
    }

    fn intersect(&self, start: usize, count: usize) -> Bitset {
        self.mem[start..start + count]
            .iter()
            .fold(Bitset::UNIVERSE, |i, s| i & *s)
    }

    /// Greedily union carriers from the range until the intersection sinks
    /// into the captured set, emit the full and return its carrier.
    fn emit(&mut self, start: usize, count: usize, captured: Bitset) -> Bitset {
        let mut union = captured;
        let mut inter = Bitset::UNIVERSE;
        for k in 0..count {
            let next = self.mem[start + k];
            if inter.is_subset_of(&next) {
                continue;
            }
            inter &= next;
            union |= next;
            if inter.is_subset_of(&captured) {
                break;
            }
        }
        debug_assert!(inter.is_subset_of(&captured));

        union.reset(self.x);
        union.reset(self.y);
        let vc = VC::full(self.x, self.y, union, VcRule::Or);
        self.stats.or_attempts += 1;
        let result = self.fulls.add(vc, self.log);
        debug_assert!(result.is_success(), "refined carrier cannot be dominated");
        if result != AddResult::Failed {
            self.stats.or_successes += 1;
            self.added.push(vc);
        }
        union
    }

    fn filter(&mut self, start: usize, count: usize, cell: Cell) -> usize {
        let mut kept = 0;
        for k in 0..count {
            let s = self.mem[start + k];
            if !s.test(cell) {
                self.mem.push(s);
                kept += 1;
            }
        }
        kept
    }
}
