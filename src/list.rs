use crate::bitset::Bitset;
use crate::cell::Cell;
use crate::changelog::Journal;
use crate::vc::{VcType, VC};

/// Soft limit for full-connection lists.
pub(crate) const SOFT_LIMIT_FULL: usize = 25;
/// Soft limit for semi-connection lists.
pub(crate) const SOFT_LIMIT_SEMI: usize = 50;

/// Outcome of [`VCList::add`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddResult {
    AddedInsideSoft,
    AddedOutsideSoft,
    /// Rejected: an existing connection already dominates the candidate.
    Failed,
}

impl AddResult {
    pub fn is_success(self) -> bool {
        self != AddResult::Failed
    }
}

/// The connections of one type between a fixed endpoint pair, ordered by
/// carrier size.
///
/// Only minimal carriers are kept: a candidate whose carrier is a superset
/// of an existing one is rejected, and inserting a smaller carrier evicts
/// the connections it dominates. The head of the list up to the soft limit
/// is the actively propagated part; connections past it are kept but not
/// fired by the builder's rules.
#[derive(Clone, Debug)]
pub struct VCList {
    x: Cell,
    y: Cell,
    soft_limit: usize,
    vcs: Vec<VC>,
    hard: Bitset,
    soft: Bitset,
}

impl VCList {
    pub(crate) fn new(x: Cell, y: Cell, soft_limit: usize) -> VCList {
        debug_assert!(x != y);
        VCList {
            x: x.min(y),
            y: x.max(y),
            soft_limit,
            vcs: Vec::new(),
            hard: Bitset::UNIVERSE,
            soft: Bitset::UNIVERSE,
        }
    }

    pub fn x(&self) -> Cell {
        self.x
    }

    pub fn y(&self) -> Cell {
        self.y
    }

    pub fn len(&self) -> usize {
        self.vcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vcs.is_empty()
    }

    pub fn soft_limit(&self) -> usize {
        self.soft_limit
    }

    pub(crate) fn soft_len(&self) -> usize {
        self.soft_limit.min(self.vcs.len())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VC> {
        self.vcs.iter()
    }

    /// The actively propagated head of the list.
    pub fn iter_soft(&self) -> std::slice::Iter<'_, VC> {
        self.vcs[..self.soft_len()].iter()
    }

    pub(crate) fn vc(&self, slot: usize) -> &VC {
        &self.vcs[slot]
    }

    /// AND of every carrier in the list; the universe when empty.
    pub fn hard_intersection(&self) -> Bitset {
        self.hard
    }

    /// AND of the carriers in the soft prefix.
    pub fn soft_intersection(&self) -> Bitset {
        self.soft
    }

    /// Insert a connection, keeping the order and the dominance invariant.
    pub(crate) fn add(&mut self, vc: VC, log: &mut Journal<'_>) -> AddResult {
        debug_assert!(vc.x() == self.x && vc.y() == self.y);

        if self.is_superset_of_any(vc.carrier()) {
            return AddResult::Failed;
        }
        self.remove_supersets_of(vc.carrier(), log);

        let size = vc.carrier().count();
        let at = self
            .vcs
            .iter()
            .position(|v| v.carrier().count() > size)
            .unwrap_or(self.vcs.len());
        self.vcs.insert(at, vc);
        log.added(&vc);

        self.hard &= vc.carrier();
        if at < self.soft_limit {
            self.recompute_soft();
            AddResult::AddedInsideSoft
        } else {
            AddResult::AddedOutsideSoft
        }
    }

    /// Add every entry of `entries` in order, keeping whatever survives
    /// dominance.
    pub(crate) fn append_from(&mut self, entries: &[VC], log: &mut Journal<'_>) {
        for vc in entries {
            self.add(*vc, log);
        }
    }

    /// Remove every connection whose carrier intersects `mask`, returning
    /// the removed entries for the caller to shrink or upgrade.
    pub(crate) fn remove_all_containing(
        &mut self,
        mask: Bitset,
        log: &mut Journal<'_>,
    ) -> Vec<VC> {
        let mut removed = Vec::new();
        let mut slot = 0;
        while slot < self.vcs.len() {
            if (self.vcs[slot].carrier() & mask).any() {
                let vc = self.vcs.remove(slot);
                log.removed(&vc, slot);
                removed.push(vc);
            } else {
                slot += 1;
            }
        }
        if !removed.is_empty() {
            self.recompute();
        }
        removed
    }

    /// Remove connections dominated by the given carrier.
    pub(crate) fn remove_supersets_of(&mut self, carrier: Bitset, log: &mut Journal<'_>) {
        let mut slot = 0;
        let mut any = false;
        while slot < self.vcs.len() {
            if carrier.is_subset_of(&self.vcs[slot].carrier()) {
                let vc = self.vcs.remove(slot);
                log.removed(&vc, slot);
                any = true;
            } else {
                slot += 1;
            }
        }
        if any {
            self.recompute();
        }
    }

    /// True iff some connection's carrier is a subset of `carrier`.
    pub fn is_superset_of_any(&self, carrier: Bitset) -> bool {
        self.vcs.iter().any(|v| v.carrier().is_subset_of(&carrier))
    }

    pub(crate) fn find(&self, vc: &VC) -> Option<usize> {
        self.vcs.iter().position(|v| v.same_connection(vc))
    }

    pub(crate) fn mark_processed(&mut self, slot: usize, log: &mut Journal<'_>) {
        if !self.vcs[slot].processed() {
            self.vcs[slot].set_processed(true);
            let vc = self.vcs[slot];
            log.processed(&vc);
        }
    }

    /// OR of all carriers.
    pub fn union(&self) -> Bitset {
        self.vcs
            .iter()
            .fold(Bitset::EMPTY, |u, v| u | v.carrier())
    }

    /// Union carriers in order, skipping any that fail to shrink the
    /// running intersection.
    pub fn greedy_union(&self) -> Bitset {
        let mut union = Bitset::EMPTY;
        let mut inter = Bitset::UNIVERSE;
        for vc in self.vcs.iter() {
            if inter & vc.carrier() != inter {
                inter &= vc.carrier();
                union |= vc.carrier();
            }
        }
        union
    }

    /// Reinsert a connection at an exact slot; rollback only.
    pub(crate) fn insert_at(&mut self, slot: usize, vc: VC) {
        self.vcs.insert(slot.min(self.vcs.len()), vc);
        self.recompute();
    }

    /// Remove a connection by identity; rollback only.
    pub(crate) fn remove_exact(&mut self, vc: &VC) -> bool {
        match self.find(vc) {
            Some(slot) => {
                self.vcs.remove(slot);
                self.recompute();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_processed(&mut self, vc: &VC) {
        if let Some(slot) = self.find(vc) {
            self.vcs[slot].set_processed(false);
        }
    }

    fn recompute(&mut self) {
        self.hard = self
            .vcs
            .iter()
            .fold(Bitset::UNIVERSE, |i, v| i & v.carrier());
        self.recompute_soft();
    }

    fn recompute_soft(&mut self) {
        self.soft = self.vcs[..self.soft_len()]
            .iter()
            .fold(Bitset::UNIVERSE, |i, v| i & v.carrier());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vc::VcRule;

    fn c(i: usize) -> Cell {
        Cell::from_index(i)
    }

    fn carrier(cells: &[usize]) -> Bitset {
        cells.iter().map(|&i| c(i)).collect()
    }

    fn full(cells: &[usize]) -> VC {
        VC::full(c(100), c(101), carrier(cells), VcRule::Base)
    }

    #[test]
    fn keeps_ascending_carrier_order() {
        let mut list = VCList::new(c(100), c(101), SOFT_LIMIT_FULL);
        let mut log = Journal::none();
        assert!(list.add(full(&[10, 11, 12]), &mut log).is_success());
        assert!(list.add(full(&[20]), &mut log).is_success());
        assert!(list.add(full(&[30, 31]), &mut log).is_success());
        let sizes: Vec<usize> = list.iter().map(|v| v.carrier().count()).collect();
        assert_eq!(sizes, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_dominated_inserts() {
        let mut list = VCList::new(c(100), c(101), SOFT_LIMIT_FULL);
        let mut log = Journal::none();
        list.add(full(&[10]), &mut log);
        assert_eq!(list.add(full(&[10, 11]), &mut log), AddResult::Failed);
        assert_eq!(list.add(full(&[10]), &mut log), AddResult::Failed);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn evicts_dominated_entries() {
        let mut list = VCList::new(c(100), c(101), SOFT_LIMIT_FULL);
        let mut log = Journal::none();
        list.add(full(&[10, 11]), &mut log);
        list.add(full(&[10, 12]), &mut log);
        assert!(list.add(full(&[10]), &mut log).is_success());
        assert_eq!(list.len(), 1);
        assert_eq!(list.vc(0).carrier(), carrier(&[10]));
    }

    #[test]
    fn intersections_track_mutations() {
        let mut list = VCList::new(c(100), c(101), SOFT_LIMIT_FULL);
        let mut log = Journal::none();
        assert_eq!(list.hard_intersection(), Bitset::UNIVERSE);
        list.add(full(&[10, 11]), &mut log);
        list.add(full(&[11, 12]), &mut log);
        assert_eq!(list.hard_intersection(), carrier(&[11]));
        assert_eq!(list.soft_intersection(), carrier(&[11]));
        let removed = list.remove_all_containing(carrier(&[12]), &mut log);
        assert_eq!(removed.len(), 1);
        assert_eq!(list.hard_intersection(), carrier(&[10, 11]));
    }

    #[test]
    fn soft_intersection_ignores_the_tail() {
        let mut list = VCList::new(c(100), c(101), 2);
        let mut log = Journal::none();
        list.add(full(&[10]), &mut log);
        list.add(full(&[10, 11]), &mut log);
        list.add(full(&[10, 12, 13]), &mut log);
        assert_eq!(list.soft_intersection(), carrier(&[10]));
        assert_eq!(list.hard_intersection(), carrier(&[10]));
    }

    #[test]
    fn greedy_union_skips_redundant_carriers() {
        let mut list = VCList::new(c(100), c(101), SOFT_LIMIT_FULL);
        let mut log = Journal::none();
        list.add(full(&[10, 11]), &mut log);
        list.add(full(&[10, 12]), &mut log);
        // the running intersection is {10} by now; {10, 13} does not shrink
        // it and is skipped
        list.add(full(&[10, 13]), &mut log);
        assert_eq!(list.greedy_union(), carrier(&[10, 11, 12]));
        assert_eq!(list.union(), carrier(&[10, 11, 12, 13]));
    }
}
