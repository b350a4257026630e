use std::collections::HashMap;

use unordered_pair::UnorderedPair;

use crate::cell::{Cell, Color};
use crate::changelog::{ChangeLog, Journal, Record};
use crate::list::{AddResult, VCList, SOFT_LIMIT_FULL, SOFT_LIMIT_SEMI};
use crate::vc::{VcType, VC};

/// Every proven connection of one color, addressed by unordered endpoint
/// pair and type.
///
/// The set is populated by a [`VCBuilder`](crate::VCBuilder); consumers read
/// it through [`get`](VCSet::get) and [`exists`](VCSet::exists) and must not
/// mutate it while a build is running.
pub struct VCSet {
    color: Color,
    fulls: HashMap<UnorderedPair<Cell>, VCList>,
    semis: HashMap<UnorderedPair<Cell>, VCList>,
}

impl VCSet {
    pub fn new(color: Color) -> VCSet {
        VCSet {
            color,
            fulls: HashMap::new(),
            semis: HashMap::new(),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn clear(&mut self) {
        self.fulls.clear();
        self.semis.clear();
    }

    fn table(&self, ty: VcType) -> &HashMap<UnorderedPair<Cell>, VCList> {
        match ty {
            VcType::Full => &self.fulls,
            VcType::Semi => &self.semis,
        }
    }

    /// The list between `x` and `y`, if any connection was ever stored
    /// there.
    pub fn get(&self, ty: VcType, x: Cell, y: Cell) -> Option<&VCList> {
        self.table(ty).get(&UnorderedPair(x, y))
    }

    /// Whether at least one connection of the given type exists between
    /// `x` and `y`.
    pub fn exists(&self, x: Cell, y: Cell, ty: VcType) -> bool {
        self.get(ty, x, y).is_some_and(|list| !list.is_empty())
    }

    /// Endpoint pairs with a non-empty list of the given type.
    pub fn pairs(&self, ty: VcType) -> impl Iterator<Item = (Cell, Cell)> + '_ {
        self.table(ty)
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(pair, _)| (pair.0, pair.1))
    }

    pub fn lists(&self, ty: VcType) -> impl Iterator<Item = &VCList> {
        self.table(ty).values()
    }

    pub(crate) fn list_mut(&mut self, ty: VcType, x: Cell, y: Cell) -> &mut VCList {
        debug_assert!(x != y);
        let (table, soft_limit) = match ty {
            VcType::Full => (&mut self.fulls, SOFT_LIMIT_FULL),
            VcType::Semi => (&mut self.semis, SOFT_LIMIT_SEMI),
        };
        table
            .entry(UnorderedPair(x, y))
            .or_insert_with(|| VCList::new(x, y, soft_limit))
    }

    pub(crate) fn existing_mut(&mut self, ty: VcType, x: Cell, y: Cell) -> Option<&mut VCList> {
        let table = match ty {
            VcType::Full => &mut self.fulls,
            VcType::Semi => &mut self.semis,
        };
        table.get_mut(&UnorderedPair(x, y))
    }

    /// Both lists of a pair at once, full first.
    pub(crate) fn pair_mut(&mut self, x: Cell, y: Cell) -> (&mut VCList, &mut VCList) {
        debug_assert!(x != y);
        let fulls = self
            .fulls
            .entry(UnorderedPair(x, y))
            .or_insert_with(|| VCList::new(x, y, SOFT_LIMIT_FULL));
        let semis = self
            .semis
            .entry(UnorderedPair(x, y))
            .or_insert_with(|| VCList::new(x, y, SOFT_LIMIT_SEMI));
        (fulls, semis)
    }

    /// Route a connection into the list its endpoints and type name.
    pub(crate) fn add(&mut self, vc: VC, log: &mut Journal<'_>) -> AddResult {
        self.list_mut(vc.vc_type(), vc.x(), vc.y()).add(vc, log)
    }

    /// Replay the changelog in reverse down to (and consuming) the latest
    /// mark, restoring the set to its state at that mark.
    pub fn revert(&mut self, log: &mut ChangeLog) {
        while let Some(record) = log.pop() {
            match record {
                Record::Mark => break,
                Record::Add(vc) => {
                    if let Some(list) = self.existing_mut(vc.vc_type(), vc.x(), vc.y()) {
                        list.remove_exact(&vc);
                    }
                }
                Record::Remove(vc, slot) => {
                    self.list_mut(vc.vc_type(), vc.x(), vc.y()).insert_at(slot, vc);
                }
                Record::Processed(vc) => {
                    if let Some(list) = self.existing_mut(vc.vc_type(), vc.x(), vc.y()) {
                        list.clear_processed(&vc);
                    }
                }
            }
        }
    }
}
