use crate::vc::VC;

/// One recorded list mutation.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Record {
    /// A connection was inserted.
    Add(VC),
    /// A connection was removed from the given slot of its list.
    Remove(VC, usize),
    /// A connection had its processed flag raised.
    Processed(VC),
    /// Boundary between builds; rollback stops here.
    Mark,
}

/// An undo journal of every list mutation performed during a build.
///
/// A search speculatively extends the connection set with
/// [`build_incremental`](crate::VCBuilder::build_incremental), then rolls the
/// set back with [`VCSet::revert`](crate::VCSet::revert) when it retreats.
/// Records are replayed in reverse, so after a full rollback the set is
/// restored to ordered equality with its state at the matching mark.
#[derive(Default)]
pub struct ChangeLog {
    records: Vec<Record>,
}

impl ChangeLog {
    pub fn new() -> ChangeLog {
        ChangeLog::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Push a build boundary.
    pub fn mark(&mut self) {
        self.records.push(Record::Mark);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub(crate) fn pop(&mut self) -> Option<Record> {
        self.records.pop()
    }
}

/// A borrowed, possibly absent changelog. Static builds run without one;
/// list operations write through this so they need not care.
pub(crate) struct Journal<'a>(pub(crate) Option<&'a mut ChangeLog>);

impl Journal<'_> {
    pub(crate) fn none() -> Journal<'static> {
        Journal(None)
    }

    pub(crate) fn added(&mut self, vc: &VC) {
        if let Some(log) = self.0.as_deref_mut() {
            log.push(Record::Add(*vc));
        }
    }

    pub(crate) fn removed(&mut self, vc: &VC, slot: usize) {
        if let Some(log) = self.0.as_deref_mut() {
            log.push(Record::Remove(*vc, slot));
        }
    }

    pub(crate) fn processed(&mut self, vc: &VC) {
        if let Some(log) = self.0.as_deref_mut() {
            log.push(Record::Processed(*vc));
        }
    }
}
