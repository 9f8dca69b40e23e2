use crate::SyncIndex;

/// Returns whether or not a wrapping number is greater than another
/// sequence_greater_than(2,1) will return true
/// sequence_greater_than(1,2) will return false
/// sequence_greater_than(1,1) will return false
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns whether or not a wrapping number is less than another
/// sequence_less_than(1,2) will return true
/// sequence_less_than(2,1) will return false
/// sequence_less_than(1,1) will return false
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Remembers the newest sync position applied for one stream.
///
/// A position at or behind the remembered one is stale, which makes
/// re-delivery of the same record a no-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncCursor {
    last_applied: Option<SyncIndex>,
}

impl SyncCursor {
    pub fn new() -> Self {
        Self { last_applied: None }
    }

    pub fn last_applied(&self) -> Option<SyncIndex> {
        self.last_applied
    }

    pub fn is_stale(&self, position: SyncIndex) -> bool {
        match self.last_applied {
            None => false,
            Some(last) => !sequence_greater_than(position, last),
        }
    }

    /// Records `position` and returns true, or returns false if it is stale.
    pub fn advance(&mut self, position: SyncIndex) -> bool {
        if self.is_stale(position) {
            return false;
        }
        self.last_applied = Some(position);
        true
    }
}

/// Hands out outbound sync positions for one stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncCounter {
    next: SyncIndex,
}

impl SyncCounter {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next(&mut self) -> SyncIndex {
        let position = self.next;
        self.next = self.next.wrapping_add(1);
        position
    }
}
