use crate::error::StoreError;
use crate::event::Event;

/// Batch persistence seam for normalized events.
///
/// `append` returns the number of rows newly inserted; re-delivered ids are
/// absorbed by the store's uniqueness constraint and do not count. Empty
/// input performs no I/O and returns 0.
pub trait EventStore {
    fn append(&self, events: &[Event]) -> Result<usize, StoreError>;
}
