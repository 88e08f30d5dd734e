use serde::{Deserialize, Serialize};

/// An event an aggregate has applied but nobody has published yet.
///
/// `sequence` is the aggregate version right after the event was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recorded<E> {
    pub sequence: u64,
    pub event: E,
}

impl<E> Recorded<E> {
    pub fn new(sequence: u64, event: E) -> Self {
        Self { sequence, event }
    }
}
