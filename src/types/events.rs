use axum::response::sse::Event;

/// One replayed dataset row, already serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub index: usize,
    pub data: String,
}

impl RowEvent {
    pub fn new(index: usize, data: String) -> Self {
        Self { index, data }
    }

    /// Unnamed SSE event carrying the row JSON as `data:`.
    pub fn to_sse_event(&self) -> Event {
        Event::default().data(&self.data)
    }
}

/// How a replay task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every row was delivered.
    Completed { sent: usize },
    /// The client went away after `sent` rows.
    Disconnected { sent: usize },
}

impl ReplayOutcome {
    pub fn sent(&self) -> usize {
        match self {
            Self::Completed { sent } | Self::Disconnected { sent } => *sent,
        }
    }
}
