pub mod events;

pub use events::{ReplayOutcome, RowEvent};
