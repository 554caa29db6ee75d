//! Row streaming services

mod replay;

pub use replay::{ReplayHandle, ReplayProducer};
