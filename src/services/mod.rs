pub mod streaming;

pub use streaming::ReplayProducer;
