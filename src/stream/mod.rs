//! Response-stream decoding and output aggregation.

mod aggregator;
mod decoder;

pub use aggregator::OutputAggregator;
pub use decoder::{fragments, StreamDecoder};
