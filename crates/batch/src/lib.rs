mod batcher;
mod point;

pub use batcher::{BatcherConfig, BatcherHandle, Sink, spawn, spawn_with_errors};
pub use point::{Batch, FieldValue, Point};
