// ============================================================
// Data Pipeline
// ============================================================
// From rows on disk (or generated) to tensor batches:
//
//   loader.rs / synthetic.rs  → Vec<Sample>
//          │
//          ▼
//   splitter.rs               → (train, eval), seeded
//          │
//          ▼
//   dataset.rs                → Burn Dataset<Sample>
//          │
//          ▼
//   batcher.rs                → Burn Batcher → SampleBatch<B>
//          │
//          ▼
//   Burn DataLoader           → batches for the trainer
//
// Which source is used is decided by the data node
// (nodes::data); this module only knows how to produce rows.

/// Numeric CSV reader
pub mod loader;

/// Seeded Gaussian clusters
pub mod synthetic;

/// Burn Dataset over in-memory samples
pub mod dataset;

/// Burn Batcher producing SampleBatch tensors
pub mod batcher;

/// Seeded shuffle + train/eval split
pub mod splitter;

pub use batcher::{SampleBatch, SampleBatcher};
pub use dataset::SampleDataset;
