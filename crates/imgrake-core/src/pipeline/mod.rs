//! Acquisition and normalization pipeline components.
//!
//! - **address**: Keyword to work-directory mapping
//! - **source**: The fetch collaborator trait and artifact destination
//! - **bing**: Bing image search as a fetch collaborator
//! - **acquire**: Bounded discovery/extraction/download worker pools
//! - **decode**: Guarded image decoding
//! - **normalize**: Canonicalize or quarantine artifacts
//! - **job**: Per-keyword state machine
//! - **orchestrator**: Resumable run over the keyword list
//! - **sweep**: Normalize or prune existing work directories
//! - **channel**: Bounded channels for backpressure

pub mod acquire;
pub mod address;
pub mod bing;
pub mod channel;
pub mod decode;
pub mod job;
pub mod normalize;
pub mod orchestrator;
pub mod retry;
pub mod sniff;
pub mod source;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use acquire::{AcquireReport, AcquisitionStage};
pub use address::{address_for, work_dir};
pub use bing::BingSource;
pub use decode::{DecodedImage, ImageDecoder};
pub use job::KeywordJob;
pub use normalize::{list_artifacts, Normalizer};
pub use orchestrator::Orchestrator;
pub use source::{Destination, ImageRef, ImageSource, PageRef, Shard, INFO_FILE};
pub use sweep::{Sweep, SweepMode, SweepReport};
