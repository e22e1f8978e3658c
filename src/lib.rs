pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod preferences;
pub mod recognition;
pub mod scanner;
pub mod store;
pub mod sync;

pub use orchestrator::{BatchEvent, BatchOrchestrator, BatchOutcome, BatchSummary, SyncSummary};
pub use store::{BatchItem, ImageSource, ItemId, ItemStore, RecognitionState, SyncState};
