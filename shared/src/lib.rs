pub mod jsonl;
pub mod records;
pub mod telemetry;
pub mod utils;

pub use jsonl::{JsonlError, JsonlReader, JsonlWriter};
pub use records::{Item, QueryAssociatedItems, RecordError, RunRecord, ScoredItemRecord};
