//! Entry write path and the index sync pipeline that follows it.

mod pipeline;
mod write;

pub use pipeline::{IndexSync, SyncOutcome};
pub use write::EntryWriter;

#[cfg(test)]
mod tests;
