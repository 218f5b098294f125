//! Application layer: marker-driven source mutation and conflict-aware writes.

pub mod document;
pub mod imports;
pub mod markers;
pub mod outcome;
pub mod report;
pub mod session;
pub mod wiring;
pub mod writer;
