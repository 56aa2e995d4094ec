//! Everything that leaves the process as a file.
pub mod generated;
