//! File-based spool between the stargate and dimension processes.
//!
//! The writer side appends payloads to files in a private staging area and
//! moves each closed file into a shared handling directory. The reader side
//! claims those files by rename, forwards their lines and deletes them.
//!
//! # Module Structure
//!
//! - `state`: file lifecycle and validated transitions
//! - `fs`: filesystem abstraction with an in-memory implementation
//! - `naming`: generated file names
//! - `file`: the Open file with size bookkeeping
//! - `mover`: background hand-off into the handling directory
//! - `writer`: the rotating writer loop
//! - `reader`: the scanning reader with bounded workers

pub mod file;
pub mod fs;
pub mod mover;
pub mod naming;
pub mod reader;
pub mod state;
pub mod writer;

pub use file::{CloseError, ClosedFile, Salvaged, SpoolFile};
pub use fs::{DirEntry, MemoryFs, OsFs, SpoolFs};
pub use mover::{MoveMetrics, MoveWorker};
pub use reader::{ScanReport, SpoolReader, SpoolReaderConfig, SpoolReaderMetrics};
pub use state::{SpoolEntry, SpoolEvent, SpoolFileState, CLAIMED_EXT, READY_EXT};
pub use writer::{Rotation, SpoolWriter, SpoolWriterConfig, SpoolWriterMetrics};
