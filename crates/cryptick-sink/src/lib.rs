//! Time-partitioned data sink for collected market data.
//!
//! Records are appended to files organised in a date hierarchy, one file
//! per interval of the configured resolution:
//!
//! ```text
//! dataset/
//! |-- 2019/
//! |   |-- 11/
//! |   |   |-- 25.csv
//! |   |   |-- 26.csv
//! |   |-- 12/
//! |-- 2020/
//! ```
//!
//! Writes rotate to a new partition automatically when they cross a
//! boundary. Storage is pluggable: a filesystem backend that streams lines
//! to disk, and an in-memory object store that publishes whole partitions
//! on completion.

pub mod error;
pub mod partition;
pub mod sink;
pub mod store;

pub use error::{SinkError, SinkResult};
pub use partition::Resolution;
pub use sink::{SinkOptions, TimeSink};
pub use store::{Backend, FsBackend, MemoryBackend, MemoryStore};
