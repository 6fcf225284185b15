//! Time-partitioned sink.
//!
//! Appends records to the partition file for "now", rotating to a fresh
//! file whenever a write crosses a partition boundary. Rotation finishes
//! the old partition (footer, flush or upload) before the new one opens.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{SinkError, SinkResult};
use crate::partition::Resolution;
use crate::store::Backend;

/// Sink construction options.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// File suffix without the dot. Empty for bare partition names.
    pub suffix: String,
    /// First line of every partition file.
    pub header: Option<String>,
    /// Last line of every finished partition file.
    pub footer: Option<String>,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            suffix: "csv".to_string(),
            header: None,
            footer: None,
        }
    }
}

/// Appends records into date-partitioned files on some backend.
pub struct TimeSink {
    backend: Box<dyn Backend>,
    resolution: Resolution,
    options: SinkOptions,
    /// Stamp of the open partition; `None` once closed.
    open_stamp: Option<String>,
}

impl TimeSink {
    /// Open the partition for the current instant.
    pub fn new(
        backend: Box<dyn Backend>,
        resolution: Resolution,
        options: SinkOptions,
    ) -> SinkResult<Self> {
        Self::new_at(backend, resolution, options, Utc::now())
    }

    fn new_at(
        backend: Box<dyn Backend>,
        resolution: Resolution,
        options: SinkOptions,
        at: DateTime<Utc>,
    ) -> SinkResult<Self> {
        let mut sink = Self {
            backend,
            resolution,
            options,
            open_stamp: None,
        };
        sink.open_partition(at)?;
        Ok(sink)
    }

    /// Append one record, rotating first if `record` belongs to a newer
    /// partition than the open file.
    pub fn write(&mut self, record: &str) -> SinkResult<()> {
        self.write_at(record, Utc::now())
    }

    fn write_at(&mut self, record: &str, at: DateTime<Utc>) -> SinkResult<()> {
        let stamp = self.resolution.stamp(at);
        match &self.open_stamp {
            None => return Err(SinkError::Closed),
            Some(open) if *open != stamp => {
                self.finish_partition()?;
                self.open_partition(at)?;
            }
            Some(_) => {}
        }
        self.backend.append(record)
    }

    /// Finish the open partition. Idempotent; later writes fail with
    /// `Closed`.
    pub fn close(&mut self) -> SinkResult<()> {
        self.finish_partition()
    }

    fn open_partition(&mut self, at: DateTime<Utc>) -> SinkResult<()> {
        let path = self.resolution.partition_path(at, &self.options.suffix);
        self.backend.create(&path)?;
        if let Some(header) = &self.options.header {
            self.backend.append(header)?;
        }
        info!(path = %path.display(), "partition opened");
        self.open_stamp = Some(self.resolution.stamp(at));
        Ok(())
    }

    fn finish_partition(&mut self) -> SinkResult<()> {
        if self.open_stamp.take().is_some() {
            if let Some(footer) = &self.options.footer {
                self.backend.append(footer)?;
            }
            self.backend.finish()?;
        }
        Ok(())
    }
}

impl Drop for TimeSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close sink on drop");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
