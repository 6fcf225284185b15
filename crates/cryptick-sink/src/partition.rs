//! Partition scheme.
//!
//! Collected data is organised into a date-based directory hierarchy, one
//! file per interval of the chosen resolution. Day resolution, for example,
//! yields `2019/11/25.csv` under the sink root.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time resolution for partition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minute,
    Hour,
    #[default]
    Day,
    Month,
}

impl Resolution {
    fn dir_pattern(&self) -> &'static str {
        match self {
            Self::Minute => "%Y/%m/%d/%H",
            Self::Hour => "%Y/%m/%d",
            Self::Day => "%Y/%m",
            Self::Month => "%Y",
        }
    }

    fn file_pattern(&self) -> &'static str {
        match self {
            Self::Minute => "%M",
            Self::Hour => "%H",
            Self::Day => "%d",
            Self::Month => "%m",
        }
    }

    fn stamp_pattern(&self) -> &'static str {
        match self {
            Self::Minute => "%Y%m%d-%H%M",
            Self::Hour => "%Y%m%d-%H",
            Self::Day => "%Y%m%d",
            Self::Month => "%Y%m",
        }
    }

    /// Relative path of the partition file holding `at`.
    pub fn partition_path(&self, at: DateTime<Utc>, suffix: &str) -> PathBuf {
        let dir = at.format(self.dir_pattern()).to_string();
        let file = at.format(self.file_pattern()).to_string();
        let name = if suffix.is_empty() {
            file
        } else {
            format!("{file}.{suffix}")
        };
        Path::new(&dir).join(name)
    }

    /// Identifier of the partition holding `at`. Two instants share a stamp
    /// exactly when they belong in the same file.
    pub fn stamp(&self, at: DateTime<Utc>) -> String {
        at.format(self.stamp_pattern()).to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_partition_paths_per_resolution() {
        let t = at(2019, 11, 25, 14, 5, 30);

        assert_eq!(
            Resolution::Minute.partition_path(t, "csv"),
            Path::new("2019/11/25/14/05.csv")
        );
        assert_eq!(
            Resolution::Hour.partition_path(t, "csv"),
            Path::new("2019/11/25/14.csv")
        );
        assert_eq!(
            Resolution::Day.partition_path(t, "csv"),
            Path::new("2019/11/25.csv")
        );
        assert_eq!(
            Resolution::Month.partition_path(t, "csv"),
            Path::new("2019/11.csv")
        );
    }

    #[test]
    fn test_empty_suffix_omits_dot() {
        let t = at(2019, 11, 25, 14, 5, 30);
        assert_eq!(
            Resolution::Day.partition_path(t, ""),
            Path::new("2019/11/25")
        );
    }

    #[test]
    fn test_stamp_changes_only_at_boundary() {
        let before = at(2019, 11, 25, 14, 5, 59);
        let after = at(2019, 11, 25, 14, 6, 0);

        assert_ne!(
            Resolution::Minute.stamp(before),
            Resolution::Minute.stamp(after)
        );
        assert_eq!(Resolution::Hour.stamp(before), Resolution::Hour.stamp(after));
        assert_eq!(Resolution::Day.stamp(before), Resolution::Day.stamp(after));
    }

    #[test]
    fn test_resolution_parses_from_lowercase() {
        let parsed: Resolution = serde_json::from_str("\"minute\"").unwrap();
        assert_eq!(parsed, Resolution::Minute);
    }
}
