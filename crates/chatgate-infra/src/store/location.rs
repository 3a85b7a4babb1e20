//! Where a document lives on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use chatgate_core::clock::day_id;

const STATIC_PARTITION: &str = "static";

/// A `(directory, name, day-partitioned?)` triple identifying a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentLocation {
    dir: PathBuf,
    name: String,
    day_partitioned: bool,
}

impl DocumentLocation {
    /// A document that persists across days, stored as `<name>.json`.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            day_partitioned: false,
        }
    }

    /// A document rotated daily, stored as `<name>_<YYYY-M-D>.json`.
    pub fn day_partitioned(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            day_partitioned: true,
            ..Self::new(dir, name)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_day_partitioned(&self) -> bool {
        self.day_partitioned
    }

    /// Cache slot for this location, independent of the partition.
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.dir.display(), self.name)
    }

    /// Partition active at `now`.
    pub fn partition_key(&self, now: DateTime<Utc>) -> String {
        if self.day_partitioned {
            day_id(now)
        } else {
            STATIC_PARTITION.to_string()
        }
    }

    pub fn file_name(&self, partition: &str) -> String {
        if self.day_partitioned {
            format!("{}_{}.json", self.name, partition)
        } else {
            format!("{}.json", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    #[test]
    fn test_static_file_name() {
        let location = DocumentLocation::new("limits", "limitIp");
        let now = Utc::now();
        assert_eq!(location.partition_key(now), "static");
        assert_eq!(location.file_name(&location.partition_key(now)), "limitIp.json");
    }

    #[test]
    fn test_day_partitioned_file_name() {
        let location = DocumentLocation::day_partitioned("stats", "usage");
        let now = Local
            .with_ymd_and_hms(2024, 1, 9, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let partition = location.partition_key(now);
        assert_eq!(partition, "2024-1-9");
        assert_eq!(location.file_name(&partition), "usage_2024-1-9.json");
        assert_eq!(location.cache_key(), "stats/usage");
    }
}
