//! Record types flowing through the pipeline
//!
//! The record type tag is decided once by the classifier and carried as an
//! enum from there on; destination names are only attached at routing time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a classified record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// `bucket, term, count`
    Frequency,
    /// `bucket, term, partner, count`
    Cooccurrence,
}

impl RecordType {
    pub const ALL: [RecordType; 2] = [RecordType::Frequency, RecordType::Cooccurrence];

    /// Number of tab-separated fields a raw line of this type carries
    pub fn arity(self) -> usize {
        match self {
            Self::Frequency => 3,
            Self::Cooccurrence => 4,
        }
    }

    pub fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            3 => Some(Self::Frequency),
            4 => Some(Self::Cooccurrence),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frequency => "frequency",
            Self::Cooccurrence => "cooccurrence",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw line after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record_type: RecordType,
    pub bucket: String,
    pub primary_key: String,
    /// Empty for frequency records
    pub secondary_key: String,
    pub count: u64,
}

impl ClassifiedRecord {
    pub fn frequency(bucket: impl Into<String>, primary: impl Into<String>, count: u64) -> Self {
        Self {
            record_type: RecordType::Frequency,
            bucket: bucket.into(),
            primary_key: primary.into(),
            secondary_key: String::new(),
            count,
        }
    }

    pub fn cooccurrence(
        bucket: impl Into<String>,
        primary: impl Into<String>,
        secondary: impl Into<String>,
        count: u64,
    ) -> Self {
        Self {
            record_type: RecordType::Cooccurrence,
            bucket: bucket.into(),
            primary_key: primary.into(),
            secondary_key: secondary.into(),
            count,
        }
    }

    pub fn coarse_key(&self) -> CoarseKey {
        CoarseKey {
            record_type: self.record_type,
            bucket: self.bucket.clone(),
        }
    }

    /// Split into the fine grouping key and the count it contributes
    pub fn into_parts(self) -> (GroupKey, u64) {
        let key = GroupKey {
            record_type: self.record_type,
            bucket: self.bucket,
            primary_key: self.primary_key,
            secondary_key: self.secondary_key,
        };
        (key, self.count)
    }
}

/// Work distribution key: type tag plus the leading bucket field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoarseKey {
    pub record_type: RecordType,
    pub bucket: String,
}

impl CoarseKey {
    pub fn new(record_type: RecordType, bucket: impl Into<String>) -> Self {
        Self {
            record_type,
            bucket: bucket.into(),
        }
    }
}

impl fmt::Display for CoarseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_type, self.bucket)
    }
}

/// Exact aggregation key
///
/// Field order gives the derived `Ord` coarse-key-first ordering, so sorted
/// keys of one coarse partition are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub record_type: RecordType,
    pub bucket: String,
    pub primary_key: String,
    pub secondary_key: String,
}

impl GroupKey {
    pub fn new(
        record_type: RecordType,
        bucket: impl Into<String>,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        Self {
            record_type,
            bucket: bucket.into(),
            primary_key: primary.into(),
            secondary_key: secondary.into(),
        }
    }

    pub fn coarse_key(&self) -> CoarseKey {
        CoarseKey::new(self.record_type, self.bucket.clone())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {:?} {:?}",
            self.record_type, self.bucket, self.primary_key, self.secondary_key
        )
    }
}

/// Summed total for one distinct [`GroupKey`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRecord {
    pub key: GroupKey,
    pub total: u64,
}

impl AggregatedRecord {
    pub fn record_type(&self) -> RecordType {
        self.key.record_type
    }

    /// Render as `primary<TAB>secondary<TAB>total`
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.key.primary_key, self.key.secondary_key, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_round_trip() {
        for record_type in RecordType::ALL {
            assert_eq!(RecordType::from_arity(record_type.arity()), Some(record_type));
        }
        assert_eq!(RecordType::from_arity(2), None);
        assert_eq!(RecordType::from_arity(5), None);
    }

    #[test]
    fn test_fine_key_extends_coarse_key() {
        let record = ClassifiedRecord::cooccurrence("201701", "aa", "rukc", 2);
        let coarse = record.coarse_key();
        let (key, count) = record.into_parts();
        assert_eq!(key.coarse_key(), coarse);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_frequency_line_keeps_empty_second_field() {
        let record = AggregatedRecord {
            key: GroupKey::new(RecordType::Frequency, "201701", "aa", ""),
            total: 5,
        };
        assert_eq!(record.to_line(), "aa\t\t5");
    }
}
