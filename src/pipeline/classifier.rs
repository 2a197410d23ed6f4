//! Raw line classification
//!
//! Lines arrive in one of two shapes:
//!
//! ```text
//! 201701<tab>aa<tab>count
//! 201701<tab>aa<tab>bb<tab>count
//! ```
//!
//! The field count alone decides the record type. Empty fields are kept
//! verbatim, so `201701<tab>aa<tab><tab>5` is a co-occurrence with an empty
//! partner term, not a frequency record.

use crate::error::{ClassificationError, MalformedReason};
use crate::pipeline::record::{ClassifiedRecord, RecordType};

/// Classify one raw line
pub fn classify(line: &str) -> Result<ClassifiedRecord, ClassificationError> {
    let trimmed = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = trimmed.split('\t').collect();

    let record_type = RecordType::from_arity(fields.len())
        .ok_or_else(|| malformed(line, MalformedReason::FieldCount(fields.len())))?;

    let count_field = fields[fields.len() - 1];
    let count = parse_count(count_field)
        .ok_or_else(|| malformed(line, MalformedReason::InvalidCount(count_field.to_string())))?;

    let record = match record_type {
        RecordType::Frequency => ClassifiedRecord::frequency(fields[0], fields[1], count),
        RecordType::Cooccurrence => {
            ClassifiedRecord::cooccurrence(fields[0], fields[1], fields[2], count)
        }
    };
    Ok(record)
}

/// Counts are plain ASCII digits; `u64::from_str` also accepts a leading `+`.
fn parse_count(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn malformed(line: &str, reason: MalformedReason) -> ClassificationError {
    ClassificationError::MalformedLine {
        line: line.to_string(),
        reason,
    }
}
