//! Reading assembler
//!
//! Turns an unordered set of detector hits into a reading: symbols are put
//! in left-to-right order, concatenated and parsed as a decimal number.
//! Pure functions, no I/O.

use wattbot_common::{ConfidenceEntry, Detection, Error, Result};

/// Numeric reading assembled from detections
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledReading {
    pub value: f64,
    pub confidence_array: Vec<ConfidenceEntry>,
    pub score: f64,
}

/// Stable sort by horizontal position
fn reading_order(detections: &[Detection]) -> Vec<ConfidenceEntry> {
    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by(|a, b| a.position.total_cmp(&b.position));
    ordered
        .into_iter()
        .map(|d| ConfidenceEntry {
            symbol: d.symbol.trim().to_string(),
            confidence: d.confidence,
        })
        .collect()
}

fn mean_confidence(entries: &[ConfidenceEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    entries.iter().map(|e| e.confidence).sum::<f64>() / entries.len() as f64
}

/// Assemble a numeric reading
///
/// Fails with `NoNumberDetected` when the concatenated symbols do not parse
/// as a finite decimal number, including when there are no detections.
pub fn assemble(detections: &[Detection]) -> Result<AssembledReading> {
    let confidence_array = reading_order(detections);
    let candidate: String = confidence_array.iter().map(|e| e.symbol.as_str()).collect();

    let value = candidate
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(Error::NoNumberDetected)?;

    let score = mean_confidence(&confidence_array);

    Ok(AssembledReading {
        value,
        confidence_array,
        score,
    })
}

/// Ordered confidences and mean score without parsing
///
/// Used for historical re-derivation, where non-numeric detector output is
/// tolerated. The score is 0.0 for an empty detection set.
pub fn score_only(detections: &[Detection]) -> (Vec<ConfidenceEntry>, f64) {
    let confidence_array = reading_order(detections);
    let score = mean_confidence(&confidence_array);
    (confidence_array, score)
}
