use crate::entities::{SegmentBox, SegmentType};

/// Newline-joined texts of the segments whose type is one of `types`, in the given order.
pub fn extract_text_by_types(segments: &[SegmentBox], types: &[SegmentType]) -> String {
    segments
        .iter()
        .filter(|s| types.contains(&s.segment_type))
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn extract_all_text(segments: &[SegmentBox]) -> String {
    extract_text_by_types(segments, &SegmentType::ALL)
}
