use itertools::Itertools;
use tracing::instrument;

use crate::{
    entities::{PdfPage, Segment, SegmentBox, SegmentType, Token},
    style::{assign_list_levels, PageStyleContext},
};

/// Minimum share (in percent) of a token's area that must lie inside a layout segment
/// for the token to belong to it. The bound is exclusive: a token split exactly in
/// half between two segments belongs to neither by this criterion alone.
const MIN_TOKEN_SEGMENT_INTERSECTION: f32 = 50.0;

#[derive(Debug)]
pub(crate) struct PageSegments {
    pub(crate) segments: Vec<Segment>,
    pub(crate) orphan_tokens: usize,
}

/// Segment types whose text comes from the layout provider or a format converter
/// rather than from the tokens they cover.
fn keeps_provider_text(segment_type: SegmentType) -> bool {
    matches!(
        segment_type,
        SegmentType::Table | SegmentType::Formula | SegmentType::Picture
    )
}

/// Segment types rendered as plain paragraphs, the only ones that can be list items.
pub(crate) fn is_regular(segment_type: SegmentType) -> bool {
    !keeps_provider_text(segment_type) && !segment_type.is_title()
}

/// Index of the segment covering the largest share of the token, above the threshold.
/// First segment in input order wins on equal shares.
fn best_segment(token: &Token, segment_boxes: &[SegmentBox]) -> Option<usize> {
    segment_boxes
        .iter()
        .enumerate()
        .map(|(idx, b)| (idx, token.rectangle.intersection_percentage(&b.rectangle())))
        .filter(|(_, pct)| *pct > MIN_TOKEN_SEGMENT_INTERSECTION)
        .fold(None, |best: Option<(usize, f32)>, (idx, pct)| match best {
            Some((_, best_pct)) if best_pct >= pct => best,
            _ => Some((idx, pct)),
        })
        .map(|(idx, _)| idx)
}

/// Assigns the page tokens to the predicted segments, classifies their style and
/// rebuilds the segment texts.
///
/// Tokens keep their source order inside a segment. Segments keep the predictor's
/// order, which is also the reading order within the page.
#[instrument(skip_all, fields(page_number = page.page_number))]
pub(crate) fn merge_tokens_segments(page: &PdfPage, segment_boxes: Vec<SegmentBox>) -> PageSegments {
    let style_ctx = PageStyleContext::new(&page.tokens);
    let mut assigned: Vec<Vec<Token>> = vec![Vec::new(); segment_boxes.len()];
    let mut orphan_tokens = 0;

    for token in &page.tokens {
        match best_segment(token, &segment_boxes) {
            Some(idx) => {
                let style = style_ctx.classify(token, segment_boxes[idx].segment_type);
                assigned[idx].push(Token {
                    style,
                    ..token.clone()
                });
            }
            None => {
                tracing::debug!(
                    "orphan token '{}' on page {}",
                    token.content,
                    page.page_number
                );
                orphan_tokens += 1;
            }
        }
    }

    let mut segments: Vec<Segment> = segment_boxes
        .into_iter()
        .zip(assigned)
        .enumerate()
        .map(|(idx, (mut segment_box, tokens))| {
            let joined = tokens.iter().map(|t| t.content.as_str()).join(" ");
            let use_tokens = if keeps_provider_text(segment_box.segment_type) {
                segment_box.text.trim().is_empty()
            } else {
                !tokens.is_empty()
            };
            if use_tokens {
                segment_box.text = joined;
            }
            Segment::new(idx, segment_box, tokens)
        })
        .collect();

    let regular_idx: Vec<usize> = segments
        .iter()
        .positions(|s| is_regular(s.kind()))
        .collect();
    let levels = assign_list_levels(regular_idx.iter().map(|&i| segments[i].text()));
    for (idx, level) in regular_idx.into_iter().zip(levels) {
        let segment = &mut segments[idx];
        segment.tokens = std::mem::take(&mut segment.tokens)
            .into_iter()
            .map(|t| Token {
                style: t.style.with_list_level(level),
                ..t
            })
            .collect();
    }

    if orphan_tokens > 0 {
        tracing::debug!(
            "page {}: {} tokens outside any segment",
            page.page_number,
            orphan_tokens
        );
    }

    PageSegments {
        segments,
        orphan_tokens,
    }
}
