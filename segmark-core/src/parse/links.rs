use std::cmp::Ordering;

use tracing::instrument;

use crate::entities::{Link, PageNumber, PdfLink, Rectangle, Segment};

/// Side of the square placed at a link's destination point.
const LINK_DESTINATION_SIZE: f32 = 20.0;

/// Finds the segment a link rectangle points at.
///
/// The segment overlapping the largest share of the rectangle wins (first one on
/// ties). With no overlap at all, the nearest segment starting below the
/// rectangle is used, preferring the smallest vertical gap then the closest
/// horizontal centre.
pub fn find_closest_segment<'a>(
    rectangle: &Rectangle,
    segments: &[&'a Segment],
) -> Option<&'a Segment> {
    let best_overlap = segments
        .iter()
        .map(|s| (*s, rectangle.intersection_percentage(&s.rectangle)))
        .filter(|(_, pct)| *pct > 0f32)
        .fold(None, |best: Option<(&Segment, f32)>, (s, pct)| match best {
            Some((_, best_pct)) if best_pct >= pct => best,
            _ => Some((s, pct)),
        });
    if let Some((segment, _)) = best_overlap {
        return Some(segment);
    }

    segments
        .iter()
        .filter(|s| s.rectangle.top() > rectangle.top())
        .map(|s| {
            let key = (
                s.rectangle.top() - rectangle.top(),
                (s.rectangle.center_x() - rectangle.center_x()).abs(),
            );
            (*s, key)
        })
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|(s, _)| s)
}

fn page_segments(segments: &[Segment], page_number: PageNumber) -> Vec<&Segment> {
    segments
        .iter()
        .filter(|s| s.page_number() == page_number)
        .collect()
}

/// Turns the internal link annotations into links between segments.
/// Links whose source or destination can't be located are dropped.
#[instrument(skip_all)]
pub fn resolve_links(pdf_links: &[PdfLink], segments: &[Segment]) -> Vec<Link> {
    let mut links = Vec::new();
    for pdf_link in pdf_links {
        if pdf_link.text.trim().is_empty() {
            tracing::debug!("skipping link without text on page {}", pdf_link.page_number);
            continue;
        }
        let source_candidates = page_segments(segments, pdf_link.page_number);
        let Some(source) = find_closest_segment(&pdf_link.source, &source_candidates) else {
            tracing::debug!("no source segment for link '{}'", pdf_link.text);
            continue;
        };

        let [x, y] = pdf_link.destination.unwrap_or([0f32, 0f32]);
        let destination_rect = Rectangle::new(
            x,
            y,
            x + LINK_DESTINATION_SIZE,
            y + LINK_DESTINATION_SIZE,
        );
        let destination_candidates = page_segments(segments, pdf_link.destination_page);
        let Some(destination) = find_closest_segment(&destination_rect, &destination_candidates)
        else {
            tracing::debug!(
                "no destination segment on page {} for link '{}'",
                pdf_link.destination_page,
                pdf_link.text
            );
            continue;
        };

        links.push(Link {
            source_segment: source.id.clone(),
            destination_segment: destination.id.clone(),
            text: pdf_link.text.trim().to_owned(),
        });
    }
    tracing::debug!("resolved {}/{} links", links.len(), pdf_links.len());
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SegmentBox, SegmentType};

    fn create_segment(page: PageNumber, idx: usize, left: f32, top: f32, w: f32, h: f32) -> Segment {
        Segment::new(
            idx,
            SegmentBox {
                left,
                top,
                width: w,
                height: h,
                page_number: page,
                page_width: 612,
                page_height: 792,
                text: format!("segment {idx}"),
                segment_type: SegmentType::Text,
            },
            vec![],
        )
    }

    #[test]
    fn test_closest_segment_prefers_overlap() {
        let a = create_segment(1, 0, 0.0, 0.0, 100.0, 100.0);
        let b = create_segment(1, 1, 0.0, 90.0, 100.0, 100.0);
        let rect = Rectangle::new(10.0, 80.0, 30.0, 100.0);
        let found = find_closest_segment(&rect, &[&a, &b]);
        assert_eq!(found.map(|s| s.id.as_str()), Some("page-1-0"));
    }

    #[test]
    fn test_closest_segment_equal_overlap_first_wins() {
        let a = create_segment(1, 0, 0.0, 0.0, 100.0, 100.0);
        let b = create_segment(1, 1, 0.0, 0.0, 100.0, 100.0);
        let rect = Rectangle::new(10.0, 10.0, 30.0, 30.0);
        let found = find_closest_segment(&rect, &[&a, &b]);
        assert_eq!(found.map(|s| s.id.as_str()), Some("page-1-0"));
    }

    #[test]
    fn test_closest_segment_falls_back_below() {
        let above = create_segment(1, 0, 0.0, 0.0, 100.0, 50.0);
        let below_far = create_segment(1, 1, 0.0, 300.0, 100.0, 50.0);
        let below_near_offset = create_segment(1, 2, 400.0, 200.0, 100.0, 50.0);
        let below_near_centered = create_segment(1, 3, 0.0, 200.0, 100.0, 50.0);
        let rect = Rectangle::new(40.0, 100.0, 60.0, 120.0);

        let found = find_closest_segment(
            &rect,
            &[&above, &below_far, &below_near_offset, &below_near_centered],
        );
        assert_eq!(found.map(|s| s.id.as_str()), Some("page-1-3"));
    }

    #[test]
    fn test_closest_segment_none_below() {
        let above = create_segment(1, 0, 0.0, 0.0, 100.0, 50.0);
        let rect = Rectangle::new(40.0, 100.0, 60.0, 120.0);
        assert!(find_closest_segment(&rect, &[&above]).is_none());
        assert!(find_closest_segment(&rect, &[]).is_none());
    }

    #[test]
    fn test_resolve_links() {
        let segments = vec![
            create_segment(1, 0, 0.0, 0.0, 300.0, 50.0),
            create_segment(2, 0, 0.0, 0.0, 300.0, 50.0),
            create_segment(2, 1, 0.0, 400.0, 300.0, 50.0),
        ];
        let pdf_links = vec![
            PdfLink {
                page_number: 1,
                source: Rectangle::new(10.0, 10.0, 30.0, 20.0),
                destination_page: 2,
                destination: Some([10.0, 410.0]),
                text: "see section 2".to_owned(),
            },
            PdfLink {
                page_number: 1,
                source: Rectangle::new(10.0, 10.0, 30.0, 20.0),
                destination_page: 2,
                destination: None,
                text: "  ".to_owned(),
            },
            PdfLink {
                page_number: 1,
                source: Rectangle::new(10.0, 10.0, 30.0, 20.0),
                destination_page: 7,
                destination: None,
                text: "missing page".to_owned(),
            },
        ];
        let links = resolve_links(&pdf_links, &segments);
        assert_eq!(
            links,
            vec![Link {
                source_segment: "page-1-0".to_owned(),
                destination_segment: "page-2-1".to_owned(),
                text: "see section 2".to_owned(),
            }]
        );
    }

    #[test]
    fn test_resolve_links_trims_text() {
        let segments = vec![
            create_segment(1, 0, 0.0, 0.0, 300.0, 50.0),
            create_segment(2, 0, 0.0, 0.0, 300.0, 50.0),
        ];
        let pdf_links = vec![PdfLink {
            page_number: 1,
            source: Rectangle::new(10.0, 10.0, 30.0, 20.0),
            destination_page: 2,
            destination: Some([10.0, 10.0]),
            text: " section 2\n".to_owned(),
        }];
        let links = resolve_links(&pdf_links, &segments);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "section 2");
    }
}
