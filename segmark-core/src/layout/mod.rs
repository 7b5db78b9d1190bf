use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::entities::{PageNumber, PdfPage, Rectangle, SegmentBox, SegmentType};

lazy_static! {
    /// DocLayNet categories, indexed by `category_id - 1`
    static ref ID2LABEL: [SegmentType; 11] = [
        SegmentType::Caption,
        SegmentType::Footnote,
        SegmentType::Formula,
        SegmentType::ListItem,
        SegmentType::PageFooter,
        SegmentType::PageHeader,
        SegmentType::Picture,
        SegmentType::SectionHeader,
        SegmentType::Table,
        SegmentType::Text,
        SegmentType::Title,
    ];
}

/// Maps a DocLayNet category id (1 based) to a segment type. Unknown ids are text.
pub fn segment_type_from_category(category_id: u32) -> SegmentType {
    (category_id as usize)
        .checked_sub(1)
        .and_then(|idx| ID2LABEL.get(idx).copied())
        .unwrap_or(SegmentType::Text)
}

/// Raw detection from the layout model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutPrediction {
    pub bounding_box: Rectangle,
    pub category_id: u32,
    pub score: f32,
}

impl LayoutPrediction {
    pub fn segment_type(&self) -> SegmentType {
        segment_type_from_category(self.category_id)
    }

    pub fn to_segment_box(&self, page: &PdfPage) -> SegmentBox {
        SegmentBox {
            left: self.bounding_box.left(),
            top: self.bounding_box.top(),
            width: self.bounding_box.width(),
            height: self.bounding_box.height(),
            page_number: page.page_number,
            page_width: page.page_width,
            page_height: page.page_height,
            text: String::new(),
            segment_type: self.segment_type(),
        }
    }
}

/// Predictions of one page, in the model's reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePredictions {
    pub page_number: PageNumber,
    pub predictions: Vec<LayoutPrediction>,
}

/// Converts per page predictions into segment boxes. Predictions for pages the
/// feature provider doesn't know about are an error.
pub fn predictions_to_segment_boxes(
    pages: &[PdfPage],
    predictions: &[PagePredictions],
) -> anyhow::Result<Vec<SegmentBox>> {
    let mut boxes = Vec::new();
    for page_predictions in predictions {
        let Some(page) = pages
            .iter()
            .find(|p| p.page_number == page_predictions.page_number)
        else {
            anyhow::bail!(
                "layout predictions reference unknown page {}",
                page_predictions.page_number
            );
        };
        boxes.extend(
            page_predictions
                .predictions
                .iter()
                .map(|p| p.to_segment_box(page)),
        );
    }
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(segment_type_from_category(1), SegmentType::Caption);
        assert_eq!(segment_type_from_category(4), SegmentType::ListItem);
        assert_eq!(segment_type_from_category(8), SegmentType::SectionHeader);
        assert_eq!(segment_type_from_category(11), SegmentType::Title);
        assert_eq!(segment_type_from_category(0), SegmentType::Text);
        assert_eq!(segment_type_from_category(42), SegmentType::Text);
    }

    #[test]
    fn test_predictions_to_segment_boxes() -> anyhow::Result<()> {
        let page = PdfPage {
            page_number: 3,
            page_width: 612,
            page_height: 792,
            tokens: vec![],
        };
        let predictions = vec![PagePredictions {
            page_number: 3,
            predictions: vec![LayoutPrediction {
                bounding_box: Rectangle::new(10.0, 20.0, 110.0, 70.0),
                category_id: 9,
                score: 0.93,
            }],
        }];
        let boxes = predictions_to_segment_boxes(&[page.clone()], &predictions)?;
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].segment_type, SegmentType::Table);
        assert_eq!((boxes[0].width, boxes[0].height), (100.0, 50.0));
        assert_eq!(boxes[0].page_number, 3);

        let unknown = vec![PagePredictions {
            page_number: 4,
            predictions: vec![],
        }];
        assert!(predictions_to_segment_boxes(&[page], &unknown).is_err());
        Ok(())
    }
}
