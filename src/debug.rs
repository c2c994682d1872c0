use crate::types::Segment;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

/// Draw the detected line on a copy of the ROI crop, 3 px thick.
pub fn visualize_line(crop: &RgbImage, segment: &Segment) -> RgbImage {
    let mut out = crop.clone();
    let color = Rgb([0, 0, 255]);

    for offset in -1..=1 {
        let off = offset as f32;
        // Thicken across the line's minor axis
        let (ox, oy) = if (segment.x2 - segment.x1).abs() >= (segment.y2 - segment.y1).abs() {
            (0.0, off)
        } else {
            (off, 0.0)
        };
        draw_line_segment_mut(
            &mut out,
            (segment.x1 as f32 + ox, segment.y1 as f32 + oy),
            (segment.x2 as f32 + ox, segment.y2 as f32 + oy),
            color,
        );
    }

    out
}
