use image::{Rgb, RgbImage};

use crate::error::{PipelineError, Result};
use crate::segmentation::{ClassMap, LabelSet};

/// Paint every pixel of `class_map` with its label color.
pub fn build_mask(class_map: &ClassMap, labels: &LabelSet) -> Result<RgbImage> {
    let (width, height) = class_map.dimensions();
    let mut mask = RgbImage::new(width, height);
    for ((y, x), &index) in class_map.indices().indexed_iter() {
        let label = labels.get(index).ok_or(PipelineError::UnknownClass {
            index,
            len: labels.len(),
        })?;
        mask.put_pixel(x as u32, y as u32, label.color);
    }
    Ok(mask)
}

/// Per-pixel `alpha * mask + (1 - alpha) * frame`.
///
/// `alpha == 0` reproduces the frame and `alpha == 1` the mask exactly.
pub fn blend(frame: &RgbImage, mask: &RgbImage, alpha: f32) -> Result<RgbImage> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(PipelineError::InvalidAlpha(alpha));
    }
    if frame.dimensions() != mask.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            frame: frame.dimensions(),
            mask: mask.dimensions(),
        });
    }

    let (width, height) = frame.dimensions();
    let blended = RgbImage::from_fn(width, height, |x, y| {
        let f = frame.get_pixel(x, y);
        let m = mask.get_pixel(x, y);
        Rgb([
            mix(f[0], m[0], alpha),
            mix(f[1], m[1], alpha),
            mix(f[2], m[2], alpha),
        ])
    });
    Ok(blended)
}

fn mix(frame: u8, mask: u8, alpha: f32) -> u8 {
    (alpha * mask as f32 + (1.0 - alpha) * frame as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{palette_color, Label};
    use ndarray::Array2;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 37 % 256) as u8, (y * 91 % 256) as u8, ((x + y) * 13 % 256) as u8])
        })
    }

    #[test]
    fn mask_uses_label_colors() {
        let labels = LabelSet::new(vec![
            Label {
                name: "ground".into(),
                color: Rgb([10, 20, 30]),
            },
            Label {
                name: "sky".into(),
                color: Rgb([200, 210, 220]),
            },
        ]);
        let map = ClassMap::new(Array2::from_shape_vec((1, 3), vec![0, 1, 1]).unwrap());
        let mask = build_mask(&map, &labels).unwrap();
        assert_eq!(mask.dimensions(), (3, 1));
        assert_eq!(*mask.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*mask.get_pixel(2, 0), Rgb([200, 210, 220]));
    }

    #[test]
    fn mask_rejects_unknown_class() {
        let labels = LabelSet::from_names(["background", "person"]);
        let map = ClassMap::filled(2, 2, 7);
        let err = build_mask(&map, &labels).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownClass { index: 7, len: 2 }));
    }

    #[test]
    fn blend_boundaries_are_exact() {
        let frame = gradient(16, 9);
        let mask = RgbImage::from_fn(16, 9, |x, _| palette_color(x as usize));
        assert_eq!(blend(&frame, &mask, 0.0).unwrap(), frame);
        assert_eq!(blend(&frame, &mask, 1.0).unwrap(), mask);
    }

    #[test]
    fn blend_half_averages() {
        let frame = RgbImage::from_pixel(1, 1, Rgb([0, 100, 255]));
        let mask = RgbImage::from_pixel(1, 1, Rgb([200, 100, 0]));
        let out = blend(&frame, &mask, 0.5).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgb([100, 100, 128]));
    }

    #[test]
    fn blend_rejects_mismatched_dimensions() {
        let err = blend(&RgbImage::new(4, 4), &RgbImage::new(4, 3), 0.5).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch {
                frame: (4, 4),
                mask: (4, 3)
            }
        ));
    }

    #[test]
    fn blend_rejects_alpha_out_of_range() {
        let frame = RgbImage::new(1, 1);
        assert!(blend(&frame, &frame, 1.5).is_err());
        assert!(blend(&frame, &frame, -0.1).is_err());
        assert!(blend(&frame, &frame, f32::NAN).is_err());
    }
}
