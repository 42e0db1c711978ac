use image::{Rgba, RgbaImage};

use crate::layout::{RelativePoint, RelativeRect};

/// Crops a sub-region from an image using relative coordinates.
///
/// Converts the relative rect (0.0–1.0) to absolute pixel coordinates,
/// clamps to image bounds, and returns the cropped sub-image.
pub fn crop_region(img: &RgbaImage, region: &RelativeRect) -> RgbaImage {
    let (w, h) = img.dimensions();

    let x0 = ((region.x * w as f32) as u32).min(w);
    let y0 = ((region.y * h as f32) as u32).min(h);
    let rw = ((region.width * w as f32) as u32).min(w - x0);
    let rh = ((region.height * h as f32) as u32).min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Converts a relative point to a pixel position inside `size`, clamped to
/// the last row/column.
pub fn to_pixel(point: RelativePoint, size: (u32, u32)) -> (u32, u32) {
    let (w, h) = size;
    let x = ((point.x * w as f32) as u32).min(w.saturating_sub(1));
    let y = ((point.y * h as f32) as u32).min(h.saturating_sub(1));
    (x, y)
}

/// A client-area rectangle inside a captured frame, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Copies `crop` out of a mapped BGRA frame of `frame_size` whose rows are
/// `row_pitch` bytes apart. Pixels past the frame edge stay transparent black.
pub fn bgra_to_rgba(data: &[u8], row_pitch: usize, frame_size: (u32, u32), crop: FrameCrop) -> RgbaImage {
    let (fw, fh) = frame_size;
    RgbaImage::from_fn(crop.width, crop.height, |x, y| {
        let (sx, sy) = (crop.x + x, crop.y + y);
        if sx >= fw || sy >= fh {
            return Rgba([0, 0, 0, 0]);
        }
        let i = sy as usize * row_pitch + sx as usize * 4;
        match data.get(i..i + 4) {
            Some(&[b, g, r, a]) => Rgba([r, g, b, a]),
            _ => Rgba([0, 0, 0, 0]),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_region() {
        let img = RgbaImage::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let region = RelativeRect::new(0.1, 0.25, 0.5, 0.1);
        let cropped = crop_region(&img, &region);

        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_region_clamps() {
        let img = RgbaImage::new(100, 100);
        let region = RelativeRect::new(0.9, 0.9, 0.5, 0.5);
        let cropped = crop_region(&img, &region);

        assert_eq!(cropped.dimensions(), (10, 10));
    }

    #[test]
    fn test_to_pixel_clamps() {
        assert_eq!(to_pixel(RelativePoint::new(0.5, 0.5), (1920, 1080)), (960, 540));
        assert_eq!(to_pixel(RelativePoint::new(1.0, 1.0), (1920, 1080)), (1919, 1079));
    }

    #[test]
    fn test_bgra_to_rgba_crops_and_swaps() {
        // 3x2 frame, 16-byte rows (4 bytes of padding)
        let mut data = vec![0u8; 32];
        for y in 0..2 {
            for x in 0..3 {
                let i = y * 16 + x * 4;
                data[i..i + 4].copy_from_slice(&[x as u8, y as u8, 200, 255]);
            }
        }
        let crop = FrameCrop { x: 1, y: 1, width: 3, height: 1 };
        let img = bgra_to_rgba(&data, 16, (3, 2), crop);

        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(*img.get_pixel(0, 0), Rgba([200, 1, 1, 255]));
        assert_eq!(*img.get_pixel(1, 0), Rgba([200, 1, 2, 255]));
        assert_eq!(*img.get_pixel(2, 0), Rgba([0, 0, 0, 0]));
    }
}
