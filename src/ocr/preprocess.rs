use image::{GrayImage, Luma, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

/// Colour-isolation filter applied before a fallback OCR pass.
///
/// Keeps only pixels within `variance` of one of the reference colours (per
/// channel), converts to greyscale, blurs, doubles the intensity and inverts,
/// leaving dark glyphs on a light background.
#[derive(Clone, Copy, Debug)]
pub struct ColourFilter {
    pub colours: &'static [([u8; 3], u8)],
}

impl ColourFilter {
    pub const DEFAULT: ColourFilter = ColourFilter {
        colours: &[([255, 255, 255], 80)],
    };

    pub const CHARACTER_COUNT: ColourFilter = ColourFilter {
        colours: &[([218, 194, 145], 30)],
    };

    pub const LIGHT_CONE_LEVEL: ColourFilter = ColourFilter {
        colours: &[([255, 255, 255], 80), ([239, 160, 61], 80)],
    };

    pub const TRACE: ColourFilter = ColourFilter {
        colours: &[
            ([255, 255, 255], 50),
            ([212, 214, 214], 50),
            ([160, 166, 175], 20),
            ([45, 240, 240], 20),
            ([26, 145, 150], 30),
            ([33, 180, 182], 30),
            ([38, 212, 206], 15),
            ([14, 77, 82], 10),
        ],
    };

    pub const EQUIPPED: ColourFilter = ColourFilter {
        colours: &[([202, 177, 134], 75)],
    };

    pub const MAIN_STAT: ColourFilter = ColourFilter {
        colours: &[([226, 155, 61], 50)],
    };

    pub const SUBSTAT: ColourFilter = ColourFilter {
        colours: &[([255, 255, 255], 95)],
    };

    pub const SUPERIMPOSITION: ColourFilter = ColourFilter {
        colours: &[([220, 196, 145], 50)],
    };

    fn matches(&self, rgb: [u8; 3]) -> bool {
        self.colours.iter().any(|(colour, variance)| {
            rgb.iter()
                .zip(colour)
                .all(|(&c, &r)| c >= r.saturating_sub(*variance) && c <= r.saturating_add(*variance))
        })
    }

    pub fn apply(&self, img: &RgbaImage) -> GrayImage {
        let (width, height) = img.dimensions();
        let mut masked = GrayImage::new(width, height);

        for (x, y, pixel) in img.enumerate_pixels() {
            let rgb = [pixel[0], pixel[1], pixel[2]];
            if self.matches(rgb) {
                masked.put_pixel(x, y, Luma([luma(rgb)]));
            }
        }

        let mut blurred = if width > 0 && height > 0 {
            gaussian_blur_f32(&masked, 1.0)
        } else {
            masked
        };

        for pixel in blurred.pixels_mut() {
            let brightened = pixel[0].saturating_mul(2);
            pixel[0] = 255 - brightened;
        }

        blurred
    }
}

/// ITU-R 601 luma, the same weights the usual RGB to grey conversion uses.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}
