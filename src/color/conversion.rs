//! Color space conversion utilities
//!
//! Provides the conversions the stages share:
//! - sRGB transfer function encoding and decoding (8-bit and float)
//! - whole-image linearization and display encoding
//! - HSV on the 0-255 scale used by the thresholding segmentor

use image::{Rgb, Rgb32FImage, RgbImage};
use palette::{FromColor, Hsv, LinSrgb, Srgb};

/// Decode 8-bit sRGB to linear light in [0, 1]
pub fn srgb8_to_linear(rgb: [u8; 3]) -> [f32; 3] {
    let lin: LinSrgb<f32> = Srgb::new(rgb[0], rgb[1], rgb[2])
        .into_format::<f32>()
        .into_linear();
    [lin.red, lin.green, lin.blue]
}

/// Encode linear light to 8-bit sRGB, clipping out-of-gamut values
pub fn linear_to_srgb8(rgb: [f32; 3]) -> [u8; 3] {
    let lin = LinSrgb::new(clip_unit(rgb[0]), clip_unit(rgb[1]), clip_unit(rgb[2]));
    let encoded: Srgb<u8> = Srgb::<f32>::from_linear(lin).into_format();
    [encoded.red, encoded.green, encoded.blue]
}

/// Linearize an 8-bit sRGB image
pub fn linearize(image: &RgbImage) -> Rgb32FImage {
    let mut out = Rgb32FImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        *dst = Rgb(srgb8_to_linear(src.0));
    }
    out
}

/// Encode a linear-light image for display
pub fn encode_display(image: &Rgb32FImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        *dst = Rgb(linear_to_srgb8(src.0));
    }
    out
}

/// HSV of an 8-bit sRGB pixel as (hue degrees, saturation 0-255, value 0-255)
pub fn rgb8_to_hsv(rgb: [u8; 3]) -> (f32, f32, f32) {
    let srgb = Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>();
    let hsv: Hsv = Hsv::from_color(srgb);
    (
        hsv.hue.into_positive_degrees(),
        hsv.saturation * 255.0,
        hsv.value * 255.0,
    )
}

/// NaN maps to 0
fn clip_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transfer_function_endpoints() {
        assert_eq!(srgb8_to_linear([0, 0, 0]), [0.0, 0.0, 0.0]);
        let white = srgb8_to_linear([255, 255, 255]);
        assert_relative_eq!(white[0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mid_gray_is_darker_in_linear_light() {
        let lin = srgb8_to_linear([128, 128, 128]);
        assert_relative_eq!(lin[1], 0.2158, epsilon = 1e-3);
    }

    #[test]
    fn test_encode_inverts_decode() {
        for v in [0u8, 1, 17, 64, 128, 200, 254, 255] {
            assert_eq!(linear_to_srgb8(srgb8_to_linear([v, v, v])), [v, v, v]);
        }
    }

    #[test]
    fn test_encode_clips_out_of_gamut() {
        assert_eq!(linear_to_srgb8([-0.5, 1.7, f32::NAN]), [0, 255, 0]);
    }

    #[test]
    fn test_hsv_of_pure_green() {
        let (h, s, v) = rgb8_to_hsv([0, 255, 0]);
        assert_relative_eq!(h, 120.0, epsilon = 1e-3);
        assert_relative_eq!(s, 255.0, epsilon = 1e-3);
        assert_relative_eq!(v, 255.0, epsilon = 1e-3);
    }

    #[test]
    fn test_image_conversion_keeps_dimensions() {
        let img = RgbImage::from_pixel(3, 2, Rgb([10, 120, 30]));
        let lin = linearize(&img);
        assert_eq!(lin.dimensions(), (3, 2));
        assert_eq!(encode_display(&lin), img);
    }
}
