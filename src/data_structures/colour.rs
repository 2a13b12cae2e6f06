//! Linear RGB colours.
//!
//! Colours in the configuration and in glTF hex notation are sRGB encoded.
//! Everything the shaders see (light colours, emissive, clear colour) is linear,
//! so [`Rgb::from_hex`] performs the sRGB decode once at the boundary.

use serde::{Deserialize, Serialize};

/// A colour in linear RGB space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Decode an sRGB hex triplet such as `0x25244b`.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Self {
            r: channel(16),
            g: channel(8),
            b: channel(0),
        }
    }

    /// Encode back to an sRGB hex triplet. Lossy: channels are rounded to 8 bit.
    pub fn to_hex(self) -> u32 {
        let channel = |c: f32| (linear_to_srgb(c).clamp(0.0, 1.0) * 255.0).round() as u32;
        channel(self.r) << 16 | channel(self.g) << 8 | channel(self.b)
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.r),
            g: f64::from(self.g),
            b: f64::from(self.b),
            a: 1.0,
        }
    }
}

impl From<[f32; 3]> for Rgb {
    fn from(rgb: [f32; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c < 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_channels_decode_to_unit_values() {
        let red = Rgb::from_hex(0xff0000);
        assert!((red.r - 1.0).abs() < 1e-6);
        assert_eq!((red.g, red.b), (0.0, 0.0));
        assert_eq!(Rgb::from_hex(0x000000), Rgb::BLACK);
        let white = Rgb::from_hex(0xffffff);
        assert!((white.r - 1.0).abs() < 1e-6);
        assert!((white.g - 1.0).abs() < 1e-6);
        assert!((white.b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn background_hex_survives_encode() {
        let background = Rgb::from_hex(0x25244b);
        assert!(background.r < 0.03 && background.b > 0.06);
        assert_eq!(background.to_hex(), 0x25244b);
    }

    #[test]
    fn wgpu_colour_is_opaque() {
        let colour = Rgb::new(0.25, 0.5, 0.75).to_wgpu();
        assert_eq!(colour.a, 1.0);
        assert_eq!(colour.g, 0.5);
    }
}
