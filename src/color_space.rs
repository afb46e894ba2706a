//! Pixel transforms between sRGB, CIE Lab and HSV, plus the CIEDE2000
//! color difference.
//!
//! All working-space math is done in `f64`. Lab uses a D65 white point with
//! the classic `0.008856` / `7.787` piecewise cube root; HSV reports hue in
//! degrees `[0, 360)` and saturation/value in percent `[0, 100]`.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An 8-bit sRGB palette entry. Centroids are always reported in this form,
/// whatever space the clustering ran in.
pub type Rgb = Srgb<u8>;

/// The space clustering runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "native-bin", derive(clap::ValueEnum))]
pub enum ColorSpace {
    #[default]
    Rgb,
    Lab,
    Hsv,
}

impl ColorSpace {
    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::Rgb => "rgb",
            ColorSpace::Lab => "lab",
            ColorSpace::Hsv => "hsv",
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(ColorSpace::Rgb),
            "lab" => Ok(ColorSpace::Lab),
            "hsv" => Ok(ColorSpace::Hsv),
            other => Err(Error::InvalidConfig(format!(
                "unknown color space {other:?} (expected rgb, lab or hsv)"
            ))),
        }
    }
}

/// One pixel of a converted buffer: the working-space triple and the source
/// alpha, carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingPixel {
    pub color: [f64; 3],
    pub alpha: u8,
}

// D65 reference white
const XN: f64 = 0.95047;
const YN: f64 = 1.00000;
const ZN: f64 = 1.08883;

const LAB_EPSILON: f64 = 0.008856;
const LAB_KAPPA: f64 = 7.787;
const LAB_OFFSET: f64 = 16.0 / 116.0;
const LAB_INVERSE_THRESHOLD: f64 = 0.206893;

#[inline]
fn srgb_to_linear(v: f64) -> f64 {
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

#[inline]
fn linear_to_srgb(v: f64) -> f64 {
    if v > 0.0031308 {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * v
    }
}

#[inline]
fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        LAB_KAPPA * t + LAB_OFFSET
    }
}

#[inline]
fn lab_f_inv(t: f64) -> f64 {
    if t > LAB_INVERSE_THRESHOLD {
        t * t * t
    } else {
        (t - LAB_OFFSET) / LAB_KAPPA
    }
}

#[inline]
fn to_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// sRGB bytes to CIE Lab `[L, a, b]`.
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> [f64; 3] {
    let r = srgb_to_linear(r as f64 / 255.0);
    let g = srgb_to_linear(g as f64 / 255.0);
    let b = srgb_to_linear(b as f64 / 255.0);

    let x = (r * 0.4124 + g * 0.3576 + b * 0.1805) / XN;
    let y = (r * 0.2126 + g * 0.7152 + b * 0.0722) / YN;
    let z = (r * 0.0193 + g * 0.1192 + b * 0.9505) / ZN;

    let fx = lab_f(x);
    let fy = lab_f(y);
    let fz = lab_f(z);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIE Lab back to sRGB bytes, gamma re-encoded then rounded and clamped.
pub fn lab_to_rgb(l: f64, a: f64, b: f64) -> Rgb {
    let fy = (l + 16.0) / 116.0;
    let fx = a / 500.0 + fy;
    let fz = fy - b / 200.0;

    let x = lab_f_inv(fx) * XN;
    let y = lab_f_inv(fy) * YN;
    let z = lab_f_inv(fz) * ZN;

    let r = x * 3.2406 + y * -1.5372 + z * -0.4986;
    let g = x * -0.9689 + y * 1.8758 + z * 0.0415;
    let bl = x * 0.0557 + y * -0.2040 + z * 1.0570;

    Srgb::new(
        to_channel(linear_to_srgb(r) * 255.0),
        to_channel(linear_to_srgb(g) * 255.0),
        to_channel(linear_to_srgb(bl) * 255.0),
    )
}

/// sRGB bytes to `[H, S, V]` with hue in degrees.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [f64; 3] {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let mut h = 0.0;
    if diff != 0.0 {
        h = if max == r {
            ((g - b) / diff) % 6.0
        } else if max == g {
            (b - r) / diff + 2.0
        } else {
            (r - g) / diff + 4.0
        };
    }
    let h = (h * 60.0 + 360.0) % 360.0;
    let s = if max == 0.0 { 0.0 } else { diff / max };

    [h, s * 100.0, max * 100.0]
}

pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let h = h.rem_euclid(360.0) / 60.0;
    let s = s / 100.0;
    let v = v / 100.0;

    let c = v * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 1.0 {
        (c, x, 0.0)
    } else if h < 2.0 {
        (x, c, 0.0)
    } else if h < 3.0 {
        (0.0, c, x)
    } else if h < 4.0 {
        (0.0, x, c)
    } else if h < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    Srgb::new(
        to_channel((r + m) * 255.0),
        to_channel((g + m) * 255.0),
        to_channel((b + m) * 255.0),
    )
}

/// Convert one sRGB color into `space`. Rgb is the identity.
pub fn rgb_to_working(color: Rgb, space: ColorSpace) -> [f64; 3] {
    match space {
        ColorSpace::Rgb => [color.red as f64, color.green as f64, color.blue as f64],
        ColorSpace::Lab => rgb_to_lab(color.red, color.green, color.blue),
        ColorSpace::Hsv => rgb_to_hsv(color.red, color.green, color.blue),
    }
}

/// Convert one working-space triple back to sRGB bytes.
pub fn working_to_rgb(color: [f64; 3], space: ColorSpace) -> Rgb {
    match space {
        ColorSpace::Rgb => Srgb::new(
            to_channel(color[0]),
            to_channel(color[1]),
            to_channel(color[2]),
        ),
        ColorSpace::Lab => lab_to_rgb(color[0], color[1], color[2]),
        ColorSpace::Hsv => hsv_to_rgb(color[0], color[1], color[2]),
    }
}

/// Convert a whole RGBA buffer into `space`, keeping each pixel's alpha.
///
/// Working values stay in `f64` at their natural ranges; no byte packing or
/// channel offsets are applied in any space.
pub fn to_working(rgba: &[u8], space: ColorSpace) -> Vec<WorkingPixel> {
    rgba.chunks_exact(4)
        .map(|px| WorkingPixel {
            color: rgb_to_working(Srgb::new(px[0], px[1], px[2]), space),
            alpha: px[3],
        })
        .collect()
}

/// Inverse of [`to_working`]: back to an RGBA byte buffer.
pub fn to_rgba(pixels: &[WorkingPixel], space: ColorSpace) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 4);
    for px in pixels {
        let rgb = working_to_rgb(px.color, space);
        out.extend_from_slice(&[rgb.red, rgb.green, rgb.blue, px.alpha]);
    }
    out
}

/// CIEDE2000 color difference between two Lab colors (kL = kC = kH = 1).
pub fn delta_e_2000(lab1: [f64; 3], lab2: [f64; 3]) -> f64 {
    let [l1, a1, b1] = lab1;
    let [l2, a2, b2] = lab2;
    let pow25_7 = 25f64.powi(7);

    let avg_lp = (l1 + l2) / 2.0;
    let c1 = (a1 * a1 + b1 * b1).sqrt();
    let c2 = (a2 * a2 + b2 * b2).sqrt();
    let avg_c = (c1 + c2) / 2.0;

    let avg_c7 = avg_c.powi(7);
    let g = 0.5 * (1.0 - (avg_c7 / (avg_c7 + pow25_7)).sqrt());
    let a1p = a1 * (1.0 + g);
    let a2p = a2 * (1.0 + g);
    let c1p = (a1p * a1p + b1 * b1).sqrt();
    let c2p = (a2p * a2p + b2 * b2).sqrt();
    let avg_cp = (c1p + c2p) / 2.0;

    let h1p = b1.atan2(a1p).rem_euclid(2.0 * PI);
    let h2p = b2.atan2(a2p).rem_euclid(2.0 * PI);
    let chroma_product = c1p * c2p;

    let mut dhp = h2p - h1p;
    if chroma_product == 0.0 {
        dhp = 0.0;
    } else if dhp > PI {
        dhp -= 2.0 * PI;
    } else if dhp < -PI {
        dhp += 2.0 * PI;
    }

    let dlp = l2 - l1;
    let dcp = c2p - c1p;
    let dhp_term = 2.0 * chroma_product.sqrt() * (dhp / 2.0).sin();

    let mut avg_hp = h1p + h2p;
    if chroma_product != 0.0 {
        if (h1p - h2p).abs() > PI {
            avg_hp += if avg_hp < 2.0 * PI { 2.0 * PI } else { -2.0 * PI };
        }
        avg_hp /= 2.0;
    }

    let t = 1.0 - 0.17 * (avg_hp - PI / 6.0).cos()
        + 0.24 * (2.0 * avg_hp).cos()
        + 0.32 * (3.0 * avg_hp + PI / 30.0).cos()
        - 0.20 * (4.0 * avg_hp - 63.0 * PI / 180.0).cos();

    let lp50 = (avg_lp - 50.0) * (avg_lp - 50.0);
    let sl = 1.0 + (0.015 * lp50) / (20.0 + lp50).sqrt();
    let sc = 1.0 + 0.045 * avg_cp;
    let sh = 1.0 + 0.015 * avg_cp * t;

    let delta_theta = (30.0 * PI / 180.0) * (-((avg_hp.to_degrees() - 275.0) / 25.0).powi(2)).exp();
    let avg_cp7 = avg_cp.powi(7);
    let rc = 2.0 * (avg_cp7 / (avg_cp7 + pow25_7)).sqrt();
    let rt = -rc * (2.0 * delta_theta).sin();

    let l_term = dlp / sl;
    let c_term = dcp / sc;
    let h_term = dhp_term / sh;

    (l_term * l_term + c_term * c_term + h_term * h_term + rt * c_term * h_term).sqrt()
}

/// `#rrggbb`, lowercase.
pub fn rgb_to_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

/// Parse `rrggbb` with an optional leading `#`.
pub fn hex_to_rgb(hex: &str) -> Result<Rgb> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHex(hex.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| Error::InvalidHex(hex.to_string()))
    };
    Ok(Srgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn lab_of_white_and_black() {
        let [l, a, b] = rgb_to_lab(255, 255, 255);
        assert_close(l, 100.0, 0.01);
        assert_close(a, 0.0, 0.05);
        assert_close(b, 0.0, 0.05);

        let [l, a, b] = rgb_to_lab(0, 0, 0);
        assert_close(l, 0.0, 1e-9);
        assert_close(a, 0.0, 1e-9);
        assert_close(b, 0.0, 1e-9);
    }

    #[test]
    fn lab_matches_palette_within_tolerance() {
        use palette::{FromColor, Lab};

        for &(r, g, b) in &[(12u8, 120u8, 200u8), (240, 32, 160), (80, 200, 40), (128, 128, 128)] {
            let ours = rgb_to_lab(r, g, b);
            let reference: Lab = Lab::from_color(Srgb::new(r, g, b).into_format::<f32>());
            assert_close(ours[0], reference.l as f64, 0.5);
            assert_close(ours[1], reference.a as f64, 1.0);
            assert_close(ours[2], reference.b as f64, 1.0);
        }
    }

    #[test]
    fn lab_round_trip_within_two() {
        for r in (0..=255u8).step_by(15) {
            for g in (0..=255u8).step_by(15) {
                for b in (0..=255u8).step_by(15) {
                    let [l, la, lb] = rgb_to_lab(r, g, b);
                    let back = lab_to_rgb(l, la, lb);
                    assert!((back.red as i16 - r as i16).abs() <= 2, "{r},{g},{b} -> {back:?}");
                    assert!((back.green as i16 - g as i16).abs() <= 2, "{r},{g},{b} -> {back:?}");
                    assert!((back.blue as i16 - b as i16).abs() <= 2, "{r},{g},{b} -> {back:?}");
                }
            }
        }
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0.0, 100.0, 100.0]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [120.0, 100.0, 100.0]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [240.0, 100.0, 100.0]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0.0, 0.0, 0.0]);

        let [h, s, _] = rgb_to_hsv(255, 0, 128);
        assert!((0.0..360.0).contains(&h));
        assert_close(s, 100.0, 1e-9);
    }

    #[test]
    fn hsv_round_trip() {
        for &(r, g, b) in &[(255u8, 0u8, 0u8), (12, 120, 200), (240, 32, 160), (77, 77, 77), (255, 255, 255)] {
            let [h, s, v] = rgb_to_hsv(r, g, b);
            assert_eq!(hsv_to_rgb(h, s, v), Srgb::new(r, g, b));
        }
    }

    #[test]
    fn rgb_buffer_conversion_is_identity() {
        let rgba = [10, 20, 30, 40, 200, 100, 0, 255];
        let working = to_working(&rgba, ColorSpace::Rgb);
        assert_eq!(working[0].color, [10.0, 20.0, 30.0]);
        assert_eq!(working[1].alpha, 255);
        assert_eq!(to_rgba(&working, ColorSpace::Rgb), rgba.to_vec());
    }

    #[test]
    fn buffer_conversion_preserves_alpha() {
        let rgba = [10, 20, 30, 7, 200, 100, 0, 0];
        for space in [ColorSpace::Lab, ColorSpace::Hsv] {
            let working = to_working(&rgba, space);
            assert_eq!(working[0].alpha, 7);
            assert_eq!(working[1].alpha, 0);
            let back = to_rgba(&working, space);
            assert_eq!(back[3], 7);
            assert_eq!(back[7], 0);
        }
    }

    #[test]
    fn delta_e_identity_and_symmetry() {
        let samples = [
            [50.0, 0.0, 0.0],
            [53.2, 80.1, 67.2],
            [32.3, 79.2, -107.9],
            [87.7, -86.2, 83.2],
            [0.0, 0.0, 0.0],
        ];
        for a in samples {
            assert!(delta_e_2000(a, a).abs() < 1e-9);
            for b in samples {
                assert_close(delta_e_2000(a, b), delta_e_2000(b, a), 1e-9);
            }
        }
    }

    #[test]
    fn delta_e_reference_pairs() {
        // Sharma, Wu & Dalal (2005) test data
        let pairs = [
            ([50.0, 2.6772, -79.7751], [50.0, 0.0, -82.7485], 2.0425),
            ([50.0, 2.5, 0.0], [61.0, -5.0, 29.0], 22.8977),
            ([50.0, 2.5, 0.0], [73.0, 25.0, -18.0], 27.1492),
            ([60.2574, -34.0099, 36.2677], [60.4626, -34.1751, 39.4387], 1.2644),
        ];
        for (lab1, lab2, expected) in pairs {
            assert_close(delta_e_2000(lab1, lab2), expected, 1e-4);
        }
    }

    #[test]
    fn delta_e_orders_differences() {
        let small = delta_e_2000([50.0, 0.0, 0.0], [55.0, 0.0, 0.0]);
        let large = delta_e_2000([50.0, 0.0, 0.0], [80.0, 60.0, -60.0]);
        assert!(large > small);
    }

    #[test]
    fn hex_round_trip() {
        for hex in ["#000000", "#ffffff", "#1e90ff", "#ff00aa"] {
            assert_eq!(rgb_to_hex(hex_to_rgb(hex).unwrap()), hex);
        }
        assert_eq!(hex_to_rgb("1E90FF").unwrap(), Srgb::new(0x1e, 0x90, 0xff));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(matches!(hex_to_rgb("#12345"), Err(Error::InvalidHex(_))));
        assert!(matches!(hex_to_rgb("zzzzzz"), Err(Error::InvalidHex(_))));
        assert!(matches!(hex_to_rgb("+1ffff"), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn color_space_tags() {
        assert_eq!("LAB".parse::<ColorSpace>().unwrap(), ColorSpace::Lab);
        assert!(matches!("xyz".parse::<ColorSpace>(), Err(Error::InvalidConfig(_))));
    }
}
