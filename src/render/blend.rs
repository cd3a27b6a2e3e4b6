//! Pixel blending.

use crate::ir_map::Rgba;

/// Source-over on straight-alpha RGBA8, with `opacity` scaling the source alpha.
pub fn over(dst: Rgba, src: Rgba, opacity: f32) -> Rgba {
    let sa = f32::from(src[3]) / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    if sa >= 1.0 {
        return src;
    }

    let da = f32::from(dst[3]) / 255.0 * (1.0 - sa);
    let out_a = sa + da;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (f32::from(src[i]) * sa + f32::from(dst[i]) * da) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}
