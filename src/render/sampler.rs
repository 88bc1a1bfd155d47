//! Equirectangular -> rectilinear projection.
//!
//! Camera space is right-handed with `+x` right, `+y` up and `+z` forward. A world ray maps to
//! longitude `atan2(x, z)` and latitude `asin(y)`, so yaw `0` looks at the centre column of the
//! panorama and positive yaw turns right.

use std::f64::consts::{PI, TAU};

use image::{Rgb, RgbImage};

use crate::foundation::core::{SamplingMode, ViewParameters};
use crate::foundation::error::PanoResult;
use crate::foundation::math::Mat3;
use crate::render::sphere::SphereImage;

/// Render one perspective frame from `sphere`.
///
/// Pure and deterministic; safe to call concurrently for different views.
pub fn render_view(sphere: &SphereImage, view: &ViewParameters) -> PanoResult<RgbImage> {
    view.validate()?;

    let (w, h) = (view.size.width, view.size.height);
    let focal = (f64::from(w) / 2.0) / (view.fov_x.to_radians() / 2.0).tan();
    let rot = Mat3::from_orientation(view.yaw, view.pitch, view.roll);

    // Pixel centres, normalised by the focal length.
    let xs: Vec<f64> = (0..w)
        .map(|u| (f64::from(u) + 0.5 - f64::from(w) / 2.0) / focal)
        .collect();
    let ys: Vec<f64> = (0..h)
        .map(|v| (f64::from(h) / 2.0 - (f64::from(v) + 0.5)) / focal)
        .collect();

    let src = sphere.pixels();
    let (sw, sh) = (f64::from(src.width()), f64::from(src.height()));

    Ok(RgbImage::from_fn(w, h, |u, v| {
        let [x, y, z] = rot.apply([xs[u as usize], ys[v as usize], 1.0]);
        let lon = x.atan2(z);
        let lat = y.atan2(x.hypot(z));
        let sx = (lon / TAU + 0.5) * sw;
        let sy = (0.5 - lat / PI) * sh;
        match view.mode {
            SamplingMode::Nearest => sample_nearest(src, sx, sy),
            SamplingMode::Bilinear => sample_bilinear(src, sx, sy),
        }
    }))
}

/// Wrap a column index around the longitude seam.
fn wrap_x(x: i64, width: u32) -> u32 {
    x.rem_euclid(i64::from(width)) as u32
}

/// Clamp a row index at the poles.
fn clamp_y(y: i64, height: u32) -> u32 {
    y.clamp(0, i64::from(height) - 1) as u32
}

fn sample_nearest(src: &RgbImage, sx: f64, sy: f64) -> Rgb<u8> {
    let x = wrap_x(sx.floor() as i64, src.width());
    let y = clamp_y(sy.floor() as i64, src.height());
    *src.get_pixel(x, y)
}

fn sample_bilinear(src: &RgbImage, sx: f64, sy: f64) -> Rgb<u8> {
    // Continuous coordinates address pixel edges; shift to pixel centres.
    let fx = sx - 0.5;
    let fy = sy - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let (x0, y0) = (x0 as i64, y0 as i64);
    let xa = wrap_x(x0, src.width());
    let xb = wrap_x(x0 + 1, src.width());
    let ya = clamp_y(y0, src.height());
    let yb = clamp_y(y0 + 1, src.height());

    let p00 = src.get_pixel(xa, ya).0;
    let p10 = src.get_pixel(xb, ya).0;
    let p01 = src.get_pixel(xa, yb).0;
    let p11 = src.get_pixel(xb, yb).0;

    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let top = f64::from(p00[c]) * (1.0 - tx) + f64::from(p10[c]) * tx;
        let bottom = f64::from(p01[c]) * (1.0 - tx) + f64::from(p11[c]) * tx;
        *o = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

#[cfg(test)]
#[path = "../../tests/unit/render/sampler.rs"]
mod tests;
