//! 2D drawing surface backed by a tiny-skia pixmap.
//!
//! Exposes the raster operations the tile pipeline needs: filled shapes,
//! polylines, pixel access, alpha compositing of pre-rendered stamps, and
//! a separable Gaussian blur. Colors at the API boundary are straight
//! RGBA; the backing store is premultiplied.

use rayon::prelude::*;
use tiny_skia::{
    BlendMode, ColorU8, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    PremultipliedColorU8, Stroke, Transform,
};

use map_common::{Color, MapError, MapResult};

/// An RGBA raster surface.
#[derive(Clone)]
pub struct Canvas {
    pixmap: Pixmap,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Canvas {
    /// Create a transparent canvas. Zero-sized dimensions are rejected.
    pub fn new(width: u32, height: u32) -> MapResult<Self> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| MapError::Render(format!("invalid canvas size {}x{}", width, height)))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Fill the whole surface with an opaque color.
    pub fn fill_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.pixmap
            .fill(tiny_skia::Color::from_rgba8(r, g, b, 255));
    }

    /// Write a single pixel; out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let (w, h) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        if x < 0 || y < 0 || x >= w || y >= h {
            return;
        }
        let idx = (y * w + x) as usize;
        self.pixmap.pixels_mut()[idx] =
            ColorU8::from_rgba(color.r, color.g, color.b, color.a).premultiply();
    }

    /// Read a pixel as straight RGBA; None when out of bounds.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let (w, h) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        if x < 0 || y < 0 || x >= w || y >= h {
            return None;
        }
        let c = self.pixmap.pixels()[(y * w + x) as usize].demultiply();
        Some(Color::rgba(c.red(), c.green(), c.blue(), c.alpha()))
    }

    /// Alpha channel of a pixel; None when out of bounds.
    pub fn alpha_at(&self, x: i32, y: i32) -> Option<u8> {
        let (w, h) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        if x < 0 || y < 0 || x >= w || y >= h {
            return None;
        }
        Some(self.pixmap.pixels()[(y * w + x) as usize].alpha())
    }

    /// Antialiased filled circle centered at (cx, cy).
    pub fn fill_circle(&mut self, cx: f64, cy: f64, diameter: f64, color: Color) {
        let radius = (diameter / 2.0) as f32;
        if radius <= 0.0 {
            return;
        }
        let Some(path) = PathBuilder::from_circle(cx as f32, cy as f32, radius) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    /// Antialiased filled polygon; the ring is closed implicitly.
    pub fn fill_polygon(&mut self, points: &[(f64, f64)], color: Color) {
        let Some(path) = build_path(points, true) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    /// Antialiased open polyline with round caps and joins.
    pub fn stroke_polyline(&mut self, points: &[(f64, f64)], color: Color, width: f32) {
        let Some(path) = build_path(points, false) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        let mut stroke = Stroke::default();
        stroke.width = width;
        stroke.line_cap = LineCap::Round;
        stroke.line_join = LineJoin::Round;
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Composite another canvas at (x, y) with SourceOver and the given
    /// opacity in [0, 1].
    pub fn stamp(&mut self, stamp: &Canvas, x: i32, y: i32, opacity: f32) {
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            blend_mode: BlendMode::SourceOver,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(x, y, stamp.pixmap.as_ref(), &paint, Transform::identity(), None);
    }

    /// True if every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|p| p.alpha() == 0)
    }

    /// Separable Gaussian blur over the premultiplied buffer.
    /// Rows are processed in parallel; edges clamp.
    pub fn gaussian_blur(&mut self, sigma: f32) {
        if sigma <= 0.0 {
            return;
        }
        let w = self.pixmap.width() as usize;
        let h = self.pixmap.height() as usize;
        let kernel = gaussian_kernel(sigma);
        let half = (kernel.len() / 2) as isize;

        // Horizontal pass
        let src = self.pixmap.data().to_vec();
        let mut tmp = vec![0u8; src.len()];
        tmp.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
            let src_row = &src[y * w * 4..(y + 1) * w * 4];
            for x in 0..w {
                for c in 0..4 {
                    let mut acc = 0.0f32;
                    for (k, &weight) in kernel.iter().enumerate() {
                        let sx = (x as isize + k as isize - half).clamp(0, w as isize - 1) as usize;
                        acc += src_row[sx * 4 + c] as f32 * weight;
                    }
                    row[x * 4 + c] = acc.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

        // Vertical pass, writing back into the pixmap
        let data = self.pixmap.data_mut();
        data.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
            for x in 0..w {
                let mut out = [0u8; 4];
                for (c, slot) in out.iter_mut().enumerate() {
                    let mut acc = 0.0f32;
                    for (k, &weight) in kernel.iter().enumerate() {
                        let sy = (y as isize + k as isize - half).clamp(0, h as isize - 1) as usize;
                        acc += tmp[(sy * w + x) * 4 + c] as f32 * weight;
                    }
                    *slot = acc.round().clamp(0.0, 255.0) as u8;
                }
                // keep the premultiplied invariant under rounding
                let a = out[3];
                row[x * 4] = out[0].min(a);
                row[x * 4 + 1] = out[1].min(a);
                row[x * 4 + 2] = out[2].min(a);
                row[x * 4 + 3] = a;
            }
        });
    }

    /// Encode the canvas as a PNG.
    pub fn to_png(&self) -> MapResult<Vec<u8>> {
        let pixels = self.to_rgba();
        crate::png::encode_auto(&pixels, self.width() as usize, self.height() as usize)
    }

    /// Copy out the surface as straight (non-premultiplied) RGBA bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixmap.pixels().len() * 4);
        for p in self.pixmap.pixels() {
            let c = p.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    pub(crate) fn pixels(&self) -> &[PremultipliedColorU8] {
        self.pixmap.pixels()
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [PremultipliedColorU8] {
        self.pixmap.pixels_mut()
    }
}

fn build_path(points: &[(f64, f64)], close: bool) -> Option<tiny_skia::Path> {
    if points.len() < 2 {
        return None;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(points[0].0 as f32, points[0].1 as f32);
    for &(x, y) in &points[1..] {
        pb.line_to(x as f32, y as f32);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

/// Normalized 1D Gaussian kernel with half-width ceil(2.57 * sigma).
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let half = (2.57 * sigma).ceil() as i32;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-(i * i) as f32 / two_sigma_sq).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}
