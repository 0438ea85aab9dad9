//! Density heatmap rendering.
//!
//! Points accumulate into per-pixel counts, each stamped onto the canvas
//! as a radial gradient whose opacity tracks the count. With a color ramp
//! configured the grayscale density is negated and remapped through the
//! ramp; without one the raw alpha-composited stamps are returned.

use std::collections::HashMap;

use rayon::prelude::*;
use tiny_skia::ColorU8;

use map_common::{Color, MapResult};

use crate::canvas::Canvas;
use crate::contour::{self, Contour};

const RAMP_SIZE: f64 = 500.0;

/// Heatmap generator.
#[derive(Debug, Clone)]
pub struct HeatMap {
    width: u32,
    height: u32,
    /// (x, y, count) triplets with unique (x, y), in insertion order.
    points: Vec<(i32, i32, u32)>,
    index: HashMap<(i32, i32), usize>,
    max_occurrence: u32,
    intensity: f32,
    blur: f32,
    radius: u32,
    colors: Option<Vec<Color>>,
}

impl HeatMap {
    /// Empty heatmap with the default cold-to-hot ramp and radius 32.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            points: Vec::new(),
            index: HashMap::new(),
            max_occurrence: 1,
            intensity: 1.0,
            blur: 1.0,
            radius: 32,
            colors: Some(build_ramp(&[
                Color::BLACK,
                Color::CYAN,
                Color::GREEN,
                Color::YELLOW,
                Color::RED,
            ])),
        }
    }

    /// Build a heatmap from raw pixel coordinates. Duplicate coordinates
    /// aggregate into counts; the canvas extent comes from the bounding
    /// box of the points. No ramp is configured.
    pub fn from_points(points: &[(i32, i32)], radius: u32) -> Self {
        let mut heatmap = Self {
            width: 1,
            height: 1,
            points: Vec::new(),
            index: HashMap::new(),
            max_occurrence: 1,
            intensity: 1.0,
            blur: 1.0,
            radius,
            colors: None,
        };
        heatmap.add_points(points);

        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
        for &(x, y, _) in &heatmap.points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if !heatmap.points.is_empty() {
            heatmap.width = (max_x - min_x).unsigned_abs().max(1);
            heatmap.height = (max_y - min_y).unsigned_abs().max(1);
        }
        heatmap
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Point stamp radius in pixels; values below 1 are ignored.
    pub fn set_radius(&mut self, radius: u32) {
        if radius < 1 {
            return;
        }
        self.radius = radius;
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Per-point opacity factor in (0, 1]; out-of-range values are ignored.
    pub fn set_intensity(&mut self, intensity: f32) {
        if intensity > 1.0 || intensity <= 0.0 {
            return;
        }
        self.intensity = intensity;
    }

    /// Percent blur applied to the stamp edge, in (0, 1]; out-of-range
    /// values are ignored.
    pub fn set_blur(&mut self, blur: f32) {
        if blur > 1.0 || blur <= 0.0 {
            return;
        }
        self.blur = blur;
    }

    pub fn max_occurrence(&self) -> u32 {
        self.max_occurrence
    }

    /// Override the normalization denominator. Normally tracked
    /// automatically, but a tiling caller may pin it so that adjacent
    /// tiles normalize identically. Zero is ignored.
    pub fn set_max_occurrence(&mut self, max_occurrence: u32) {
        if max_occurrence == 0 {
            return;
        }
        self.max_occurrence = max_occurrence;
    }

    pub fn colors(&self) -> Option<&[Color]> {
        self.colors.as_deref()
    }

    /// Build the blended ramp from a list of key colors, cold to hot.
    /// Opacity ramps from 0 to 255 across the first segment.
    pub fn set_colors(&mut self, colors: &[Color]) {
        if colors.len() < 2 {
            return;
        }
        self.colors = Some(build_ramp(colors));
    }

    /// Ramp from hex color strings; entries not starting with `#` are
    /// skipped.
    pub fn set_colors_hex(&mut self, hex: &[&str]) {
        let parsed: Vec<Color> = hex
            .iter()
            .filter(|s| s.starts_with('#'))
            .filter_map(|s| Color::from_hex(s))
            .collect();
        self.set_colors(&parsed);
    }

    /// Use a pre-built ramp verbatim.
    pub fn set_colors_raw(&mut self, colors: Vec<Color>) {
        if colors.is_empty() {
            return;
        }
        self.colors = Some(colors);
    }

    /// Read a ramp out of a color-scale image: column 0 top to bottom when
    /// `use_rows`, row 0 left to right otherwise.
    pub fn set_colors_from_image(&mut self, image: &Canvas, use_rows: bool) {
        let ramp: Vec<Color> = if use_rows {
            (0..image.height() as i32)
                .filter_map(|y| image.pixel(0, y))
                .collect()
        } else {
            (0..image.width() as i32)
                .filter_map(|x| image.pixel(x, 0))
                .collect()
        };
        self.set_colors_raw(ramp);
    }

    /// Add points, aggregating duplicates at identical pixel coordinates.
    /// The running maximum count is tracked unless overridden.
    pub fn add_points(&mut self, points: &[(i32, i32)]) {
        for &(x, y) in points {
            let count = match self.index.get(&(x, y)) {
                Some(&i) => {
                    self.points[i].2 += 1;
                    self.points[i].2
                }
                None => {
                    self.index.insert((x, y), self.points.len());
                    self.points.push((x, y, 1));
                    1
                }
            };
            if count > self.max_occurrence {
                self.max_occurrence = count;
            }
        }
    }

    /// Render the heatmap.
    pub fn render(&self) -> MapResult<Canvas> {
        composite(
            &self.points,
            self.width,
            self.height,
            self.colors.as_deref(),
            self.radius,
            self.intensity,
            self.blur,
            self.max_occurrence,
        )
    }

    /// Extract iso-density contours at the given percentile breakpoints.
    ///
    /// An empty slice selects the defaults: the 80th percentile, the value
    /// halfway between that and the minimum, and the minimum observed
    /// density. Returned coordinates are in the heatmap's pixel space.
    pub fn contours(&self, percentiles: &[f64]) -> MapResult<Vec<Contour>> {
        // Work on an expanded canvas so the blur never clips at the edges
        let blur_px = self.radius as f64;
        let offset = (self.radius as f64 + blur_px).ceil() as i32;
        let width = self.width + 2 * offset as u32;
        let height = self.height + 2 * offset as u32;
        let shifted: Vec<(i32, i32, u32)> = self
            .points
            .iter()
            .map(|&(x, y, c)| (x + offset, y + offset, c))
            .collect();

        let ramp = build_ramp(&[Color::WHITE, Color::RED]);
        let mut canvas = composite(
            &shifted,
            width,
            height,
            Some(&ramp),
            self.radius,
            self.intensity,
            self.blur,
            self.max_occurrence,
        )?;
        canvas.gaussian_blur(self.radius as f32);

        // Alpha at each point drives the breakpoint thresholds
        let mut alphas: Vec<u8> = shifted
            .iter()
            .filter_map(|&(x, y, _)| canvas.alpha_at(x, y))
            .collect();
        if alphas.is_empty() {
            return Ok(Vec::new());
        }
        alphas.sort_unstable();
        let min_alpha = alphas[0];

        let steps: Vec<u8> = if percentiles.is_empty() {
            let top = percentile_alpha(80.0, &alphas) as i32;
            let half = (top - min_alpha as i32) / 2 + min_alpha as i32;
            vec![top as u8, half as u8, min_alpha]
        } else {
            percentiles
                .iter()
                .map(|&p| {
                    if p > 0.0 {
                        percentile_alpha(p, &alphas)
                    } else {
                        min_alpha
                    }
                })
                .collect()
        };

        let mut contours = Vec::with_capacity(steps.len());
        for &threshold in &steps {
            let mut polygons = contour::vectorize_alpha(&canvas, threshold, 2.0, 2.0, 8);
            for ring in &mut polygons {
                for pt in ring.iter_mut() {
                    pt.0 -= offset as f64;
                    pt.1 -= offset as f64;
                }
            }
            tracing::debug!(
                threshold,
                polygons = polygons.len(),
                "extracted contour level"
            );
            contours.push(Contour { polygons });
        }
        Ok(contours)
    }
}

/// Composite the density stamps and apply the ramp.
#[allow(clippy::too_many_arguments)]
fn composite(
    points: &[(i32, i32, u32)],
    width: u32,
    height: u32,
    ramp: Option<&[Color]>,
    radius: u32,
    intensity: f32,
    blur: f32,
    max_occurrence: u32,
) -> MapResult<Canvas> {
    let mut canvas = Canvas::new(width, height)?;
    if ramp.is_some() {
        canvas.fill_rgb(255, 255, 255);
    }

    let stamp = density_stamp(radius, blur)?;
    let r = radius as i32;
    for &(x, y, count) in points {
        let opacity = (count as f32 / max_occurrence as f32 * intensity).min(1.0);
        canvas.stamp(&stamp, x - r, y - r, opacity);
    }

    if let Some(ramp) = ramp {
        negate(&mut canvas);
        remap(&mut canvas, ramp);
    }
    Ok(canvas)
}

/// Radial gradient stamp: opaque black out to 10% of the radius, fading
/// to `round(255 * (1 - blur))` at the edge and clamped beyond it.
fn density_stamp(radius: u32, blur: f32) -> MapResult<Canvas> {
    let size = radius * 2;
    let mut stamp = Canvas::new(size, size)?;
    let edge_alpha = (255.0 - 255.0 * blur).round() as f32;
    let center = radius as f32;

    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let t = (dx * dx + dy * dy).sqrt() / radius as f32;
            let alpha = if t <= 0.1 {
                255.0
            } else if t >= 1.0 {
                edge_alpha
            } else {
                let frac = (t - 0.1) / 0.9;
                255.0 + (edge_alpha - 255.0) * frac
            };
            stamp.set_pixel(x, y, Color::rgba(0, 0, 0, alpha.round() as u8));
        }
    }
    Ok(stamp)
}

/// Invert the RGB channels in place, preserving alpha.
fn negate(canvas: &mut Canvas) {
    let width = canvas.width() as usize;
    canvas
        .pixels_mut()
        .par_chunks_mut(width)
        .for_each(|row| {
            for px in row {
                let c = px.demultiply();
                *px = ColorU8::from_rgba(
                    255 - c.red(),
                    255 - c.green(),
                    255 - c.blue(),
                    c.alpha(),
                )
                .premultiply();
            }
        });
}

/// Replace each pixel with the ramp entry selected by its RGB luminance
/// product. Brighter pixels pick from the hot end of the ramp.
fn remap(canvas: &mut Canvas, ramp: &[Color]) {
    let width = canvas.width() as usize;
    let top = (ramp.len() - 1) as f64;
    canvas
        .pixels_mut()
        .par_chunks_mut(width)
        .for_each(|row| {
            for px in row {
                let c = px.demultiply();
                let multiplier = c.red() as f64 * c.green() as f64 * c.blue() as f64
                    / (255.0 * 255.0 * 255.0);
                let color = ramp[(multiplier * top).round() as usize];
                *px = ColorU8::from_rgba(color.r, color.g, color.b, color.a).premultiply();
            }
        });
}

/// Blend a list of key colors into a ~500-entry ramp. Opacity ramps
/// linearly from 0 to 255 across the first segment.
fn build_ramp(colors: &[Color]) -> Vec<Color> {
    let num_steps = colors.len() - 1;
    let step_size = (RAMP_SIZE / num_steps as f64).round() as usize;

    let mut ramp = Vec::with_capacity(step_size * num_steps);
    for i in 0..num_steps {
        for j in 0..step_size {
            let ratio = j as f32 / step_size as f32;
            let mut color = colors[i].blend(&colors[i + 1], ratio);
            if i == 0 {
                color.a = (ratio * 255.0).floor() as u8;
            }
            ramp.push(color);
        }
    }
    ramp
}

/// Alpha value at the given percentile of a sorted sample.
fn percentile_alpha(percentile: f64, sorted: &[u8]) -> u8 {
    if percentile == 0.0 {
        return sorted[0];
    }
    let index = (percentile / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[index.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ramp_shape() {
        let heatmap = HeatMap::new(10, 10);
        let ramp = heatmap.colors().unwrap();
        // 4 segments of 125 blended entries
        assert_eq!(ramp.len(), 500);
        // first entry is fully transparent, alpha ramps across segment one
        assert_eq!(ramp[0].a, 0);
        assert_eq!(ramp[124].a, (124.0 / 125.0 * 255.0) as u8);
        assert_eq!(ramp[499].a, 255);
        // hot end is red
        assert_eq!(ramp[499].r, 255);
    }

    #[test]
    fn test_point_aggregation() {
        let mut heatmap = HeatMap::new(64, 64);
        heatmap.add_points(&[(3, 4), (3, 4), (3, 4), (10, 10)]);
        assert_eq!(heatmap.max_occurrence(), 3);
        heatmap.add_points(&[(3, 4)]);
        assert_eq!(heatmap.max_occurrence(), 4);
        // later batches keep aggregating into the same pixel entry
        assert_eq!(heatmap.points.len(), 2);
    }

    #[test]
    fn test_from_points_extent() {
        let heatmap = HeatMap::from_points(&[(10, 20), (110, 70), (10, 20)], 16);
        assert_eq!(heatmap.width(), 100);
        assert_eq!(heatmap.height(), 50);
        assert_eq!(heatmap.max_occurrence(), 2);
        assert_eq!(heatmap.radius(), 16);
        assert!(heatmap.colors().is_none());
    }

    #[test]
    fn test_from_points_degenerate() {
        let heatmap = HeatMap::from_points(&[(5, 5)], 8);
        assert_eq!(heatmap.width(), 1);
        assert_eq!(heatmap.height(), 1);
    }

    #[test]
    fn test_setters_reject_out_of_range() {
        let mut heatmap = HeatMap::new(8, 8);
        heatmap.set_radius(0);
        assert_eq!(heatmap.radius(), 32);
        heatmap.set_intensity(0.0);
        heatmap.set_intensity(1.5);
        assert_eq!(heatmap.intensity(), 1.0);
        heatmap.set_intensity(0.25);
        assert_eq!(heatmap.intensity(), 0.25);
        heatmap.set_blur(2.0);
        assert_eq!(heatmap.blur, 1.0);
        heatmap.set_max_occurrence(0);
        assert_eq!(heatmap.max_occurrence(), 1);
    }

    #[test]
    fn test_hex_colors_skip_invalid() {
        let mut heatmap = HeatMap::new(8, 8);
        heatmap.set_colors_hex(&["#fff", "red", "#ff0000"]);
        let ramp = heatmap.colors().unwrap();
        // only two valid entries -> a single 500-entry segment
        assert_eq!(ramp.len(), 500);
        assert_eq!(ramp[499].r, 255);
        assert_eq!(ramp[499].g, (255.0 / 500.0) as u8);
    }

    #[test]
    fn test_colors_from_image_row_scan() {
        let mut scale = Canvas::new(3, 2).unwrap();
        scale.set_pixel(0, 0, Color::RED);
        scale.set_pixel(1, 0, Color::GREEN);
        scale.set_pixel(2, 0, Color::BLUE);
        let mut heatmap = HeatMap::new(8, 8);
        heatmap.set_colors_from_image(&scale, false);
        assert_eq!(
            heatmap.colors().unwrap(),
            &[Color::RED, Color::GREEN, Color::BLUE]
        );
    }

    #[test]
    fn test_render_single_point_ramp_extremes() {
        let mut heatmap = HeatMap::new(100, 100);
        heatmap.set_radius(10);
        heatmap.add_points(&[(50, 50)]);
        let ramp: Vec<Color> = heatmap.colors().unwrap().to_vec();
        let image = heatmap.render().unwrap();

        // densest pixel takes the hot end of the ramp
        assert_eq!(image.pixel(50, 50).unwrap(), ramp[ramp.len() - 1]);
        // an untouched corner takes the cold end (transparent black)
        assert_eq!(image.pixel(0, 99).unwrap(), Color::rgba(0, 0, 0, 0));
        assert_eq!(ramp[0].a, 0);
    }

    #[test]
    fn test_render_without_ramp_is_grayscale_alpha() {
        let mut heatmap = HeatMap::from_points(&[(0, 0), (40, 40)], 12);
        heatmap.set_radius(12);
        let image = heatmap.render().unwrap();
        // no white background fill: untouched pixels stay transparent
        assert_eq!(image.alpha_at(20, 5), Some(0));
    }

    #[test]
    fn test_heatmap_monotonicity() {
        // More hits at a pixel never darken the pre-ramp density
        let mut single = HeatMap::new(60, 60);
        single.set_radius(8);
        single.add_points(&[(30, 30)]);
        single.set_max_occurrence(4);
        single.colors = None;

        let mut triple = single.clone();
        triple.add_points(&[(30, 30), (30, 30)]);
        triple.set_max_occurrence(4);

        let a = single.render().unwrap();
        let b = triple.render().unwrap();
        assert!(b.alpha_at(30, 30).unwrap() >= a.alpha_at(30, 30).unwrap());
    }

    #[test]
    fn test_percentile_alpha() {
        let sorted = [10u8, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        assert_eq!(percentile_alpha(0.0, &sorted), 10);
        assert_eq!(percentile_alpha(50.0, &sorted), 50);
        assert_eq!(percentile_alpha(80.0, &sorted), 80);
        assert_eq!(percentile_alpha(100.0, &sorted), 100);
    }
}
