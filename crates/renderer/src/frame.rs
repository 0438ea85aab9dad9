//! Per-tile rendering frame.
//!
//! A `TileFrame` fixes the affine between world coordinates and the pixels
//! of one tile image, and exposes drawing operations that take lat/lon
//! input. Frames can be built in Web Mercator meters (EPSG:3857) or
//! geographic degrees (EPSG:4326).

use std::sync::OnceLock;

use map_common::geometry::format_coord;
use map_common::projection::{self, Srid};
use map_common::{Color, Geometry, MapError, MapResult};

use crate::canvas::Canvas;

/// An image tile bound to a geographic extent.
///
/// The projection parameters are immutable after construction; only the
/// backing canvas changes as primitives are drawn.
pub struct TileFrame {
    srid: Srid,
    ul_x: f64,
    ul_y: f64,
    res_x: f64,
    res_y: f64,
    north: f64,
    south: f64,
    east: f64,
    west: f64,
    wkt: String,
    geom: OnceLock<Geometry>,
    canvas: Canvas,
}

impl TileFrame {
    /// Build a frame from min/max corner coordinates in the units of the
    /// given SRID (meters for 3857, degrees for 4326).
    pub fn new(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        width: u32,
        height: u32,
        srid: i32,
    ) -> MapResult<Self> {
        let srid = Srid::from_epsg(srid)?;
        let canvas = Canvas::new(width, height)?;

        match srid {
            Srid::Epsg3857 => {
                let north = projection::lat_from_merc_y(max_y);
                let south = projection::lat_from_merc_y(min_y);
                let east = projection::lon_from_merc_x(max_x);
                let west = projection::lon_from_merc_x(min_x);
                validate(west, south, east, north)?;

                Ok(Self {
                    srid,
                    ul_x: min_x,
                    ul_y: max_y,
                    res_x: width as f64 / (max_x - min_x).abs(),
                    res_y: height as f64 / (max_y - min_y).abs(),
                    north,
                    south,
                    east,
                    west,
                    wkt: bounds_wkt(west, south, east, north),
                    geom: OnceLock::new(),
                    canvas,
                })
            }
            Srid::Epsg4326 => {
                validate(min_x, min_y, max_x, max_y)?;
                let wkt = bounds_wkt(min_x, min_y, max_x, max_y);

                // Re-express the corners through the pixel transforms
                // (identity resolution) before deriving the frame affine.
                let min_xt = x4326(min_x, 0.0, 1.0);
                let max_xt = x4326(max_x, 0.0, 1.0);
                let min_yt = y4326(min_y, 0.0, 1.0);
                let max_yt = y4326(max_y, 0.0, 1.0);

                Ok(Self {
                    srid,
                    ul_x: min_xt,
                    ul_y: max_yt,
                    res_x: width as f64 / (max_xt - min_xt),
                    res_y: height as f64 / (min_yt - max_yt),
                    north: max_y,
                    south: min_y,
                    east: max_x,
                    west: min_x,
                    wkt,
                    geom: OnceLock::new(),
                    canvas,
                })
            }
        }
    }

    pub fn srid(&self) -> i32 {
        self.srid.epsg()
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    /// Tile boundary as WKT in lat/lon coordinates (EPSG:4326).
    pub fn bounds_wkt(&self) -> &str {
        &self.wkt
    }

    /// Tile boundary as a lat/lon geometry, realized on first use.
    pub fn geometry(&self) -> &Geometry {
        self.geom.get_or_init(|| {
            Geometry::rectangle(self.west, self.south, self.east, self.north)
        })
    }

    /// True if the tile boundary intersects the given WKT geometry.
    pub fn intersects(&self, wkt: &str) -> MapResult<bool> {
        let other = Geometry::parse_wkt(wkt)?;
        Ok(self.geometry().intersects(&other))
    }

    pub fn image(&self) -> &Canvas {
        &self.canvas
    }

    pub fn into_image(self) -> Canvas {
        self.canvas
    }

    /// Fill the entire surface with an opaque color.
    pub fn set_background(&mut self, r: u8, g: u8, b: u8) {
        self.canvas.fill_rgb(r, g, b);
    }

    /// Color a single pixel at the projected position.
    pub fn add_pixel(&mut self, lat: f64, lon: f64, color: Color) {
        let (x, y) = self.project(lat, lon);
        self.canvas.set_pixel(round_px(x), round_px(y), color);
    }

    /// Draw an antialiased circle of the given diameter centered on the
    /// projected position.
    pub fn add_point(&mut self, lat: f64, lon: f64, color: Color, size: f64) {
        let (x, y) = self.project(lat, lon);
        self.canvas.fill_circle(x, y, size, color);
    }

    /// Draw a polygon ring given as (lon, lat) pairs. The interior is
    /// filled first when a fill color is present, then the outline is
    /// stroked as an open polyline.
    pub fn add_polygon(
        &mut self,
        ring: &[(f64, f64)],
        line_color: Option<Color>,
        fill_color: Option<Color>,
    ) {
        let pixels: Vec<(f64, f64)> = ring
            .iter()
            .map(|&(lon, lat)| self.project(lat, lon))
            .collect();

        if let Some(fill) = fill_color {
            self.canvas.fill_polygon(&pixels, fill);
        }
        if let Some(line) = line_color {
            self.canvas.stroke_polyline(&pixels, line, 1.0);
        }
    }

    /// Project a lat/lon coordinate into pixel space.
    fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        match self.srid {
            Srid::Epsg3857 => (
                x3857(projection::merc_x_from_lon(lon), self.ul_x, self.res_x),
                y3857(projection::merc_y_from_lat(lat), self.ul_y, self.res_y),
            ),
            Srid::Epsg4326 => (
                x4326(lon, self.ul_x, self.res_x),
                y4326(lat, self.ul_y, self.res_y),
            ),
        }
    }
}

impl std::fmt::Debug for TileFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFrame")
            .field("srid", &self.srid)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bounds", &self.wkt)
            .finish()
    }
}

/// Round half away from zero to an integer pixel index.
fn round_px(v: f64) -> i32 {
    v.round() as i32
}

fn validate(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MapResult<()> {
    let ok = min_x <= max_x
        && min_y <= max_y
        && (-180.0..=180.0).contains(&min_x)
        && (-180.0..=180.0).contains(&max_x)
        && (-90.0..=90.0).contains(&min_y)
        && (-90.0..=90.0).contains(&max_y);
    if ok {
        Ok(())
    } else {
        Err(MapError::InvalidCoordinates(format!(
            "bounds out of range: ({} {}, {} {})",
            min_x, min_y, max_x, max_y
        )))
    }
}

/// Boundary ring in NE, NW, SW, SE, NE order.
fn bounds_wkt(west: f64, south: f64, east: f64, north: f64) -> String {
    let ne = format!("{} {}", format_coord(east), format_coord(north));
    let nw = format!("{} {}", format_coord(west), format_coord(north));
    let sw = format!("{} {}", format_coord(west), format_coord(south));
    let se = format!("{} {}", format_coord(east), format_coord(south));
    format!("POLYGON(({},{},{},{},{}))", ne, nw, sw, se, ne)
}

fn x3857(m: f64, ul_x: f64, res_x: f64) -> f64 {
    let mut d = (ul_x - m).abs();
    if m < ul_x {
        d = -d;
    }
    d * res_x
}

fn y3857(m: f64, ul_y: f64, res_y: f64) -> f64 {
    let mut d = (ul_y - m).abs();
    if m > ul_y {
        d = -d;
    }
    d * res_y
}

fn x4326(lon: f64, ul_x: f64, res_x: f64) -> f64 {
    ((lon + 180.0) - ul_x) * res_x
}

/// Latitude pixel transform for 4326 frames.
///
/// Folds the latitude axis so north maps to smaller pixel rows, then snaps
/// values that round to zero. The fold has to match the frame constructor
/// bit for bit, otherwise tile seams shift by a pixel.
fn y4326(lat: f64, ul_y: f64, res_y: f64) -> f64 {
    let mut pt = -lat;
    if pt <= 0.0 {
        pt = 90.0 + -pt;
    } else {
        pt = 90.0 - pt;
    }
    pt = 180.0 - pt;

    let y = (pt - ul_y) * res_y;
    if y.round() == 0.0 {
        0.0
    } else {
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::projection::{merc_x_from_lon, merc_y_from_lat};

    #[test]
    fn test_bounds_wkt_starts_north_east() {
        let frame = TileFrame::new(0.0, 0.0, 180.0, 85.0, 256, 256, 4326).unwrap();
        assert!(frame.bounds_wkt().starts_with("POLYGON((180 85,"));
        assert!(frame.intersects("POINT(90 40)").unwrap());
        assert!(!frame.intersects("POINT(-90 40)").unwrap());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            TileFrame::new(0.0, 0.0, 1.0, 1.0, 256, 256, 9999),
            Err(MapError::UnsupportedProjection(9999))
        ));
        assert!(matches!(
            TileFrame::new(10.0, 0.0, 5.0, 1.0, 256, 256, 4326),
            Err(MapError::InvalidCoordinates(_))
        ));
        assert!(matches!(
            TileFrame::new(-200.0, 0.0, 5.0, 1.0, 256, 256, 4326),
            Err(MapError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn test_4326_corner_mapping() {
        let mut frame = TileFrame::new(-180.0, -90.0, 180.0, 90.0, 360, 180, 4326).unwrap();
        // NW corner of the world lands on pixel (0, 0)
        frame.add_pixel(90.0, -180.0, Color::RED);
        assert_eq!(frame.image().pixel(0, 0), Some(Color::RED));
        // equator at the prime meridian lands mid-image
        frame.add_pixel(0.0, 0.0, Color::BLUE);
        assert_eq!(frame.image().pixel(180, 90), Some(Color::BLUE));
    }

    #[test]
    fn test_3857_corner_mapping() {
        let min_x = merc_x_from_lon(-10.0);
        let max_x = merc_x_from_lon(10.0);
        let min_y = merc_y_from_lat(-10.0);
        let max_y = merc_y_from_lat(10.0);
        let mut frame = TileFrame::new(min_x, min_y, max_x, max_y, 200, 200, 3857).unwrap();
        assert!((frame.north() - 10.0).abs() < 1e-9);
        assert!((frame.west() + 10.0).abs() < 1e-9);

        frame.add_pixel(10.0, -10.0, Color::RED);
        assert_eq!(frame.image().pixel(0, 0), Some(Color::RED));
        frame.add_pixel(0.0, 0.0, Color::BLUE);
        assert_eq!(frame.image().pixel(100, 100), Some(Color::BLUE));
    }

    #[test]
    fn test_background_and_point() {
        let mut frame = TileFrame::new(0.0, 0.0, 10.0, 10.0, 100, 100, 4326).unwrap();
        frame.set_background(200, 200, 200);
        frame.add_point(5.0, 5.0, Color::RED, 10.0);
        let px = frame.image().pixel(50, 50).unwrap();
        assert_eq!(px.r, 255);
        assert_eq!(frame.image().pixel(5, 5), Some(Color::rgb(200, 200, 200)));
    }

    #[test]
    fn test_add_polygon_fill_and_outline() {
        let mut frame = TileFrame::new(0.0, 0.0, 10.0, 10.0, 100, 100, 4326).unwrap();
        let ring = [
            (2.0, 2.0),
            (8.0, 2.0),
            (8.0, 8.0),
            (2.0, 8.0),
            (2.0, 2.0),
        ];
        frame.add_polygon(&ring, Some(Color::BLACK), Some(Color::GREEN));
        // interior filled
        let center = frame.image().pixel(50, 50).unwrap();
        assert_eq!(center.g, 255);
        // exterior untouched
        assert_eq!(frame.image().alpha_at(5, 95), Some(0));
    }

    #[test]
    fn test_geometry_lazy_and_consistent() {
        let frame = TileFrame::new(-20.0, -10.0, 20.0, 10.0, 64, 64, 4326).unwrap();
        let geom = frame.geometry();
        assert_eq!(geom.envelope(), (-20.0, -10.0, 20.0, 10.0));
        assert!(std::ptr::eq(geom, frame.geometry()));
    }

    #[test]
    fn test_compass_accessors() {
        let frame = TileFrame::new(-5.0, -4.0, 3.0, 2.0, 64, 64, 4326).unwrap();
        assert_eq!(frame.north(), 2.0);
        assert_eq!(frame.south(), -4.0);
        assert_eq!(frame.east(), 3.0);
        assert_eq!(frame.west(), -5.0);
        assert_eq!(frame.srid(), 4326);
    }
}
