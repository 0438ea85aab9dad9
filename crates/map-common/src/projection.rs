//! Web Mercator projection math and slippy-map tile arithmetic.
//!
//! Conversions between geographic coordinates (EPSG:4326), Web Mercator
//! meters (EPSG:3857) and tile (x, y, z) indices. Tile (0, 0) is the
//! north-west corner of the grid; zoom z has 2^z tiles per axis.

use std::f64::consts::PI;

use crate::error::{MapError, MapResult};
use crate::geometry::Geometry;

/// Half the extent of the Web Mercator plane in meters (pi * 6378137).
pub const ORIGIN_SHIFT: f64 = PI * 6_378_137.0;

/// Latitude limit of the square Web Mercator tile grid.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Spatial reference systems supported by the tile renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Srid {
    /// WGS84 geographic (lat/lon degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
}

impl Srid {
    pub fn from_epsg(code: i32) -> MapResult<Self> {
        match code {
            4326 => Ok(Srid::Epsg4326),
            3857 => Ok(Srid::Epsg3857),
            other => Err(MapError::UnsupportedProjection(other)),
        }
    }

    pub fn epsg(&self) -> i32 {
        match self {
            Srid::Epsg4326 => 4326,
            Srid::Epsg3857 => 3857,
        }
    }
}

/// Converts a Web Mercator y coordinate to a latitude in degrees.
pub fn lat_from_merc_y(y: f64) -> f64 {
    let lat = (y / ORIGIN_SHIFT) * 180.0;
    180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0)
}

/// Converts a Web Mercator x coordinate to a longitude in degrees.
pub fn lon_from_merc_x(x: f64) -> f64 {
    (x / ORIGIN_SHIFT) * 180.0
}

/// Converts a longitude in degrees to a Web Mercator x coordinate.
pub fn merc_x_from_lon(lon: f64) -> f64 {
    lon * ORIGIN_SHIFT / 180.0
}

/// Converts a latitude in degrees to a Web Mercator y coordinate.
pub fn merc_y_from_lat(lat: f64) -> f64 {
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    y * ORIGIN_SHIFT / 180.0
}

/// Longitude of the western edge of tile column x at the given zoom.
pub fn tile_to_lon(x: u32, z: u32) -> f64 {
    x as f64 / 2f64.powi(z as i32) * 360.0 - 180.0
}

/// Latitude of the northern edge of tile row y at the given zoom.
pub fn tile_to_lat(y: u32, z: u32) -> f64 {
    (PI - 2.0 * PI * y as f64 / 2f64.powi(z as i32))
        .sinh()
        .atan()
        .to_degrees()
}

/// Returns the (x, y) tile indices containing a lat/lon coordinate.
///
/// Latitude is clipped to the Mercator limit and longitude to [-180, 180]
/// before indexing, so any input maps onto the grid.
pub fn lat_lon_to_tile(lat: f64, lon: f64, z: u32) -> (u32, u32) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let lon = lon.clamp(-180.0, 180.0);
    let n = 2f64.powi(z as i32);

    let tx = ((lon + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let ty = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    let max = (1u32 << z) - 1;
    (
        (tx.max(0.0) as u32).min(max),
        (ty.max(0.0) as u32).min(max),
    )
}

/// Lat/lon rectangle of a tile as a closed polygon ring.
fn tile_geometry(x: u32, y: u32, z: u32) -> Geometry {
    let west = tile_to_lon(x, z);
    let east = tile_to_lon(x + 1, z);
    let north = tile_to_lat(y, z);
    let south = tile_to_lat(y + 1, z);
    Geometry::rectangle(west, south, east, north)
}

/// Returns all tiles at the given zoom whose bounds intersect the geometry.
///
/// The envelope of the geometry bounds the candidate rectangle; each
/// candidate tile is then tested against the geometry itself so that
/// diagonal shapes do not pull in the whole bounding box.
pub fn intersecting_tiles(geom: &Geometry, z: u32) -> Vec<(u32, u32)> {
    let (min_x, min_y, max_x, max_y) = geom.envelope();

    let (ul_x, ul_y) = lat_lon_to_tile(max_y, min_x, z);
    let (lr_x, lr_y) = lat_lon_to_tile(min_y, max_x, z);

    let mut tiles = Vec::new();
    for x in ul_x..=lr_x {
        for y in ul_y..=lr_y {
            if tile_geometry(x, y, z).intersects(geom) {
                tiles.push((x, y));
            }
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srid_codes() {
        assert_eq!(Srid::from_epsg(3857).unwrap(), Srid::Epsg3857);
        assert_eq!(Srid::from_epsg(4326).unwrap(), Srid::Epsg4326);
        assert!(matches!(
            Srid::from_epsg(5070),
            Err(MapError::UnsupportedProjection(5070))
        ));
    }

    #[test]
    fn test_mercator_round_trip() {
        for lon in [-180.0, -74.006, -0.1, 0.0, 13.4, 179.99] {
            let back = lon_from_merc_x(merc_x_from_lon(lon));
            assert!((back - lon).abs() < 1e-9, "lon {} -> {}", lon, back);
        }
        for lat in [-85.0, -40.7128, 0.0, 1e-6, 51.5, 85.0] {
            let back = lat_from_merc_y(merc_y_from_lat(lat));
            assert!((back - lat).abs() < 1e-9, "lat {} -> {}", lat, back);
        }
    }

    #[test]
    fn test_origin_shift_extent() {
        assert!((merc_x_from_lon(180.0) - ORIGIN_SHIFT).abs() < 1e-6);
        assert!((merc_y_from_lat(MAX_LATITUDE) - ORIGIN_SHIFT).abs() < 1.0);
    }

    #[test]
    fn test_tile_zero_corner() {
        assert!((tile_to_lat(0, 0) - 85.051_128_779_8).abs() < 1e-9);
        assert_eq!(tile_to_lon(0, 0), -180.0);
    }

    #[test]
    fn test_lat_lon_to_tile_origin() {
        assert_eq!(lat_lon_to_tile(0.0, 0.0, 1), (1, 1));
        assert_eq!(lat_lon_to_tile(0.0, 0.0, 0), (0, 0));
    }

    #[test]
    fn test_lat_lon_to_tile_clips_out_of_range() {
        // Inputs beyond the poles and the antimeridian still land on the grid
        let n = 1u32 << 10;
        let (x, y) = lat_lon_to_tile(89.9, 200.0, 10);
        assert!(x < n && y < n);
        let (x, y) = lat_lon_to_tile(-89.9, -200.0, 10);
        assert!(x < n && y < n);
    }

    #[test]
    fn test_tile_round_trip() {
        let z = 12;
        for (x, y) in [(0, 0), (1023, 2048), (4095, 4095)] {
            let lat = tile_to_lat(y, z) - 1e-7;
            let lon = tile_to_lon(x, z) + 1e-7;
            assert_eq!(lat_lon_to_tile(lat, lon, z), (x, y));
        }
    }

    #[test]
    fn test_intersecting_tiles_point() {
        let geom = Geometry::Point(90.0, 40.0);
        let tiles = intersecting_tiles(&geom, 4);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0], lat_lon_to_tile(40.0, 90.0, 4));
    }

    #[test]
    fn test_intersecting_tiles_rectangle() {
        // A rectangle spanning the equator around the prime meridian
        let geom = Geometry::rectangle(-10.0, -10.0, 10.0, 10.0);
        let tiles = intersecting_tiles(&geom, 3);
        // Straddles the center of the grid: 2x2 block at zoom 3
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&(3, 3)));
        assert!(tiles.contains(&(4, 4)));
    }
}
