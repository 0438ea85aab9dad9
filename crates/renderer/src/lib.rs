//! Raster rendering for slippy-map tiles.
//!
//! Provides the pieces a tile pipeline composes:
//! - A 2D drawing surface with antialiased primitives
//! - Per-tile projection frames mapping lat/lon onto pixels
//! - Density heatmaps with configurable color ramps
//! - Iso-density contour extraction
//! - PNG encoding

pub mod canvas;
pub mod contour;
pub mod frame;
pub mod heatmap;
pub mod png;

pub use canvas::Canvas;
pub use contour::Contour;
pub use frame::TileFrame;
pub use heatmap::HeatMap;
