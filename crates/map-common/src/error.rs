//! Error types for the map tile crates.

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// Primary error type for tile rendering and caching operations.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Unsupported projection: EPSG:{0}")]
    UnsupportedProjection(i32),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid cache directory: {0}")]
    InvalidCacheDir(String),

    #[error("Invalid WKT: {0}")]
    WktParse(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Tile producer failed: {0}")]
    ProducerFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
