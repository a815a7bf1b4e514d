/// Errors surfaced by construction and configuration. Per-tick collision
/// never fails; it degrades to "no contact" instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollisionError {
    /// Tile map constructed with a non-positive size.
    #[error("invalid grid size {width}x{height}")]
    InvalidGridSize { width: i32, height: i32 },

    /// Tile shape string names no known prototype.
    #[error("unknown tile shape: {0}")]
    UnknownTileShape(String),

    /// World configuration rejected by validation.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    /// Handle refers to a removed body or region.
    #[error("stale or unknown handle")]
    StaleHandle,

    /// Collidable size must be positive and finite.
    #[error("invalid body size {0}x{1}")]
    InvalidBodySize(f32, f32),
}
