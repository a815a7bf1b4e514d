//! tilebonk: tile-platformer collision core (swept tile contacts, arbitration and resolution)

pub mod geom;
pub mod error;
pub mod types;
pub mod quad;
pub mod shape;
pub mod tilemap;
pub mod simple;
pub mod narrowphase;
pub mod api;
pub mod discrete;
pub mod continuous;
pub mod arbiter;
pub mod solver;
pub mod collidable;
pub mod world;

pub use crate::types::*;
pub use crate::api::*;
pub use crate::error::CollisionError;
pub use crate::geom::{Cardinal, Line, Rect};
pub use crate::collidable::{Collidable, ResponseKind};
pub use crate::shape::TileShape;
pub use crate::tilemap::ColliderTileMap;
pub use crate::simple::ColliderSimple;
pub use crate::world::CollisionWorld;
