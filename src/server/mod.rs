//! Read-only HTTP API over the mirror.

pub mod router;
pub mod routes;

pub use router::{MirrorState, mirror_router};
