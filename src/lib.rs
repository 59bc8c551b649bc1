pub mod config;
pub mod db;
pub mod error;
pub mod server;
pub mod sync;
pub mod upstream;
pub(crate) mod utils;

pub use error::MirrorError;
pub use sync::{SyncOrchestrator, SyncReport};
