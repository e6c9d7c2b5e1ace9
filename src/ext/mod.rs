//! Extension traits.

mod app;
mod world;

pub use app::AppPersistExt;
pub use world::WorldPersistExt;
