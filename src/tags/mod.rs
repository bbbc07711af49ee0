//! Tag classification domain: the `tag -> category` dictionary, its
//! write-coalescing cache and the incremental listing sync.

mod cache;
mod models;
mod syncer;

pub use cache::{TagCache, TagCacheConfig, TagSnapshot};
pub use models::TagCategory;
pub use syncer::TagSyncer;
