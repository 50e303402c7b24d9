pub mod registry;

pub use registry::{CacheEntry, FetchOutcome, ResourceCache};
