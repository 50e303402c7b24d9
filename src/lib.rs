pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod lookup;
pub mod normalize;
pub mod resolver;
pub mod transport;

pub use cache::{CacheEntry, ResourceCache};
pub use config::Config;
pub use entity::{Entity, EntityOptions, FieldValue, FIELD_PREFIX};
pub use error::{AbortReport, DapiError, Result};
pub use lookup::{Address, Depth, Lookup};
pub use resolver::{Resolver, ResolverOptions};
pub use transport::{Transport, TransportError};
