//! # Resolver
//!
//! Turns lookups into entities. A lookup is addressed by the
//! [`EndpointResolver`] (after slug routing when only a human path is known),
//! fetched through the run-scoped [`ResourceCache`], projected into an
//! [`Entity`] and then expanded: every relationship it references is resolved
//! concurrently, down to the requested [`Depth`].
//!
//! ```rust,no_run
//! use dapi::resolver::{Resolver, ResolverOptions};
//! use dapi::transport::HttpTransport;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> dapi::Result<()> {
//!     let transport = HttpTransport::new("https://cms.example.com", Duration::from_secs(30))?;
//!     let resolver = Resolver::new(Arc::new(transport), ResolverOptions::default());
//!
//!     let entry = resolver.slug("/about").await?;
//!     if let Some(page) = entry.as_entity() {
//!         println!("{}", page);
//!     }
//!     Ok(())
//! }
//! ```

mod fetch;
mod snapshot;
mod traversal;

pub use fetch::MAX_STRICT_ATTEMPTS;
pub use traversal::collect_references;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::cache::{CacheEntry, ResourceCache};
use crate::config::Config;
use crate::entity::{Entity, EntityOptions, RelationshipRef};
use crate::error::{DapiError, Result};
use crate::lookup::{Address, Depth, EndpointResolver, Lookup};
use crate::transport::{self, Transport};

/// Everything a resolver needs besides its transport.
#[derive(Debug, Default)]
pub struct ResolverOptions {
    pub endpoints: EndpointResolver,
    /// Retry missing resources and abort on any other error resource
    pub strict: bool,
    pub entity: EntityOptions,
}

impl ResolverOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            endpoints: EndpointResolver::new(
                config.endpoints.style,
                config.endpoints.alias_prefix.as_deref(),
            ),
            strict: config.dapi.strict_generation,
            entity: EntityOptions::from_config(&config.entity)?,
        })
    }
}

pub(crate) struct ResolverInner {
    transport: Arc<dyn Transport>,
    cache: ResourceCache,
    endpoints: EndpointResolver,
    entity_options: Arc<EntityOptions>,
    strict: bool,
}

impl ResolverInner {
    /// Cached value of the resource a reference points at.
    pub(crate) fn cached_reference(&self, reference: &RelationshipRef) -> Option<CacheEntry> {
        let address = self.endpoints.address(&reference.to_lookup()).ok()?;
        self.cache.get(&address)
    }
}

/// Handle to one resolver instance. Clones share the cache.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

impl Resolver {
    pub fn new(transport: Arc<dyn Transport>, options: ResolverOptions) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                transport,
                cache: ResourceCache::new(),
                endpoints: options.endpoints,
                entity_options: Arc::new(options.entity),
                strict: options.strict,
            }),
        }
    }

    /// Build the transport and options described by a configuration file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = transport::from_config(config)?;
        Ok(Self::new(transport, ResolverOptions::from_config(config)?))
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.inner.cache
    }

    pub fn endpoints(&self) -> &EndpointResolver {
        &self.inner.endpoints
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Resolve a lookup and expand its relationships down to `depth`.
    ///
    /// # Arguments
    /// * `lookup` - What is known about the resource
    /// * `depth` - Hop budget counted from this resource
    ///
    /// # Returns
    /// The cached entry; error resources come back as error entities unless
    /// strict mode aborts.
    pub fn get_entity(
        &self,
        lookup: Lookup,
        depth: Depth,
    ) -> BoxFuture<'static, Result<CacheEntry>> {
        let resolver = self.clone();
        async move {
            let entry = resolver.get_from_server(lookup).await?;
            // Error resources and raw payloads have nothing to expand
            if let Some(entity) = entry.as_entity().filter(|entity| !entity.is_error()) {
                resolver.load_relationships(entity, depth).await?;
            }
            Ok(entry)
        }
        .boxed()
    }

    /// Fetch the resource a lookup names, without expanding relationships.
    pub async fn get_from_server(&self, lookup: Lookup) -> Result<CacheEntry> {
        let lookup = lookup.promote_identifier();
        // Route through the slug only when the lookup cannot name an address
        if !self.inner.endpoints.can_resolve_directly(&lookup) && lookup.slug.is_some() {
            return self.resolve_by_slug(lookup).await;
        }
        let address = self.inner.endpoints.address(&lookup)?;
        self.from_api(&address).await
    }

    /// Route a human path to its entity: fetch the routing response, then the
    /// canonical address it names. A routing failure yields its error entity.
    pub async fn resolve_by_slug(&self, lookup: Lookup) -> Result<CacheEntry> {
        let slug = lookup.slug.as_deref().ok_or_else(|| {
            DapiError::IncompleteLookup(format!("{} has no slug to route", lookup.describe()))
        })?;
        let routing = self.inner.endpoints.slug_endpoint(slug);
        let routed = self.from_api(&routing).await?;
        if routed.is_error() {
            log::info!("Slug {} did not route to an entity", routing);
            return Ok(routed);
        }
        let completed = self
            .inner
            .endpoints
            .complete_from_slug(&lookup, &routed.to_object())?;
        let address = self.inner.endpoints.address(&completed)?;
        log::debug!("Slug {} routed to {}", routing, address);
        self.from_api(&address).await
    }

    /// Cached value of an address, or a single coalesced fetch of it.
    pub async fn from_api(&self, address: &Address) -> Result<CacheEntry> {
        let inner = self.inner.clone();
        let target = address.clone();
        self.inner
            .cache
            .fetch_or_join(address, move || fetch::fetch_with_policy(inner, target))
            .await
            .map_err(DapiError::StrictAbort)
    }

    /// The resource a relationship points at, from cache or freshly resolved.
    pub async fn relationship(&self, reference: &RelationshipRef) -> Result<CacheEntry> {
        match self.inner.cached_reference(reference) {
            Some(entry) => Ok(entry),
            None => self.get_entity(reference.to_lookup(), Depth::Unbounded).await,
        }
    }

    /// Cached value for a complete lookup.
    pub fn cached(&self, lookup: &Lookup) -> Option<CacheEntry> {
        let address = self.inner.endpoints.address(lookup).ok()?;
        self.inner.cache.get(&address)
    }

    /// Cached or currently being fetched.
    pub fn has_been_traversed(&self, lookup: &Lookup) -> bool {
        self.inner
            .endpoints
            .address(lookup)
            .map_or(false, |address| self.inner.cache.was_traversed(&address))
    }

    /// Wrap a payload as an entity owned by this resolver.
    pub fn attach(&self, payload: JsonValue) -> Arc<Entity> {
        Arc::new(Entity::attached(
            payload,
            self.inner.entity_options.clone(),
            Arc::downgrade(&self.inner),
        ))
    }

    /// Node by numeric id or UUID.
    pub async fn node(&self, identifier: &str) -> Result<CacheEntry> {
        self.by_identifier("node", identifier).await
    }

    /// Node by human path.
    pub async fn slug(&self, slug: &str) -> Result<CacheEntry> {
        self.get_entity(Lookup::slug(slug), Depth::Unbounded).await
    }

    /// Same as [`Resolver::slug`].
    pub async fn alias(&self, slug: &str) -> Result<CacheEntry> {
        self.slug(slug).await
    }

    pub async fn term(&self, identifier: &str) -> Result<CacheEntry> {
        self.by_identifier("taxonomy_term", identifier).await
    }

    pub async fn file(&self, identifier: &str) -> Result<CacheEntry> {
        self.by_identifier("file", identifier).await
    }

    pub async fn media(&self, identifier: &str) -> Result<CacheEntry> {
        self.by_identifier("media", identifier).await
    }

    pub async fn paragraph(&self, identifier: &str) -> Result<CacheEntry> {
        self.by_identifier("paragraph", identifier).await
    }

    /// Every resource of a bundle.
    pub async fn collection(&self, entity_type: &str, bundle: &str) -> Result<CacheEntry> {
        self.get_entity(Lookup::collection(entity_type, bundle), Depth::Unbounded)
            .await
    }

    async fn by_identifier(&self, entity_type: &str, identifier: &str) -> Result<CacheEntry> {
        self.get_entity(Lookup::identifier(entity_type, identifier), Depth::Unbounded)
            .await
    }
}
