//! Resource addressing: partial lookups, canonical addresses and hop budgets.
//!
//! A [`Lookup`] is whatever the caller knows about a resource. The
//! [`EndpointResolver`] turns complete lookups into an [`Address`], the only
//! key the cache and the in-flight registry understand.

mod endpoint;

pub use endpoint::{AddressStyle, EndpointResolver, SLUG_FORMAT_QUERY};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical string key of a resource. Unit of caching and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Pre-resolution identifier: a numeric domain id or a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u64),
    Uuid(String),
}

impl Identifier {
    /// Classify a raw identifier. Returns `None` for anything that is neither
    /// an unsigned integer nor a UUID.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<u64>() {
            return Some(Identifier::Numeric(id));
        }
        uuid::Uuid::parse_str(raw)
            .ok()
            .map(|_| Identifier::Uuid(raw.to_string()))
    }
}

/// A possibly partial address for a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub entity_type: Option<String>,
    pub bundle: Option<String>,
    pub uuid: Option<String>,
    pub slug: Option<String>,
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub is_bundle_query: bool,
}

impl Lookup {
    /// A complete lookup for a single resource.
    pub fn new(entity_type: &str, bundle: &str, uuid: &str) -> Self {
        Self {
            entity_type: Some(entity_type.to_string()),
            bundle: Some(bundle.to_string()),
            uuid: Some(uuid.to_string()),
            ..Self::default()
        }
    }

    /// A complete lookup for the whole collection of a bundle.
    pub fn collection(entity_type: &str, bundle: &str) -> Self {
        Self {
            entity_type: Some(entity_type.to_string()),
            bundle: Some(bundle.to_string()),
            is_bundle_query: true,
            ..Self::default()
        }
    }

    /// A node known only by its human path.
    pub fn slug(slug: &str) -> Self {
        Self {
            entity_type: Some("node".to_string()),
            slug: Some(slug.to_string()),
            ..Self::default()
        }
    }

    /// An entity known by a numeric id or UUID. Unclassifiable identifiers
    /// leave the lookup incomplete.
    pub fn identifier(entity_type: &str, identifier: &str) -> Self {
        Self {
            entity_type: Some(entity_type.to_string()),
            identifier: Identifier::parse(identifier),
            ..Self::default()
        }
    }

    pub fn with_bundle(mut self, bundle: &str) -> Self {
        self.bundle = Some(bundle.to_string());
        self
    }

    /// Complete iff entity type, bundle and either a uuid or the collection
    /// flag are present.
    pub fn is_complete(&self) -> bool {
        self.entity_type.is_some()
            && self.bundle.is_some()
            && (self.uuid.is_some() || self.is_bundle_query)
    }

    /// Move a classified identifier into the field resolution can use: a
    /// UUID becomes the uuid, a numeric node id becomes its direct node path.
    pub fn promote_identifier(mut self) -> Self {
        match self.identifier.take() {
            Some(Identifier::Uuid(uuid)) if self.uuid.is_none() => {
                self.uuid = Some(uuid);
            }
            Some(Identifier::Numeric(id))
                if self.slug.is_none() && self.entity_type.as_deref() == Some("node") =>
            {
                self.slug = Some(format!("/node/{}", id));
            }
            other => self.identifier = other,
        }
        self
    }

    /// Short human description used in errors and logs.
    pub fn describe(&self) -> String {
        let part = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());
        match &self.slug {
            Some(slug) if !self.is_complete() => format!("slug '{}'", slug),
            _ => format!(
                "{}--{} {}",
                part(&self.entity_type),
                part(&self.bundle),
                if self.is_bundle_query {
                    "(collection)".to_string()
                } else {
                    part(&self.uuid)
                }
            ),
        }
    }
}

/// Hop budget for relationship expansion, counted from the root entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    Hops(usize),
    #[default]
    Unbounded,
}

impl Depth {
    /// No relationships found at this level may be expanded.
    pub fn is_exhausted(self) -> bool {
        matches!(self, Depth::Hops(0))
    }

    /// Budget left for entities one hop further away.
    pub fn descend(self) -> Self {
        match self {
            Depth::Hops(n) => Depth::Hops(n.saturating_sub(1)),
            Depth::Unbounded => Depth::Unbounded,
        }
    }
}

impl From<usize> for Depth {
    fn from(hops: usize) -> Self {
        Depth::Hops(hops)
    }
}
