//! Lookup → address resolution and slug normalization.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use super::{Address, Lookup};
use crate::error::{DapiError, Result};

/// Query appended to a human path to ask the CMS for the routed entity.
pub const SLUG_FORMAT_QUERY: &str = "?_format=json";

/// Layout of canonical addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressStyle {
    /// Live JSON:API routes, `/jsonapi/<entity>/<bundle>/<uuid>`.
    #[default]
    Api,
    /// Pre-generated resource files, `/_resources/<entity>/<bundle>/<uuid>.json`.
    Static,
}

fn direct_node_path() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/node/\d+$").expect("Invalid regex pattern"))
}

/// Converts lookups into canonical addresses.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    style: AddressStyle,
    alias_prefix: Option<String>,
}

impl EndpointResolver {
    pub fn new(style: AddressStyle, alias_prefix: Option<&str>) -> Self {
        let alias_prefix = alias_prefix
            .map(trim_slashes)
            .filter(|prefix| prefix != "/" && !prefix.is_empty());
        Self { style, alias_prefix }
    }

    pub fn style(&self) -> AddressStyle {
        self.style
    }

    /// True when the lookup can be fetched without slug resolution.
    pub fn can_resolve_directly(&self, lookup: &Lookup) -> bool {
        lookup.is_complete()
    }

    /// Canonical address of a complete lookup.
    pub fn address(&self, lookup: &Lookup) -> Result<Address> {
        let (entity, bundle) = match (&lookup.entity_type, &lookup.bundle) {
            (Some(entity), Some(bundle)) => (entity, bundle),
            _ => return Err(incomplete(lookup)),
        };
        let address = match (self.style, lookup.is_bundle_query, &lookup.uuid) {
            (AddressStyle::Api, true, _) => format!("/jsonapi/{}/{}", entity, bundle),
            (AddressStyle::Static, true, _) => format!("/_resources/{}/{}.json", entity, bundle),
            (AddressStyle::Api, false, Some(uuid)) => {
                format!("/jsonapi/{}/{}/{}", entity, bundle, uuid)
            }
            (AddressStyle::Static, false, Some(uuid)) => {
                format!("/_resources/{}/{}/{}.json", entity, bundle, uuid)
            }
            (_, false, None) => return Err(incomplete(lookup)),
        };
        Ok(Address::from(address))
    }

    /// Whether an address has the canonical layout [`Self::address`] produces.
    pub fn is_resource_address(&self, address: &Address) -> bool {
        let path = address.as_str();
        match self.style {
            AddressStyle::Api => path.starts_with("/jsonapi/"),
            AddressStyle::Static => path.starts_with("/_resources/") && path.ends_with(".json"),
        }
    }

    /// One leading slash, no trailing slash, alias prefix applied unless the
    /// path is a direct node path or already prefixed.
    pub fn normalize_slug(&self, slug: &str) -> String {
        let path = trim_slashes(slug);
        match &self.alias_prefix {
            Some(prefix)
                if !direct_node_path().is_match(&path)
                    && path != *prefix
                    && !path.starts_with(&format!("{}/", prefix)) =>
            {
                if path == "/" {
                    prefix.clone()
                } else {
                    format!("{}{}", prefix, path)
                }
            }
            _ => path,
        }
    }

    /// Address of the routing request for a human path.
    pub fn slug_endpoint(&self, slug: &str) -> Address {
        Address::from(format!("{}{}", self.normalize_slug(slug), SLUG_FORMAT_QUERY))
    }

    /// Fill entity type, bundle and uuid from a routing response.
    pub fn complete_from_slug(&self, lookup: &Lookup, routed: &JsonValue) -> Result<Lookup> {
        let first = |key: &str, inner: &str| {
            routed
                .get(key)
                .and_then(|v| v.get(0))
                .and_then(|v| v.get(inner))
                .and_then(|v| match v {
                    JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        };

        let mut completed = lookup.clone();
        completed.entity_type = Some(
            lookup
                .entity_type
                .clone()
                .unwrap_or_else(|| "node".to_string()),
        );
        completed.bundle = first("type", "target_id").or_else(|| first("vid", "target_id"));
        completed.uuid = first("uuid", "value");

        if completed.bundle.is_none() || completed.uuid.is_none() {
            return Err(DapiError::IncompleteLookup(format!(
                "routing response for {} did not include a bundle and uuid",
                lookup.describe()
            )));
        }
        Ok(completed)
    }
}

fn incomplete(lookup: &Lookup) -> DapiError {
    DapiError::IncompleteLookup(format!(
        "{} needs an entity type, bundle and uuid (or a slug to resolve them from)",
        lookup.describe()
    ))
}

fn trim_slashes(path: &str) -> String {
    format!("/{}", path.trim().trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_addresses() {
        let endpoints = EndpointResolver::default();
        let address = endpoints
            .address(&Lookup::new("node", "article", "abc"))
            .unwrap();
        assert_eq!(address.as_str(), "/jsonapi/node/article/abc");

        let address = endpoints
            .address(&Lookup::collection("taxonomy_term", "tags"))
            .unwrap();
        assert_eq!(address.as_str(), "/jsonapi/taxonomy_term/tags");
    }

    #[test]
    fn test_static_addresses() {
        let endpoints = EndpointResolver::new(AddressStyle::Static, None);
        let address = endpoints
            .address(&Lookup::new("node", "article", "abc"))
            .unwrap();
        assert_eq!(address.as_str(), "/_resources/node/article/abc.json");

        let address = endpoints
            .address(&Lookup::collection("node", "article"))
            .unwrap();
        assert_eq!(address.as_str(), "/_resources/node/article.json");
    }

    #[test]
    fn test_resource_addresses_follow_style() {
        let api = EndpointResolver::default();
        let address = api.address(&Lookup::new("node", "page", "p1")).unwrap();
        assert!(api.is_resource_address(&address));
        assert!(!api.is_resource_address(&api.slug_endpoint("/about")));
        assert!(!api.is_resource_address(&Address::from("/menu/main")));

        let static_files = EndpointResolver::new(AddressStyle::Static, None);
        let address = static_files
            .address(&Lookup::collection("node", "page"))
            .unwrap();
        assert!(static_files.is_resource_address(&address));
        assert!(!static_files.is_resource_address(&Address::from("/jsonapi/node/page/p1")));
    }

    #[test]
    fn test_equal_lookups_share_address() {
        let endpoints = EndpointResolver::default();
        let mut with_slug = Lookup::new("node", "page", "u1");
        with_slug.slug = Some("/about".to_string());
        assert_eq!(
            endpoints.address(&with_slug).unwrap(),
            endpoints.address(&Lookup::new("node", "page", "u1")).unwrap()
        );
    }

    #[test]
    fn test_incomplete_lookup_has_no_address() {
        let endpoints = EndpointResolver::default();
        let err = endpoints.address(&Lookup::slug("/about")).unwrap_err();
        assert!(matches!(err, DapiError::IncompleteLookup(_)));
        assert!(!endpoints.can_resolve_directly(&Lookup::slug("/about")));
    }

    #[test]
    fn test_normalize_slug_slashes() {
        let endpoints = EndpointResolver::default();
        assert_eq!(endpoints.normalize_slug("  about/team/ "), "/about/team");
        assert_eq!(endpoints.normalize_slug("/about"), "/about");
        assert_eq!(endpoints.normalize_slug("/"), "/");
        assert_eq!(endpoints.normalize_slug("//about//"), "/about");
    }

    #[test]
    fn test_normalize_slug_alias_prefix() {
        let endpoints = EndpointResolver::new(AddressStyle::Api, Some("en/"));
        assert_eq!(endpoints.normalize_slug("about"), "/en/about");
        assert_eq!(endpoints.normalize_slug("/en/about"), "/en/about");
        assert_eq!(endpoints.normalize_slug("/node/12"), "/node/12");
        assert_eq!(endpoints.normalize_slug("/"), "/en");
    }

    #[test]
    fn test_slug_endpoint() {
        let endpoints = EndpointResolver::default();
        assert_eq!(
            endpoints.slug_endpoint("a/b/").as_str(),
            "/a/b?_format=json"
        );
    }

    #[test]
    fn test_complete_from_slug() {
        let endpoints = EndpointResolver::default();
        let routed = json!({
            "nid": [{"value": 4}],
            "uuid": [{"value": "u-4"}],
            "type": [{"target_id": "article"}]
        });
        let lookup = endpoints
            .complete_from_slug(&Lookup::slug("/a/b"), &routed)
            .unwrap();
        assert_eq!(lookup.entity_type.as_deref(), Some("node"));
        assert_eq!(lookup.bundle.as_deref(), Some("article"));
        assert_eq!(lookup.uuid.as_deref(), Some("u-4"));
        assert!(lookup.is_complete());
    }

    #[test]
    fn test_complete_from_slug_taxonomy_vocabulary() {
        let endpoints = EndpointResolver::default();
        let mut lookup = Lookup::slug("/topics/rust");
        lookup.entity_type = Some("taxonomy_term".to_string());
        let routed = json!({
            "uuid": [{"value": "t-1"}],
            "vid": [{"target_id": "tags"}]
        });
        let completed = endpoints.complete_from_slug(&lookup, &routed).unwrap();
        assert_eq!(completed.entity_type.as_deref(), Some("taxonomy_term"));
        assert_eq!(completed.bundle.as_deref(), Some("tags"));
    }

    #[test]
    fn test_complete_from_slug_missing_fields() {
        let endpoints = EndpointResolver::default();
        let routed = json!({ "type": [{"target_id": "article"}] });
        let err = endpoints
            .complete_from_slug(&Lookup::slug("/a"), &routed)
            .unwrap_err();
        assert!(matches!(err, DapiError::IncompleteLookup(_)));
    }
}
