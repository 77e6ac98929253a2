//! Resource descriptor.
//!
//! A `Resource` is the fixed attribute set identifying the emitting process.
//! It is built once at startup and shared by reference with every exporter.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Attribute key for the logical service name.
pub const SERVICE_NAME: &str = "service.name";
/// Attribute key for the service version.
pub const SERVICE_VERSION: &str = "service.version";
/// Attribute key for the SDK name.
pub const TELEMETRY_SDK_NAME: &str = "telemetry.sdk.name";
/// Attribute key for the SDK language.
pub const TELEMETRY_SDK_LANGUAGE: &str = "telemetry.sdk.language";

/// Environment variable holding extra `key=value` resource attributes.
pub const RESOURCE_ATTRIBUTES_ENV: &str = "OTEL_RESOURCE_ATTRIBUTES";

/// Immutable attribute set attached to every exported batch.
///
/// Cloning is cheap; all clones share the same attribute map.
///
/// # Example
///
/// ```
/// use telemetry::Resource;
///
/// let resource = Resource::builder("checkout")
///     .with_attribute("deployment.environment", "staging")
///     .build();
///
/// assert_eq!(resource.service_name(), "checkout");
/// assert_eq!(
///     resource.get("deployment.environment"),
///     Some(&serde_json::json!("staging"))
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    attributes: Arc<BTreeMap<String, serde_json::Value>>,
}

impl Resource {
    /// Starts building a resource for the given service name.
    #[must_use]
    pub fn builder(service_name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(service_name)
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Returns the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.get(SERVICE_NAME)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    }

    /// Iterates over all attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.attributes.iter()
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the resource has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Builder for [`Resource`].
#[must_use = "builders do nothing unless .build() is called"]
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    attributes: BTreeMap<String, serde_json::Value>,
    from_env: Option<String>,
}

impl ResourceBuilder {
    /// Creates a builder seeded with the service name and SDK attributes.
    pub fn new(service_name: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            SERVICE_NAME.to_string(),
            serde_json::Value::String(service_name.into()),
        );
        attributes.insert(
            TELEMETRY_SDK_NAME.to_string(),
            serde_json::Value::String(env!("CARGO_PKG_NAME").to_string()),
        );
        attributes.insert(
            TELEMETRY_SDK_LANGUAGE.to_string(),
            serde_json::Value::String("rust".to_string()),
        );
        Self {
            attributes,
            from_env: None,
        }
    }

    /// Sets the service version.
    pub fn with_service_version(self, version: impl Into<String>) -> Self {
        self.with_attribute(SERVICE_VERSION, version.into())
    }

    /// Adds an attribute. Values should be strings, numbers, or booleans.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Merges attributes from an `OTEL_RESOURCE_ATTRIBUTES`-style string.
    ///
    /// Attributes set explicitly on the builder take precedence.
    pub fn with_env_attributes(mut self, raw: impl Into<String>) -> Self {
        self.from_env = Some(raw.into());
        self
    }

    /// Merges attributes from the `OTEL_RESOURCE_ATTRIBUTES` variable, if set.
    pub fn with_env(self) -> Self {
        match std::env::var(RESOURCE_ATTRIBUTES_ENV) {
            Ok(raw) => self.with_env_attributes(raw),
            Err(_) => self,
        }
    }

    /// Builds the immutable resource.
    #[must_use]
    pub fn build(self) -> Resource {
        let mut attributes = self
            .from_env
            .as_deref()
            .map(parse_attribute_list)
            .unwrap_or_default();
        attributes.extend(self.attributes);
        Resource {
            attributes: Arc::new(attributes),
        }
    }
}

/// Parses `k1=v1,k2=v2`; malformed pairs are skipped.
fn parse_attribute_list(raw: &str) -> BTreeMap<String, serde_json::Value> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((
                key.to_string(),
                serde_json::Value::String(value.trim().to_string()),
            ))
        })
        .collect()
}
