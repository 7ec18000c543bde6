//! Key expressions for the served address space.
//!
//! Variable nodes map onto the Zenoh key space as
//! `<prefix>/<object>/<variable>`; service metadata lives under the reserved
//! `<prefix>/@/` segment.

/// Default key expression prefix for the gateway's address space.
pub const KEY_PREFIX: &str = "plcgate/opcua";

/// Builder for address-space key expressions.
#[derive(Debug, Clone)]
pub struct NodeKeyBuilder {
    prefix: String,
}

impl Default for NodeKeyBuilder {
    fn default() -> Self {
        Self::new(KEY_PREFIX)
    }
}

impl NodeKeyBuilder {
    /// Create a builder rooted at `prefix` (trailing slashes are ignored).
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of a single variable node.
    ///
    /// # Example
    /// ```
    /// use plcgate_common::keyexpr::NodeKeyBuilder;
    ///
    /// let builder = NodeKeyBuilder::default();
    /// let key = builder.node_key("ModbusPLC", "Temperature");
    /// assert_eq!(key, "plcgate/opcua/ModbusPLC/Temperature");
    /// ```
    pub fn node_key(&self, object: &str, variable: &str) -> String {
        format!("{}/{}/{}", self.prefix, object, variable)
    }

    /// Wildcard matching every variable of an object.
    ///
    /// # Example
    /// ```
    /// use plcgate_common::keyexpr::NodeKeyBuilder;
    ///
    /// let builder = NodeKeyBuilder::default();
    /// assert_eq!(builder.object_wildcard("ModbusPLC"), "plcgate/opcua/ModbusPLC/*");
    /// ```
    pub fn object_wildcard(&self, object: &str) -> String {
        format!("{}/{}/*", self.prefix, object)
    }

    /// Wildcard matching everything under the prefix.
    pub fn all_wildcard(&self) -> String {
        format!("{}/**", self.prefix)
    }

    /// Key of the browse (discovery) queryable.
    pub fn browse_key(&self) -> String {
        format!("{}/@/browse", self.prefix)
    }

    /// Key of the service status.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    /// Split a concrete key into its object and variable parts.
    ///
    /// Returns `None` for keys outside the prefix, metadata keys (`@`), and
    /// keys that are not exactly two levels below the prefix.
    pub fn parse<'a>(&self, key: &'a str) -> Option<ParsedNodeKey<'a>> {
        parse_node_key(&self.prefix, key)
    }
}

/// Parsed components of a variable key expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedNodeKey<'a> {
    pub object: &'a str,
    pub variable: &'a str,
}

/// Parse `<prefix>/<object>/<variable>`.
pub fn parse_node_key<'a>(prefix: &str, key: &'a str) -> Option<ParsedNodeKey<'a>> {
    let rest = key.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut parts = rest.split('/');

    let object = parts.next()?;
    let variable = parts.next()?;

    if parts.next().is_some() || object.is_empty() || variable.is_empty() || object == "@" {
        return None;
    }

    Some(ParsedNodeKey { object, variable })
}
