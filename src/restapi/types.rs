use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Monotonically increasing document version, used as the optimistic-concurrency token.
pub type Version = u64;

/// One named item inside a resource document.
///
/// Fields are kept as raw JSON so patches can address them directly; the
/// validator is what gives an entry its resource-specific shape.
pub type Entry = Map<String, Value>;

/// Category of configuration document managed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    InternalUsers,
    Roles,
    RolesMapping,
    ActionGroups,
    Tenants,
    Config,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::InternalUsers,
        ResourceType::Roles,
        ResourceType::RolesMapping,
        ResourceType::ActionGroups,
        ResourceType::Tenants,
        ResourceType::Config,
    ];

    /// Storage key of the document holding this resource type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::InternalUsers => "internalusers",
            ResourceType::Roles => "roles",
            ResourceType::RolesMapping => "rolesmapping",
            ResourceType::ActionGroups => "actiongroups",
            ResourceType::Tenants => "tenants",
            ResourceType::Config => "config",
        }
    }

    /// Resolve a URL path segment, including the legacy singular aliases.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "internalusers" | "user" => Some(ResourceType::InternalUsers),
            "roles" => Some(ResourceType::Roles),
            "rolesmapping" => Some(ResourceType::RolesMapping),
            "actiongroups" | "actiongroup" => Some(ResourceType::ActionGroups),
            "tenants" => Some(ResourceType::Tenants),
            "securityconfig" => Some(ResourceType::Config),
            _ => None,
        }
    }

    /// Canonical URL path segment.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceType::Config => "securityconfig",
            other => other.as_str(),
        }
    }

    /// Whether entries of this type carry a credential hash.
    pub fn has_credentials(&self) -> bool {
        matches!(self, ResourceType::InternalUsers)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All entries of one resource type, ordered by entry name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    pub entries: BTreeMap<String, Entry>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or replace an entry, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, entry: Entry) -> Option<Entry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(name, entry)| (name.clone(), Value::Object(entry.clone())))
                .collect(),
        )
    }

    /// Rebuild a document from its JSON form. Every top-level value must be an object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub version: Version,
    pub document: ConfigDocument,
}

/// Resolved identity of the caller.
///
/// Superadmin status is carried explicitly so protection checks stay a pure
/// function of actor, entry and operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub principal: String,
    pub is_super_admin: bool,
    pub granted_privileges: Vec<String>,
}

impl Actor {
    pub fn super_admin(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            is_super_admin: true,
            granted_privileges: Vec::new(),
        }
    }

    pub fn with_privileges(principal: impl Into<String>, privileges: &[&str]) -> Self {
        Self {
            principal: principal.into(),
            is_super_admin: false,
            granted_privileges: privileges.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn has_any_privilege(&self, privileges: &[String]) -> bool {
        self.granted_privileges
            .iter()
            .any(|granted| privileges.contains(granted))
    }
}

/// HTTP-level operation requested against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Patch,
    Delete,
    Post,
}

impl Verb {
    pub fn from_method(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET => Some(Verb::Get),
            axum::http::Method::PUT => Some(Verb::Put),
            axum::http::Method::PATCH => Some(Verb::Patch),
            axum::http::Method::DELETE => Some(Verb::Delete),
            axum::http::Method::POST => Some(Verb::Post),
            _ => None,
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Verb::Get)
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Post => "POST",
        };
        f.write_str(s)
    }
}
