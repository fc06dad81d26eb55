use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::restapi::errors::ApiError;
use crate::restapi::types::{Actor, ResourceType};

/// Derived protection level of an entry. Never stored on the entry itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionFlag {
    Normal,
    /// Visible to everyone with API access, mutable only by super admins.
    ReadOnly,
    /// Behaves as absent for everyone but super admins.
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Reserved/hidden name rules for a single resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRules {
    #[serde(default)]
    pub reserved: Vec<String>,
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default)]
    pub reserved_prefixes: Vec<String>,
    #[serde(default)]
    pub hidden_prefixes: Vec<String>,
}

impl ProtectionRules {
    fn classify(&self, name: &str) -> ProtectionFlag {
        let matches = |names: &[String], prefixes: &[String]| {
            names.iter().any(|n| n == name) || prefixes.iter().any(|p| name.starts_with(p.as_str()))
        };

        // hidden wins over reserved
        if matches(&self.hidden, &self.hidden_prefixes) {
            ProtectionFlag::Hidden
        } else if matches(&self.reserved, &self.reserved_prefixes) {
            ProtectionFlag::ReadOnly
        } else {
            ProtectionFlag::Normal
        }
    }
}

/// Configured protection policy for all resource types.
///
/// Classification depends on the entry name only, so a hidden name is hidden
/// whether or not an entry with that name exists.
#[derive(Debug, Clone, Default)]
pub struct ProtectionPolicy {
    rules: HashMap<ResourceType, ProtectionRules>,
}

impl ProtectionPolicy {
    pub fn new(rules: HashMap<ResourceType, ProtectionRules>) -> Self {
        Self { rules }
    }

    pub fn with_rules(mut self, resource: ResourceType, rules: ProtectionRules) -> Self {
        self.rules.insert(resource, rules);
        self
    }

    pub fn classify(&self, resource: ResourceType, name: &str) -> ProtectionFlag {
        self.rules
            .get(&resource)
            .map(|rules| rules.classify(name))
            .unwrap_or(ProtectionFlag::Normal)
    }
}

pub fn is_authorized(actor: &Actor, flag: ProtectionFlag, operation: Operation) -> bool {
    if actor.is_super_admin {
        return true;
    }
    match (flag, operation) {
        (ProtectionFlag::Normal, _) => true,
        (ProtectionFlag::ReadOnly, Operation::Read) => true,
        (ProtectionFlag::ReadOnly, Operation::Write) => false,
        (ProtectionFlag::Hidden, _) => false,
    }
}

/// Turn a denied check into the error the caller is allowed to see.
///
/// `in_collection` selects the not-found status used when the request
/// addresses the whole collection.
pub fn enforce(
    actor: &Actor,
    name: &str,
    flag: ProtectionFlag,
    operation: Operation,
    in_collection: bool,
) -> Result<(), ApiError> {
    if is_authorized(actor, flag, operation) {
        return Ok(());
    }

    match flag {
        ProtectionFlag::Hidden => {
            tracing::warn!(principal = %actor.principal, entry = name, "access to hidden entry denied");
            Err(ApiError::HiddenResource {
                name: name.to_string(),
                in_collection,
            })
        }
        _ => {
            tracing::warn!(principal = %actor.principal, entry = name, "mutation of read-only entry denied");
            Err(ApiError::ProtectedResource {
                names: vec![name.to_string()],
            })
        }
    }
}
