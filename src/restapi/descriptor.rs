use crate::restapi::errors::ApiError;
use crate::restapi::types::{ResourceType, Verb};

/// Name of the only entry in the global config document.
pub const GLOBAL_CONFIG_NAME: &str = "config";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Any number of named entries.
    Collection,
    /// Exactly one entry, always called `fixed_name`.
    SingleDocument { fixed_name: &'static str },
}

/// Static description of what an endpoint accepts.
#[derive(Debug)]
pub struct EndpointDescriptor {
    pub resource: ResourceType,
    pub allowed: &'static [Verb],
    /// Allowed only while the opt-in flag is on.
    pub gated: &'static [Verb],
    /// Recognized but never served; rejected before authentication.
    pub unimplemented: &'static [Verb],
    pub addressing: Addressing,
}

const COLLECTION_VERBS: &[Verb] = &[Verb::Get, Verb::Put, Verb::Patch, Verb::Delete];

macro_rules! collection {
    ($resource:expr) => {
        EndpointDescriptor {
            resource: $resource,
            allowed: COLLECTION_VERBS,
            gated: &[],
            unimplemented: &[],
            addressing: Addressing::Collection,
        }
    };
}

static INTERNAL_USERS: EndpointDescriptor = collection!(ResourceType::InternalUsers);
static ROLES: EndpointDescriptor = collection!(ResourceType::Roles);
static ROLES_MAPPING: EndpointDescriptor = collection!(ResourceType::RolesMapping);
static ACTION_GROUPS: EndpointDescriptor = collection!(ResourceType::ActionGroups);
static TENANTS: EndpointDescriptor = collection!(ResourceType::Tenants);

static CONFIG: EndpointDescriptor = EndpointDescriptor {
    resource: ResourceType::Config,
    allowed: &[Verb::Get, Verb::Put, Verb::Patch],
    gated: &[Verb::Put, Verb::Patch],
    unimplemented: &[Verb::Delete, Verb::Post],
    addressing: Addressing::SingleDocument {
        fixed_name: GLOBAL_CONFIG_NAME,
    },
};

impl EndpointDescriptor {
    pub fn for_resource(resource: ResourceType) -> &'static EndpointDescriptor {
        match resource {
            ResourceType::InternalUsers => &INTERNAL_USERS,
            ResourceType::Roles => &ROLES,
            ResourceType::RolesMapping => &ROLES_MAPPING,
            ResourceType::ActionGroups => &ACTION_GROUPS,
            ResourceType::Tenants => &TENANTS,
            ResourceType::Config => &CONFIG,
        }
    }

    /// Verb gating. `gate_enabled` is the value of the opt-in flag.
    pub fn admit(&self, verb: Verb, gate_enabled: bool) -> Result<(), ApiError> {
        if self.unimplemented.contains(&verb) {
            return Err(ApiError::MethodDisabled(verb));
        }
        if !self.allowed.contains(&verb) {
            return Err(ApiError::MethodNotSupported(verb));
        }
        if self.gated.contains(&verb) && !gate_enabled {
            return Err(ApiError::MethodDisabled(verb));
        }
        Ok(())
    }

    /// Check the entry name against the addressing mode.
    pub fn check_name(&self, verb: Verb, name: Option<&str>) -> Result<(), ApiError> {
        match (self.addressing, name) {
            (Addressing::Collection, None) if matches!(verb, Verb::Put | Verb::Delete) => {
                Err(ApiError::MethodNotSupported(verb))
            }
            (Addressing::Collection, _) => Ok(()),
            (Addressing::SingleDocument { fixed_name }, Some(name)) if name != fixed_name => {
                Err(ApiError::BadRequest(format!(
                    "Resource '{}' only accepts the name '{fixed_name}'",
                    self.resource.path_segment()
                )))
            }
            (Addressing::SingleDocument { fixed_name }, None) if verb == Verb::Put => {
                Err(ApiError::BadRequest(format!(
                    "PUT on '{}' requires the name '{fixed_name}'",
                    self.resource.path_segment()
                )))
            }
            (Addressing::SingleDocument { .. }, _) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_verbs() {
        let d = EndpointDescriptor::for_resource(ResourceType::Roles);
        for verb in [Verb::Get, Verb::Put, Verb::Patch, Verb::Delete] {
            assert!(d.admit(verb, false).is_ok());
        }
        assert_eq!(d.admit(Verb::Post, true).unwrap_err().kind(), "METHOD_NOT_SUPPORTED");

        assert_eq!(
            d.check_name(Verb::Put, None).unwrap_err().kind(),
            "METHOD_NOT_SUPPORTED"
        );
        assert_eq!(
            d.check_name(Verb::Delete, None).unwrap_err().kind(),
            "METHOD_NOT_SUPPORTED"
        );
        assert!(d.check_name(Verb::Patch, None).is_ok());
        assert!(d.check_name(Verb::Get, None).is_ok());
    }

    #[test]
    fn test_config_gating() {
        let d = EndpointDescriptor::for_resource(ResourceType::Config);
        assert!(d.admit(Verb::Get, false).is_ok());
        assert_eq!(d.admit(Verb::Put, false).unwrap_err().kind(), "METHOD_DISABLED");
        assert_eq!(d.admit(Verb::Patch, false).unwrap_err().kind(), "METHOD_DISABLED");
        assert!(d.admit(Verb::Put, true).is_ok());
        assert!(d.admit(Verb::Patch, true).is_ok());
        // never served, even with the flag on
        assert_eq!(d.admit(Verb::Delete, true).unwrap_err().kind(), "METHOD_DISABLED");
        assert_eq!(d.admit(Verb::Post, true).unwrap_err().kind(), "METHOD_DISABLED");
    }

    #[test]
    fn test_config_fixed_name() {
        let d = EndpointDescriptor::for_resource(ResourceType::Config);
        assert!(d.check_name(Verb::Get, Some("config")).is_ok());
        assert!(d.check_name(Verb::Get, None).is_ok());
        assert!(d.check_name(Verb::Patch, None).is_ok());
        assert_eq!(
            d.check_name(Verb::Put, Some("other")).unwrap_err().kind(),
            "BAD_REQUEST"
        );
        assert_eq!(d.check_name(Verb::Put, None).unwrap_err().kind(), "BAD_REQUEST");
    }
}
