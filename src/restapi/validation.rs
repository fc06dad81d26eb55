//! Schema and security-policy validation of untrusted entry bodies.
//!
//! Stages run in a fixed order and the first failing stage ends validation:
//! parse, unknown keys, datatypes, password policy, server-computed keys.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde_json::Value;

use crate::restapi::errors::ApiError;
use crate::restapi::hashing::{resolve_secret, SecretInput, HASH_FIELD, PASSWORD_FIELD};
use crate::restapi::types::{Entry, ResourceType};

/// Keys whose values are derived by the server and can never be set by a client.
pub const SERVER_COMPUTED_KEYS: [&str; 3] = ["hidden", "reserved", "static"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    StringArray,
    Object,
    StringMap,
}

impl DataType {
    fn check(&self, value: &Value) -> Result<(), &'static str> {
        match (self, value) {
            (DataType::String, Value::String(_)) => Ok(()),
            (DataType::String, _) => Err("String expected"),
            (DataType::StringArray, Value::Array(items)) => {
                if items.iter().all(Value::is_string) {
                    Ok(())
                } else {
                    Err("Array of strings expected")
                }
            }
            (DataType::StringArray, _) => Err("Array expected"),
            (DataType::Object, Value::Object(_)) => Ok(()),
            (DataType::Object, _) => Err("Object expected"),
            (DataType::StringMap, Value::Object(map)) => {
                if map.values().all(Value::is_string) {
                    Ok(())
                } else {
                    Err("Object of strings expected")
                }
            }
            (DataType::StringMap, _) => Err("Object expected"),
        }
    }
}

/// Known keys of one resource type and their declared types.
#[derive(Debug)]
pub struct ResourceSchema {
    pub fields: &'static [(&'static str, DataType)],
    /// String arrays with set semantics; duplicates are dropped.
    pub set_fields: &'static [&'static str],
}

impl ResourceSchema {
    pub fn field_type(&self, key: &str) -> Option<DataType> {
        self.fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, data_type)| *data_type)
    }
}

static INTERNAL_USERS: ResourceSchema = ResourceSchema {
    fields: &[
        ("hash", DataType::String),
        ("password", DataType::String),
        ("roles", DataType::StringArray),
        ("attributes", DataType::StringMap),
        ("description", DataType::String),
    ],
    set_fields: &["roles"],
};

static ROLES: ResourceSchema = ResourceSchema {
    fields: &[
        ("cluster", DataType::StringArray),
        ("indices", DataType::Object),
        ("tenants", DataType::Object),
        ("description", DataType::String),
    ],
    set_fields: &["cluster"],
};

static ROLES_MAPPING: ResourceSchema = ResourceSchema {
    fields: &[
        ("users", DataType::StringArray),
        ("backendroles", DataType::StringArray),
        ("and_backendroles", DataType::StringArray),
        ("hosts", DataType::StringArray),
        ("description", DataType::String),
    ],
    set_fields: &["users", "backendroles", "and_backendroles", "hosts"],
};

static ACTION_GROUPS: ResourceSchema = ResourceSchema {
    fields: &[
        ("permissions", DataType::StringArray),
        ("description", DataType::String),
    ],
    set_fields: &["permissions"],
};

static TENANTS: ResourceSchema = ResourceSchema {
    fields: &[("description", DataType::String)],
    set_fields: &[],
};

static CONFIG: ResourceSchema = ResourceSchema {
    fields: &[("dynamic", DataType::Object)],
    set_fields: &[],
};

pub fn schema_for(resource: ResourceType) -> &'static ResourceSchema {
    match resource {
        ResourceType::InternalUsers => &INTERNAL_USERS,
        ResourceType::Roles => &ROLES,
        ResourceType::RolesMapping => &ROLES_MAPPING,
        ResourceType::ActionGroups => &ACTION_GROUPS,
        ResourceType::Tenants => &TENANTS,
        ResourceType::Config => &CONFIG,
    }
}

/// Password strength policy.
///
/// The configured pattern must match the whole password. Leading lookaheads
/// such as `(?=.*[A-Z])` are supported by compiling each one into its own
/// prefix-anchored rule, since the regex engine has no lookaround.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    rules: Vec<Regex>,
    message: String,
}

impl PasswordPolicy {
    pub const DEFAULT_MESSAGE: &'static str = "Password does not match minimum criteria";
    pub const USERNAME_MESSAGE: &'static str = "Password must not be equal to the user name";

    pub fn new(pattern: Option<&str>, message: Option<&str>) -> Result<Self, regex::Error> {
        let rules = match pattern.filter(|p| !p.trim().is_empty()) {
            Some(pattern) => compile_pattern(pattern)?,
            None => Vec::new(),
        };
        Ok(Self {
            rules,
            message: message.unwrap_or(Self::DEFAULT_MESSAGE).to_string(),
        })
    }

    /// No strength requirement; the user-name ban still applies.
    pub fn permissive() -> Self {
        Self {
            rules: Vec::new(),
            message: Self::DEFAULT_MESSAGE.to_string(),
        }
    }

    pub fn check(&self, username: &str, password: &str) -> Result<(), ApiError> {
        if password.to_lowercase() == username.to_lowercase() {
            return Err(ApiError::PasswordPolicyViolation(
                Self::USERNAME_MESSAGE.to_string(),
            ));
        }
        if self.rules.iter().all(|rule| rule.is_match(password)) {
            Ok(())
        } else {
            Err(ApiError::PasswordPolicyViolation(self.message.clone()))
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Vec<Regex>, regex::Error> {
    let mut rest = pattern.strip_prefix('^').unwrap_or(pattern);
    let mut rules = Vec::new();

    while let Some(body) = rest.strip_prefix("(?=") {
        let end = closing_paren(body).ok_or_else(|| {
            regex::Error::Syntax(format!("unbalanced lookahead in `{pattern}`"))
        })?;
        rules.push(Regex::new(&format!("^(?:{})", &body[..end]))?);
        rest = &body[end + 1..];
    }

    let rest = match rest.strip_suffix('$') {
        Some(stripped) if !stripped.ends_with('\\') => stripped,
        _ => rest,
    };
    if !rest.is_empty() {
        rules.push(Regex::new(&format!("^(?:{rest})$"))?);
    }
    Ok(rules)
}

/// Byte offset of the `)` closing a group whose `(` was already consumed.
fn closing_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut escaped = false;
    let mut in_class = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Entry that passed every validation stage, with its secret split off.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    pub fields: Entry,
    /// Present only for resource types that carry credentials.
    pub secret: Option<SecretInput>,
}

impl ValidatedEntry {
    /// Resolve the secret against the hash stored before this request and
    /// produce the entry as it will be persisted.
    pub fn into_stored(self, existing_hash: Option<&str>) -> Result<Entry, ApiError> {
        let Self { mut fields, secret } = self;
        if let Some(secret) = secret {
            let hash = resolve_secret(existing_hash, &secret)?;
            fields.insert(HASH_FIELD.to_string(), Value::String(hash));
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    password_policy: PasswordPolicy,
}

impl Validator {
    pub fn new(password_policy: PasswordPolicy) -> Self {
        Self { password_policy }
    }

    /// Validate a raw request body for the entry `name`.
    pub fn validate(
        &self,
        resource: ResourceType,
        name: &str,
        raw_body: &[u8],
    ) -> Result<ValidatedEntry, ApiError> {
        if raw_body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::PayloadMandatory);
        }
        let value: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ApiError::BodyNotParseable(e.to_string()))?;
        self.validate_value(resource, name, value)
    }

    /// Validate an already parsed entry, e.g. the result of a patch operation.
    pub fn validate_value(
        &self,
        resource: ResourceType,
        name: &str,
        value: Value,
    ) -> Result<ValidatedEntry, ApiError> {
        let Value::Object(mut fields) = value else {
            return Err(ApiError::BodyNotParseable(
                "entry must be a JSON object".to_string(),
            ));
        };
        let schema = schema_for(resource);

        let unknown: Vec<String> = fields
            .keys()
            .filter(|k| schema.field_type(k).is_none() && !is_server_computed(k))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ApiError::invalid_keys("Invalid configuration", unknown));
        }

        let wrong: BTreeMap<String, String> = fields
            .iter()
            .filter_map(|(key, value)| {
                let expected = schema.field_type(key)?.check(value).err()?;
                Some((key.clone(), expected.to_string()))
            })
            .collect();
        if !wrong.is_empty() {
            return Err(ApiError::WrongDatatype { fields: wrong });
        }

        if resource.has_credentials() {
            if let Some(Value::String(password)) = fields.get(PASSWORD_FIELD) {
                if !password.is_empty() {
                    self.password_policy.check(name, password)?;
                }
            }
        }

        let server_computed: Vec<String> = fields
            .keys()
            .filter(|k| is_server_computed(k))
            .cloned()
            .collect();
        if !server_computed.is_empty() {
            return Err(ApiError::invalid_keys(
                "Server-computed fields cannot be set",
                server_computed,
            ));
        }

        for key in schema.set_fields {
            if let Some(Value::Array(items)) = fields.get_mut(*key) {
                let mut seen = HashSet::new();
                items.retain(|item| seen.insert(item.to_string()));
            }
        }

        let secret = resource
            .has_credentials()
            .then(|| SecretInput::take_from(&mut fields));

        Ok(ValidatedEntry { fields, secret })
    }
}

fn is_server_computed(key: &str) -> bool {
    SERVER_COMPUTED_KEYS.contains(&key)
}
