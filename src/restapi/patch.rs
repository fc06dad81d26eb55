//! RFC 6902 JSON Patch against a working copy of a resource document.
//!
//! Operations are applied one at a time. After each operation every entry it
//! wrote is run through the validator and the hash manager again, so a patch
//! can never produce an entry a PUT would have rejected. The authoritative
//! document is untouched until the caller commits the returned copy.

use serde::Deserialize;
use serde_json::Value;

use crate::restapi::errors::ApiError;
use crate::restapi::hashing::HASH_FIELD;
use crate::restapi::protection::{enforce, Operation, ProtectionFlag, ProtectionPolicy};
use crate::restapi::types::{Actor, ConfigDocument, Entry, ResourceType};
use crate::restapi::validation::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

/// A single well-formed patch operation.
#[derive(Debug, Clone)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub from: Option<String>,
    inner: json_patch::PatchOperation,
}

#[derive(Deserialize)]
struct OperationHeader {
    op: PatchOp,
    path: String,
    #[serde(default)]
    from: Option<String>,
}

impl PatchOperation {
    fn from_value(raw: Value) -> Result<Self, ApiError> {
        let header: OperationHeader = serde_json::from_value(raw.clone())
            .map_err(|e| ApiError::BodyNotParseable(format!("Malformed patch operation: {e}")))?;
        let inner: json_patch::PatchOperation = serde_json::from_value(raw)
            .map_err(|e| ApiError::BodyNotParseable(format!("Malformed patch operation: {e}")))?;
        Ok(Self {
            op: header.op,
            path: header.path,
            from: header.from,
            inner,
        })
    }

    /// Entry names this operation touches when addressing a whole collection,
    /// with the kind of access each one needs.
    fn collection_targets(&self) -> Result<Vec<(String, Operation)>, ApiError> {
        let path_access = if self.op == PatchOp::Test {
            Operation::Read
        } else {
            Operation::Write
        };
        let mut targets = vec![(entry_name(&self.path)?, path_access)];
        if let Some(from) = &self.from {
            let from_access = if self.op == PatchOp::Move {
                Operation::Write
            } else {
                Operation::Read
            };
            targets.push((entry_name(from)?, from_access));
        }
        Ok(targets)
    }

    fn apply(&self, target: &mut Value, in_collection: bool) -> Result<(), ApiError> {
        let unresolved = if in_collection {
            self.unresolved_entry(target)
        } else {
            self.path.clone()
        };
        json_patch::patch(target, std::slice::from_ref(&self.inner)).map_err(|e| {
            if self.op == PatchOp::Test {
                ApiError::BadRequest(format!("Test operation failed at '{}'", self.path))
            } else {
                tracing::debug!(path = %self.path, error = %e, "patch operation did not apply");
                ApiError::not_found(unresolved, in_collection)
            }
        })
    }

    /// Entry name reported when a collection operation cannot be applied.
    ///
    /// Named after the entry, never the pointer, so a missing entry reads
    /// exactly like a hidden one.
    fn unresolved_entry(&self, collection: &Value) -> String {
        let missing_source = self
            .from
            .as_deref()
            .and_then(|from| entry_name(from).ok())
            .filter(|name| collection.get(name).is_none());
        missing_source
            .or_else(|| entry_name(&self.path).ok())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Parse a request body into patch operations. The body must be a JSON array.
pub fn parse_operations(raw_body: &[u8]) -> Result<Vec<PatchOperation>, ApiError> {
    if raw_body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::PayloadMandatory);
    }
    let value: Value = serde_json::from_slice(raw_body)
        .map_err(|e| ApiError::BodyNotParseable(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ApiError::BodyNotParseable(
            "A JSON Patch must be an array of operations".to_string(),
        ));
    };
    items.into_iter().map(PatchOperation::from_value).collect()
}

/// First reference token of a JSON pointer, unescaped.
fn entry_name(pointer: &str) -> Result<String, ApiError> {
    let rest = pointer.strip_prefix('/').ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Patch path '{pointer}' must address an entry of the collection"
        ))
    })?;
    let token = rest.split('/').next().unwrap_or(rest);
    Ok(token.replace("~1", "/").replace("~0", "~"))
}

/// Everything a patch needs besides the document and the operations.
pub struct PatchContext<'a> {
    pub resource: ResourceType,
    pub actor: &'a Actor,
    pub policy: &'a ProtectionPolicy,
    pub validator: &'a Validator,
    /// Set for single-document resources; the entry cannot be renamed or removed.
    pub fixed_name: Option<&'static str>,
}

impl PatchContext<'_> {
    /// Patch addressing the whole collection (`/entryName/...` paths).
    pub fn apply_to_collection(
        &self,
        document: &ConfigDocument,
        operations: &[PatchOperation],
    ) -> Result<ConfigDocument, ApiError> {
        self.check_collection_targets(operations)?;

        let mut working = document.to_value();
        for operation in operations {
            let written: Vec<String> = operation
                .collection_targets()?
                .into_iter()
                .filter(|(_, access)| *access == Operation::Write)
                .map(|(name, _)| name)
                .collect();
            let prior_hashes: Vec<Option<String>> = written
                .iter()
                .map(|name| stored_hash(working.get(name)))
                .collect();

            operation.apply(&mut working, true)?;

            for (name, prior_hash) in written.iter().zip(prior_hashes) {
                let Some(value) = working.get(name).cloned() else {
                    continue;
                };
                let entry = self.revalidate(name, value, prior_hash.as_deref())?;
                working[name.as_str()] = Value::Object(entry);
            }
        }

        let patched = ConfigDocument::from_value(working)
            .map_err(|e| ApiError::BadRequest(format!("Patched document is not valid: {e}")))?;
        if let Some(fixed_name) = self.fixed_name {
            if patched.len() != 1 || !patched.contains(fixed_name) {
                return Err(ApiError::BadRequest(format!(
                    "'{}' must contain exactly the entry '{fixed_name}'",
                    self.resource.path_segment()
                )));
            }
        }
        Ok(patched)
    }

    /// Patch addressing one entry (`/field/...` paths).
    pub fn apply_to_entry(
        &self,
        document: &ConfigDocument,
        name: &str,
        operations: &[PatchOperation],
    ) -> Result<ConfigDocument, ApiError> {
        let flag = self.policy.classify(self.resource, name);
        enforce(self.actor, name, flag, Operation::Write, false)?;

        let entry = document
            .get(name)
            .ok_or_else(|| ApiError::not_found(name, false))?;

        let mut working = Value::Object(entry.clone());
        for operation in operations {
            let prior_hash = stored_hash(Some(&working));
            operation.apply(&mut working, false)?;
            let revalidated = self.revalidate(name, working, prior_hash.as_deref())?;
            working = Value::Object(revalidated);
        }

        let Value::Object(entry) = working else {
            return Err(ApiError::Internal("patched entry is not an object".to_string()));
        };
        let mut patched = document.clone();
        patched.insert(name, entry);
        Ok(patched)
    }

    /// Classify every target up front. Hidden targets fail immediately;
    /// read-only targets are collected and reported together.
    fn check_collection_targets(&self, operations: &[PatchOperation]) -> Result<(), ApiError> {
        let mut protected: Vec<String> = Vec::new();
        for operation in operations {
            for (name, access) in operation.collection_targets()? {
                let flag = self.policy.classify(self.resource, &name);
                match enforce(self.actor, &name, flag, access, true) {
                    Ok(()) => {}
                    Err(ApiError::ProtectedResource { .. }) if flag == ProtectionFlag::ReadOnly => {
                        if !protected.contains(&name) {
                            protected.push(name);
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if protected.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ProtectedResource { names: protected })
        }
    }

    fn revalidate(
        &self,
        name: &str,
        value: Value,
        prior_hash: Option<&str>,
    ) -> Result<Entry, ApiError> {
        let mut value = value;
        // The working copy still carries the stored hash; only a changed one counts as supplied.
        if let (Some(prior), Some(fields)) = (prior_hash, value.as_object_mut()) {
            if fields.get(HASH_FIELD).and_then(Value::as_str) == Some(prior) {
                fields.remove(HASH_FIELD);
            }
        }
        self.validator
            .validate_value(self.resource, name, value)?
            .into_stored(prior_hash)
    }
}

fn stored_hash(entry: Option<&Value>) -> Option<String> {
    entry?.get(HASH_FIELD)?.as_str().map(str::to_string)
}
