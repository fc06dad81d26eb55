//! Request dispatcher for the security REST API.
//!
//! Every request runs one read-validate-commit cycle:
//!
//! 1. resolve the resource type and gate the verb
//! 2. check the entry name against the addressing mode
//! 3. authenticate and authorize the caller
//! 4. check payload presence
//! 5. read the current document and compare `If-Match`
//! 6. classify, validate and resolve hashes on a working copy
//! 7. commit conditionally on the version read in step 5

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Map, Value};

use crate::restapi::concurrency::DocumentController;
use crate::restapi::descriptor::{Addressing, EndpointDescriptor};
use crate::restapi::errors::{status_label, ApiError};
use crate::restapi::hashing::{redact, HASH_FIELD};
use crate::restapi::patch::{parse_operations, PatchContext};
use crate::restapi::protection::{
    enforce, is_authorized, Operation, ProtectionFlag, ProtectionPolicy,
};
use crate::restapi::types::{Actor, Entry, ResourceType, Verb, Version};
use crate::restapi::validation::Validator;
use crate::storage::ConfigRepository;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub verb: Verb,
    pub resource_segment: String,
    pub name: Option<String>,
    pub body: Vec<u8>,
    pub if_match: Option<Version>,
}

impl ApiRequest {
    pub fn new(verb: Verb, resource_segment: impl Into<String>) -> Self {
        Self {
            verb,
            resource_segment: resource_segment.into(),
            name: None,
            body: Vec::new(),
            if_match: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: Value) -> Self {
        self.with_body(body.to_string())
    }

    pub fn with_if_match(mut self, version: Version) -> Self {
        self.if_match = Some(version);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Version of the document the response reflects.
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Opens PUT and PATCH on the global config.
    pub allow_config_modification: bool,
    /// Privileges that grant API access to non-superadmins.
    pub admin_roles: Vec<String>,
}

pub struct ResourceEngine {
    controller: DocumentController,
    policy: ProtectionPolicy,
    validator: Validator,
    options: EngineOptions,
}

impl ResourceEngine {
    pub fn new(
        repository: Arc<dyn ConfigRepository>,
        policy: ProtectionPolicy,
        validator: Validator,
        options: EngineOptions,
    ) -> Self {
        Self {
            controller: DocumentController::new(repository),
            policy,
            validator,
            options,
        }
    }

    pub fn controller(&self) -> &DocumentController {
        &self.controller
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub async fn handle(
        &self,
        actor: Option<&Actor>,
        request: ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        let resource = ResourceType::from_segment(&request.resource_segment)
            .ok_or_else(|| ApiError::not_found(request.resource_segment.clone(), false))?;
        let descriptor = EndpointDescriptor::for_resource(resource);
        descriptor.admit(request.verb, self.options.allow_config_modification)?;

        let name = request.name.as_deref().filter(|n| !n.is_empty());
        descriptor.check_name(request.verb, name)?;

        let actor = self.authorize(actor)?;
        tracing::debug!(
            principal = %actor.principal,
            verb = %request.verb,
            resource = %resource,
            name = name.unwrap_or(""),
            "handling request"
        );

        let has_body = !request.body.iter().all(u8::is_ascii_whitespace);
        match request.verb {
            Verb::Get | Verb::Delete if has_body => return Err(ApiError::PayloadNotAllowed),
            Verb::Put | Verb::Patch if !has_body => return Err(ApiError::PayloadMandatory),
            _ => {}
        }

        match (request.verb, name) {
            (Verb::Get, _) => self.get(actor, resource, name).await,
            (Verb::Put, Some(name)) => {
                self.put(actor, resource, name, &request.body, request.if_match)
                    .await
            }
            (Verb::Patch, _) => {
                self.patch(actor, descriptor, name, &request.body, request.if_match)
                    .await
            }
            (Verb::Delete, Some(name)) => {
                self.delete(actor, resource, name, request.if_match).await
            }
            (verb, _) => Err(ApiError::MethodNotSupported(verb)),
        }
    }

    fn authorize<'a>(&self, actor: Option<&'a Actor>) -> Result<&'a Actor, ApiError> {
        let actor = actor.ok_or(ApiError::Unauthorized)?;
        if actor.is_super_admin || actor.has_any_privilege(&self.options.admin_roles) {
            Ok(actor)
        } else {
            tracing::warn!(principal = %actor.principal, "caller lacks API privileges");
            Err(ApiError::Forbidden(actor.principal.clone()))
        }
    }

    async fn get(
        &self,
        actor: &Actor,
        resource: ResourceType,
        name: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let current = self.controller.read(resource).await?;

        let mut body = Map::new();
        match name {
            Some(name) => {
                let flag = self.policy.classify(resource, name);
                enforce(actor, name, flag, Operation::Read, false)?;
                let entry = current
                    .document
                    .get(name)
                    .ok_or_else(|| ApiError::not_found(name, false))?;
                body.insert(name.to_string(), render(resource, entry, flag));
            }
            None => {
                for (name, entry) in &current.document.entries {
                    let flag = self.policy.classify(resource, name);
                    if is_authorized(actor, flag, Operation::Read) {
                        body.insert(name.clone(), render(resource, entry, flag));
                    }
                }
            }
        }

        Ok(ApiResponse {
            status: StatusCode::OK,
            body: Value::Object(body),
            version: Some(current.version),
        })
    }

    async fn put(
        &self,
        actor: &Actor,
        resource: ResourceType,
        name: &str,
        body: &[u8],
        if_match: Option<Version>,
    ) -> Result<ApiResponse, ApiError> {
        let current = self.controller.read(resource).await?;
        check_if_match(if_match, current.version)?;

        let flag = self.policy.classify(resource, name);
        enforce(actor, name, flag, Operation::Write, false)?;

        let validated = self.validator.validate(resource, name, body)?;
        let existing = current.document.get(name);
        let created = existing.is_none();
        let existing_hash = existing
            .and_then(|entry| entry.get(HASH_FIELD))
            .and_then(Value::as_str)
            .map(str::to_string);
        let entry = validated.into_stored(existing_hash.as_deref())?;

        let mut document = current.document;
        document.insert(name, entry);
        let version = self
            .controller
            .commit(resource, current.version, document)
            .await?;

        if created {
            Ok(success(StatusCode::CREATED, format!("'{name}' created."), version))
        } else {
            Ok(success(StatusCode::OK, format!("'{name}' updated."), version))
        }
    }

    async fn patch(
        &self,
        actor: &Actor,
        descriptor: &EndpointDescriptor,
        name: Option<&str>,
        body: &[u8],
        if_match: Option<Version>,
    ) -> Result<ApiResponse, ApiError> {
        let resource = descriptor.resource;
        let current = self.controller.read(resource).await?;
        check_if_match(if_match, current.version)?;

        let operations = parse_operations(body)?;
        let fixed_name = match descriptor.addressing {
            Addressing::SingleDocument { fixed_name } => Some(fixed_name),
            Addressing::Collection => None,
        };
        let ctx = PatchContext {
            resource,
            actor,
            policy: &self.policy,
            validator: &self.validator,
            fixed_name,
        };
        let patched = match name {
            Some(name) => ctx.apply_to_entry(&current.document, name, &operations)?,
            None => ctx.apply_to_collection(&current.document, &operations)?,
        };

        let version = self
            .controller
            .commit(resource, current.version, patched)
            .await?;
        Ok(success(StatusCode::OK, "Resource updated.".to_string(), version))
    }

    async fn delete(
        &self,
        actor: &Actor,
        resource: ResourceType,
        name: &str,
        if_match: Option<Version>,
    ) -> Result<ApiResponse, ApiError> {
        let current = self.controller.read(resource).await?;
        check_if_match(if_match, current.version)?;

        let flag = self.policy.classify(resource, name);
        enforce(actor, name, flag, Operation::Write, false)?;

        let mut document = current.document;
        document
            .remove(name)
            .ok_or_else(|| ApiError::not_found(name, false))?;
        let version = self
            .controller
            .commit(resource, current.version, document)
            .await?;
        Ok(success(StatusCode::OK, format!("'{name}' deleted."), version))
    }
}

fn check_if_match(if_match: Option<Version>, current: Version) -> Result<(), ApiError> {
    match if_match {
        Some(expected) if expected != current => {
            tracing::warn!(expected, actual = current, "If-Match precondition failed");
            Err(ApiError::VersionConflict {
                expected,
                actual: current,
            })
        }
        _ => Ok(()),
    }
}

/// Outgoing form of an entry: credentials blanked, protection flags attached.
fn render(resource: ResourceType, entry: &Entry, flag: ProtectionFlag) -> Value {
    let mut out = entry.clone();
    if resource.has_credentials() {
        redact(&mut out);
    }
    out.insert(
        "reserved".to_string(),
        Value::Bool(flag == ProtectionFlag::ReadOnly),
    );
    out.insert("hidden".to_string(), Value::Bool(flag == ProtectionFlag::Hidden));
    Value::Object(out)
}

fn success(status: StatusCode, message: String, version: Version) -> ApiResponse {
    ApiResponse {
        status,
        body: json!({ "status": status_label(status), "message": message }),
        version: Some(version),
    }
}
