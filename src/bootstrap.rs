use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::errors::WardenError;
use crate::restapi::descriptor::EndpointDescriptor;
use crate::restapi::types::{ConfigDocument, ResourceType, Verb};
use crate::restapi::validation::Validator;
use crate::storage::ConfigRepository;

/// Initialize an empty store from the seed file, if one is configured.
///
/// Returns `true` if the store was initialized by this call. An already
/// initialized store is never touched, whatever the seed contains.
pub async fn initialize_store(
    repository: &dyn ConfigRepository,
    seed_file: Option<&Path>,
    validator: &Validator,
) -> Result<bool, WardenError> {
    if repository.is_initialized().await? {
        tracing::info!(backend = repository.backend_name(), "configuration store already initialized");
        return Ok(false);
    }

    let Some(path) = seed_file else {
        tracing::warn!(
            backend = repository.backend_name(),
            "configuration store not initialized and no seed file configured"
        );
        return Ok(false);
    };

    let documents = load_seed_file(path, validator)?;
    let entries: usize = documents.values().map(ConfigDocument::len).sum();
    let created = repository.initialize(documents).await?;
    if created {
        tracing::info!(path = %path.display(), entries, "configuration store initialized from seed");
    }
    Ok(created)
}

pub fn load_seed_file(
    path: &Path,
    validator: &Validator,
) -> Result<BTreeMap<ResourceType, ConfigDocument>, WardenError> {
    tracing::info!("Loading seed from {}", path.display());
    let content = fs::read_to_string(path)?;
    let seed: Value = serde_json::from_str(&content)?;
    build_documents(seed, validator)
}

/// Turn a seed (`{"internalusers": {"name": {...}}, ...}`) into documents.
///
/// Every entry passes through the same validation and hashing as a PUT, so
/// plaintext seed passwords are stored hashed.
pub fn build_documents(
    seed: Value,
    validator: &Validator,
) -> Result<BTreeMap<ResourceType, ConfigDocument>, WardenError> {
    let Value::Object(sections) = seed else {
        return Err(WardenError::Other(
            "seed must be a JSON object keyed by resource type".to_string(),
        ));
    };

    let mut documents = BTreeMap::new();
    for (segment, section) in sections {
        let resource = ResourceType::from_segment(&segment)
            .ok_or_else(|| WardenError::Other(format!("unknown resource type '{segment}' in seed")))?;
        let Value::Object(entries) = section else {
            return Err(WardenError::Other(format!(
                "seed section '{segment}' must be a JSON object"
            )));
        };

        let descriptor = EndpointDescriptor::for_resource(resource);
        let mut document = ConfigDocument::new();
        for (name, raw) in entries {
            let seed_error = |source| WardenError::Seed {
                resource: segment.clone(),
                name: name.clone(),
                source,
            };
            descriptor
                .check_name(Verb::Put, Some(&name))
                .map_err(seed_error)?;
            let entry = validator
                .validate_value(resource, &name, raw)
                .and_then(|validated| validated.into_stored(None))
                .map_err(seed_error)?;
            document.insert(name.clone(), entry);
        }
        documents.insert(resource, document);
    }

    Ok(documents)
}
