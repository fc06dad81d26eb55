use std::sync::Arc;

use serde_json::{json, Value};
use warden::bootstrap::build_documents;
use warden::restapi::engine::{ApiRequest, ApiResponse, EngineOptions, ResourceEngine};
use warden::restapi::errors::ApiError;
use warden::restapi::protection::{ProtectionPolicy, ProtectionRules};
use warden::restapi::types::{Actor, ConfigDocument, ResourceType, VersionedDocument};
use warden::restapi::validation::{PasswordPolicy, Validator};
use warden::storage::{ConfigRepository, MemoryRepository};

pub const STRONG_PASSWORD_REGEX: &str =
    r"(?=.*[A-Z])(?=.*[^a-zA-Z\d])(?=.*[0-9])(?=.*[a-z]).{8,}";
pub const PASSWORD_MESSAGE: &str = "Password does not meet the requirements";

pub const KIRK_HASH: &str = "$2a$12$n5nubfWATfQjSYHiWtUyeOxMIxFInUHOAx8VMmGmxFNPGpaBmeB.m";

pub fn superadmin() -> Actor {
    Actor::super_admin("admin")
}

pub fn manager() -> Actor {
    Actor::with_privileges("kirk", &["security_manager"])
}

pub fn outsider() -> Actor {
    Actor::with_privileges("ensign", &["readall"])
}

pub fn seed() -> Value {
    json!({
        "internalusers": {
            "admin": {"hash": "$2a$12$admin", "roles": ["all_access"]},
            "kirk": {"hash": KIRK_HASH, "roles": ["captains"], "description": "captain"},
            "spock": {"hash": "$2a$12$spock", "roles": ["science"]},
            "sarek": {"hash": "$2a$12$sarek", "roles": ["vulcan"]},
            "q": {"hash": "$2a$12$q", "roles": []}
        },
        "roles": {
            "starfleet": {"cluster": ["CLUSTER_MONITOR"], "indices": {"sf": {"ships": ["READ"]}}},
            "vulcan": {"cluster": ["*"]},
            ".internal": {"cluster": ["*"]}
        },
        "rolesmapping": {
            "starfleet": {"users": ["kirk", "spock"], "backendroles": ["captains"]}
        },
        "actiongroups": {
            "CRUD": {"permissions": ["READ", "WRITE"]}
        },
        "tenants": {
            "enterprise": {"description": "NCC-1701"}
        },
        "securityconfig": {
            "config": {"dynamic": {"authc": {"basic": {"order": 0}}}}
        }
    })
}

pub fn protection() -> ProtectionPolicy {
    ProtectionPolicy::default()
        .with_rules(
            ResourceType::InternalUsers,
            ProtectionRules {
                reserved: vec!["sarek".into()],
                hidden: vec!["q".into()],
                ..Default::default()
            },
        )
        .with_rules(
            ResourceType::Roles,
            ProtectionRules {
                reserved: vec!["vulcan".into()],
                hidden_prefixes: vec![".".into()],
                ..Default::default()
            },
        )
}

pub fn default_options() -> EngineOptions {
    EngineOptions {
        allow_config_modification: false,
        admin_roles: vec!["security_manager".to_string()],
    }
}

/// Engine over an in-memory repository seeded with [`seed`].
pub struct Harness {
    pub engine: ResourceEngine,
    pub repository: Arc<MemoryRepository>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(default_options()).await
    }

    pub async fn with_options(options: EngineOptions) -> Self {
        let harness = Self::uninitialized(options);
        let documents = build_documents(seed(), &Validator::new(PasswordPolicy::permissive()))
            .expect("valid seed");
        harness
            .repository
            .initialize(documents)
            .await
            .expect("Failed to initialize repository");
        harness
    }

    pub fn uninitialized(options: EngineOptions) -> Self {
        let repository = Arc::new(MemoryRepository::new());
        let shared: Arc<dyn ConfigRepository> = repository.clone();
        let validator = Validator::new(
            PasswordPolicy::new(Some(STRONG_PASSWORD_REGEX), Some(PASSWORD_MESSAGE))
                .expect("valid pattern"),
        );
        let engine = ResourceEngine::new(shared, protection(), validator, options);
        Self { engine, repository }
    }

    pub async fn call(&self, actor: &Actor, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.engine.handle(Some(actor), request).await
    }

    pub async fn anonymous(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.engine.handle(None, request).await
    }

    /// Raw stored state, bypassing redaction and protection.
    pub async fn stored(&self, resource: ResourceType) -> VersionedDocument {
        self.repository
            .load(resource)
            .await
            .expect("Failed to load document")
    }

    pub async fn stored_document(&self, resource: ResourceType) -> ConfigDocument {
        self.stored(resource).await.document
    }
}
