//! Warden - management plane for security configuration
//!
//! Administrators read, create, patch and delete the documents that define
//! authorization (internal users, roles, role mappings, action groups,
//! tenants and the global security config) through a REST API.
//! It exposes all modules for testing purposes.

pub mod bootstrap;
pub mod entities;
pub mod errors;
pub mod identity;
pub mod restapi;
pub mod settings;
pub mod storage;
pub mod web;
