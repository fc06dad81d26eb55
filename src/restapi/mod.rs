pub mod concurrency;
pub mod descriptor;
pub mod engine;
pub mod errors;
pub mod hashing;
pub mod patch;
pub mod protection;
pub mod types;
pub mod validation;
pub mod web;

use crate::identity::TokenDirectory;
use engine::ResourceEngine;

/// Shared state of the REST surface. Holds no configuration documents;
/// those are read from the repository on every request.
pub struct ApiState {
    pub engine: ResourceEngine,
    pub identity: TokenDirectory,
}
