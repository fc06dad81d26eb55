pub mod db;
pub mod fixtures;

pub use db::TestDb;
pub use fixtures::{manager, outsider, superadmin, Harness};
