use tempfile::NamedTempFile;
use warden::storage::SqlRepository;

/// SQLite-backed repository with automatic cleanup
pub struct TestDb {
    repository: SqlRepository,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        let repository = SqlRepository::connect(&db_url)
            .await
            .expect("Failed to open test database");

        Self {
            repository,
            _temp_file: temp_file,
        }
    }

    pub fn repository(&self) -> SqlRepository {
        self.repository.clone()
    }
}
