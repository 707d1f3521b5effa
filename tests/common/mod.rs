use std::sync::Arc;

use tradelog_core::db::{self, DbPool};

/// Creates a pooled connection to a fresh temporary database with all
/// migrations applied. The TempDir must stay alive for the test's duration.
pub fn setup_pool() -> (tempfile::TempDir, Arc<DbPool>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("journal.db");
    let pool = db::create_pool(db_path.to_str().expect("utf8 path")).expect("create pool");
    db::run_migrations(&pool).expect("run migrations");
    (dir, pool)
}
