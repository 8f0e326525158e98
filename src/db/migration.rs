//! Schema migrations.
//!
//! Rather than pull in `sea-orm-migration` — a whole additional crate with
//! its own `SchemaManager`/`MigratorTrait` machinery — for a schema this
//! small, each table is a `Migration` struct carrying its own idempotent
//! `CREATE TABLE IF NOT EXISTS` statement, applied in dependency order
//! through the same `DatabaseConnection` via `execute_unprepared`. Noted
//! as a deliberate scoping decision in DESIGN.md.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "m001_repositories",
        sql: "CREATE TABLE IF NOT EXISTS repositories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            main_branch TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
    Migration {
        name: "m002_blobs",
        sql: "CREATE TABLE IF NOT EXISTS blobs (
            repository_id TEXT NOT NULL,
            hash TEXT NOT NULL,
            size INTEGER NOT NULL,
            storage_key TEXT NOT NULL,
            PRIMARY KEY (repository_id, hash)
        )",
    },
    Migration {
        name: "m003_trees",
        sql: "CREATE TABLE IF NOT EXISTS trees (
            repository_id TEXT NOT NULL,
            hash TEXT NOT NULL,
            PRIMARY KEY (repository_id, hash)
        )",
    },
    Migration {
        name: "m004_tree_entries",
        sql: "CREATE TABLE IF NOT EXISTS tree_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository_id TEXT NOT NULL,
            tree_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            target_hash TEXT NOT NULL,
            mode TEXT NOT NULL,
            UNIQUE (repository_id, tree_hash, name)
        )",
    },
    Migration {
        name: "m005_commits",
        sql: "CREATE TABLE IF NOT EXISTS commits (
            repository_id TEXT NOT NULL,
            hash TEXT NOT NULL,
            tree_hash TEXT NOT NULL,
            parent_hash TEXT,
            author TEXT NOT NULL,
            author_email TEXT NOT NULL,
            message TEXT NOT NULL,
            committed_at TEXT NOT NULL,
            PRIMARY KEY (repository_id, hash)
        )",
    },
    Migration {
        name: "m006_refs",
        sql: "CREATE TABLE IF NOT EXISTS refs (
            repository_id TEXT NOT NULL,
            name TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            PRIMARY KEY (repository_id, name)
        )",
    },
    Migration {
        name: "m007_stages",
        sql: "CREATE TABLE IF NOT EXISTS stages (
            id TEXT PRIMARY KEY,
            repository_id TEXT NOT NULL,
            branch TEXT NOT NULL,
            base_commit_hash TEXT,
            created_at TEXT NOT NULL
        )",
    },
    Migration {
        name: "m008_staging_files",
        sql: "CREATE TABLE IF NOT EXISTS staging_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stage_id TEXT NOT NULL,
            path TEXT NOT NULL,
            blob_hash TEXT NOT NULL,
            deleted BOOLEAN NOT NULL DEFAULT 0,
            UNIQUE (stage_id, path)
        )",
    },
    Migration {
        name: "m009_stage_runs",
        sql: "CREATE TABLE IF NOT EXISTS stage_runs (
            id TEXT PRIMARY KEY,
            parent_id TEXT,
            repo_name TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            workflow_file TEXT NOT NULL,
            stage_name TEXT NOT NULL,
            arguments TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            result_value TEXT,
            error_message TEXT,
            triggered_by TEXT,
            trigger_event TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    },
    Migration {
        name: "m010_stage_runs_status_idx",
        sql: "CREATE INDEX IF NOT EXISTS idx_stage_runs_status_created
              ON stage_runs (status, created_at)",
    },
    Migration {
        name: "m011_stage_runs_parent_idx",
        sql: "CREATE INDEX IF NOT EXISTS idx_stage_runs_parent ON stage_runs (parent_id)",
    },
    Migration {
        name: "m012_stage_runs_trigger_idx",
        sql: "CREATE INDEX IF NOT EXISTS idx_stage_runs_trigger_event ON stage_runs (trigger_event)",
    },
    Migration {
        name: "m013_stage_log_lines",
        sql: "CREATE TABLE IF NOT EXISTS stage_log_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stage_run_id TEXT NOT NULL,
            log_line_index INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            log_contents TEXT NOT NULL,
            UNIQUE (stage_run_id, log_line_index)
        )",
    },
    Migration {
        name: "m014_stage_files",
        sql: "CREATE TABLE IF NOT EXISTS stage_files (
            id TEXT PRIMARY KEY,
            stage_run_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            storage_key TEXT NOT NULL,
            size INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (stage_run_id, file_path)
        )",
    },
    Migration {
        name: "m015_pull_requests",
        sql: "CREATE TABLE IF NOT EXISTS pull_requests (
            id TEXT PRIMARY KEY,
            repository_id TEXT NOT NULL,
            number INTEGER NOT NULL,
            base_branch TEXT NOT NULL,
            head_branch TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            author TEXT NOT NULL,
            status TEXT NOT NULL,
            merge_commit_hash TEXT,
            merged_at TEXT,
            merged_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (repository_id, number)
        )",
    },
    Migration {
        name: "m016_pull_request_comments",
        sql: "CREATE TABLE IF NOT EXISTS pull_request_comments (
            id TEXT PRIMARY KEY,
            pull_request_id TEXT NOT NULL,
            author TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
];

/// Apply every migration, in order, idempotently.
pub async fn run(db: &DatabaseConnection) -> Result<(), DbErr> {
    for migration in MIGRATIONS {
        tracing::debug!(migration = migration.name, "applying migration");
        db.execute_unprepared(migration.sql).await?;
    }
    add_stage_runs_required_column(db).await?;
    Ok(())
}

/// `ALTER TABLE ... ADD COLUMN` has no `IF NOT EXISTS` in SQLite, unlike the
/// `CREATE TABLE`/`CREATE INDEX` statements above, so this column addition
/// checks `PRAGMA table_info` first rather than living in `MIGRATIONS`.
async fn add_stage_runs_required_column(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm::{FromQueryResult, Statement};

    #[derive(FromQueryResult)]
    struct ColumnInfo {
        name: String,
    }

    let columns = ColumnInfo::find_by_statement(Statement::from_string(db.get_database_backend(), "PRAGMA table_info(stage_runs)".to_string()))
        .all(db)
        .await?;
    if columns.iter().any(|c| c.name == "required") {
        return Ok(());
    }
    tracing::debug!(migration = "m017_stage_runs_required", "applying migration");
    db.execute_unprepared("ALTER TABLE stage_runs ADD COLUMN required BOOLEAN NOT NULL DEFAULT 1").await?;
    Ok(())
}
