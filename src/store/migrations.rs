//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "campaign_control_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'active',
                sent INTEGER NOT NULL DEFAULT 0,
                delivered INTEGER NOT NULL DEFAULT 0,
                opened INTEGER NOT NULL DEFAULT 0,
                clicked INTEGER NOT NULL DEFAULT 0,
                bounced INTEGER NOT NULL DEFAULT 0,
                complained INTEGER NOT NULL DEFAULT 0,
                unsubscribed INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS campaign_ai_settings (
                campaign_id TEXT PRIMARY KEY,
                smart_sending_enabled INTEGER NOT NULL DEFAULT 1,
                throttle_optimization_enabled INTEGER NOT NULL DEFAULT 1,
                send_time_optimization_enabled INTEGER NOT NULL DEFAULT 1,
                ab_auto_winner_enabled INTEGER NOT NULL DEFAULT 0,
                target_metric TEXT NOT NULL DEFAULT 'open_rate',
                min_throttle_rate INTEGER NOT NULL,
                max_throttle_rate INTEGER NOT NULL,
                current_throttle_rate INTEGER NOT NULL,
                learning_period_days INTEGER NOT NULL,
                ab_confidence_threshold REAL NOT NULL,
                ab_min_sample_size INTEGER NOT NULL,
                complaint_rate_threshold REAL NOT NULL,
                bounce_rate_threshold REAL NOT NULL,
                pause_on_high_complaints INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metrics_snapshots (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                interval_start TEXT NOT NULL,
                interval_end TEXT NOT NULL,
                sent INTEGER NOT NULL DEFAULT 0,
                delivered INTEGER NOT NULL DEFAULT 0,
                opened INTEGER NOT NULL DEFAULT 0,
                clicked INTEGER NOT NULL DEFAULT 0,
                bounced INTEGER NOT NULL DEFAULT 0,
                complained INTEGER NOT NULL DEFAULT 0,
                unsubscribed INTEGER NOT NULL DEFAULT 0,
                total_sent INTEGER NOT NULL DEFAULT 0,
                total_delivered INTEGER NOT NULL DEFAULT 0,
                total_opened INTEGER NOT NULL DEFAULT 0,
                total_clicked INTEGER NOT NULL DEFAULT 0,
                total_bounced INTEGER NOT NULL DEFAULT 0,
                total_complained INTEGER NOT NULL DEFAULT 0,
                total_unsubscribed INTEGER NOT NULL DEFAULT 0,
                delivery_rate REAL NOT NULL DEFAULT 0,
                open_rate REAL NOT NULL DEFAULT 0,
                click_rate REAL NOT NULL DEFAULT 0,
                bounce_rate REAL NOT NULL DEFAULT 0,
                complaint_rate REAL NOT NULL DEFAULT 0,
                throttle_rate INTEGER NOT NULL DEFAULT 0,
                throttle_utilization REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_campaign_end
                ON metrics_snapshots(campaign_id, interval_end DESC);

            CREATE TABLE IF NOT EXISTS ai_decisions (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                decision_type TEXT NOT NULL,
                reason TEXT NOT NULL,
                old_value INTEGER NOT NULL,
                new_value INTEGER NOT NULL,
                metrics TEXT NOT NULL DEFAULT '{}',
                confidence REAL NOT NULL,
                applied INTEGER NOT NULL DEFAULT 0,
                applied_at TEXT,
                reverted INTEGER NOT NULL DEFAULT 0,
                reverted_at TEXT,
                reverted_by TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_campaign
                ON ai_decisions(campaign_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS campaign_alerts (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                threshold_value REAL NOT NULL DEFAULT 0,
                actual_value REAL NOT NULL DEFAULT 0,
                acknowledged INTEGER NOT NULL DEFAULT 0,
                acknowledged_by TEXT,
                acknowledged_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_campaign
                ON campaign_alerts(campaign_id, created_at DESC);
        "#,
    },
    Migration {
        version: 2,
        name: "send_time_profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS inbox_profiles (
                address_hash TEXT PRIMARY KEY,
                email_domain TEXT NOT NULL,
                optimal_hour INTEGER,
                optimal_hour_confidence REAL NOT NULL DEFAULT 0,
                avg_open_delay_minutes REAL NOT NULL DEFAULT 0,
                avg_click_delay_minutes REAL NOT NULL DEFAULT 0,
                engagement_score REAL NOT NULL DEFAULT 0.5,
                engagement_prev REAL NOT NULL DEFAULT 0.5,
                total_sent INTEGER NOT NULL DEFAULT 0,
                total_opens INTEGER NOT NULL DEFAULT 0,
                total_clicks INTEGER NOT NULL DEFAULT 0,
                total_bounces INTEGER NOT NULL DEFAULT 0,
                total_complaints INTEGER NOT NULL DEFAULT 0,
                last_sent_at TEXT,
                last_event_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_domain
                ON inbox_profiles(email_domain);

            CREATE TABLE IF NOT EXISTS profile_hourly_opens (
                address_hash TEXT NOT NULL,
                hour INTEGER NOT NULL,
                opens INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (address_hash, hour)
            );

            CREATE TABLE IF NOT EXISTS profile_daily_opens (
                address_hash TEXT NOT NULL,
                weekday INTEGER NOT NULL,
                opens INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (address_hash, weekday)
            );

            CREATE TABLE IF NOT EXISTS domain_send_times (
                domain TEXT PRIMARY KEY,
                optimal_hours TEXT NOT NULL DEFAULT '[]',
                sample_size INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in [
            "_migrations",
            "campaigns",
            "campaign_ai_settings",
            "metrics_snapshots",
            "ai_decisions",
            "campaign_alerts",
            "inbox_profiles",
            "profile_hourly_opens",
            "profile_daily_opens",
            "domain_send_times",
        ] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "table {table} missing");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn version_tracking_records_each_step() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();

        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 2);
    }
}
