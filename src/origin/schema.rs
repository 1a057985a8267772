use rusqlite::Connection;
use tracing::debug;

/// Current schema version.  Increment when adding new migrations.
const SCHEMA_VERSION: u32 = 1;

/// Apply all pending migrations to `conn`.
///
/// Tables are created with `IF NOT EXISTS` and the `meta` table records the
/// applied version so only new migrations run.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current_version = get_schema_version(conn);

    if current_version >= SCHEMA_VERSION {
        debug!(version = current_version, "origin schema up to date");
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "origin schema migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1: initial tables
// ---------------------------------------------------------------------------

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    // ------------------------------------------------------------------
    // widget_config: the single configuration record.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS widget_config (
            id               TEXT    PRIMARY KEY,
            enabled          INTEGER NOT NULL,
            phone_number     TEXT    NOT NULL DEFAULT '',
            position         TEXT    NOT NULL,
            button_color     TEXT    NOT NULL,
            button_size      INTEGER NOT NULL,
            show_tooltip     INTEGER NOT NULL,
            tooltip_text     TEXT    NOT NULL DEFAULT '',
            pulse_animation  INTEGER NOT NULL,
            show_delay_ms    INTEGER NOT NULL,
            show_on_mobile   INTEGER NOT NULL,
            show_on_desktop  INTEGER NOT NULL,
            hidden_routes    TEXT    NOT NULL DEFAULT '[]',
            default_message  TEXT    NOT NULL DEFAULT '',
            updated_at       TEXT    NOT NULL
        );",
    )?;

    // ------------------------------------------------------------------
    // widget_agents: contacts offered in multi-agent mode.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS widget_agents (
            id                TEXT    NOT NULL,
            config_id         TEXT    NOT NULL REFERENCES widget_config(id) ON DELETE CASCADE,
            display_name      TEXT    NOT NULL,
            title             TEXT,
            phone_number      TEXT    NOT NULL,
            avatar_url        TEXT,
            is_always_online  INTEGER NOT NULL DEFAULT 0,
            is_active         INTEGER NOT NULL DEFAULT 1,
            sort_order        INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (config_id, id)
        );",
    )?;

    // ------------------------------------------------------------------
    // widget_clicks: engagement events, append only.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS widget_clicks (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            config_id     TEXT    NOT NULL,
            agent_id      TEXT,
            page_url      TEXT    NOT NULL DEFAULT '',
            referrer      TEXT    NOT NULL DEFAULT '',
            device_class  TEXT    NOT NULL DEFAULT '',
            session_id    TEXT    NOT NULL DEFAULT '',
            user_agent    TEXT,
            received_at   TEXT    NOT NULL
        );",
    )?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_clicks_received_at ON widget_clicks(received_at);",
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<u32>().unwrap_or(0))
        },
    )
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}
