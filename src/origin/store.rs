//! Persistence behind the origin endpoints: the configuration record with its
//! agent list, and the append-only click log.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::schema;
use crate::widget::defaults::default_payload;
use crate::widget::{AgentPayload, ConfigPayload};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("store task failed: {0}")]
    Task(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Invalid(e.to_string())
    }
}

// ============================================================================
// Seams
// ============================================================================

/// Read side of `GET /whatsapp/config`.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The current record with its resolved agent list, if provisioned.
    async fn current(&self) -> Result<Option<ConfigPayload>, StoreError>;
}

/// Write side of `POST /whatsapp/track`.
#[async_trait]
pub trait TrackingSink: Send + Sync {
    async fn record(&self, click: ClickRecord) -> Result<(), StoreError>;
}

// ============================================================================
// Records
// ============================================================================

/// One stored agent. Inactive agents stay in the table but are never served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    #[serde(flatten)]
    pub agent: AgentPayload,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_true() -> bool {
    true
}

/// The full administrative record: configuration fields plus every agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub config: ConfigPayload,
    pub agents: Vec<AgentRecord>,
}

impl ConfigRecord {
    /// Parse an import document: payload fields at the top level, `agents`
    /// entries optionally carrying `isActive` and `sortOrder`.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        let agents = value
            .as_object_mut()
            .and_then(|obj| obj.remove("agents"))
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let agents: Vec<AgentRecord> = serde_json::from_value(agents)?;
        let config: ConfigPayload = serde_json::from_value(value)?;
        if config.id.trim().is_empty() {
            return Err(StoreError::Invalid("config id must not be empty".into()));
        }
        Ok(Self { config, agents })
    }

    /// Wrap a payload; agents keep their listed order.
    pub fn from_payload(mut config: ConfigPayload) -> Self {
        let agents = std::mem::take(&mut config.agents)
            .into_iter()
            .enumerate()
            .map(|(i, agent)| AgentRecord {
                agent,
                is_active: true,
                sort_order: i as i64,
            })
            .collect();
        Self { config, agents }
    }
}

/// A click as persisted, stamped on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub config_id: String,
    pub agent_id: Option<String>,
    pub page_url: String,
    pub referrer: String,
    pub device_class: String,
    pub session_id: String,
    pub user_agent: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickStats {
    pub total: u64,
    /// `None` key is the single-contact button.
    pub by_agent: Vec<(Option<String>, u64)>,
    pub by_device: Vec<(String, u64)>,
}

// ============================================================================
// SQLite
// ============================================================================

/// SQLite-backed store shared by both endpoints.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(4).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        schema::run_migrations(&conn)?;

        info!(path = %path.display(), "origin store opened");
        Ok(Self { pool })
    }

    /// Run `f` on a pooled connection off the async executor.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Replace the configuration record and its agents atomically.
    pub async fn replace(&self, record: ConfigRecord) -> Result<(), StoreError> {
        self.blocking(move |conn| replace_record(conn, &record)).await
    }

    /// Import a JSON document from disk, replacing the current record.
    pub async fn import(&self, path: &Path) -> Result<ConfigRecord, StoreError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let record = ConfigRecord::from_json(&raw)?;
        self.replace(record.clone()).await?;
        Ok(record)
    }

    /// Provision the compiled-in default when no record exists. Returns
    /// whether anything was written.
    pub async fn seed_default(&self) -> Result<bool, StoreError> {
        self.blocking(|conn| {
            if load_current(conn)?.is_some() {
                return Ok(false);
            }
            replace_record(conn, &ConfigRecord::from_payload(default_payload()))?;
            Ok(true)
        })
        .await
    }

    /// Click counts received since `since`.
    pub async fn click_stats(&self, since: DateTime<Utc>) -> Result<ClickStats, StoreError> {
        self.blocking(move |conn| load_stats(conn, since)).await
    }

    /// Click counts over the trailing `days`.
    pub async fn recent_stats(&self, days: u32) -> Result<ClickStats, StoreError> {
        self.click_stats(Utc::now() - ChronoDuration::days(i64::from(days)))
            .await
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn current(&self) -> Result<Option<ConfigPayload>, StoreError> {
        self.blocking(|conn| load_current(conn)).await
    }
}

#[async_trait]
impl TrackingSink for SqliteStore {
    async fn record(&self, click: ClickRecord) -> Result<(), StoreError> {
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO widget_clicks
                    (config_id, agent_id, page_url, referrer, device_class, session_id, user_agent, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    click.config_id,
                    click.agent_id,
                    click.page_url,
                    click.referrer,
                    click.device_class,
                    click.session_id,
                    click.user_agent,
                    timestamp(click.received_at),
                ],
            )?;
            debug!(config_id = %click.config_id, "click recorded");
            Ok(())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Fixed-width UTC timestamps so text comparison orders correctly.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn replace_record(conn: &mut Connection, record: &ConfigRecord) -> Result<(), StoreError> {
    let c = &record.config;
    let hidden_routes = serde_json::to_string(&c.hidden_routes)?;
    let show_delay_ms = i64::try_from(c.show_delay_ms).map_err(|_| {
        StoreError::Invalid(format!("showDelayMs {} is out of range", c.show_delay_ms))
    })?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM widget_agents", [])?;
    tx.execute("DELETE FROM widget_config", [])?;
    tx.execute(
        "INSERT INTO widget_config
            (id, enabled, phone_number, position, button_color, button_size, show_tooltip,
             tooltip_text, pulse_animation, show_delay_ms, show_on_mobile, show_on_desktop,
             hidden_routes, default_message, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            c.id,
            c.enabled,
            c.phone_number,
            c.position.to_string(),
            c.button_color,
            i64::from(c.button_size),
            c.show_tooltip,
            c.tooltip_text,
            c.pulse_animation,
            show_delay_ms,
            c.show_on_mobile,
            c.show_on_desktop,
            hidden_routes,
            c.default_message,
            timestamp(Utc::now()),
        ],
    )?;

    for a in &record.agents {
        tx.execute(
            "INSERT INTO widget_agents
                (id, config_id, display_name, title, phone_number, avatar_url,
                 is_always_online, is_active, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                a.agent.id,
                c.id,
                a.agent.display_name,
                a.agent.title,
                a.agent.phone_number,
                a.agent.avatar_url,
                a.agent.is_always_online,
                a.is_active,
                a.sort_order,
            ],
        )?;
    }
    tx.commit()?;

    info!(config_id = %c.id, agents = record.agents.len(), "widget config replaced");
    Ok(())
}

fn load_current(conn: &mut Connection) -> Result<Option<ConfigPayload>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, enabled, phone_number, position, button_color, button_size, show_tooltip,
                    tooltip_text, pulse_animation, show_delay_ms, show_on_mobile, show_on_desktop,
                    hidden_routes, default_message
             FROM widget_config ORDER BY updated_at DESC LIMIT 1",
            [],
            |row| {
                let position: String = row.get(3)?;
                let button_size: i64 = row.get(5)?;
                let show_delay_ms: i64 = row.get(9)?;
                let hidden_routes: String = row.get(12)?;
                Ok((
                    ConfigPayload {
                        id: row.get(0)?,
                        enabled: row.get(1)?,
                        phone_number: row.get(2)?,
                        position: position.parse().unwrap_or_default(),
                        button_color: row.get(4)?,
                        button_size: u32::try_from(button_size).unwrap_or_default(),
                        show_tooltip: row.get(6)?,
                        tooltip_text: row.get(7)?,
                        pulse_animation: row.get(8)?,
                        show_delay_ms: u64::try_from(show_delay_ms).unwrap_or_default(),
                        show_on_mobile: row.get(10)?,
                        show_on_desktop: row.get(11)?,
                        hidden_routes: Vec::new(),
                        default_message: row.get(13)?,
                        agents: Vec::new(),
                    },
                    hidden_routes,
                ))
            },
        )
        .optional()?;

    let Some((mut payload, hidden_routes)) = row else {
        return Ok(None);
    };
    payload.hidden_routes = serde_json::from_str(&hidden_routes)?;

    let mut stmt = conn.prepare(
        "SELECT id, display_name, title, phone_number, avatar_url, is_always_online
         FROM widget_agents
         WHERE config_id = ?1 AND is_active = 1
         ORDER BY sort_order, display_name",
    )?;
    payload.agents = stmt
        .query_map([&payload.id], |row| {
            Ok(AgentPayload {
                id: row.get(0)?,
                display_name: row.get(1)?,
                title: row.get(2)?,
                phone_number: row.get(3)?,
                avatar_url: row.get(4)?,
                is_always_online: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(payload))
}

fn load_stats(conn: &mut Connection, since: DateTime<Utc>) -> Result<ClickStats, StoreError> {
    let since = timestamp(since);

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM widget_clicks WHERE received_at >= ?1",
        [&since],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT agent_id, COUNT(*) AS n FROM widget_clicks
         WHERE received_at >= ?1 GROUP BY agent_id ORDER BY n DESC, agent_id",
    )?;
    let by_agent = stmt
        .query_map([&since], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT device_class, COUNT(*) AS n FROM widget_clicks
         WHERE received_at >= ?1 GROUP BY device_class ORDER BY n DESC, device_class",
    )?;
    let by_device = stmt
        .query_map([&since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClickStats {
        total: total as u64,
        by_agent,
        by_device,
    })
}
