//! Connection pool and queries.

use crate::error::AsteriskResult;
use crate::types::{CallGroup, SipAccount, ENDPOINT_CODECS};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Connection settings for the Asterisk database.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub database: String,
    /// Default: 5
    pub max_connections: u32,
    /// Default: 30 seconds
    pub connect_timeout: Duration,
}

impl DbConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            username: username.into(),
            password,
            database: "asterisk".into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Handle on the Asterisk realtime tables.
///
/// An extension's SIP identity spans `ps_aors`, `ps_auths` and `ps_endpoints`; every
/// mutation touching more than one row runs in a single transaction.
#[derive(Debug, Clone)]
pub struct AsteriskDb {
    pool: PgPool,
}

impl AsteriskDb {
    pub async fn connect(config: &DbConfig) -> AsteriskResult<Self> {
        info!(host = %config.host, database = %config.database, "Connecting to Asterisk database");

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(config.password.expose_secret())
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the call group tables if missing.
    pub async fn migrate(&self) -> AsteriskResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ---------------------------------------------------------------------
    // SIP accounts
    // ---------------------------------------------------------------------

    pub async fn sip_exists(&self, number: &str) -> AsteriskResult<bool> {
        let found = sqlx::query("SELECT id FROM ps_aors WHERE id = $1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    #[instrument(skip(self, account), fields(number = %account.number, temporary = account.temporary))]
    pub async fn create_sip(&self, account: &SipAccount) -> AsteriskResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO ps_aors (id, max_contacts, remove_existing) VALUES ($1, 1, 'yes')")
            .bind(&account.number)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO ps_auths (id, auth_type, password, username) VALUES ($1, 'userpass', $2, $1)",
        )
        .bind(&account.number)
        .bind(&account.password)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO ps_endpoints (id, aors, auth, context, allow, direct_media) \
             VALUES ($1, $1, $1, $2, $3, 'no')",
        )
        .bind(&account.number)
        .bind(account.context())
        .bind(ENDPOINT_CODECS)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Created SIP account");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_sip(&self, number: &str) -> AsteriskResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["ps_aors", "ps_auths", "ps_endpoints"] {
            sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
                .bind(number)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Deleted SIP account");
        Ok(())
    }

    /// Move a SIP identity, including its auth username and group memberships.
    #[instrument(skip(self))]
    pub async fn rename_sip(&self, old: &str, new: &str) -> AsteriskResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE ps_aors SET id = $2 WHERE id = $1")
            .bind(old)
            .bind(new)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE ps_auths SET id = $2, username = $2 WHERE id = $1")
            .bind(old)
            .bind(new)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE ps_endpoints SET id = $2, aors = $2, auth = $2 WHERE id = $1")
            .bind(old)
            .bind(new)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE callgroup_members SET extension = $2 WHERE extension = $1")
            .bind(old)
            .bind(new)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Renamed SIP account");
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn update_sip_password(&self, number: &str, password: &str) -> AsteriskResult<()> {
        sqlx::query("UPDATE ps_auths SET password = $2 WHERE id = $1")
            .bind(number)
            .bind(password)
            .execute(&self.pool)
            .await?;
        info!("Updated SIP password");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Call groups
    // ---------------------------------------------------------------------

    pub async fn callgroup(&self, number: &str) -> AsteriskResult<Option<CallGroup>> {
        let Some(row) = sqlx::query("SELECT name FROM callgroups WHERE number = $1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let members: Vec<String> = sqlx::query_scalar(
            "SELECT extension FROM callgroup_members WHERE callgroup = $1",
        )
        .bind(number)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(CallGroup {
            number: number.to_string(),
            name: row.try_get("name")?,
            members: members.into_iter().collect::<BTreeSet<_>>(),
        }))
    }

    #[instrument(skip(self, group), fields(number = %group.number))]
    pub async fn create_callgroup(&self, group: &CallGroup) -> AsteriskResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO callgroups (number, name) VALUES ($1, $2)")
            .bind(&group.number)
            .bind(&group.name)
            .execute(&mut *tx)
            .await?;
        for member in &group.members {
            sqlx::query("INSERT INTO callgroup_members (callgroup, extension) VALUES ($1, $2)")
                .bind(&group.number)
                .bind(member)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Created call group");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_callgroup_name(&self, number: &str, name: &str) -> AsteriskResult<()> {
        sqlx::query("UPDATE callgroups SET name = $2 WHERE number = $1")
            .bind(number)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a group; its member rows go with it (`ON DELETE CASCADE`).
    #[instrument(skip(self))]
    pub async fn delete_callgroup(&self, number: &str) -> AsteriskResult<()> {
        sqlx::query("DELETE FROM callgroups WHERE number = $1")
            .bind(number)
            .execute(&self.pool)
            .await?;
        info!("Deleted call group");
        Ok(())
    }

    /// Move a group. Its own member rows follow via `ON UPDATE CASCADE`; rows listing the
    /// group as a member of another group are moved explicitly.
    #[instrument(skip(self))]
    pub async fn rename_callgroup(&self, old: &str, new: &str) -> AsteriskResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE callgroups SET number = $2 WHERE number = $1")
            .bind(old)
            .bind(new)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE callgroup_members SET extension = $2 WHERE extension = $1")
            .bind(old)
            .bind(new)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!("Renamed call group");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn add_callgroup_member(&self, group: &str, extension: &str) -> AsteriskResult<()> {
        sqlx::query(
            "INSERT INTO callgroup_members (callgroup, extension) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(group)
        .bind(extension)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_callgroup_member(&self, group: &str, extension: &str) -> AsteriskResult<()> {
        sqlx::query("DELETE FROM callgroup_members WHERE callgroup = $1 AND extension = $2")
            .bind(group)
            .bind(extension)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
