use std::str::FromStr;

use async_trait::async_trait;
use mysql_async::prelude::*;
use tokio_postgres::NoTls;
use tracing::{error, info};

use crate::error::CliError;

/// Which engine a connection string targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    MySql,
    Postgres,
}

impl FromStr for ConnectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(ConnectionKind::MySql),
            "pg" | "postgres" | "postgresql" => Ok(ConnectionKind::Postgres),
            other => Err(format!("Unknown connection kind: {other}")),
        }
    }
}

/// The pieces a native client binary (`mysql`, `psql`) needs, pulled out
/// of a URL-style connection string so `connectors` adapters never have
/// to parse one themselves.
pub struct ParsedConn {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

pub fn parse_conn_str(kind: ConnectionKind, conn_str: &str) -> Result<ParsedConn, CliError> {
    let url = url::Url::parse(conn_str)
        .map_err(|_| CliError::InvalidConnectionFormat(conn_str.to_string()))?;

    let default_port = match kind {
        ConnectionKind::MySql => 3306,
        ConnectionKind::Postgres => 5432,
    };

    let database = url.path().trim_start_matches('/').to_string();
    if database.is_empty() {
        return Err(CliError::InvalidConnectionFormat(conn_str.to_string()));
    }

    Ok(ParsedConn {
        host: url.host_str().unwrap_or("localhost").to_string(),
        port: url.port().unwrap_or(default_port),
        user: url.username().to_string(),
        password: url.password().unwrap_or("").to_string(),
        database,
    })
}

/// Trait for "pinging" a data source before the manager starts syncing.
#[async_trait]
pub trait ConnectionPinger {
    async fn ping(&self) -> Result<(), CliError>;
}

pub struct MySqlConnectionPinger {
    pub conn_str: String,
}

pub struct PostgresConnectionPinger {
    pub conn_str: String,
}

#[async_trait]
impl ConnectionPinger for MySqlConnectionPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!("Pinging MySQL at '{}'", &self.conn_str);

        let opts = mysql_async::Opts::from_url(&self.conn_str).map_err(|e| {
            error!("MySQL connection string parse failed: {}", e);
            CliError::MySql(mysql_async::Error::Url(e))
        })?;
        let pool = mysql_async::Pool::new(opts);
        let mut conn = pool.get_conn().await.map_err(|e| {
            error!("MySQL connection to '{}' failed: {}", &self.conn_str, e);
            CliError::MySql(e)
        })?;

        let val: i32 = conn
            .query_first("SELECT 1")
            .await
            .map_err(|e| {
                error!("MySQL ping query on '{}' failed: {}", &self.conn_str, e);
                CliError::MySql(e)
            })?
            .ok_or_else(|| {
                let msg = format!("MySQL ping to '{}' returned no result", &self.conn_str);
                error!("{}", msg);
                CliError::Unexpected(msg)
            })?;

        if val != 1 {
            let msg = format!(
                "MySQL ping to '{}' returned unexpected result: {}",
                &self.conn_str, val
            );
            error!("{}", msg);
            return Err(CliError::Unexpected(msg));
        }

        info!("MySQL ping to '{}' succeeded", &self.conn_str);
        drop(conn);
        pool.disconnect().await.ok();
        Ok(())
    }
}

#[async_trait]
impl ConnectionPinger for PostgresConnectionPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!("Pinging Postgres at '{}'", &self.conn_str);

        let (client, connection) = tokio_postgres::connect(&self.conn_str, NoTls)
            .await
            .map_err(|e| {
                error!("Postgres connection to '{}' failed: {}", &self.conn_str, e);
                CliError::Postgres(e)
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Postgres connection error: {}", e);
            }
        });

        let row = client.query_one("SELECT 1", &[]).await.map_err(|e| {
            error!("Postgres ping query on '{}' failed: {}", &self.conn_str, e);
            CliError::Postgres(e)
        })?;

        let val: i32 = row.get(0);
        if val != 1 {
            let msg = format!(
                "Postgres ping to '{}' returned unexpected result: {}",
                &self.conn_str, val
            );
            error!("{}", msg);
            return Err(CliError::Unexpected(msg));
        }

        info!("Postgres ping to '{}' succeeded", &self.conn_str);
        Ok(())
    }
}
