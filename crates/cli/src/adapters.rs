//! Builds a `DatabaseAdapter` trait object from a `DatabaseConfig` entry,
//! the one place the CLI layer is allowed to know about driver-specific
//! connection setup (spec's driver-internals Non-goal stops at the
//! `connectors` crate boundary; this just wires it up).

use std::sync::Arc;

use connectors::adapter::DatabaseAdapter;
use connectors::mysql::{MySqlAdapter, MySqlConnectionInfo};
use connectors::postgres::{PostgresAdapter, PostgresConnectionInfo};
use tokio_postgres::NoTls;
use tracing::error;

use crate::config::{DatabaseConfig, EngineKind};
use crate::conn::{parse_conn_str, ConnectionKind};
use crate::error::CliError;

pub async fn build_adapter(config: &DatabaseConfig) -> Result<Arc<dyn DatabaseAdapter>, CliError> {
    match config.engine {
        EngineKind::Mysql => {
            let parsed = parse_conn_str(ConnectionKind::MySql, &config.conn_str)?;
            let opts = mysql_async::Opts::from_url(&config.conn_str)
                .map_err(|e| CliError::MySql(mysql_async::Error::Url(e)))?;
            let pool = mysql_async::Pool::new(opts);
            let conn_info = MySqlConnectionInfo {
                host: parsed.host,
                port: parsed.port,
                user: parsed.user,
                password: parsed.password,
                database: config.database.clone(),
            };
            Ok(Arc::new(MySqlAdapter::new(pool, conn_info)))
        }
        EngineKind::Postgres => {
            let parsed = parse_conn_str(ConnectionKind::Postgres, &config.conn_str)?;
            let (client, connection) = tokio_postgres::connect(&config.conn_str, NoTls).await?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    error!(%err, "postgres connection task failed");
                }
            });
            let conn_info = PostgresConnectionInfo {
                host: parsed.host,
                port: parsed.port,
                user: parsed.user,
                password: parsed.password,
                database: config.database.clone(),
            };
            Ok(Arc::new(PostgresAdapter::new(client, conn_info)))
        }
    }
}
