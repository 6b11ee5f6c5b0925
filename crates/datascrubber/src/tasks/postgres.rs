//! PostgreSQL driver seam
//!
//! The runner talks to databases through three small traits so it can be
//! tested without a server. [`PgConnector`] implements them over a single
//! `sqlx` connection per session; there is no pooling.

use crate::workspace::ConnectionInfo;
use futures::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

/// Statement execution handle handed to scrub routines.
pub trait Statements: Send {
    /// Execute one or more SQL statements, returning the rows affected
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<u64, sqlx::Error>>;
}

/// A connection to one database.
#[allow(async_fn_in_trait)]
pub trait Session: Statements {
    /// Names of all non-template databases on the server
    async fn list_databases(&mut self) -> Result<Vec<String>, sqlx::Error>;

    async fn begin(&mut self) -> Result<(), sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;

    async fn rollback(&mut self) -> Result<(), sqlx::Error>;

    /// Close the connection gracefully
    async fn close(self) -> Result<(), sqlx::Error>
    where
        Self: Sized;
}

/// Opens sessions against the workspace instance.
#[allow(async_fn_in_trait)]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(
        &self,
        info: &ConnectionInfo,
        database: &str,
    ) -> Result<Self::Session, sqlx::Error>;
}

/// `sqlx` PostgreSQL connector
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, info: &ConnectionInfo, database: &str) -> Result<PgSession, sqlx::Error> {
        let options = PgConnectOptions::new()
            .host(&info.address)
            .port(info.port)
            .username(&info.username)
            .password(info.password.expose())
            .database(database)
            .application_name("datascrubber");

        let conn = PgConnection::connect_with(&options).await?;
        Ok(PgSession { conn })
    }
}

/// A single PostgreSQL connection. Transactions are managed with explicit
/// `BEGIN`/`COMMIT`/`ROLLBACK` so routines can run arbitrary scripts in them.
pub struct PgSession {
    conn: PgConnection,
}

impl PgSession {
    async fn simple(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(sql).execute(&mut self.conn).await?;
        Ok(())
    }
}

impl Statements for PgSession {
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            let conn: &'a mut PgConnection = &mut self.conn;
            let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await?;
            Ok(result.rows_affected())
        })
    }
}

impl Session for PgSession {
    async fn list_databases(&mut self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT datname::text FROM pg_database WHERE datistemplate IS FALSE ORDER BY datname",
        )
        .fetch_all(&mut self.conn)
        .await
    }

    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        self.simple("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.simple("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.simple("ROLLBACK").await
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}
