//! Database access.
//!
//! The engine talks to the database through the [`Database`] trait so that
//! hosts can supply their own drivers. The bundled implementation uses the
//! sqlx `Any` driver and covers PostgreSQL, MySQL, and SQLite; SQL Server
//! and Oracle are fully supported dialects for query templating but have
//! no bundled driver.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use regex::Regex;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use quarry_connector::error::{ConnectorError, ConnectorResult};

/// Maximum number of open connections in the pool.
const MAX_OPEN_CONNS: u32 = 10;

/// Maximum lifetime of a pooled connection.
const MAX_CONN_LIFETIME: Duration = Duration::from_secs(5 * 60);

static DSN_ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("DSN_ENV_RE is a valid regex pattern")
});

/// SQL dialect of the target database. Drives placeholder syntax in the
/// query templater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
    Oracle,
}

impl Dialect {
    /// The placeholder for the argument at 1-based position `index`.
    pub fn next_placeholder(&self, index: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
            Dialect::SqlServer => format!("@p{index}"),
            Dialect::Oracle => format!(":{index}"),
        }
    }

    /// The DSN scheme naming this dialect.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::SqlServer => "sqlserver",
            Dialect::Oracle => "oracle",
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "mysql" => Some(Dialect::MySql),
            "postgres" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            "sqlserver" => Some(Dialect::SqlServer),
            "oracle" => Some(Dialect::Oracle),
            _ => None,
        }
    }
}

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Format the value for direct interpolation into SQL (`|unquoted`
    /// substitution).
    pub fn to_unquoted_string(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::UInt(u) => u.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// One result row: column name/value pairs in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from name/value pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, SqlValue)>) -> Self {
        Self {
            columns: pairs.into_iter().collect(),
        }
    }

    /// Append a column.
    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    /// Look up a column by name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    /// Iterate over columns in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Driver seam for the engine. Implementations must be safe to share
/// across tasks; each call acquires its own connection from the pool.
#[async_trait]
pub trait Database: Send + Sync + std::fmt::Debug {
    /// The dialect this database speaks.
    fn dialect(&self) -> Dialect;

    /// Run a query and return up to `max_rows` rows (all rows when
    /// `None`), in the order produced by the database.
    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
        max_rows: Option<u64>,
    ) -> ConnectorResult<Vec<SqlRow>>;

    /// Execute a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> ConnectorResult<u64>;

    /// Begin a transaction.
    async fn begin(&self) -> ConnectorResult<Box<dyn DatabaseTransaction>>;
}

/// An open transaction. Dropping an unfinished transaction rolls it back
/// at the driver level.
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a statement within the transaction and return the number of
    /// affected rows.
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> ConnectorResult<u64>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> ConnectorResult<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> ConnectorResult<()>;
}

/// Substitute `${ENV_VAR}` references from the process environment.
///
/// Every missing variable is reported in one joined error.
pub fn substitute_env(input: &str) -> ConnectorResult<String> {
    let mut missing = Vec::new();
    let result = DSN_ENV_RE.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.push(format!("environment variable {name} is not set"));
                caps[0].to_string()
            }
        }
    });

    if missing.is_empty() {
        Ok(result.into_owned())
    } else {
        Err(ConnectorError::configuration(missing.join("; ")))
    }
}

/// Connect to the database named by the DSN.
///
/// The DSN scheme selects the engine (`mysql`, `postgres`, `sqlserver`,
/// `oracle`, plus `sqlite` for local use); unknown schemes fail. When the
/// DSN carries no credentials, `user` and `password` are required and are
/// also subject to `${ENV_VAR}` substitution.
pub async fn connect(
    dsn: &str,
    user: &str,
    password: &str,
) -> ConnectorResult<Arc<dyn Database>> {
    let populated = substitute_env(dsn)?;
    let mut url = Url::parse(&populated)
        .map_err(|e| ConnectorError::configuration(format!("failed to parse DSN: {e}")))?;

    let dialect = Dialect::from_scheme(url.scheme()).ok_or_else(|| {
        ConnectorError::configuration(format!(
            "unsupported database scheme: {}",
            url.scheme()
        ))
    })?;

    if dialect != Dialect::Sqlite && url.username().is_empty() {
        if user.is_empty() || password.is_empty() {
            return Err(ConnectorError::configuration(
                "user and password must be set in DSN or in the configuration",
            ));
        }

        let populated_user = substitute_env(user)?;
        let populated_password = substitute_env(password)?;

        url.set_username(&populated_user).map_err(|()| {
            ConnectorError::configuration("failed to set username on DSN")
        })?;
        url.set_password(Some(&populated_password)).map_err(|()| {
            ConnectorError::configuration("failed to set password on DSN")
        })?;
    }

    match dialect {
        Dialect::MySql | Dialect::Postgres | Dialect::Sqlite => {
            let db = SqlxDatabase::connect(url.as_str(), dialect).await?;
            Ok(Arc::new(db))
        }
        Dialect::SqlServer | Dialect::Oracle => Err(ConnectorError::database(format!(
            "no bundled driver for {}; supply a Database implementation",
            dialect.as_str()
        ))),
    }
}

/// [`Database`] implementation over a sqlx `Any` pool.
#[derive(Debug)]
pub struct SqlxDatabase {
    pool: AnyPool,
    dialect: Dialect,
}

fn install_drivers() {
    static DRIVERS: OnceLock<()> = OnceLock::new();
    DRIVERS.get_or_init(|| {
        sqlx::any::install_default_drivers();
    });
}

impl SqlxDatabase {
    /// Connect with the default pool settings (max 10 connections,
    /// 5-minute connection lifetime).
    pub async fn connect(url: &str, dialect: Dialect) -> ConnectorResult<Self> {
        install_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(MAX_OPEN_CONNS)
            .max_lifetime(MAX_CONN_LIFETIME)
            .connect(url)
            .await
            .map_err(|e| {
                ConnectorError::database_with_source("failed to connect to database", e)
            })?;

        debug!(dialect = dialect.as_str(), "database pool established");

        Ok(Self { pool, dialect })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &SqlValue,
) -> ConnectorResult<Query<'q, Any, AnyArguments<'q>>> {
    Ok(match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::UInt(u) => {
            let i = i64::try_from(*u).map_err(|_| {
                ConnectorError::database(format!("unsigned parameter {u} exceeds i64 range"))
            })?;
            query.bind(i)
        }
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Bytes(_) => {
            return Err(ConnectorError::database(
                "binary query parameters are not supported by the any driver",
            ))
        }
    })
}

fn decode_row(row: &AnyRow) -> SqlRow {
    let mut out = SqlRow::new();
    for (i, col) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Int)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Float)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Bool)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Text)
        } else {
            warn!(column = col.name(), "undecodable column value, treating as NULL");
            SqlValue::Null
        };
        out.push(col.name().to_string(), value);
    }
    out
}

#[async_trait]
impl Database for SqlxDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query(
        &self,
        sql: &str,
        args: &[SqlValue],
        max_rows: Option<u64>,
    ) -> ConnectorResult<Vec<SqlRow>> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg)?;
        }

        let mut rows = Vec::new();
        let mut stream = query.fetch(&self.pool);
        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| ConnectorError::database_with_source("failed to run query", e))?
        {
            rows.push(decode_row(&row));
            if let Some(max) = max_rows {
                if rows.len() as u64 >= max {
                    break;
                }
            }
        }
        Ok(rows)
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> ConnectorResult<u64> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg)?;
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| ConnectorError::database_with_source("failed to execute statement", e))?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> ConnectorResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ConnectorError::database_with_source("failed to begin transaction", e))?;
        debug!("database transaction started");
        Ok(Box::new(SqlxTransaction { inner: Some(tx) }))
    }
}

/// Transaction over a sqlx `Any` connection.
pub struct SqlxTransaction {
    inner: Option<sqlx::Transaction<'static, Any>>,
}

#[async_trait]
impl DatabaseTransaction for SqlxTransaction {
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> ConnectorResult<u64> {
        let tx = self
            .inner
            .as_mut()
            .ok_or_else(|| ConnectorError::database("transaction already finished"))?;

        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg)?;
        }

        let result = query
            .execute(&mut **tx)
            .await
            .map_err(|e| ConnectorError::database_with_source("failed to execute statement", e))?;
        Ok(result.rows_affected())
    }

    async fn commit(mut self: Box<Self>) -> ConnectorResult<()> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| ConnectorError::database("transaction already finished"))?;
        tx.commit()
            .await
            .map_err(|e| ConnectorError::database_with_source("failed to commit transaction", e))?;
        debug!("database transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> ConnectorResult<()> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| ConnectorError::database("transaction already finished"))?;
        tx.rollback()
            .await
            .map_err(|e| {
                ConnectorError::database_with_source("failed to rollback transaction", e)
            })?;
        warn!("database transaction rolled back");
        Ok(())
    }
}

/// Variable map used when rewriting templated queries.
pub type VarMap = HashMap<String, quarry_expr::Dynamic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_sequences() {
        assert_eq!(Dialect::MySql.next_placeholder(1), "?");
        assert_eq!(Dialect::MySql.next_placeholder(7), "?");
        assert_eq!(Dialect::Sqlite.next_placeholder(2), "?");
        assert_eq!(Dialect::Postgres.next_placeholder(1), "$1");
        assert_eq!(Dialect::Postgres.next_placeholder(2), "$2");
        assert_eq!(Dialect::SqlServer.next_placeholder(1), "@p1");
        assert_eq!(Dialect::Oracle.next_placeholder(3), ":3");
    }

    #[test]
    fn test_sql_row_lookup_preserves_order() {
        let mut row = SqlRow::new();
        row.push("b", SqlValue::Int(2));
        row.push("a", SqlValue::Int(1));

        assert_eq!(row.get("a"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("missing"), None);

        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_substitute_env() {
        std::env::set_var("QUARRY_TEST_DB_HOST", "db.internal");
        let out = substitute_env("mysql://${QUARRY_TEST_DB_HOST}:3306/app").unwrap();
        assert_eq!(out, "mysql://db.internal:3306/app");
    }

    #[test]
    fn test_substitute_env_reports_all_missing() {
        let err = substitute_env("${QUARRY_NO_SUCH_VAR_A}/${QUARRY_NO_SUCH_VAR_B}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("QUARRY_NO_SUCH_VAR_A"));
        assert!(message.contains("QUARRY_NO_SUCH_VAR_B"));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let err = connect("redis://localhost/0", "u", "p").await.unwrap_err();
        assert!(err.to_string().contains("unsupported database scheme"));
    }

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let err = connect("mysql://localhost:3306/app", "", "")
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("user and password must be set"));
    }

    #[tokio::test]
    async fn test_connect_refuses_driverless_dialects() {
        let err = connect("oracle://u:p@localhost/xe", "", "").await.unwrap_err();
        assert!(err.to_string().contains("no bundled driver"));
    }

    #[test]
    fn test_unquoted_formatting() {
        assert_eq!(SqlValue::Text("users".into()).to_unquoted_string(), "users");
        assert_eq!(SqlValue::Int(11).to_unquoted_string(), "11");
        assert_eq!(SqlValue::Null.to_unquoted_string(), "NULL");
    }
}
