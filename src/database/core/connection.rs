//! Snowflake SQL API connection
//!
//! `SqlApiConnection` implements [`SqlExecutor`] on top of the Snowflake SQL
//! REST API (`/api/v2/statements`). The API is stateless per request, so the
//! connection tracks the session context (role, warehouse, database, schema)
//! itself: once the server accepts a `use ...` statement the new value is
//! recorded and sent with every following request.

use super::executor::{QueryResult, SqlExecutor};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Interval between polls of a statement that is still running
const POLL_INTERVAL: Duration = Duration::from_millis(500);

// =============================================================================
// Settings
// =============================================================================

/// Kind of bearer token presented to the SQL API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenType {
    #[default]
    Oauth,
    KeypairJwt,
    ProgrammaticAccessToken,
}

impl TokenType {
    fn header_value(&self) -> &'static str {
        match self {
            TokenType::Oauth => "OAUTH",
            TokenType::KeypairJwt => "KEYPAIR_JWT",
            TokenType::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "oauth" => Ok(TokenType::Oauth),
            "keypair_jwt" | "jwt" => Ok(TokenType::KeypairJwt),
            "programmatic_access_token" | "pat" => Ok(TokenType::ProgrammaticAccessToken),
            _ => Err(format!(
                "Unknown token type '{}'. Valid types: oauth, keypair_jwt, programmatic_access_token",
                s
            )),
        }
    }
}

/// Everything needed to open a connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub account: String,
    pub user: Option<String>,
    /// Overrides `https://<account>.snowflakecomputing.com`
    pub host: Option<String>,
    pub token: String,
    pub token_type: TokenType,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub timeout_secs: u64,
}

impl ConnectionSettings {
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                host.trim_end_matches('/').to_string()
            }
            Some(host) => format!("https://{}", host.trim_end_matches('/')),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

// =============================================================================
// Session context
// =============================================================================

/// Session context carried with every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

/// A `use <kind> <name>` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseStatement {
    Role(String),
    Warehouse(String),
    Database(String),
    Schema(String),
}

/// Recognize statements that change the session context
pub fn parse_use_statement(sql: &str) -> Option<UseStatement> {
    let sql = sql.trim().trim_end_matches(';');
    let tokens: Vec<&str> = sql.split_whitespace().collect();
    match tokens.as_slice() {
        [verb, kind, name] if verb.eq_ignore_ascii_case("use") => {
            let name = name.to_string();
            match kind.to_lowercase().as_str() {
                "role" => Some(UseStatement::Role(name)),
                "warehouse" => Some(UseStatement::Warehouse(name)),
                "database" => Some(UseStatement::Database(name)),
                "schema" => Some(UseStatement::Schema(name)),
                _ => None,
            }
        }
        [verb, name] if verb.eq_ignore_ascii_case("use") => {
            Some(UseStatement::Database(name.to_string()))
        }
        _ => None,
    }
}

/// `PUT` and `GET` move local files and are only served by the driver
/// protocol, never by the SQL API
pub fn is_file_transfer(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .is_some_and(|verb| verb.eq_ignore_ascii_case("put") || verb.eq_ignore_ascii_case("get"))
}

impl SessionState {
    pub fn apply(&mut self, statement: UseStatement) {
        match statement {
            UseStatement::Role(r) => self.role = Some(r),
            UseStatement::Warehouse(w) => self.warehouse = Some(w),
            UseStatement::Database(d) => {
                self.database = Some(d);
                self.schema = None;
            }
            UseStatement::Schema(s) => match s.split_once('.') {
                Some((db, schema)) => {
                    self.database = Some(db.to_string());
                    self.schema = Some(schema.to_string());
                }
                None => self.schema = Some(s),
            },
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failure reported by the SQL API or the transport underneath it
#[derive(Debug, Clone)]
pub enum SqlError {
    /// Request could not be sent or the response could not be read
    Http(String),
    /// Snowflake rejected the statement
    Statement {
        code: String,
        message: String,
        sql_state: Option<String>,
    },
    /// Statement kind the SQL API does not accept
    Unsupported(String),
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::Http(e) => write!(f, "Snowflake request failed: {}", e),
            SqlError::Statement {
                code,
                message,
                sql_state,
            } => match sql_state {
                Some(state) => write!(f, "{} ({}): {}", code, state, message),
                None => write!(f, "{}: {}", code, message),
            },
            SqlError::Unsupported(statement) => write!(
                f,
                "{} is not supported over the Snowflake SQL API; use a driver-based client for file transfers",
                statement
            ),
        }
    }
}

impl std::error::Error for SqlError {}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

fn cell_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn convert_rows(data: Vec<Vec<Value>>) -> Vec<Vec<Option<String>>> {
    data.into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect()
}

// =============================================================================
// Connection
// =============================================================================

/// Blocking connection to the Snowflake SQL API
pub struct SqlApiConnection {
    settings: ConnectionSettings,
    agent: ureq::Agent,
    session: RefCell<SessionState>,
}

impl SqlApiConnection {
    /// Create a connection; no request is made until the first statement
    pub fn open(settings: ConnectionSettings) -> Result<Self> {
        if settings.account.is_empty() && settings.host.is_none() {
            return Err(anyhow!(
                "No Snowflake account configured (set `account` in the config file or SNOWCLI_ACCOUNT)"
            ));
        }
        if settings.token.is_empty() {
            return Err(anyhow!(
                "No Snowflake token configured (set `token` in the config file or SNOWCLI_TOKEN)"
            ));
        }

        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs.max(1) + 30)))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let session = SessionState {
            role: settings.role.clone(),
            warehouse: settings.warehouse.clone(),
            database: settings.database.clone(),
            schema: settings.schema.clone(),
        };

        Ok(Self {
            settings,
            agent,
            session: RefCell::new(session),
        })
    }

    /// Snapshot of the tracked session context
    pub fn session(&self) -> SessionState {
        self.session.borrow().clone()
    }

    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.settings.base_url())
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.settings.token)
    }

    fn user_agent() -> &'static str {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
    }

    fn submit(&self, sql: &str) -> Result<(u16, StatementResponse)> {
        let session = self.session.borrow().clone();
        let body = StatementRequest {
            statement: sql,
            timeout: self.settings.timeout_secs,
            database: session.database.as_deref(),
            schema: session.schema.as_deref(),
            warehouse: session.warehouse.as_deref(),
            role: session.role.as_deref(),
        };

        let mut response = self
            .agent
            .post(&self.statements_url())
            .header("Authorization", self.authorization())
            .header(
                "X-Snowflake-Authorization-Token-Type",
                self.settings.token_type.header_value(),
            )
            .header("Accept", "application/json")
            .header("User-Agent", Self::user_agent())
            .send_json(&body)
            .map_err(|e| SqlError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let parsed = response
            .body_mut()
            .read_json::<StatementResponse>()
            .map_err(|e| SqlError::Http(format!("invalid response body: {}", e)))?;
        Ok((status, parsed))
    }

    fn fetch(&self, handle: &str, partition: Option<usize>) -> Result<(u16, StatementResponse)> {
        let url = match partition {
            Some(p) => format!("{}/{}?partition={}", self.statements_url(), handle, p),
            None => format!("{}/{}", self.statements_url(), handle),
        };
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", self.authorization())
            .header(
                "X-Snowflake-Authorization-Token-Type",
                self.settings.token_type.header_value(),
            )
            .header("Accept", "application/json")
            .header("User-Agent", Self::user_agent())
            .call()
            .map_err(|e| SqlError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let parsed = response
            .body_mut()
            .read_json::<StatementResponse>()
            .map_err(|e| SqlError::Http(format!("invalid response body: {}", e)))?;
        Ok((status, parsed))
    }

    fn check(status: u16, response: StatementResponse) -> Result<StatementResponse> {
        if (200..300).contains(&status) {
            return Ok(response);
        }
        Err(SqlError::Statement {
            code: response.code.unwrap_or_else(|| status.to_string()),
            message: response
                .message
                .unwrap_or_else(|| format!("HTTP status {}", status)),
            sql_state: response.sql_state,
        }
        .into())
    }

    fn run(&self, sql: &str) -> Result<QueryResult> {
        let (mut status, mut response) = self.submit(sql)?;

        // 202: accepted but still running
        while status == 202 {
            let handle = response
                .statement_handle
                .clone()
                .ok_or_else(|| SqlError::Http("statement running without a handle".to_string()))?;
            std::thread::sleep(POLL_INTERVAL);
            (status, response) = self.fetch(&handle, None)?;
        }

        let response = Self::check(status, response)?;
        let meta = response.result_set_meta_data.unwrap_or_default();
        let columns = meta.row_type.into_iter().map(|r| r.name).collect();
        let mut rows = convert_rows(response.data.unwrap_or_default());

        if meta.partition_info.len() > 1 {
            let handle = response
                .statement_handle
                .ok_or_else(|| SqlError::Http("partitioned result without a handle".to_string()))?;
            for partition in 1..meta.partition_info.len() {
                let (status, part) = self.fetch(&handle, Some(partition))?;
                let part = Self::check(status, part)?;
                rows.extend(convert_rows(part.data.unwrap_or_default()));
            }
        }

        Ok(QueryResult::new(columns, rows))
    }
}

impl SqlExecutor for SqlApiConnection {
    fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!("executing: {}", sql.trim());
        if is_file_transfer(sql) {
            let verb = sql.split_whitespace().next().unwrap_or_default().to_uppercase();
            return Err(SqlError::Unsupported(verb).into());
        }
        let result = self.run(sql)?;
        if let Some(statement) = parse_use_statement(sql) {
            self.session.borrow_mut().apply(statement);
        }
        Ok(result)
    }
}
