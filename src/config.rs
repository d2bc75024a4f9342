use crate::lens::nativeapp::ProjectDefaults;
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

#[cfg(feature = "http")]
use crate::database::{ConnectionSettings, TokenType};

/// Default timeout for a single SQL API request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Interpreter used to run `pip` when none is configured
pub const DEFAULT_PYTHON: &str = "python3";

#[derive(Debug, Clone, Serialize)]
pub struct SnowcliConfig {
    /// Snowflake account identifier, e.g. `myorg-myaccount`
    pub account: Option<String>,

    pub user: Option<String>,

    /// Bearer token for the SQL API
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// `oauth`, `keypair_jwt` or `programmatic_access_token`
    pub token_type: String,

    /// Overrides `https://<account>.snowflakecomputing.com`
    pub host: Option<String>,

    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,

    /// Python interpreter used for `pip install`
    pub python: String,

    pub request_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### snowcli configuration file

### Snowflake account and user
# account = "myorg-myaccount"
# user = "jdoe"

### SQL API bearer token and its kind (oauth | keypair_jwt | programmatic_access_token)
# token = "..."
# token_type = "oauth"

### session defaults
# role = "sysadmin"
# warehouse = "compute_wh"
# database = "dev"
# schema = "public"

### interpreter used by `snowpark package` to run pip
# python = "python3"

### SQL API request timeout (in seconds)
# request_timeout_secs = 60
"#;

impl Default for SnowcliConfig {
    fn default() -> Self {
        Self {
            account: None,
            user: None,
            token: None,
            token_type: "oauth".to_string(),
            host: None,
            role: None,
            warehouse: None,
            database: None,
            schema: None,
            python: DEFAULT_PYTHON.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SnowcliConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<SnowcliConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.snowcli/config.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let snowcli_dir = format!("{}/.snowcli", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(snowcli_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create snowcli directory: {}", e))?;
                let p = format!("{}/config.toml", snowcli_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of SNOWCLI)
        // E.g., `SNOWCLI_WAREHOUSE=compute_wh ./snowcli` would set the warehouse
        builder = builder.add_source(config::Environment::with_prefix("SNOWCLI"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<SnowcliConfig> {
        let defaults = SnowcliConfig::default();
        let get = |key: &str| {
            config
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let request_timeout_secs = match get("request_timeout_secs") {
            Some(v) => v
                .parse()
                .map_err(|_| anyhow!("request_timeout_secs must be a number of seconds, got '{}'", v))?,
            None => defaults.request_timeout_secs,
        };

        Ok(SnowcliConfig {
            account: get("account"),
            user: get("user"),
            token: get("token"),
            token_type: get("token_type").unwrap_or(defaults.token_type),
            host: get("host"),
            role: get("role"),
            warehouse: get("warehouse"),
            database: get("database"),
            schema: get("schema"),
            python: get("python").unwrap_or(defaults.python),
            request_timeout_secs,
        })
    }

    /// Connection settings for the SQL API
    #[cfg(feature = "http")]
    pub fn connection_settings(&self) -> Result<ConnectionSettings> {
        let token_type = self
            .token_type
            .parse::<TokenType>()
            .map_err(|e| anyhow!(e))?;
        Ok(ConnectionSettings {
            account: self.account.clone().unwrap_or_default(),
            user: self.user.clone(),
            host: self.host.clone(),
            token: self.token.clone().unwrap_or_default(),
            token_type,
            role: self.role.clone(),
            warehouse: self.warehouse.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
            timeout_secs: self.request_timeout_secs,
        })
    }

    /// Values a native app project falls back to
    pub fn project_defaults(&self) -> ProjectDefaults {
        ProjectDefaults {
            role: self.role.clone(),
            warehouse: self.warehouse.clone(),
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let token = match &self.token {
            Some(_) => "********".to_string(),
            None => "-".to_string(),
        };
        [
            format!("Config File:        {}", Self::config_file_path()),
            format!("Account:            {}", show(&self.account)),
            format!("User:               {}", show(&self.user)),
            format!("Host:               {}", show(&self.host)),
            format!("Token:              {}", token),
            format!("Token Type:         {}", self.token_type),
            format!("Role:               {}", show(&self.role)),
            format!("Warehouse:          {}", show(&self.warehouse)),
            format!("Database:           {}", show(&self.database)),
            format!("Schema:             {}", show(&self.schema)),
            format!("Python:             {}", self.python),
            format!("Request Timeout:    {} seconds", self.request_timeout_secs),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.snowcli/config.toml", home_dir)
    }
}
