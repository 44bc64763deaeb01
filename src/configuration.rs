use crate::error::{AppError, ConfigError};

/// None of the settings types implement `Debug`: they carry the signing secrets
/// and the database password, which must never end up in a log line.
#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// bcrypt work factor for newly hashed passwords
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default)]
    pub storage: StorageBackend,
}

/// Where users and notes are persisted
#[derive(serde::Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    /// Connection string for the server itself, used to create databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Session token settings
///
/// Access and refresh tokens are signed with separate secrets so that a leaked
/// key for one kind cannot forge the other.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64, // seconds
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64, // seconds, also the refresh cookie Max-Age
}

impl JwtSettings {
    /// Reject settings that would make the two token kinds interchangeable
    /// or instantly expired.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_token_secret".to_string()));
        }
        if self.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_token_secret".to_string()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_secret and jwt.refresh_token_secret must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token expiry values must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_access_token_expiry() -> i64 {
    15 * 60
}

fn default_refresh_token_expiry() -> i64 {
    7 * 24 * 60 * 60
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) overlaid with
/// `APP_`-prefixed environment variables, e.g. `APP_JWT__ACCESS_TOKEN_SECRET`.
pub fn get_configuration() -> Result<Settings, AppError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}
