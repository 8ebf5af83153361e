use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::reply::DisclosurePolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub line: LineConfig,
    pub sheets: SheetsConfig,
    pub server: ServerConfig,
    pub replies: ReplyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LineConfig {
    pub access_token: SecretString,
    pub channel_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub credentials_json: Option<SecretString>,
    pub credentials_path: Option<PathBuf>,
    pub spreadsheet_title: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ReplyConfig {
    pub disclosure: DisclosurePolicy,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub line_access_token: Option<String>,
    pub line_channel_secret: Option<String>,
    pub sheets_credentials_json: Option<String>,
    pub sheets_credentials_path: Option<PathBuf>,
    pub sheets_spreadsheet_title: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub disclosure: Option<DisclosurePolicy>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            line: LineConfig {
                access_token: String::new().into(),
                channel_secret: String::new().into(),
            },
            sheets: SheetsConfig {
                credentials_json: None,
                credentials_path: None,
                spreadsheet_title: "laundry-bot".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            replies: ReplyConfig { disclosure: DisclosurePolicy::Generic },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("sudsy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(line) = patch.line {
            if let Some(access_token_value) = line.access_token {
                self.line.access_token = secret_value(access_token_value);
            }
            if let Some(channel_secret_value) = line.channel_secret {
                self.line.channel_secret = secret_value(channel_secret_value);
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(credentials_json_value) = sheets.credentials_json {
                self.sheets.credentials_json = Some(secret_value(credentials_json_value));
            }
            if let Some(credentials_path) = sheets.credentials_path {
                self.sheets.credentials_path = Some(credentials_path);
            }
            if let Some(spreadsheet_title) = sheets.spreadsheet_title {
                self.sheets.spreadsheet_title = spreadsheet_title;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(replies) = patch.replies {
            if let Some(disclosure) = replies.disclosure {
                self.replies.disclosure = disclosure;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SUDSY_LINE_ACCESS_TOKEN") {
            self.line.access_token = secret_value(value);
        }
        if let Some(value) = read_env("SUDSY_LINE_CHANNEL_SECRET") {
            self.line.channel_secret = secret_value(value);
        }

        if let Some(value) = read_env("SUDSY_SHEETS_CREDENTIALS_JSON") {
            self.sheets.credentials_json = Some(secret_value(value));
        }
        if let Some(value) = read_env("SUDSY_SHEETS_CREDENTIALS_PATH") {
            self.sheets.credentials_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SUDSY_SHEETS_SPREADSHEET_TITLE") {
            self.sheets.spreadsheet_title = value;
        }

        if let Some(value) = read_env("SUDSY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // Hosting platforms inject the listen port as bare PORT.
        let port = read_env("SUDSY_SERVER_PORT")
            .map(|value| ("SUDSY_SERVER_PORT", value))
            .or_else(|| read_env("PORT").map(|value| ("PORT", value)));
        if let Some((key, value)) = port {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("SUDSY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("SUDSY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("SUDSY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SUDSY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SUDSY_REPLY_DISCLOSURE") {
            self.replies.disclosure =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "SUDSY_REPLY_DISCLOSURE".to_string(),
                    value,
                })?;
        }

        let log_level = read_env("SUDSY_LOGGING_LEVEL").or_else(|| read_env("SUDSY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("SUDSY_LOGGING_FORMAT").or_else(|| read_env("SUDSY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(line_access_token) = overrides.line_access_token {
            self.line.access_token = secret_value(line_access_token);
        }
        if let Some(line_channel_secret) = overrides.line_channel_secret {
            self.line.channel_secret = secret_value(line_channel_secret);
        }
        if let Some(sheets_credentials_json) = overrides.sheets_credentials_json {
            self.sheets.credentials_json = Some(secret_value(sheets_credentials_json));
        }
        if let Some(sheets_credentials_path) = overrides.sheets_credentials_path {
            self.sheets.credentials_path = Some(sheets_credentials_path);
        }
        if let Some(sheets_spreadsheet_title) = overrides.sheets_spreadsheet_title {
            self.sheets.spreadsheet_title = sheets_spreadsheet_title;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(disclosure) = overrides.disclosure {
            self.replies.disclosure = disclosure;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_line(&self.line)?;
        validate_sheets(&self.sheets)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("sudsy.toml"), PathBuf::from("config/sudsy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_line(line: &LineConfig) -> Result<(), ConfigError> {
    if line.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.access_token is required. Issue one from the LINE Developers console under Messaging API > Channel access token".to_string(),
        ));
    }

    if line.channel_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.channel_secret is required. Find it in the LINE Developers console under Basic settings > Channel secret".to_string(),
        ));
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.spreadsheet_title.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_title must not be empty".to_string(),
        ));
    }

    let has_blob = sheets
        .credentials_json
        .as_ref()
        .map(|value| !value.expose_secret().trim().is_empty())
        .unwrap_or(false);
    let has_path = sheets.credentials_path.is_some();
    if !has_blob && !has_path {
        return Err(ConfigError::Validation(
            "sheets credentials are required: set sheets.credentials_json (service account JSON) or sheets.credentials_path".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    line: Option<LinePatch>,
    sheets: Option<SheetsPatch>,
    server: Option<ServerPatch>,
    replies: Option<RepliesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LinePatch {
    access_token: Option<String>,
    channel_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    credentials_json: Option<String>,
    credentials_path: Option<PathBuf>,
    spreadsheet_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RepliesPatch {
    disclosure: Option<DisclosurePolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::reply::DisclosurePolicy;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn required_vars() -> [(&'static str, &'static str); 3] {
        [
            ("SUDSY_LINE_ACCESS_TOKEN", "line-token"),
            ("SUDSY_LINE_CHANNEL_SECRET", "line-secret"),
            ("SUDSY_SHEETS_CREDENTIALS_JSON", "{}"),
        ]
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LINE_ACCESS_TOKEN", "token-from-env");
        env::set_var("TEST_LINE_CHANNEL_SECRET", "secret-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sudsy.toml");
            fs::write(
                &path,
                r#"
[line]
access_token = "${TEST_LINE_ACCESS_TOKEN}"
channel_secret = "${TEST_LINE_CHANNEL_SECRET}"

[sheets]
credentials_json = "{}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.line.access_token.expose_secret() == "token-from-env",
                "access token should be loaded from environment",
            )?;
            ensure(
                config.line.channel_secret.expose_secret() == "secret-from-env",
                "channel secret should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_LINE_ACCESS_TOKEN", "TEST_LINE_CHANNEL_SECRET"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        for (key, value) in required_vars() {
            env::set_var(key, value);
        }
        env::set_var("SUDSY_SHEETS_SPREADSHEET_TITLE", "roster-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sudsy.toml");
            fs::write(
                &path,
                r#"
[sheets]
spreadsheet_title = "roster-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sheets.spreadsheet_title == "roster-from-env",
                "env spreadsheet title should win over file and defaults",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(&[
            "SUDSY_LINE_ACCESS_TOKEN",
            "SUDSY_LINE_CHANNEL_SECRET",
            "SUDSY_SHEETS_CREDENTIALS_JSON",
            "SUDSY_SHEETS_SPREADSHEET_TITLE",
        ]);
        result
    }

    #[test]
    fn port_env_alias_is_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        for (key, value) in required_vars() {
            env::set_var(key, value);
        }
        env::set_var("PORT", "10000");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 10000, "bare PORT should override the listen port")
        })();

        clear_vars(&[
            "SUDSY_LINE_ACCESS_TOKEN",
            "SUDSY_LINE_CHANNEL_SECRET",
            "SUDSY_SHEETS_CREDENTIALS_JSON",
            "PORT",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUDSY_LINE_ACCESS_TOKEN", "line-token");
        env::remove_var("SUDSY_LINE_CHANNEL_SECRET");
        env::set_var("SUDSY_SHEETS_CREDENTIALS_JSON", "{}");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("line.channel_secret")
            );
            ensure(has_message, "validation failure should mention line.channel_secret")
        })();

        clear_vars(&["SUDSY_LINE_ACCESS_TOKEN", "SUDSY_SHEETS_CREDENTIALS_JSON"]);
        result
    }

    #[test]
    fn disclosure_policy_is_parsed_from_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        for (key, value) in required_vars() {
            env::set_var(key, value);
        }
        env::set_var("SUDSY_REPLY_DISCLOSURE", "verbose");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.replies.disclosure == DisclosurePolicy::Verbose,
                "verbose disclosure should be set from env var",
            )
        })();

        clear_vars(&[
            "SUDSY_LINE_ACCESS_TOKEN",
            "SUDSY_LINE_CHANNEL_SECRET",
            "SUDSY_SHEETS_CREDENTIALS_JSON",
            "SUDSY_REPLY_DISCLOSURE",
        ]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUDSY_LINE_ACCESS_TOKEN", "token-secret-value");
        env::set_var("SUDSY_LINE_CHANNEL_SECRET", "channel-secret-value");
        env::set_var("SUDSY_SHEETS_CREDENTIALS_JSON", "{\"private_key\":\"pk-secret-value\"}");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("token-secret-value"),
                "debug output should not contain the access token",
            )?;
            ensure(
                !debug.contains("channel-secret-value"),
                "debug output should not contain the channel secret",
            )?;
            ensure(
                !debug.contains("pk-secret-value"),
                "debug output should not contain the credential blob",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "SUDSY_LINE_ACCESS_TOKEN",
            "SUDSY_LINE_CHANNEL_SECRET",
            "SUDSY_SHEETS_CREDENTIALS_JSON",
        ]);
        result
    }
}
