//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::HashSet,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagebits";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 8000;
const DEFAULT_ADMIN_PORT: u16 = 8001;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_KEY_PREFIX: &str = "pagebits";
const DEFAULT_CACHE_MAX_CAPACITY: u64 = 10_000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_UPLOAD_URL_PREFIX: &str = "/media/";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_TEMPLATES_DIR: &str = "site";

/// Paths the public router owns regardless of configuration.
const RESERVED_PATH_PREFIX: &str = "/_health";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub uploads: UploadSettings,
    pub templates: TemplateSettings,
    pub views: Vec<ViewSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub key_prefix: String,
    pub max_capacity: u64,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    /// Always starts and ends with `/`.
    pub url_prefix: String,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct TemplateSettings {
    pub directory: PathBuf,
}

/// A statically routed view rendering `template` with the context of `groups`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    pub path: String,
    pub template: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PAGEBITS").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    uploads: RawUploadSettings,
    templates: RawTemplateSettings,
    views: Vec<RawViewSettings>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(prefix) = overrides.cache_key_prefix.as_ref() {
            self.cache.key_prefix = Some(prefix.clone());
        }
        if let Some(capacity) = overrides.cache_max_capacity {
            self.cache.max_capacity = Some(capacity);
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(prefix) = overrides.uploads_url_prefix.as_ref() {
            self.uploads.url_prefix = Some(prefix.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(directory) = overrides.templates_directory.as_ref() {
            self.templates.directory = Some(directory.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            uploads,
            templates,
            views,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let uploads = build_upload_settings(uploads)?;
        let templates = build_template_settings(templates)?;
        let views = build_view_settings(views, &uploads)?;

        Ok(Self {
            server,
            logging,
            database,
            cache,
            uploads,
            templates,
            views,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            format!("admin listener collides with public listener on {public_addr}"),
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_connections.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let key_prefix = cache
        .key_prefix
        .map(|prefix| prefix.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());
    if key_prefix.is_empty() || key_prefix.chars().any(char::is_whitespace) {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "must be non-empty and contain no whitespace",
        ));
    }

    let max_capacity = cache.max_capacity.unwrap_or(DEFAULT_CACHE_MAX_CAPACITY);
    if max_capacity == 0 {
        return Err(LoadError::invalid(
            "cache.max_capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        ttl: Duration::from_secs(ttl_seconds),
        key_prefix,
        max_capacity,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

    let url_prefix = uploads
        .url_prefix
        .unwrap_or_else(|| DEFAULT_UPLOAD_URL_PREFIX.to_string());
    if url_prefix.len() < 3 || !url_prefix.starts_with('/') || !url_prefix.ends_with('/') {
        return Err(LoadError::invalid(
            "uploads.url_prefix",
            "must start and end with `/` and name a path segment, e.g. `/media/`",
        ));
    }

    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        url_prefix,
        max_request_bytes,
    })
}

fn build_template_settings(templates: RawTemplateSettings) -> Result<TemplateSettings, LoadError> {
    let directory = templates
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "templates.directory",
            "path must not be empty",
        ));
    }
    Ok(TemplateSettings { directory })
}

fn build_view_settings(
    views: Vec<RawViewSettings>,
    uploads: &UploadSettings,
) -> Result<Vec<ViewSettings>, LoadError> {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(views.len());

    for view in views {
        let path = view
            .path
            .map(|path| path.trim().to_string())
            .filter(|path| path.starts_with('/'))
            .ok_or_else(|| LoadError::invalid("views.path", "each view needs a path starting with `/`"))?;

        if path.starts_with(RESERVED_PATH_PREFIX) || path.starts_with(&uploads.url_prefix) {
            return Err(LoadError::invalid(
                "views.path",
                format!("view path `{path}` overlaps a built-in route"),
            ));
        }
        if !seen.insert(path.clone()) {
            return Err(LoadError::invalid(
                "views.path",
                format!("view path `{path}` is configured more than once"),
            ));
        }

        let template = view
            .template
            .map(|template| template.trim().to_string())
            .filter(|template| !template.is_empty())
            .ok_or_else(|| {
                LoadError::invalid("views.template", format!("view `{path}` has no template"))
            })?;

        let groups: Vec<String> = view
            .groups
            .unwrap_or_default()
            .into_iter()
            .map(|slug| slug.trim().to_string())
            .filter(|slug| !slug.is_empty())
            .collect();
        if groups.is_empty() {
            return Err(LoadError::invalid(
                "views.groups",
                format!("view `{path}` has no groups"),
            ));
        }

        built.push(ViewSettings {
            path,
            template,
            groups,
        });
    }

    Ok(built)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    key_prefix: Option<String>,
    max_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    url_prefix: Option<String>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTemplateSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawViewSettings {
    path: Option<String>,
    template: Option<String>,
    groups: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
