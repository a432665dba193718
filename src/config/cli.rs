use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the pagebits binary.
#[derive(Debug, Parser)]
#[command(name = "pagebits", version, about = "Pagebits content server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGEBITS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP services.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override how long a loaded group stays cached.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the prefix of group cache keys.
    #[arg(long = "cache-key-prefix", value_name = "PREFIX")]
    pub cache_key_prefix: Option<String>,

    /// Override the maximum number of cached groups.
    #[arg(long = "cache-max-capacity", value_name = "COUNT")]
    pub cache_max_capacity: Option<u64>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Override the public URL prefix of stored images.
    #[arg(long = "uploads-url-prefix", value_name = "PREFIX")]
    pub uploads_url_prefix: Option<String>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the site templates directory.
    #[arg(long = "templates-directory", value_name = "PATH")]
    pub templates_directory: Option<PathBuf>,
}
