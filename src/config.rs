use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub site: SiteConfig,
    pub buffers: BufferConfig,
}

/// Website behaviour: which container is served and which documents stand in
/// for directory requests and missing objects.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub account_name: String,
    pub container_name: String,
    pub index_document: String,
    pub not_found_document: String,
}

/// Sizing of the shared block-copy buffer pool.
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    /// Largest buffer handed out; bigger segments are copied in chunks of this size.
    pub copy_chunk_size: usize,
    /// Number of idle buffers retained for reuse.
    pub max_pooled_buffers: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            account_name: "devstoreaccount1".into(),
            container_name: "$web".into(),
            index_document: "index.html".into(),
            not_found_document: "404.html".into(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            copy_chunk_size: 1024 * 1024,
            max_pooled_buffers: 32,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Static website emulator for block-backed blob storage")]
pub struct Args {
    /// Host to bind to (overrides STATIC_SITE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides STATIC_SITE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Catalog database URL (overrides STATIC_SITE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum pooled catalog connections (overrides STATIC_SITE_MAX_CONNECTIONS)
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Storage account owning the website container (overrides STATIC_SITE_ACCOUNT)
    #[arg(long)]
    pub account: Option<String>,

    /// Container served as the website (overrides STATIC_SITE_CONTAINER)
    #[arg(long)]
    pub container: Option<String>,

    /// Document served for directory paths (overrides STATIC_SITE_INDEX_DOCUMENT)
    #[arg(long)]
    pub index_document: Option<String>,

    /// Document served with 404 responses (overrides STATIC_SITE_NOT_FOUND_DOCUMENT)
    #[arg(long)]
    pub not_found_document: Option<String>,

    /// Block copy chunk size in bytes (overrides STATIC_SITE_COPY_CHUNK_SIZE)
    #[arg(long)]
    pub copy_chunk_size: Option<usize>,

    /// Idle copy buffers kept for reuse (overrides STATIC_SITE_MAX_POOLED_BUFFERS)
    #[arg(long)]
    pub max_pooled_buffers: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over environment values over defaults.
    ///
    /// `lookup` stands in for `std::env::var` so the precedence rules can be
    /// exercised without touching the process environment.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let site_defaults = SiteConfig::default();
        let buffer_defaults = BufferConfig::default();

        // --- Environment fallback ---
        let env_host = lookup("STATIC_SITE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "STATIC_SITE_PORT")?.unwrap_or(3000);
        let env_db = lookup("STATIC_SITE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/static_site.db".into());
        let env_max_connections = parse_var(&lookup, "STATIC_SITE_MAX_CONNECTIONS")?.unwrap_or(5);
        let env_account = lookup("STATIC_SITE_ACCOUNT").unwrap_or(site_defaults.account_name);
        let env_container =
            lookup("STATIC_SITE_CONTAINER").unwrap_or(site_defaults.container_name);
        let env_index =
            lookup("STATIC_SITE_INDEX_DOCUMENT").unwrap_or(site_defaults.index_document);
        let env_not_found =
            lookup("STATIC_SITE_NOT_FOUND_DOCUMENT").unwrap_or(site_defaults.not_found_document);
        let env_chunk = parse_var(&lookup, "STATIC_SITE_COPY_CHUNK_SIZE")?
            .unwrap_or(buffer_defaults.copy_chunk_size);
        let env_pooled = parse_var(&lookup, "STATIC_SITE_MAX_POOLED_BUFFERS")?
            .unwrap_or(buffer_defaults.max_pooled_buffers);

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            max_connections: args.max_connections.unwrap_or(env_max_connections).max(1),
            site: SiteConfig {
                account_name: args.account.unwrap_or(env_account),
                container_name: args.container.unwrap_or(env_container),
                index_document: args.index_document.unwrap_or(env_index),
                not_found_document: args.not_found_document.unwrap_or(env_not_found),
            },
            buffers: BufferConfig {
                copy_chunk_size: args.copy_chunk_size.unwrap_or(env_chunk).max(1),
                max_pooled_buffers: args.max_pooled_buffers.unwrap_or(env_pooled),
            },
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an optional numeric environment value.
fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> + use<> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_args_or_env() {
        let args = Args::parse_from(["static-site-store"]);
        let cfg = AppConfig::merge(args, lookup_from(&[])).unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.site.container_name, "$web");
        assert_eq!(cfg.site.index_document, "index.html");
        assert_eq!(cfg.site.not_found_document, "404.html");
        assert_eq!(cfg.buffers.copy_chunk_size, 1024 * 1024);
        assert_eq!(cfg.max_connections, 5);
    }

    #[test]
    fn cli_overrides_environment() {
        let args = Args::parse_from([
            "static-site-store",
            "--port",
            "9000",
            "--index-document",
            "default.htm",
        ]);
        let env = lookup_from(&[
            ("STATIC_SITE_PORT", "8000"),
            ("STATIC_SITE_INDEX_DOCUMENT", "home.html"),
            ("STATIC_SITE_NOT_FOUND_DOCUMENT", "missing.html"),
        ]);
        let cfg = AppConfig::merge(args, env).unwrap();

        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.site.index_document, "default.htm");
        assert_eq!(cfg.site.not_found_document, "missing.html");
    }

    #[test]
    fn malformed_numeric_env_is_an_error() {
        let args = Args::parse_from(["static-site-store"]);
        let err = AppConfig::merge(args, lookup_from(&[("STATIC_SITE_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("STATIC_SITE_PORT"));
    }
}
