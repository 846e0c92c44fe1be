use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

/// Command-line args; each also reads an environment variable and, when
/// given, overrides the YAML config file.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "microbiome-store",
    version,
    about = "CSV ingestion and query service over the microbiome research store"
)]
pub struct Args {
    /// YAML file with base settings
    #[arg(long, env = "MICROBIOME_CONFIG")]
    pub config: Option<PathBuf>,

    /// DuckDB file, or `:memory:`
    #[arg(long, env = "DATABASE_PATH")]
    pub database: Option<String>,

    #[arg(long, env = "HOST")]
    pub host: Option<IpAddr>,

    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// tracing filter directive, e.g. `info` or `microbiome_store=debug`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
    pub max_upload_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            server: ServerSettings::default(),
            log_level: "info".into(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "microbiome.duckdb".into(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing settings YAML")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults, then the config file (if any), then CLI/env overrides.
    pub fn load(args: &Args) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply(args);
        Ok(settings)
    }

    fn apply(&mut self, args: &Args) {
        if let Some(db) = &args.database {
            self.database.path = db.clone();
        }
        if let Some(host) = args.host {
            self.server.host = host;
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        if let Some(limit) = args.max_upload_bytes {
            self.server.max_upload_bytes = limit;
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let s = Settings::from_yaml_str("server:\n  port: 9001\n")?;
        assert_eq!(s.server.port, 9001);
        assert_eq!(s.database, DatabaseSettings::default());
        assert_eq!(s.log_level, "info");
        Ok(())
    }

    #[test]
    fn args_override_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "database:\n  path: /data/research.duckdb\nlog_level: debug\nserver:\n  port: 7000"
        )?;

        let args = Args {
            config: Some(file.path().to_path_buf()),
            port: Some(8080),
            ..Args::default()
        };
        let s = Settings::load(&args)?;
        assert_eq!(s.database.path, "/data/research.duckdb");
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.bind_addr().port(), 8080);
        Ok(())
    }

    #[test]
    fn cli_flags_parse() {
        let args = Args::parse_from([
            "microbiome-store",
            "--database",
            ":memory:",
            "--port",
            "8123",
        ]);
        assert_eq!(args.database.as_deref(), Some(":memory:"));
        assert_eq!(args.port, Some(8123));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(Settings::from_yaml_str("server: [").is_err());
    }
}
