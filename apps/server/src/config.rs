use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] io::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no configuration directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: Http,
    pub storage: Storage,
    pub scheduler: Scheduler,
    pub transport: Transport,
    pub log: Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Configuration document holding settings and endpoints
    pub path: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub reconcile_seconds: u64,
    pub event_buffer: usize,
    /// Probe results kept per endpoint
    pub max_history_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transport {
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    pub level: String,
}

impl Default for Http {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self { path: default_data_path() }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            reconcile_seconds: 30,
            event_buffer: 256,
            max_history_records: vigil::registry::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self { user_agent: vigil::probe::DEFAULT_USER_AGENT.into() }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

fn home_subdir(xdg_var: &str, fallback: &str) -> Option<path::PathBuf> {
    if let Ok(dir) = env::var(xdg_var) {
        Some(path::PathBuf::from(dir))
    } else {
        env::home_dir().map(|home| home.join(fallback))
    }
}

/// Get default config path ($XDG_CONFIG_HOME/vigil/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    home_subdir("XDG_CONFIG_HOME", ".config")
        .map(|dir| dir.join("vigil/config.toml"))
        .ok_or(Error::ConfigPathUnavailable)
}

/// Get default document path ($XDG_DATA_HOME/vigil/config.json or
/// $HOME/.local/share/...), falling back to the working directory
fn default_data_path() -> path::PathBuf {
    home_subdir("XDG_DATA_HOME", ".local/share")
        .map(|dir| dir.join("vigil/config.json"))
        .unwrap_or_else(|| path::PathBuf::from("vigil-config.json"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "HTTP")?;
        write_1(f, "Bind Address", &self.http.bind)?;
        write_1(f, "Port", &self.http.port)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Document", &self.storage.path.display())?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Reconcile Interval (s)", &self.scheduler.reconcile_seconds)?;
        write_1(f, "Event Buffer", &self.scheduler.event_buffer)?;
        write_1(f, "History Records", &self.scheduler.max_history_records)?;
        write_title_1(f, "Transport")?;
        write_1(f, "User Agent", &self.transport.user_agent)?;
        write_title_1(f, "Log")?;
        write_1(f, "Level", &self.log.level)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/vigil/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str()).map_err(|err| Error::ParseFailed(config_path, err))
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(parent.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil").join("server");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.http, Http::default());
        assert!(dir.path().join("vigil").join("server.toml").exists());

        let reread = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[http]\nport = 9090\n\n[storage]\npath = \"/tmp/vigil.json\"\n\n[scheduler]\nmax_history_records = 5\n",
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.http.bind, "0.0.0.0");
        assert_eq!(config.storage.path, path::PathBuf::from("/tmp/vigil.json"));
        assert_eq!(config.scheduler.max_history_records, 5);
        assert_eq!(config.scheduler.reconcile_seconds, 30);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[http\nport = ").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(..))));
    }
}
