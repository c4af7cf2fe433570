use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_JAR: &str = "server.jar";
pub const DEFAULT_MEMORY: &str = "2G";
pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_JAVA: &str = "java";
pub const DEFAULT_BACKUPS_DIR: &str = "./backups";

/// One configured server. The config store is the single source of truth
/// for directory, jar, memory, and port; lifecycle code never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Display label.
    pub name: String,
    /// Working directory; all lifecycle artifacts live under it.
    pub dir: String,
    /// Launchable jar, relative to `dir`.
    pub jar: String,
    /// Heap size spec passed verbatim to -Xmx/-Xms, e.g. "2G".
    pub memory: String,
    /// Informational only; nothing here binds or probes it.
    pub port: u16,
    /// Reserved. Parsed and persisted, never acted on.
    pub autostart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java: Option<String>,
}

impl ServerDefinition {
    pub fn java_bin(&self) -> &str {
        self.java.as_deref().unwrap_or(DEFAULT_JAVA)
    }

    pub fn jar_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.jar)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backups_dir: PathBuf,
    pub servers: HashMap<String, ServerDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawServerDefinition {
    name: Option<String>,
    dir: String,
    jar: Option<String>,
    memory: Option<String>,
    port: Option<u16>,
    autostart: Option<bool>,
    java: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, toml::Value>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config file is empty")]
    Empty,
    #[error("TOML parse error: {0}")]
    TomlParse(String),
    #[error("unknown field `{field}` in server `{server}`")]
    UnknownField { server: String, field: String },
    #[error("invalid server `{server}`: {reason}")]
    Invalid { server: String, reason: String },
    #[error("{0}")]
    IoError(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let table: HashMap<String, toml::Value> =
        toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

    if table.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut backups_dir = PathBuf::from(DEFAULT_BACKUPS_DIR);
    let mut servers = HashMap::new();

    for (key, value) in table {
        if key == "backups_dir" {
            let dir: String = value
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::TomlParse(e.to_string()))?;
            backups_dir = PathBuf::from(dir);
            continue;
        }

        let raw: RawServerDefinition = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::TomlParse(e.to_string()))?;

        if let Some(field) = raw.extra.keys().next() {
            return Err(ConfigError::UnknownField {
                server: key,
                field: field.clone(),
            });
        }

        let def = ServerDefinition {
            name: raw.name.unwrap_or_else(|| key.clone()),
            dir: raw.dir,
            jar: raw.jar.unwrap_or_else(|| DEFAULT_JAR.to_string()),
            memory: raw.memory.unwrap_or_else(|| DEFAULT_MEMORY.to_string()),
            port: raw.port.unwrap_or(DEFAULT_PORT),
            autostart: raw.autostart.unwrap_or(false),
            java: raw.java,
        };
        validate_definition(&key, &def)?;
        servers.insert(key, def);
    }

    Ok(Config {
        backups_dir,
        servers,
    })
}

/// Reject ids and jars that would escape the working directory, and memory
/// specs the JVM would refuse at launch.
pub fn validate_definition(id: &str, def: &ServerDefinition) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        server: id.to_string(),
        reason,
    };

    if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(invalid("id must not contain '/', '\\', or '..'".to_string()));
    }
    if def.jar.contains("..") || def.jar.contains('/') {
        return Err(invalid("jar must not contain '..' or '/'".to_string()));
    }
    if !is_valid_memory_spec(&def.memory) {
        return Err(invalid(format!("malformed memory spec `{}`", def.memory)));
    }
    Ok(())
}

/// Heap specs the JVM accepts: digits with an optional K/M/G suffix.
fn is_valid_memory_spec(spec: &str) -> bool {
    let digits = spec.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    let suffix_len = spec.len() - digits.len();
    suffix_len <= 1 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Persist the config: write a temp sibling, fsync, rename into place.
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |e: std::io::Error| ConfigError::IoError(format!("{}: {}", path.display(), e));

    let mut table = toml::Table::new();
    table.insert(
        "backups_dir".to_string(),
        toml::Value::String(config.backups_dir.to_string_lossy().into_owned()),
    );
    for (id, def) in &config.servers {
        let value =
            toml::Value::try_from(def).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        table.insert(id.clone(), value);
    }
    let serialized = toml::to_string_pretty(&table).map_err(|e| {
        ConfigError::TomlParse(e.to_string())
    })?;

    let tmp = path.with_extension("toml.tmp");
    {
        let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(serialized.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
