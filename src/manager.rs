use crate::backup::{self, BackupRecord};
use crate::config::{Config, ServerDefinition};
use crate::paths::ServerPaths;
use crate::{log, pid, process, stats};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Every public operation resolves to one of these; precondition and
/// environment failures are messages, never panics or propagated errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Computed fresh on every call; nothing here is cached or persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub id: String,
    pub name: String,
    pub dir: String,
    pub port: u16,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
}

/// The lifecycle facade. Holds the loaded config and one lazily-created
/// mutex per server id, held across the whole check-and-mutate span of
/// start/stop so concurrent transitions for the same server serialize.
/// Locks are never removed; the set of ids is small and bounded.
pub struct Manager {
    config: Config,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Manager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn definition(&self, id: &str) -> Option<&ServerDefinition> {
        self.config.servers.get(id)
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// The liveness oracle. Unknown ids are simply not running.
    pub fn is_running(&self, id: &str) -> bool {
        let Some(def) = self.definition(id) else {
            return false;
        };
        pid::is_marker_alive(&ServerPaths::new(&def.dir)).unwrap_or(false)
    }

    pub async fn status(&self, id: &str) -> Option<ServerStatus> {
        let def = self.definition(id)?;
        Some(self.status_for(id, def).await)
    }

    pub async fn list_servers(&self) -> Vec<ServerStatus> {
        let mut ids: Vec<&String> = self.config.servers.keys().collect();
        ids.sort();

        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            let def = &self.config.servers[id];
            statuses.push(self.status_for(id, def).await);
        }
        statuses
    }

    async fn status_for(&self, id: &str, def: &ServerDefinition) -> ServerStatus {
        let paths = ServerPaths::new(&def.dir);
        let running = pid::is_marker_alive(&paths).unwrap_or(false);

        let mut status = ServerStatus {
            id: id.to_string(),
            name: def.name.clone(),
            dir: def.dir.clone(),
            port: def.port,
            running,
            pid: None,
            cpu_percent: None,
            memory_mb: None,
        };

        if running && let Some(pid_value) = pid::read_pid_marker(&paths) {
            status.pid = Some(pid_value);
            if let Some(sample) = stats::sample(pid_value).await {
                status.cpu_percent = Some(sample.cpu_percent);
                status.memory_mb = Some(sample.memory_mb);
            }
        }
        status
    }

    pub async fn start(&self, id: &str) -> Outcome {
        let Some(def) = self.definition(id) else {
            return Outcome::fail(format!("server '{id}' not found in configuration"));
        };

        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let paths = ServerPaths::new(&def.dir);
        if pid::is_marker_alive(&paths).unwrap_or(false) {
            return Outcome::fail(format!("server '{id}' is already running"));
        }

        match process::spawn_server(def, &paths) {
            Ok(pid_value) => Outcome::ok(format!("server '{id}' started (pid {pid_value})")),
            Err(e) => Outcome::fail(format!("failed to start '{id}': {e}")),
        }
    }

    /// Request shutdown. Returns once the graceful signal is sent; kill
    /// escalation and marker cleanup continue in the background. With
    /// `wait`, blocks until exit is confirmed instead.
    pub async fn stop(&self, id: &str, wait: bool) -> Outcome {
        let Some(def) = self.definition(id) else {
            return Outcome::fail(format!("server '{id}' not found in configuration"));
        };

        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let paths = ServerPaths::new(&def.dir);
        if !pid::is_marker_alive(&paths).unwrap_or(false) {
            return Outcome::fail(format!("server '{id}' is not running"));
        }
        let Some(pid_value) = pid::read_pid_marker(&paths) else {
            return Outcome::fail(format!("server '{id}' is not running"));
        };

        let result = if wait {
            process::stop_and_wait(pid_value, &paths).await
        } else {
            process::request_stop(pid_value, &paths)
        };

        match result {
            Ok(()) if wait => Outcome::ok(format!("server '{id}' stopped")),
            Ok(()) => Outcome::ok(format!("server '{id}' stopping (pid {pid_value})")),
            Err(e) => Outcome::fail(format!("failed to stop '{id}': {e}")),
        }
    }

    /// Last `lines` of console output, oldest first. `None` for unknown
    /// ids; a server that never started yields an empty list.
    pub fn console(&self, id: &str, lines: usize) -> Option<Vec<String>> {
        let def = self.definition(id)?;
        Some(log::console_output(&ServerPaths::new(&def.dir), lines))
    }

    pub fn create_backup(&self, id: &str) -> Outcome {
        let Some(def) = self.definition(id) else {
            return Outcome::fail(format!("server '{id}' not found in configuration"));
        };

        let paths = ServerPaths::new(&def.dir);
        match backup::create_backup(id, paths.working_dir(), &self.config.backups_dir) {
            Ok(name) => Outcome::ok(format!("backup created: {name}")),
            Err(e) => Outcome::fail(format!("failed to back up '{id}': {e}")),
        }
    }

    pub fn backups(&self, id: Option<&str>) -> Vec<BackupRecord> {
        match backup::list_backups(&self.config.backups_dir, id) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list backups");
                Vec::new()
            }
        }
    }
}
