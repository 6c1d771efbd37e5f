//! Server-side configuration, read from a TOML file.
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/hypervisor"
//!
//! [resolver]
//! max_closure_passes = 64
//!
//! [log]
//! filter = "info,hypervisor=debug"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Directory searched for bare context names.
const CONTEXT_DIR: &str = "/etc/hypervisor";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,

    /// Overrides `{data_dir}/hypervisor.sqlite`.
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_max_closure_passes")]
    pub max_closure_passes: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_closure_passes: default_max_closure_passes(),
        }
    }
}

fn default_max_closure_passes() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Map a context name to `/etc/hypervisor/<name>.toml`.
    /// Anything containing `/` or `.` is taken as a path.
    pub fn resolve_path(context: &str) -> PathBuf {
        if context.contains('/') || context.contains('.') {
            PathBuf::from(context)
        } else {
            Path::new(CONTEXT_DIR).join(format!("{}.toml", context))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Refuse to start on a configuration that cannot work.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.storage.data_dir.trim().is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.resolver.max_closure_passes == 0 {
        anyhow::bail!("resolver.max_closure_passes must be at least 1.");
    }
    Ok(())
}
