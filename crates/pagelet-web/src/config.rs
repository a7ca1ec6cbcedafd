use pagelet_core::ScriptLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "pagelet.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {} as SiteConfig: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub root_path: PathBuf,
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    #[serde(default = "default_template_file")]
    pub template_file: String,
    #[serde(default = "default_index_page")]
    pub index_page: String,
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u64,
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_script_extension() -> String {
    "js".to_string()
}

fn default_template_file() -> String {
    "index.tmpl".to_string()
}

fn default_index_page() -> String {
    "index".to_string()
}

fn default_max_loop_iterations() -> u64 {
    ScriptLimits::default().max_loop_iterations
}

fn default_max_recursion_depth() -> usize {
    ScriptLimits::default().max_recursion_depth
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl SiteConfig {
    pub fn minimal(root_path: PathBuf) -> Self {
        Self {
            root_path,
            script_extension: default_script_extension(),
            template_file: default_template_file(),
            index_page: default_index_page(),
            max_loop_iterations: default_max_loop_iterations(),
            max_recursion_depth: default_max_recursion_depth(),
            max_body_bytes: default_max_body_bytes(),
        }
    }

    pub fn script_limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_loop_iterations: self.max_loop_iterations,
            max_recursion_depth: self.max_recursion_depth,
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.root_path.join(&self.template_file)
    }

    /// File name of the script that serves `/`.
    pub fn index_script(&self) -> String {
        format!("{}.{}", self.index_page, self.script_extension)
    }
}

/// Reads `pagelet.json` from the content root, falling back to defaults.
///
/// A relative `rootPath` is resolved against `root`.
pub fn load_site_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(SiteConfig::minimal(root.to_path_buf()));
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let mut cfg = serde_json::from_str::<SiteConfig>(&content)
        .map_err(|source| ConfigError::Parse { path, source })?;

    if cfg.root_path.as_os_str().is_empty() {
        cfg.root_path = root.to_path_buf();
    }
    if !cfg.root_path.is_absolute() {
        cfg.root_path = root.join(&cfg.root_path);
    }
    if cfg.script_extension.is_empty() {
        cfg.script_extension = default_script_extension();
    }
    if cfg.max_loop_iterations == 0 {
        cfg.max_loop_iterations = default_max_loop_iterations();
    }
    if cfg.max_recursion_depth == 0 {
        cfg.max_recursion_depth = default_max_recursion_depth();
    }

    Ok(cfg)
}
