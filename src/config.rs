//! Configuration management for the assembler

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub assembler: AssemblerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// JSON manifest produced by the manifest parser
    pub manifest_path: PathBuf,
    /// Directory holding the unpacked publication; defaults to the
    /// manifest's directory
    pub content_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssemblerConfig {
    /// Per-resource fetch limit in seconds, 0 disables it
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Destination of the flattened document, stdout when unset
    pub path: Option<PathBuf>,
    /// Page to open at, as a `file` token or page id
    pub bookmark: Option<String>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl AssemblerConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        match self.fetch_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl SourceConfig {
    pub fn content_root(&self) -> PathBuf {
        match &self.content_root {
            Some(root) => root.clone(),
            None => self
                .manifest_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: SourceConfig {
                manifest_path: PathBuf::from(DEFAULT_MANIFEST),
                content_root: None,
            },
            assembler: AssemblerConfig::default(),
            output: OutputConfig {
                path: None,
                bookmark: None,
            },
        }
    }
}

impl Config {
    /// Read settings from the environment.
    ///
    /// Unset variables fall back to their defaults; only a variable that is
    /// set to non-unicode data is an error.
    pub fn from_env() -> Result<Self, env::VarError> {
        let manifest_path = match env::var("ASSEMBLER_MANIFEST") {
            Ok(path) => path,
            Err(env::VarError::NotPresent) => DEFAULT_MANIFEST.to_string(),
            Err(e) => return Err(e),
        };

        Ok(Config {
            source: SourceConfig {
                manifest_path: PathBuf::from(manifest_path),
                content_root: env::var("ASSEMBLER_CONTENT_ROOT").ok().map(PathBuf::from),
            },
            assembler: AssemblerConfig {
                fetch_timeout_secs: env::var("ASSEMBLER_FETCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_FETCH_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            },
            output: OutputConfig {
                path: env::var("ASSEMBLER_OUTPUT").ok().map(PathBuf::from),
                bookmark: env::var("ASSEMBLER_BOOKMARK").ok(),
            },
        })
    }
}
