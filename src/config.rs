//! Diagnosis system configuration.
//!
//! TOML file under the user's home directory, created with defaults on
//! first run. Every section is optional; partial files keep the defaults
//! for whatever they omit.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::llama::DEFAULT_MODEL;
use crate::errors::{DiagnosisError, Result};
use crate::knowledge::SourceParams;
use crate::monitor::MonitorConfig;
use crate::retrieval::DEFAULT_EMBEDDING_MODEL;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub knowledge: KnowledgeConfig,
    pub monitor: MonitorSettings,
    pub artifacts: ArtifactsConfig,
    pub diagnosis: DiagnosisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    /// How long to wait for the model server to report ready
    pub startup_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            model: DEFAULT_MODEL.to_string(),
            startup_timeout_secs: 600,
        }
    }
}

impl ServerConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub disease_path: PathBuf,
    pub crop_path: PathBuf,
    pub treatment_path: PathBuf,
    /// Character cap for one knowledge chunk
    pub max_words: usize,
    pub embedding_model: String,
    pub disease: RetrievalSettings,
    pub crop: RetrievalSettings,
    pub treatment: RetrievalSettings,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            disease_path: PathBuf::from("knowledge/diseases.json"),
            crop_path: PathBuf::from("knowledge/crops.json"),
            treatment_path: PathBuf::from("knowledge/treatments.json"),
            max_words: 512,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            disease: RetrievalSettings::new(8),
            crop: RetrievalSettings::new(5),
            treatment: RetrievalSettings::new(10),
        }
    }
}

/// Per-source retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Squared-distance cutoff; `<= 0` disables the filter
    pub score_threshold: f32,
    /// Character budget for one merged evidence neighborhood
    pub chunk_size_budget: usize,
    /// When false the source answers from the lexical lookup instead
    pub eager: bool,
}

impl RetrievalSettings {
    fn new(top_k: usize) -> Self {
        Self {
            top_k,
            score_threshold: 0.0,
            chunk_size_budget: 1024,
            eager: true,
        }
    }

    pub fn source_params(&self) -> SourceParams {
        SourceParams {
            top_k: self.top_k,
            score_threshold: self.score_threshold,
            chunk_size_budget: self.chunk_size_budget,
            eager: self.eager,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::new(8)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    /// Path whose backing disk is watched, typically the model weights
    pub watch_path: PathBuf,
    pub enabled: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            watch_path: PathBuf::from("."),
            enabled: true,
        }
    }
}

impl MonitorSettings {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            watch_path: self.watch_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub briefing_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            briefing_dir: PathBuf::from("briefings"),
            report_dir: PathBuf::from("fullreports"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    pub system_prompt: String,
    /// Directory holding `<stem>.txt` symptom detection results
    pub roi_dir: PathBuf,
    /// Detection label names indexed by class id
    pub symptom_classes: Vec<String>,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            system_prompt: "你是一名植物病害诊断专家，请基于输入图像与农业背景知识，逐步完成作物病害的识别、分析与防治建议。".to_string(),
            roi_dir: PathBuf::from("cache"),
            symptom_classes: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration, creating the default file if it doesn't exist.
    ///
    /// An explicit path must exist; the implicit home-directory path is
    /// created with defaults on first run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path()?;
                if !path.exists() {
                    let config = Config::default();
                    config.save_to(&path)?;
                    return Ok(config);
                }
                Self::load_from(&path)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            DiagnosisError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        toml::from_str(&contents).map_err(|err| {
            DiagnosisError::Config(format!("cannot parse {}: {err}", path.display()))
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                DiagnosisError::Config(format!(
                    "cannot create config directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let toml_string = toml::to_string_pretty(self)
            .map_err(|err| DiagnosisError::Config(format!("cannot serialize config: {err}")))?;
        fs::write(path, toml_string).map_err(|err| {
            DiagnosisError::Config(format!("cannot write {}: {err}", path.display()))
        })
    }

    /// Default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| DiagnosisError::Config("no home directory".to_string()))?;
        Ok(home.join(".plantdoc").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.model, "plant-qwen2.5-vl");
        assert_eq!(config.knowledge.disease.top_k, 8);
        assert_eq!(config.knowledge.crop.top_k, 5);
        assert_eq!(config.knowledge.treatment.top_k, 10);
        assert!(config.knowledge.treatment.eager);
        assert_eq!(config.monitor.interval_secs, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
port = 9090

[knowledge.disease]
top_k = 3
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.knowledge.disease.top_k, 3);
        assert_eq!(config.knowledge.disease.chunk_size_budget, 1024);
        assert_eq!(config.knowledge.crop.top_k, 5);
    }

    #[test]
    fn test_source_params_mapping() {
        let settings = RetrievalSettings {
            top_k: 4,
            score_threshold: 1.5,
            chunk_size_budget: 300,
            eager: false,
        };
        let params = settings.source_params();
        assert_eq!(params.top_k, 4);
        assert_eq!(params.score_threshold, 1.5);
        assert_eq!(params.chunk_size_budget, 300);
        assert!(!params.eager);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server.port = 9001;
        config.diagnosis.symptom_classes = vec!["叶斑".to_string(), "黄化".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 9001);
        assert_eq!(loaded.diagnosis.symptom_classes.len(), 2);
    }

    #[test]
    fn test_explicit_missing_path_errors() {
        let err = Config::load_from(Path::new("/nonexistent/plantdoc.toml")).unwrap_err();
        assert!(matches!(err, DiagnosisError::Config(_)));
    }
}
