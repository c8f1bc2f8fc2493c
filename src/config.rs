use crate::error::PipelineError;
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Tool locations, service endpoints and retry budgets.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub template_path: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub obabel_bin: String,
    pub vina_bin: String,
    pub plip_bin: String,
    pub mgltools_python: Option<String>,
    pub prepare_receptor_script: Option<String>,
    pub max_run_attempts: u32,
    pub restart_backoff_secs: u64,
    pub max_answer_attempts: u32,
    pub docking_exhaustiveness: u32,
    pub reference_exhaustiveness: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            template_path: "./config/template.txt".to_string(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o".to_string(),
            llm_api_key: None,
            obabel_bin: "obabel".to_string(),
            vina_bin: "vina".to_string(),
            plip_bin: "plip".to_string(),
            mgltools_python: None,
            prepare_receptor_script: None,
            max_run_attempts: 5,
            restart_backoff_secs: 2,
            max_answer_attempts: 5,
            docking_exhaustiveness: 1,
            reference_exhaustiveness: 8,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        Ok(config)
    }

    pub fn load(file_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = file_path {
            info!("Loading config from file: {:?}", path);
            Self::from_file(path)?
        } else {
            Config::default()
        };
        config.apply_env(|name| env::var(name).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("DRUG_REALIGN_TEMPLATE") {
            self.template_path = val;
        }
        if let Some(val) = var("OPENAI_API_KEY") {
            self.llm_api_key = Some(val);
        }
        if let Some(val) = var("OPENAI_BASE_URL") {
            self.llm_base_url = val;
        }
        if let Some(val) = var("DRUG_REALIGN_MODEL") {
            self.llm_model = val;
        }
        if let Some(val) = var("OBABEL_BIN") {
            self.obabel_bin = val;
        }
        if let Some(val) = var("VINA_BIN") {
            self.vina_bin = val;
        }
        if let Some(val) = var("PLIP_BIN") {
            self.plip_bin = val;
        }
        if let Some(val) = var("MGLTOOLS_PYTHON") {
            self.mgltools_python = Some(val);
        }
        if let Some(val) = var("PREPARE_RECEPTOR_SCRIPT") {
            self.prepare_receptor_script = Some(val);
        }
    }

    /// Configured tool paths that cannot be resolved abort before any run starts.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        match (&self.mgltools_python, &self.prepare_receptor_script) {
            (Some(python), Some(script)) => {
                for (label, path) in [("MGLTools python", python), ("prepare_receptor4 script", script)] {
                    if !Path::new(path).exists() {
                        return Err(PipelineError::Config(format!(
                            "{label} not found at {path}"
                        )));
                    }
                }
            }
            (None, None) => {}
            _ => {
                return Err(PipelineError::Config(
                    "MGLTools python and prepare_receptor4 script must be configured together"
                        .to_string(),
                ))
            }
        }
        if self.max_run_attempts == 0 || self.max_answer_attempts == 0 {
            return Err(PipelineError::Config(
                "retry budgets must allow at least one attempt".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(&path, r#"{"vina_bin": "/opt/vina/bin/vina", "max_run_attempts": 3}"#)
            .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.vina_bin, "/opt/vina/bin/vina");
        assert_eq!(config.max_run_attempts, 3);
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.docking_exhaustiveness, 1);
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [("VINA_BIN", "qvina"), ("OPENAI_API_KEY", "sk-test")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.vina_bin, "qvina");
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.obabel_bin, "obabel");
    }

    #[test]
    fn missing_receptor_tool_is_fatal() {
        let config = Config {
            mgltools_python: Some("/nonexistent/MGLpython2.5".into()),
            prepare_receptor_script: Some("/nonexistent/prepare_receptor4.py".into()),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());

        let half = Config {
            mgltools_python: Some("/usr/bin/python".into()),
            ..Config::default()
        };
        assert!(half.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
