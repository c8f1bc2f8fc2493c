use crate::capabilities::InteractionAnalyzer;
use crate::interactions::summarize_report;
use crate::runners::LocalJobStarter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub struct Plip {
    pub plip_bin: String,
}

impl Plip {
    pub fn new(plip_bin: &str) -> Self {
        Self {
            plip_bin: plip_bin.to_string(),
        }
    }

    async fn run_plip(&self, complex: &Path, flag: &str, out_dir: &Path) -> Result<()> {
        let complex = fs::canonicalize(complex)
            .await
            .context(format!("Structure not found: {:?}", complex))?;
        fs::create_dir_all(out_dir).await?;
        let args: Vec<OsString> = vec![
            "-f".into(),
            complex.into(),
            flag.into(),
            "--out".into(),
            out_dir.into(),
        ];
        LocalJobStarter::run_tool(&self.plip_bin, args, out_dir).await?;
        Ok(())
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("plip-{}", Uuid::new_v4().simple()))
}

#[async_trait]
impl InteractionAnalyzer for Plip {
    async fn interaction_report(&self, complex: &Path) -> Result<String> {
        let scratch = scratch_dir();
        let outcome = async {
            self.run_plip(complex, "-t", &scratch).await?;
            let report = fs::read_to_string(scratch.join("report.txt"))
                .await
                .context("PLIP wrote no report.txt")?;
            Ok::<_, anyhow::Error>(summarize_report(&report))
        }
        .await;
        if let Err(e) = fs::remove_dir_all(&scratch).await {
            warn!("Could not clean PLIP scratch dir {:?}: {}", scratch, e);
        }
        outcome
    }

    async fn visualize(&self, complex: &Path, out_dir: &Path) -> Result<()> {
        info!("Rendering interaction session for {:?}", complex);
        self.run_plip(complex, "-y", out_dir).await?;
        let pattern = format!("{}/*.pse", glob::Pattern::escape(&out_dir.to_string_lossy()));
        let sessions = glob::glob(&pattern)?.filter_map(|p| p.ok()).count();
        if sessions == 0 {
            anyhow::bail!("PSE file not found in {:?}", out_dir);
        }
        Ok(())
    }
}
