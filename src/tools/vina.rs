//! Molecular docking using AutoDock Vina.

use crate::capabilities::{DockingEngine, DockingRequest};
use crate::runners::LocalJobStarter;
use crate::structure::first_vina_energy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::ffi::OsString;
use std::path::Path;

/// Wrapper for AutoDock Vina execution.
pub struct Vina {
    pub vina_bin: String,
}

impl Vina {
    pub fn new(vina_bin: &str) -> Self {
        Self {
            vina_bin: vina_bin.to_string(),
        }
    }

    fn args(req: &DockingRequest<'_>) -> Vec<OsString> {
        let b = req.docking_box;
        let mut args: Vec<OsString> = vec![
            "--receptor".into(),
            req.receptor.into(),
            "--ligand".into(),
            req.ligand.into(),
        ];
        for (axis, i) in [("x", 0), ("y", 1), ("z", 2)] {
            args.push(format!("--center_{axis}").into());
            args.push(format!("{:.3}", b.center[i]).into());
        }
        for (axis, i) in [("x", 0), ("y", 1), ("z", 2)] {
            args.push(format!("--size_{axis}").into());
            args.push(format!("{:.3}", b.size[i]).into());
        }
        args.push("--exhaustiveness".into());
        args.push(req.exhaustiveness.to_string().into());
        args.push("--out".into());
        args.push(req.out.into());
        args
    }
}

#[async_trait]
impl DockingEngine for Vina {
    async fn dock(&self, req: &DockingRequest<'_>) -> Result<f64> {
        info!("Running AutoDock Vina on {:?}", req.ligand);
        let cwd = req.out.parent().unwrap_or_else(|| Path::new("."));
        LocalJobStarter::run_tool(&self.vina_bin, Self::args(req), cwd).await?;

        let poses = tokio::fs::read_to_string(req.out)
            .await
            .context(format!("Vina wrote no poses to {:?}", req.out))?;
        let energy = first_vina_energy(&poses)
            .ok_or_else(|| anyhow::anyhow!("No VINA RESULT record in {:?}", req.out))?;
        debug!("AutoDock Vina completed successfully, best energy {}", energy);
        Ok(energy)
    }
}
