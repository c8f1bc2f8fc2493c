use crate::capabilities::ChemistryConverter;
use crate::runners::LocalJobStarter;
use crate::tools::ensure_output;
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::ffi::OsString;
use std::path::Path;

pub struct OpenBabel {
    pub obabel_bin: String,
    mgltools: Option<(String, String)>,
}

impl OpenBabel {
    pub fn new(obabel_bin: &str) -> Self {
        Self {
            obabel_bin: obabel_bin.to_string(),
            mgltools: None,
        }
    }

    /// Receptors go through `prepare_receptor4.py` instead of Open Babel.
    pub fn with_mgltools(mut self, python: &str, prepare_receptor_script: &str) -> Self {
        self.mgltools = Some((python.to_string(), prepare_receptor_script.to_string()));
        self
    }
}

fn working_dir(out: &Path) -> &Path {
    out.parent().unwrap_or_else(|| Path::new("."))
}

#[async_trait]
impl ChemistryConverter for OpenBabel {
    async fn ligand_from_smiles(&self, smiles: &str, out: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            format!("-:{smiles}").into(),
            "-opdbqt".into(),
            "-O".into(),
            out.into(),
            "--gen3d".into(),
            "-h".into(),
        ];
        LocalJobStarter::run_tool(&self.obabel_bin, args, working_dir(out)).await?;
        ensure_output("obabel", out).await
    }

    async fn ligand_from_pdb(&self, pdb: &Path, out: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-ipdb".into(),
            pdb.into(),
            "-opdbqt".into(),
            "-O".into(),
            out.into(),
            "-h".into(),
        ];
        LocalJobStarter::run_tool(&self.obabel_bin, args, working_dir(out)).await?;
        ensure_output("obabel", out).await
    }

    async fn receptor_from_pdb(&self, pdb: &Path, out: &Path) -> Result<()> {
        match &self.mgltools {
            Some((python, script)) => {
                info!("Preparing receptor {:?} with prepare_receptor4", pdb);
                let args: Vec<OsString> =
                    vec![script.into(), "-r".into(), pdb.into(), "-o".into(), out.into()];
                LocalJobStarter::run_tool(python, args, working_dir(out)).await?;
                ensure_output("prepare_receptor4", out).await
            }
            None => {
                let args: Vec<OsString> = vec![
                    "-ipdb".into(),
                    pdb.into(),
                    "-opdbqt".into(),
                    "-O".into(),
                    out.into(),
                    "-xr".into(),
                    "-h".into(),
                ];
                LocalJobStarter::run_tool(&self.obabel_bin, args, working_dir(out)).await?;
                ensure_output("obabel", out).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn tool_without_output_is_an_error() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("aspirin.pdbqt");
        // `true` accepts any arguments, exits 0 and writes nothing
        let babel = OpenBabel::new("true");
        let err = babel
            .ligand_from_smiles("CC(=O)OC1=CC=CC=C1C(=O)O", &out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("produced no output"));
    }
}
