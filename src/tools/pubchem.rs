use crate::capabilities::CompoundLookup;
use crate::tools::checked;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

pub struct PubChemClient {
    client: reqwest::Client,
    pub base_url: String,
}

impl PubChemClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://pubchem.ncbi.nlm.nih.gov/rest/pug".to_string(),
        }
    }

    fn property_url(&self, name: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).context("Invalid PubChem base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("PubChem base URL cannot carry a path"))?
            .extend(["compound", "name", name, "property", "IsomericSMILES", "JSON"]);
        Ok(url)
    }
}

/// Newer PubChem responses report the isomeric form under `SMILES`.
fn smiles_from_response(body: &Value) -> Option<String> {
    let props = body["PropertyTable"]["Properties"].get(0)?;
    props["IsomericSMILES"]
        .as_str()
        .or_else(|| props["SMILES"].as_str())
        .map(str::to_string)
}

#[async_trait]
impl CompoundLookup for PubChemClient {
    async fn smiles_for_name(&self, name: &str) -> Result<Option<String>> {
        let url = self.property_url(name)?;
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("PubChem has no compound named {}", name);
            return Ok(None);
        }
        let body: Value = checked("pubchem", resp)?
            .json()
            .await
            .context("Failed to decode PubChem response")?;
        Ok(smiles_from_response(&body))
    }
}
