use crate::capabilities::{StructureRepository, StructureSummary};
use crate::tools::checked;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use scraper::{Html, Selector};
use serde::Deserialize;

const SUMMARY_FIELDS: [(&str, &str); 5] = [
    ("PDB ID", "structureID"),
    ("Title", "structureTitle"),
    ("Classification", "header_classification"),
    ("Organism(s)", "header_organism"),
    ("Expression System", "header_expression-system"),
];

pub struct RcsbClient {
    client: reqwest::Client,
    pub files_url: String,
    pub site_url: String,
    pub search_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result_set: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    identifier: String,
}

impl RcsbClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            files_url: "https://files.rcsb.org".to_string(),
            site_url: "https://www.rcsb.org".to_string(),
            search_url: "https://search.rcsb.org/rcsbsearch/v2/query".to_string(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;
        let resp = checked("rcsb", resp)?;
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl StructureRepository for RcsbClient {
    async fn download_structure(&self, id: &str) -> Result<String> {
        info!("Downloading structure {} from RCSB", id);
        self.get_text(&format!("{}/download/{}.pdb", self.files_url, id))
            .await
            .context(format!("Failed to download structure {}", id))
    }

    async fn download_sequence(&self, id: &str) -> Result<String> {
        self.get_text(&format!("{}/fasta/entry/{}", self.site_url, id))
            .await
            .context(format!("Failed to download FASTA for {}", id))
    }

    async fn fetch_summary(&self, id: &str) -> Result<StructureSummary> {
        let html = self
            .get_text(&format!("{}/structure/{}", self.site_url, id))
            .await
            .context(format!("Failed to fetch summary page for {}", id))?;
        Ok(summary_from_html(&html))
    }

    async fn search_by_sequence(&self, sequence: &str) -> Result<Option<String>> {
        let query = serde_json::json!({
            "query": {
                "type": "terminal",
                "service": "sequence",
                "parameters": {
                    "evalue_cutoff": 1,
                    "identity_cutoff": 0.9,
                    "target": "pdb_protein_sequence",
                    "value": sequence,
                }
            },
            "request_options": { "scoring_strategy": "sequence" },
            "return_type": "entry",
        });
        let resp = self.client.post(&self.search_url).json(&query).send().await?;
        // an empty result set comes back as 204 with no body
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body: SearchResponse = checked("rcsb-search", resp)?
            .json()
            .await
            .context("Failed to decode sequence search response")?;
        Ok(body.result_set.into_iter().next().map(|hit| hit.identifier))
    }
}

/// Text content of the element carrying `id`, whitespace collapsed.
fn element_text(document: &Html, id: &str) -> Option<String> {
    let selector = Selector::parse(&format!("#{id}")).ok()?;
    let element = document.select(&selector).next()?;
    let text = element.text().collect::<String>();
    Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn summary_from_html(html: &str) -> StructureSummary {
    let document = Html::parse_document(html);
    StructureSummary {
        fields: SUMMARY_FIELDS
            .iter()
            .map(|(label, id)| {
                let value = element_text(&document, id)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| "Not found".to_string());
                (label.to_string(), value)
            })
            .collect(),
    }
}
