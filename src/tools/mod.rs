pub mod obabel;
pub mod openai;
pub mod plip;
pub mod pubchem;
pub mod rcsb;
pub mod vina;

use crate::capabilities::Toolbox;
use crate::config::Config;
use crate::error::PipelineError;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Turns an unsuccessful response into a typed status error so the
/// supervisor can tell client errors from outages.
pub(crate) fn checked(service: &'static str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(PipelineError::Status {
        service,
        status: status.as_u16(),
        url: resp.url().to_string(),
    }
    .into())
}

/// Tools that write their own output must leave a non-empty file behind.
pub(crate) async fn ensure_output(tool: &str, out: &Path) -> Result<()> {
    match tokio::fs::metadata(out).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => anyhow::bail!("{} produced no output at {:?}", tool, out),
    }
}

pub fn toolbox_from_config(config: &Config) -> Result<Toolbox> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("drug-realign/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut chemistry = obabel::OpenBabel::new(&config.obabel_bin);
    if let (Some(python), Some(script)) = (&config.mgltools_python, &config.prepare_receptor_script)
    {
        chemistry = chemistry.with_mgltools(python, script);
    }

    Ok(Toolbox {
        structures: Arc::new(rcsb::RcsbClient::new(client.clone())),
        compounds: Arc::new(pubchem::PubChemClient::new(client.clone())),
        chemistry: Arc::new(chemistry),
        docking: Arc::new(vina::Vina::new(&config.vina_bin)),
        interactions: Arc::new(plip::Plip::new(&config.plip_bin)),
        llm: Arc::new(openai::OpenAiChat::new(
            client,
            &config.llm_base_url,
            &config.llm_model,
            config.llm_api_key.clone(),
        )),
    })
}
