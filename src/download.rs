//! Downloads the gage document from the NWS.

use anyhow::{Error, Result};
use tracing::info;

/// Fetches the document at `url`. Transport errors and non-success
/// responses are errors.
pub async fn fetch_document(url: &str) -> Result<Vec<u8>, Error> {
    info!("url to open: {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::msg(format!("Failed to download document: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download document: {}",
            response.status()
        )));
    }

    let bytes = response.bytes().await?;

    Ok(bytes.to_vec())
}
