//! Inference through the control-plane proxy

use anyhow::Result;

use crate::client::{ApiClient, PredictRequest, PredictResponse};
use crate::output::{print_json, OutputFormat};

pub async fn predict(
    client: &ApiClient,
    address: String,
    features: Vec<f64>,
    format: OutputFormat,
) -> Result<()> {
    let response: PredictResponse = client
        .post("callDeploymentAPI", &PredictRequest { address, features })
        .await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => println!("{}", response.prediction),
    }
    Ok(())
}
