// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{start_server, ExtractionResponse};
use crate::config::ServiceConfig;
use crate::messaging::{line_deliveries, LineReplyChannel, OcrConsumer};
use crate::pipeline::{ExtractionResult, IdCardPipeline};
use crate::version;
use crate::vision::ModelRegistry;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, env = "API_HOST")]
    pub host: Option<String>,

    /// Port
    #[arg(long, env = "API_PORT")]
    pub port: Option<u16>,

    /// Load models on first request instead of at startup
    #[arg(long)]
    pub lazy: bool,
}

/// Arguments for the consume command
#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Load models on first message instead of at startup
    #[arg(long)]
    pub lazy: bool,
}

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to the ID card photo
    pub image: PathBuf,

    /// Request id naming the isolation directory (random by default)
    #[arg(long)]
    pub request_id: Option<String>,
}

fn load_config() -> Result<ServiceConfig> {
    let config = ServiceConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Run the HTTP API until shutdown
pub async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = args.host {
        config.api_host = host;
    }
    if let Some(port) = args.port {
        config.api_port = port;
    }

    info!("Starting {}", version::get_version_string());
    let registry = Arc::new(ModelRegistry::new(config.models.clone()));

    if config.preload_models && !args.lazy {
        // A missing model leaves /health reporting false; requests retry loading
        if let Err(e) = registry.preload().await {
            warn!("Continuing without preloaded models: {:#}", e);
        }
    }

    start_server(config, registry)
        .await
        .map_err(|e| anyhow!("HTTP server failed: {}", e))
}

/// Consume deliveries from stdin until it closes
pub async fn consume(args: ConsumeArgs) -> Result<()> {
    let config = load_config()?;

    info!("Starting {} consumer", version::get_version_string());
    let registry = Arc::new(ModelRegistry::new(config.models.clone()));

    if config.preload_models && !args.lazy {
        registry.preload().await?;
    }

    let channel = Arc::new(LineReplyChannel::new(tokio::io::stdout()));
    let consumer = OcrConsumer::new(registry, config.pipeline, channel);
    info!("✓ OCR Service is ready to accept requests");

    let stats = consumer
        .run(line_deliveries(BufReader::new(tokio::io::stdin())))
        .await;
    info!("Consumer stopped: {:?}", stats);

    Ok(())
}

/// Extract one image and print the record
pub async fn extract(args: ExtractArgs) -> Result<()> {
    let config = load_config()?;
    let registry = ModelRegistry::new(config.models.clone());
    let models = registry.models().await.context("Failed to load models")?;

    let pipeline = IdCardPipeline::new(models, config.pipeline);
    let request_id = args
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let image = args.image;

    let result = tokio::task::spawn_blocking(move || pipeline.process(&image, &request_id))
        .await
        .context("Extraction task failed")?;

    match result {
        ExtractionResult::Success(fields) => {
            let response = ExtractionResponse::from(fields);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        ExtractionResult::Failure { kind, message } => Err(anyhow!("{} ({})", kind, message)),
    }
}
