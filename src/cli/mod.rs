// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod service;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// National ID card OCR service
#[derive(Parser, Debug)]
#[command(name = "id-card-ocr")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Extract fields from national ID card photos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API
    Serve(service::ServeArgs),

    /// Consume newline-delimited JSON deliveries from stdin, replying on stdout
    Consume(service::ConsumeArgs),

    /// Extract fields from a single image and print them as JSON
    Extract(service::ExtractArgs),

    /// Print version information
    Version,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => service::serve(args).await,
        Commands::Consume(args) => service::consume(args).await,
        Commands::Extract(args) => service::extract(args).await,
        Commands::Version => {
            println!(
                "{}",
                serde_json::to_string_pretty(&crate::version::get_version_info())?
            );
            Ok(())
        }
    }
}
