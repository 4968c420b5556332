// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF Cat — command-line entry point.
//
// Reads a PDF, applies a watermark or a compression strategy, and writes the
// conventionally named artifact. Defaults come from an optional JSON config
// file; flags override them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use pdfcat_core::error::{PdfCatError, Result};
use pdfcat_core::human_errors::humanize_error;
use pdfcat_core::{
    AppConfig, CompressionStrategy, WATERMARKED_FILE_NAME, WatermarkKind, compressed_file_name,
};
use pdfcat_document::{Compressor, PdfDocument, SaveOptions, composite};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pdfcat")]
#[command(version)]
#[command(about = "Watermark and compress PDF files locally", long_about = None)]
struct Cli {
    /// JSON settings file supplying defaults
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw a text or image watermark on every page
    Watermark {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Watermark text (default from config)
        #[arg(long, conflicts_with = "image")]
        text: Option<String>,

        /// PNG or JPEG logo to use instead of text
        #[arg(long, value_name = "FILE")]
        image: Option<PathBuf>,

        /// Text size in points (10-200)
        #[arg(long)]
        font_size: Option<f32>,

        /// Logo size in percent (10-200)
        #[arg(long)]
        scale: Option<f32>,

        /// Opacity (0.0-1.0)
        #[arg(long)]
        opacity: Option<f32>,

        /// Counter-clockwise rotation in degrees (0-360)
        #[arg(long)]
        rotation: Option<f32>,

        /// Horizontal position in percent of page width (0-100)
        #[arg(short = 'x', long)]
        horizontal: Option<f32>,

        /// Vertical position in percent of page height (0-100)
        #[arg(short = 'y', long)]
        vertical: Option<f32>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Reduce file size
    Compress {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// How to shrink the document
        #[arg(long, value_enum, default_value = "rasterize")]
        strategy: StrategyArg,

        /// Page scale factor before rasterizing, in (0, 1]
        #[arg(long)]
        scale: Option<f32>,

        /// JPEG quality, in (0, 1]
        #[arg(long)]
        quality: Option<f32>,

        /// Fail if the output is larger than this many bytes
        #[arg(long, value_name = "BYTES")]
        target_bytes: Option<usize>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Render every page to a JPEG and rebuild the document
    Rasterize,
    /// Clear document metadata and re-save compactly
    StripMetadata,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_or_default(path),
        None => AppConfig::default(),
    };

    match run(cli.command, &config).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, class = ?err.class(), "command failed");
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &AppConfig) -> Result<PathBuf> {
    match command {
        Commands::Watermark {
            input,
            text,
            image,
            font_size,
            scale,
            opacity,
            rotation,
            horizontal,
            vertical,
            output,
        } => {
            let mut settings = config.watermark_settings();
            if let Some(text) = text {
                settings.select(WatermarkKind::Text);
                settings.text = text;
            }
            if let Some(path) = image {
                settings.select(WatermarkKind::Image);
                settings.image = Some(std::fs::read(&path)?.into());
            }
            if let Some(size) = font_size {
                settings.font_size = size;
            }
            if let Some(scale) = scale {
                settings.image_scale_percent = scale;
            }
            let placement = &mut settings.placement;
            if let Some(opacity) = opacity {
                placement.opacity = opacity;
            }
            if let Some(rotation) = rotation {
                placement.rotation_degrees = rotation;
            }
            if let Some(h) = horizontal {
                placement.horizontal_percent = h;
            }
            if let Some(v) = vertical {
                placement.vertical_percent = v;
            }

            let spec = settings.active_spec().ok_or_else(|| {
                PdfCatError::InvalidSettings("watermark needs non-empty text or an image".into())
            })?;

            let document = PdfDocument::parse(&std::fs::read(&input)?)?;
            let watermarked = composite(document, &spec).await?;
            let bytes = watermarked.save(&SaveOptions::from_config(config)).await?;

            write_artifact(&output, WATERMARKED_FILE_NAME, &bytes)
        }

        Commands::Compress {
            input,
            strategy,
            scale,
            quality,
            target_bytes,
            output,
        } => {
            let strategy = match strategy {
                StrategyArg::Rasterize => {
                    let mut spec = config.compression;
                    if let Some(scale) = scale {
                        spec.scale_factor = scale;
                    }
                    if let Some(quality) = quality {
                        spec.quality = quality;
                    }
                    spec.target_max_bytes = target_bytes.or(spec.target_max_bytes);
                    CompressionStrategy::Rasterize(spec)
                }
                StrategyArg::StripMetadata => CompressionStrategy::StripMetadata {
                    target_max_bytes: target_bytes.or(config.compression.target_max_bytes),
                },
            };

            let document = PdfDocument::parse(&std::fs::read(&input)?)?;
            let compressor = Compressor::default().with_save_options(SaveOptions::from_config(config));
            let compressed = compressor
                .compress(&document, &strategy, |fraction| {
                    eprint!("\rCompressing… {:>3.0}%", fraction * 100.0);
                    let _ = std::io::stderr().flush();
                })
                .await;
            eprintln!();
            let compressed = compressed?;

            let name = input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());
            write_artifact(&output, &compressed_file_name(&name), &compressed.bytes)
        }
    }
}

fn write_artifact(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(path)
}
