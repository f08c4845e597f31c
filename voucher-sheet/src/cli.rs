/// # voucher-sheet CLI Interface (Module)
///
/// Command parsing and orchestration for the `voucher-sheet` binary. All layout, PDF,
/// export and persistence logic lives in [`voucher-sheet-core`]; this module only wires
/// configuration, batch files and credentials into it.
///
/// ## Commands
/// - `sheet`: print a batch file to a PDF sheet in `output_dir`.
/// - `export`: download a server-side export into `output_dir` with a bearer token.
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
///
/// [`voucher-sheet-core`]: ../../voucher_sheet_core/
use crate::batch::load_batch;
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use voucher_sheet_core::assemble::ArtifactBuilder;
use voucher_sheet_core::export::{BearerToken, ExportDispatcher};
use voucher_sheet_core::persist::save_artifact;
use voucher_sheet_core::render::DigestGlyphRenderer;

/// Print voucher batches to PDF sheets and fetch authenticated exports.
#[derive(Parser)]
#[clap(
    name = "voucher-sheet",
    version,
    about = "Print voucher code batches to PDF sheets and download authenticated exports"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a batch file to a printable PDF sheet
    Sheet {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the JSON batch file
        #[clap(long)]
        batch: PathBuf,
    },
    /// Download a server-side export file
    Export {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Export path, relative to the configured base URL
        #[clap(long)]
        path: String,
        /// Filename to use when the server does not name the file
        #[clap(long)]
        fallback: String,
        /// Bearer token for the export endpoint
        #[clap(long, env = "VOUCHER_SHEET_TOKEN", hide_env_values = true)]
        token: String,
    },
}

/// Async CLI entrypoint shared by `main` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sheet { config, batch } => {
            let config = load_config(config)?;
            let batch = load_batch(batch)?;
            tracing::info!(command = "sheet", "Building voucher sheet");

            let items = batch.printable_items();
            let header = batch.header();
            let builder = ArtifactBuilder::new(config.layout, batch.owner.clone())
                .with_skip_policy(config.policy);
            let result = builder
                .render_and_build(
                    &items,
                    &header,
                    &DigestGlyphRenderer::default(),
                    chrono::Utc::now(),
                )
                .await
                .map_err(|e| {
                    tracing::error!(command = "sheet", error = %e, "Sheet build failed");
                    anyhow::Error::new(e)
                })?;

            let saved = save_artifact(
                &config.output_dir,
                &result.suggested_filename,
                &result.binary,
            )?;
            tracing::info!(command = "sheet", path = %saved.display(), "Sheet complete");
            println!("{}", result.status_line());
            println!("{}", saved.display());
            Ok(())
        }
        Commands::Export {
            config,
            path,
            fallback,
            token,
        } => {
            let config = load_config(config)?;
            let Some(export) = config.export.as_ref() else {
                tracing::error!(command = "export", "No export section in config");
                anyhow::bail!("Config has no `export` section with a base_url");
            };
            tracing::info!(command = "export", base_url = %export.base_url, "Starting export");

            let dispatcher = ExportDispatcher::new(&export.base_url)?;
            let result = dispatcher
                .fetch_artifact(&path, &BearerToken::new(token), &fallback)
                .await
                .map_err(|e| {
                    tracing::error!(command = "export", error = %e, "Export failed");
                    anyhow::Error::new(e)
                })?;

            let saved = save_artifact(&config.output_dir, &result.filename, &result.binary)?;
            tracing::info!(command = "export", path = %saved.display(), "Export complete");
            println!("Downloaded.");
            println!("{}", saved.display());
            Ok(())
        }
    }
}
