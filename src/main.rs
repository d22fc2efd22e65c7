//! # Blob Image Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e applicazione degli override CLI
//! - Risoluzione del container e avvio del `BatchOptimizer`
//! - Traduzione dell'esito del run in exit code
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (container, workers, json, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica il file di configurazione e applica gli override
//! 4. Verifica la presenza dei tool esterni
//! 5. Esegue il batch; Ctrl-C ferma il run tra un oggetto e l'altro
//!
//! ## Exit code:
//! `0` completato, `2` nessuna immagine, `3` tutte già ottimizzate,
//! `4` conferma rifiutata, `5` cancellato, `1` errore fatale
//!
//! ## Esempio di utilizzo:
//! ```bash
//! blob-optimizer --store-root /srv/blobs --container images --workers 4 --yes
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use blob_image_optimizer::{
    AdapterRegistry, AutoConfirm, BatchOptimizer, Config, ConfiguredTarget, JsonMessage, LocalObjectStore,
    PlatformCommands, SuccessCheck, TargetResolver,
};

#[derive(Parser)]
#[command(name = "blob-optimizer")]
#[command(about = "Losslessly recompress PNG and JPEG images stored in an object-store container")]
struct Args {
    /// Container to optimize
    #[arg(short, long)]
    container: Option<String>,

    /// Root directory of the local object store
    #[arg(long)]
    store_root: Option<PathBuf>,

    /// Account name
    #[arg(long)]
    account: Option<String>,

    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Candidate extensions, comma separated (e.g. png,jpg,jpeg)
    #[arg(short, long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// Skip the batch confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Number of concurrent pipelines
    #[arg(short, long)]
    workers: Option<usize>,

    /// Timeout for a single optimizer invocation, in seconds
    #[arg(long)]
    tool_timeout: Option<u64>,

    /// Judge optimizer runs by exit status instead of their output
    #[arg(long)]
    exit_status_check: bool,

    /// Only overwrite objects that did not change since they were listed
    #[arg(long)]
    conditional_commit: bool,

    /// Directory for working copies
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Output progress and status as JSON for programmatic use
    #[arg(long)]
    json: bool,

    /// Force a fresh login with the storage provider
    #[arg(long)]
    reauth: bool,

    /// Print the optimizer tool report and exit
    #[arg(long)]
    check_tools: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(ref container) = self.container {
            config.container = Some(container.clone());
        }
        if let Some(ref root) = self.store_root {
            config.store_root = root.clone();
        }
        if let Some(ref account) = self.account {
            config.account = account.clone();
        }
        if let Some(ref extensions) = self.extensions {
            config.extensions = extensions.clone();
        }
        if self.yes {
            config.confirm_batch = false;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(timeout) = self.tool_timeout {
            config.tool_timeout_secs = timeout;
        }
        if self.exit_status_check {
            config.success_check = SuccessCheck::ExitStatus;
        }
        if self.conditional_commit {
            config.conditional_commit = true;
        }
        if let Some(ref dir) = self.scratch_dir {
            config.scratch_dir = Some(dir.clone());
        }
        if self.json {
            config.json_output = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose. In JSON mode logs go
    // to stderr so stdout carries only JSON lines.
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.check_tools {
        let info = PlatformCommands::system_info();
        println!("Platform: {} ({}, {})", info.os, info.arch, info.family);
        println!("{}", PlatformCommands::instance().get_tools_report());
        return Ok(());
    }

    let json_output = args.json;
    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            if json_output {
                JsonMessage::error(format!("{:#}", e)).emit();
            }
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match config_path {
        Some(ref path) => {
            debug!("Loading configuration from {}", path.display());
            Config::from_file(path).await?
        }
        None => Config::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    if args.reauth {
        warn!("--reauth: credentials for the local store are managed outside this tool, nothing to refresh");
    }

    let container = ConfiguredTarget::new(&config).resolve()?;
    let store = Arc::new(
        LocalObjectStore::new(config.store_root.clone()).with_content_versions(config.conditional_commit),
    );

    let registry = AdapterRegistry::from_config(&config);
    registry.check_dependencies()?;

    let (stop_sender, stop_receiver) = BatchOptimizer::create_cancellation_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing the current object before stopping");
            let _ = stop_sender.send(());
        }
    });

    let mut optimizer = BatchOptimizer::new(config.clone(), container, store, registry).with_cancellation(stop_receiver);
    if !config.confirm_batch {
        optimizer = optimizer.with_confirmation(Box::new(AutoConfirm));
    }

    let status = optimizer.run().await?;
    Ok(status.exit_code())
}
