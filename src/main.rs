use facescan::{
    authenticate_user, enroll_user, CachedTemplateSource, Config, ScanOrchestrator, ServiceEngine,
    UserStore, V4l2Device, VerificationCoordinator,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "facescan")]
#[command(about = "Face scan enrollment and check-in verification")]
struct Cli {
    /// Verbose logging with file and line info
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a face scan and store it as the user's template
    Enroll {
        #[arg(short, long)]
        user: String,
    },
    /// Capture a face scan and check it against the user's stored template
    Verify {
        #[arg(short, long)]
        user: String,
    },
    /// Remove a user's stored template
    Remove {
        #[arg(short, long)]
        user: String,
    },
    /// List available cameras
    ListCameras,
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Enroll { user } => {
            let engine = Arc::new(ServiceEngine::new(&config.engine));
            let orchestrator = start_orchestrator(&config, engine).await?;
            let store = UserStore::new(config.storage.data_dir.clone())?;

            let template = enroll_user(&orchestrator, &store, &user)
                .await
                .with_context(|| format!("Enrollment failed for user {}", user))?;

            if cli.json {
                let summary = serde_json::json!({
                    "user": user,
                    "enrolled": true,
                    "template": template.fingerprint(),
                });
                println!("{}", summary);
            } else {
                println!("Enrolled {} (template {})", user, template.fingerprint());
            }
        }
        Commands::Verify { user } => {
            let engine = Arc::new(ServiceEngine::new(&config.engine));
            let orchestrator = start_orchestrator(&config, engine.clone()).await?;
            let store = Arc::new(UserStore::new(config.storage.data_dir.clone())?);
            let templates =
                Arc::new(CachedTemplateSource::from_config(store, &config.verification));
            let coordinator = VerificationCoordinator::new(engine, templates)
                .with_engine_timeout(config.scan.engine_timeout());

            let outcome = authenticate_user(&orchestrator, &coordinator, &user).await;

            if cli.json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else if outcome.is_authenticated() {
                println!("Authentication: SUCCESS");
            } else {
                println!("Authentication: FAILED - {}", outcome.message().unwrap_or_default());
            }

            if !outcome.is_authenticated() {
                std::process::exit(1);
            }
        }
        Commands::Remove { user } => {
            let store = UserStore::new(config.storage.data_dir.clone())?;
            if store.remove_user(&user).await? {
                println!("Removed template for {}", user);
            } else {
                println!("No template stored for {}", user);
            }
        }
        Commands::ListCameras => {
            let cameras = V4l2Device::list_cameras()?;
            if cameras.is_empty() {
                println!("No cameras found. Check that /dev/video* exists and is readable.");
            }
            for camera in cameras {
                let formats = camera.formats.join(", ");
                println!("/dev/video{}: {} [{}]", camera.index, camera.name, formats);
            }
        }
        Commands::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Build an orchestrator and run initialization, echoing status changes to stderr.
///
/// A failed initialization is returned with its own cause rather than surfacing
/// later as a not-ready scan.
async fn start_orchestrator(
    config: &Config,
    engine: Arc<ServiceEngine>,
) -> Result<Arc<ScanOrchestrator>> {
    let device = Arc::new(V4l2Device::new(config.camera.clone()));
    let orchestrator = Arc::new(ScanOrchestrator::new(engine, device, config.scan.clone()));

    let mut status = orchestrator.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            if current.error.is_none() {
                eprintln!("{}", current.message);
            }
        }
    });

    if let Err(e) = orchestrator.initialize().await {
        tracing::debug!("Initialization failed with {} (fatal: {})", e.code(), e.is_fatal());
        return Err(e).context("Face scanning unavailable");
    }
    Ok(orchestrator)
}

fn setup_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}
