//! `mender-agent`: process entry point wiring `mender-config`'s paths and
//! logging bootstrap, every production collaborator implementation, and
//! `mender-client::Client` into a running agent, the way `daemon-bin` wires
//! `Config`/`Paths` and its collaborators into `app::run_daemon`.

use clap::{Parser, Subcommand};
use mender_addons::InventoryReporter;
use mender_api_client::InventoryAttribute;
use mender_client::{Client, ClientCallbacks};
use mender_config::Paths;
use mender_flash::FileFlashWriter;
use mender_scheduler::{Scheduler, TokioScheduler};
use mender_storage::{FileStorage, KvClient};
use mender_transport::ReqwestTransport;
use mender_types::ClientConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Mender-compatible OTA update agent.
#[derive(Parser)]
#[command(name = "mender-agent")]
#[command(about = "Over-the-air firmware update client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Overrides the base directory that would otherwise default to
    /// `~/.mender-client` (also settable via `MENDER_CLIENT_HOME`).
    #[arg(long, global = true)]
    home: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent in the foreground until interrupted.
    Start,
    /// Print the persisted pending-deployment record, if any.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.home {
        Some(home) => Paths::with_base_dir(home),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => start(&paths).await,
        Commands::Status => status(&paths),
    }
}

fn default_config() -> ClientConfig {
    // A brand-new device has no identity of its own yet; a random
    // per-install id stands in for whatever hardware-derived identity
    // (MAC address, serial number) a real port would read. It is
    // persisted in `config.json` on first run, so subsequent starts
    // reuse the same identity rather than minting a new one.
    let device_id = uuid::Uuid::new_v4().to_string();
    ClientConfig {
        identity: BTreeMap::from([("mender_device_id".to_string(), device_id)]),
        artifact_name: "unknown".to_string(),
        device_type: "generic-linux".to_string(),
        server_host: "https://hosted.mender.io".to_string(),
        tenant_token: None,
        auth_poll_interval_secs: 5,
        update_poll_interval_secs: 1800,
        recommissioning_flag: false,
        configuration_deployments_enabled: true,
        log_level: "info".to_string(),
    }
}

async fn start(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let config = mender_config::load(paths, default_config)?;
    mender_config::save(&config, paths)?;
    mender_config::init_logging("mender-agent", &config.log_level, paths);

    tracing::info!(server_host = %config.server_host, device_type = %config.device_type, "starting mender-agent");

    let transport = ReqwestTransport::new(config.server_host.clone());
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new());
    let storage = Arc::new(KvClient::new(Box::new(FileStorage::open(paths.store_file())?)));
    let flash_writer: Box<dyn mender_flash::FlashWriter> =
        Box::new(FileFlashWriter::new(paths.base_dir().join("flash")));

    let callbacks = ClientCallbacks::new(Arc::new(restart_callback));

    let client = Client::init(
        config.clone(),
        callbacks,
        transport,
        Arc::clone(&scheduler),
        storage,
        flash_writer,
    )?;

    register_inventory_addon(&client, &config, &scheduler);

    client.activate()?;
    tracing::info!("mender-agent activated, awaiting interrupt");

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    client.exit();

    Ok(())
}

/// Registers the inventory reporter against the client's own API client and
/// session token, reporting the static attributes every hour on its own
/// scheduler work item, independent of the client's own update-check one.
fn register_inventory_addon(
    client: &Arc<Client<ReqwestTransport>>,
    config: &ClientConfig,
    scheduler: &Arc<dyn Scheduler>,
) {
    let reporter = Arc::new(InventoryReporter::new(
        client.api_client(),
        vec![
            InventoryAttribute {
                name: "artifact_name".to_string(),
                value: config.artifact_name.clone(),
            },
            InventoryAttribute {
                name: "device_type".to_string(),
                value: config.device_type.clone(),
            },
        ],
    ));

    let handle = scheduler.work_create(
        "mender-inventory",
        Duration::from_secs(3600),
        Arc::clone(&reporter).work_callback(),
    );
    if let Err(error) = scheduler.work_activate(&handle) {
        tracing::warn!(%error, "failed to activate the inventory reporter's work item");
    }

    client.register_addon(reporter as Arc<dyn mender_addons::Addon>);
}

/// Expected not to return: on real hardware this would hand control to
/// the bootloader. On this hosted port, exiting the
/// process is the closest equivalent — the next invocation of
/// `mender-agent start` re-enters `init` with the `PendingDeployment`
/// record still on disk, exactly like a real reboot.
fn restart_callback() {
    tracing::warn!("restart callback invoked; exiting process to simulate a reboot");
    std::process::exit(0);
}

fn status(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let storage = KvClient::new(Box::new(FileStorage::open(paths.store_file())?));
    let pending = storage.get_pending_deployment()?;
    let keys = storage.get_keys()?;

    let summary = serde_json::json!({
        "base_dir": paths.base_dir(),
        "has_key_pair": keys.is_some(),
        "pending_deployment": pending,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
