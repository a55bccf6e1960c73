//! Entry point for the UVM guest agent.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use uvm_guest::config::GuestConfig;
use uvm_guest::storage::scsi::{MountRequest, Scsi, ScsiAddress, ScsiOps, Traced};
use uvm_guest::OpContext;
use uvm_guest_shared::errors::GuestResult;

/// UVM Guest Agent - attaches host-provided SCSI disks
#[derive(Parser, Debug)]
#[command(author, version, about = "UVM Guest Agent - SCSI disk attachment")]
struct GuestArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Abort the operation after this many milliseconds
    ///
    /// Without it the operation waits until it succeeds, fails, or is
    /// interrupted with Ctrl-C.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Override the sysfs SCSI devices directory
    #[arg(long)]
    devices_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SCSI disk operations
    #[command(subcommand)]
    Scsi(ScsiCommand),
}

#[derive(Subcommand, Debug)]
enum ScsiCommand {
    /// Print the /dev node for a SCSI address
    Resolve(AddressArgs),

    /// Mount a SCSI disk
    Mount {
        #[command(flatten)]
        address: AddressArgs,

        /// Mount point (created if missing)
        #[arg(short, long)]
        target: PathBuf,

        /// Mount read-only, skipping journal replay
        #[arg(long)]
        readonly: bool,
    },

    /// Request guest-initiated removal of a SCSI disk
    Unplug(AddressArgs),
}

#[derive(Args, Debug)]
struct AddressArgs {
    /// SCSI controller number assigned by the host
    #[arg(short, long)]
    controller: u8,

    /// Logical unit number on the controller
    #[arg(short, long)]
    lun: u8,
}

impl AddressArgs {
    fn address(&self) -> ScsiAddress {
        ScsiAddress::new(self.controller, self.lun)
    }
}

#[tokio::main]
async fn main() -> GuestResult<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("[PANIC] Guest agent panicked: {}", panic_info);
        std::process::exit(1);
    }));

    // Respects RUST_LOG; defaults to "error"
    if let Err(e) = tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .try_init()
    {
        eprintln!("[ERROR] Failed to initialize tracing: {}", e);
    }

    let args = GuestArgs::parse();
    info!("UVM guest agent starting: {:?}", args.command);

    let mut config = match &args.config {
        Some(path) => GuestConfig::load(path)?,
        None => GuestConfig::default(),
    };
    if let Some(root) = args.devices_root {
        config.scsi.devices_root = root;
    }

    let ops = Traced::new(Scsi::new(&config.scsi)?);

    let mut ctx = OpContext::new();
    if let Some(ms) = args.timeout_ms {
        ctx = ctx.timeout(Duration::from_millis(ms));
    }
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            token.cancel();
        }
    });

    let result = run(&ops, &ctx, args.command).await;
    if let Err(e) = &result {
        error!("Operation failed: {}", e);
    }
    result
}

async fn run(ops: &dyn ScsiOps, ctx: &OpContext, command: Command) -> GuestResult<()> {
    match command {
        Command::Scsi(ScsiCommand::Resolve(address)) => {
            let device = ops.resolve_device_path(ctx, address.address()).await?;
            println!("{}", device.display());
        }
        Command::Scsi(ScsiCommand::Mount {
            address,
            target,
            readonly,
        }) => {
            let request = MountRequest::new(address.address(), target, readonly);
            ops.mount(ctx, &request).await?;
        }
        Command::Scsi(ScsiCommand::Unplug(address)) => {
            ops.unplug(ctx, address.address()).await?;
        }
    }
    Ok(())
}
