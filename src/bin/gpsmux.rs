use anyhow::Context;
use anyhow::Result;

use clap::Parser;

use gpsmux::configuration::Args;
use gpsmux::configuration::Configuration;
use gpsmux::control::ControlSocket;
use gpsmux::daemon::Daemon;
use gpsmux::daemon::Exit;
use gpsmux::daemon::PidFile;
use gpsmux::gpsd::Listeners;
use gpsmux::shm::ShmExport;

use std::convert::TryFrom;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::runtime;

use tracing::info;

use tracing_subscriber::filter::EnvFilter;

fn main() {
    if let Err(e) = start() {
        eprintln!("gpsmux: {:#}", e);
        std::process::exit(1);
    }
}

fn start() -> Result<()> {
    let args = Args::parse();

    let configuration =
        Configuration::from_args(&args).context("failed to load the configuration")?;

    start_tracing(&configuration)?;

    if !configuration.foreground {
        nix::unistd::daemon(true, true).context("unable to daemonize")?;
    }

    let runtime = runtime::Builder::new_multi_thread()
        .thread_name_fn(|| {
            static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
            let id = ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
            format!("gpsmux-{}", id)
        })
        .enable_all()
        .build()
        .context("unable to start the runtime")?;

    runtime.block_on(run(configuration))
}

fn start_tracing(configuration: &Configuration) -> Result<()> {
    let filter = EnvFilter::try_from(configuration).context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

async fn run(configuration: Configuration) -> Result<()> {
    info!("gpsmux {} starting", env!("CARGO_PKG_VERSION"));

    let _pid_file = match &configuration.pid_file {
        Some(path) => Some(
            PidFile::create(path)
                .with_context(|| format!("unable to write pid file {}", path.display()))?,
        ),
        None => None,
    };

    let control = match &configuration.control_socket {
        Some(path) => Some(ControlSocket::bind(path)?),
        None => None,
    };

    let linger = configuration.timeouts.release_timeout();
    let listeners = Listeners::bind(&configuration.server, linger)
        .await
        .context("unable to listen for clients")?;

    let shm = if configuration.shm_export {
        let key = configuration.shm_key();

        Some(ShmExport::create(key).with_context(|| format!("SHM export {:#x}", key))?)
    } else {
        None
    };

    let mut daemon = Daemon::new(configuration, shm);

    daemon.start().context("unable to add devices")?;

    match daemon.run(&listeners, control.as_ref()).await? {
        Exit::Idle => info!("no devices or clients remain"),
        Exit::Signal(signal) => info!("stopped by {}", signal),
    }

    Ok(())
}
