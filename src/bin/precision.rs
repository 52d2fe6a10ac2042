use anyhow::Context;
use anyhow::Result;

use clap::Parser;

use gpsmux::pps::Pps;
use gpsmux::precision::Precision;

use tracing::info;

use tracing_subscriber::filter::EnvFilter;

/// Show PPS precision
#[derive(Parser)]
#[clap(about)]
struct Args {
    /// PPS device path
    #[clap(long, default_value = "/dev/pps0")]
    pub pps_device: String,
    /// Continue to show precision measurements after the first result
    #[clap(long)]
    pub watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let device = &args.pps_device;

    let pps = Pps::open(device).with_context(|| format!("unable to open {}", device))?;
    info!("opened PPS device {}", device);

    let precision = Precision::new();

    if args.watch {
        let mut precision = precision.watch(&pps);

        while precision.changed().await.is_ok() {
            let current = *precision.borrow();

            println!("{} precision: {}", device, current);
        }
    } else {
        println!("{} precision: {}", device, precision.once(&pps).await?);
    }

    Ok(())
}
