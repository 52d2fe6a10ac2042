use anyhow::Context;
use anyhow::Result;

use clap::Parser;

use gpsmux::configuration::parse_shm_key;
use gpsmux::configuration::Configuration;
use gpsmux::shm::ExportRecord;
use gpsmux::shm::ExportSatellite;
use gpsmux::shm::Layout;
use gpsmux::shm::Segment;
use gpsmux::shm::ShmReader;

use serde::Serialize;

use std::time::Duration;

use tracing::debug;

use tracing_subscriber::filter::EnvFilter;

/// Print each new snapshot in the SHM export as JSON
#[derive(Parser)]
#[clap(about)]
struct Args {
    /// Segment key, defaults to GPSD_SHM_KEY or the daemon's default
    #[clap(long, value_parser = parse_key)]
    key: Option<i32>,

    /// Polling interval in milliseconds
    #[clap(long, default_value = "500")]
    interval: u64,

    /// Print one snapshot and exit
    #[clap(long)]
    once: bool,
}

fn parse_key(key: &str) -> Result<i32, String> {
    parse_shm_key(key).ok_or_else(|| format!("invalid key {:?}", key))
}

#[derive(Serialize)]
struct Satellite {
    prn: i16,
    gnssid: u8,
    svid: u8,
    used: bool,
    el: Option<f64>,
    az: Option<f64>,
    ss: Option<f64>,
}

impl From<&ExportSatellite> for Satellite {
    fn from(satellite: &ExportSatellite) -> Self {
        Satellite {
            prn: satellite.prn,
            gnssid: satellite.gnss_id,
            svid: satellite.sv_id,
            used: satellite.used != 0,
            el: finite(satellite.elevation),
            az: finite(satellite.azimuth),
            ss: finite(satellite.ss),
        }
    }
}

#[derive(Serialize)]
struct Snapshot {
    tick: i32,
    device: String,
    online: Option<f64>,
    mode: i32,
    status: i32,
    time: Option<f64>,
    ept: Option<f64>,
    lat: Option<f64>,
    lon: Option<f64>,
    alt_hae: Option<f64>,
    alt_msl: Option<f64>,
    eph: Option<f64>,
    epv: Option<f64>,
    track: Option<f64>,
    speed: Option<f64>,
    climb: Option<f64>,
    hdop: Option<f64>,
    vdop: Option<f64>,
    pdop: Option<f64>,
    n_sat: i32,
    u_sat: i32,
    satellites: Vec<Satellite>,
}

fn finite(value: f64) -> Option<f64> {
    Some(value).filter(|v| v.is_finite())
}

impl Snapshot {
    fn new(tick: i32, record: &ExportRecord) -> Self {
        let visible = usize::try_from(record.satellites_visible)
            .unwrap_or(0)
            .min(record.satellites.len());

        let time = if record.time_sec == 0 && record.time_nsec == 0 {
            None
        } else {
            Some(record.time_sec as f64 + record.time_nsec as f64 / 1e9)
        };

        Snapshot {
            tick,
            device: record.path(),
            online: Some(record.online).filter(|online| *online != 0.0),
            mode: record.mode,
            status: record.status,
            time,
            ept: finite(record.ept),
            lat: finite(record.latitude),
            lon: finite(record.longitude),
            alt_hae: finite(record.alt_hae),
            alt_msl: finite(record.alt_msl),
            eph: finite(record.eph),
            epv: finite(record.epv),
            track: finite(record.track),
            speed: finite(record.speed),
            climb: finite(record.climb),
            hdop: finite(record.hdop),
            vdop: finite(record.vdop),
            pdop: finite(record.pdop),
            n_sat: record.satellites_visible,
            u_sat: record.satellites_used,
            satellites: record.satellites[..visible].iter().map(Satellite::from).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let key = args
        .key
        .unwrap_or_else(|| Configuration::default().shm_key());

    let segment = Segment::<Layout>::attach(key, 0, false)
        .with_context(|| format!("no SHM export at {:#x}, is the daemon running?", key))?;
    let reader = ShmReader::new(&segment);

    let mut interval = tokio::time::interval(Duration::from_millis(args.interval.max(1)));
    let mut last_tick = None;

    loop {
        interval.tick().await;

        let (tick, record) = match reader.read() {
            Some(snapshot) => snapshot,
            None => {
                debug!("no consistent snapshot");
                continue;
            }
        };

        if last_tick == Some(tick) {
            continue;
        }

        last_tick = Some(tick);

        println!("{}", serde_json::to_string(&Snapshot::new(tick, &record))?);

        if args.once {
            return Ok(());
        }
    }
}
