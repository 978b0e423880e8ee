//! A file copy utility that uses APRS for backhaul.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use aprs_file_copy::aprs::{AprsConfig, AprsInterface};
use aprs_file_copy::callsign::Callsign;
use aprs_file_copy::commands::file::{ReceiveFile, SendFile};
use aprs_file_copy::commands::Command;
use aprs_file_copy::connection::{AprsIsConnection, GenericConnection, TncConnection};

/// A file copy utility that uses APRS for backhaul.
#[derive(Parser, Debug)]
#[command(version, about, rename_all = "snake_case")]
struct Args {
    /// The file to send.
    #[arg(short, long)]
    send: Option<PathBuf>,

    /// Set to true to receive files sent by the network.
    #[arg(short, long)]
    receive: bool,

    /// Set to the callsign of this station.
    #[arg(short, long)]
    callsign: Callsign,

    /// Set to the callsign of the other station. If this is left empty,
    /// files are sent to all stations (no ACKs) and all files are received
    /// (broadcast mode).
    #[arg(short, long, default_value = "")]
    peer_callsign: Callsign,

    /// Set to true to use the APRS-IS network to receive files.
    #[arg(long)]
    use_aprs_is: bool,

    /// The largest file chunk to carry in one packet. Zero disables
    /// file-level chunking.
    #[arg(long, default_value_t = 0)]
    max_file_chunk_size: usize,

    /// Seconds to pause between transmitted frames.
    #[arg(long, default_value_t = 20.0)]
    aprs_transmit_interval_s: f64,

    /// The largest packet chunk to carry in one frame, in bytes.
    #[arg(long, default_value_t = 100)]
    aprs_max_packet_size: usize,

    /// The number of times to transmit each payload.
    #[arg(long, default_value_t = 1)]
    aprs_retransmit_count: u32,

    /// The hostname of the TNC to connect to.
    #[arg(long, default_value = "localhost")]
    tnc_hostname: String,

    /// The port of the TNC to connect to.
    #[arg(long, default_value_t = 8001)]
    tnc_port: u16,

    /// The hostname of the APRS-IS service to connect to.
    #[arg(long, default_value = "rotate.aprs2.net")]
    aprs_is_hostname: String,

    /// The port of the APRS-IS service to connect to.
    #[arg(long, default_value_t = 14580)]
    aprs_is_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;
    info!("start");

    if args.send.is_some() && args.use_aprs_is {
        bail!("unable to use APRS-IS to send files");
    }
    let Ok(transmit_interval) = Duration::try_from_secs_f64(args.aprs_transmit_interval_s) else {
        bail!("invalid transmit interval");
    };

    let connection = if args.use_aprs_is {
        GenericConnection::from(
            AprsIsConnection::connect(&args.aprs_is_hostname, args.aprs_is_port, &args.callsign)
                .await?,
        )
    } else {
        GenericConnection::from(TncConnection::open(&args.tnc_hostname, args.tnc_port).await?)
    };

    let config = AprsConfig {
        max_packet_size: args.aprs_max_packet_size,
        transmit_interval,
        retransmit_count: args.aprs_retransmit_count,
    };
    let mut interface = AprsInterface::new(connection, config);

    if let Some(path) = &args.send {
        let mut command = SendFile::new(
            path.clone(),
            args.max_file_chunk_size,
            args.callsign.clone(),
            args.peer_callsign.clone(),
            Vec::new(),
        );
        command.execute(&mut interface).await?;
    } else if args.receive {
        let mut command = ReceiveFile::new(args.callsign.clone(), args.peer_callsign.clone());
        command.execute(&mut interface).await?;
    } else {
        bail!("must specify whether to send or receive");
    }

    info!("success");
    Ok(())
}
