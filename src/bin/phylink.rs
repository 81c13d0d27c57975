use clap::{App, Arg, ArgMatches};
use colored::*;
use phylink::{
    connect, format_bits, parse_bits, Bit, BitHandler, Cable, Device, DeviceConfig, Iface,
    ManchesterEncoder,
};
use phylink::ticker::IntervalTickerFactory;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time;
use tracing::{info, Level};

const DEFAULT_DATA: &str = "10110010";
const DEFAULT_PREAMBLE_BITS: &str = "8";

// Send periods the listener keeps sampling after the sender goes quiet
const TRAILING_SEND_PERIODS: u32 = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("phylink")
        .version("0.1.0")
        .author("Network Systems Engineering Team")
        .about("Manchester-coded link between two devices sharing one cable")
        .arg(
            Arg::with_name("data")
                .short("d")
                .long("data")
                .value_name("BITS")
                .help("Data bits to transmit, e.g. 1011")
                .takes_value(true)
                .default_value(DEFAULT_DATA)
                .validator(|v| parse_bits(&v).map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("preamble")
                .short("p")
                .long("preamble")
                .value_name("COUNT")
                .help("Preamble bits sent ahead of the data")
                .takes_value(true)
                .default_value(DEFAULT_PREAMBLE_BITS)
                .validator(|v| match v.parse::<usize>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Preamble must be a non-negative number".into()),
                }),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON device configuration")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("send-us")
                .long("send-us")
                .value_name("MICROS")
                .help("Send clock period in microseconds")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listen-us")
                .long("listen-us")
                .value_name("MICROS")
                .help("Listen clock period in microseconds")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["table", "json"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = load_config(&matches)?;
    let data = parse_bits(matches.value_of("data").unwrap_or(DEFAULT_DATA))?;
    let preamble_bits: usize = matches
        .value_of("preamble")
        .unwrap_or(DEFAULT_PREAMBLE_BITS)
        .parse()?;
    let format = matches.value_of("format").unwrap_or("table");

    let received = run_link(&config, &data, preamble_bits).await?;
    let decoded = received.get(preamble_bits..).unwrap_or(&[]);

    match format {
        "json" => {
            let report = serde_json::json!({
                "config": config,
                "preamble_bits": preamble_bits,
                "sent": format_bits(&data),
                "received": format_bits(&received),
                "decoded": format_bits(decoded),
                "match": decoded == data.as_slice(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_report(&config, preamble_bits, &data, &received, decoded),
    }

    Ok(())
}

fn load_config(matches: &ArgMatches<'_>) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => DeviceConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => DeviceConfig::default(),
    };

    if let Some(send_us) = matches.value_of("send-us") {
        config.send_clock_period_us = send_us.parse()?;
    }
    if let Some(listen_us) = matches.value_of("listen-us") {
        config.listen_clock_period_us = listen_us.parse()?;
    }

    config.validate()?;
    Ok(config)
}

/// Wire a sender and a receiver on one cable, transmit preamble + data, and
/// return every bit the receiver's decoder emitted.
async fn run_link(
    config: &DeviceConfig,
    data: &[Bit],
    preamble_bits: usize,
) -> Result<Vec<Bit>, Box<dyn std::error::Error>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let receiver_handler: Arc<dyn BitHandler> = Arc::new(move |bit: Bit, iface: Iface| {
        info!("{} received {}", iface, bit);
        if let Ok(mut bits) = sink.lock() {
            bits.push(bit);
        }
    });
    let sender_handler: Arc<dyn BitHandler> = Arc::new(|_bit: Bit, _iface: Iface| {});

    let cable = Cable::new();
    let sender = Device::from_config(config, Arc::new(IntervalTickerFactory), sender_handler)?;
    let receiver = Device::from_config(config, Arc::new(IntervalTickerFactory), receiver_handler)?;

    let tx_iface = Iface::new("eth0")?;
    let rx_iface = Iface::new("eth1")?;
    connect(&cable, &sender, tx_iface)?;
    connect(&cable, &receiver, rx_iface)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = Arc::clone(&receiver);
    let listen_task = tokio::spawn(async move { listener.listen_until(shutdown_rx).await });

    let mut frame = ManchesterEncoder::preamble(preamble_bits);
    frame.extend_from_slice(data);
    sender.send(tx_iface, &frame).await?;

    time::sleep(config.send_clock_period() * TRAILING_SEND_PERIODS).await;
    shutdown_tx.send(true)?;
    listen_task.await?;

    let bits = received.lock().map(|bits| bits.clone()).unwrap_or_default();
    Ok(bits)
}

fn print_report(
    config: &DeviceConfig,
    preamble_bits: usize,
    sent: &[Bit],
    received: &[Bit],
    decoded: &[Bit],
) {
    println!("{}", "Physical Link Report".bright_blue().bold());
    println!(
        "{} {} us send / {} us listen ({}x oversampling)",
        "Clocks:".bright_white(),
        config.send_clock_period_us,
        config.listen_clock_period_us,
        config.oversampling_ratio()
    );
    println!("{} {}", "Preamble bits:".bright_white(), preamble_bits);
    println!("{} {}", "Sent:".bright_white(), format_bits(sent).bright_cyan());
    println!("{} {}", "Received:".bright_white(), format_bits(received).dimmed());
    println!("{} {}", "Decoded:".bright_white(), format_bits(decoded).bright_cyan());

    if decoded == sent {
        println!("{} {}", "✅".green(), "Data recovered intact".bright_green());
    } else {
        println!("{} {}", "❌".red(), "Data mismatch".bright_red());
    }
}
