use phylink::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::watch;

const SEND_PERIOD: Duration = Duration::from_secs(1);
const LISTEN_PERIOD: Duration = Duration::from_millis(100);

/// Encoder that puts data bits on the wire unchanged.
struct PassThroughEncoder;

impl Encoder for PassThroughEncoder {
    fn encode(&self, bits: &[Bit]) -> Vec<Bit> {
        bits.to_vec()
    }
}

/// Decoder that emits every sample it is given.
struct EchoDecoder {
    handler: Box<dyn IfaceBitHandler>,
}

impl Decoder for EchoDecoder {
    fn handle(&mut self, bit: Bit) {
        self.handler.handle(bit);
    }
}

#[derive(Default)]
struct EchoDecoderFactory {
    created: AtomicUsize,
}

impl DecoderFactory for EchoDecoderFactory {
    fn new_decoder(&self, handler: Box<dyn IfaceBitHandler>) -> Box<dyn Decoder> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(EchoDecoder { handler })
    }
}

#[derive(Clone, Default)]
struct Received {
    bits: Arc<Mutex<HashMap<Iface, Vec<Bit>>>>,
}

impl Received {
    fn handler(&self) -> Arc<dyn BitHandler> {
        let bits = Arc::clone(&self.bits);
        Arc::new(move |bit: Bit, iface: Iface| {
            bits.lock().unwrap().entry(iface).or_default().push(bit);
        })
    }

    fn bits_for(&self, iface: Iface) -> Vec<Bit> {
        self.bits.lock().unwrap().get(&iface).cloned().unwrap_or_default()
    }
}

fn iface(name: &str) -> Iface {
    Iface::new(name).unwrap()
}

fn mock_device(tickers: Vec<ManualTicker>) -> (Arc<Device>, Received) {
    let received = Received::default();
    let device = Device::new(
        Arc::new(ManualTickerFactory::new(tickers)),
        SEND_PERIOD,
        LISTEN_PERIOD,
        Arc::new(PassThroughEncoder),
        Arc::new(EchoDecoderFactory::default()),
        received.handler(),
    );
    (device, received)
}

fn manchester_device(tickers: Vec<ManualTicker>) -> (Arc<Device>, Received) {
    let received = Received::default();
    let device = Device::new(
        Arc::new(ManualTickerFactory::new(tickers)),
        SEND_PERIOD,
        LISTEN_PERIOD,
        Arc::new(ManchesterEncoder::new()),
        Arc::new(ManchesterDecoderFactory::new()),
        received.handler(),
    );
    (device, received)
}

#[tokio::test]
async fn test_device_receives_bits() {
    let (send_ticker, send_clock) = ManualTicker::new();
    let (d1, _) = mock_device(vec![send_ticker]);
    let (listen_ticker, listen_clock) = ManualTicker::new();
    let (d2, received) = mock_device(vec![listen_ticker]);

    let cable = Cable::new();
    let eth0 = iface("eth0");
    let eth1 = iface("eth1");
    connect(&cable, &d1, eth0).unwrap();
    connect(&cable, &d2, eth1).unwrap();

    let data = vec![Bit::One, Bit::Zero, Bit::One, Bit::Zero];

    let listener = Arc::clone(&d2);
    let listen_task = tokio::spawn(async move { listener.listen().await });
    let sender = Arc::clone(&d1);
    let payload = data.clone();
    let send_task = tokio::spawn(async move { sender.send(eth0, &payload).await });

    for _ in 0..data.len() {
        assert!(send_clock.tick().await);
        assert!(listen_clock.tick().await);
    }

    assert_eq!(send_task.await.unwrap(), Ok(()));
    assert_eq!(received.bits_for(eth1), data);

    drop(listen_clock);
    listen_task.await.unwrap();
}

#[tokio::test]
async fn test_cable_interference() {
    let (ticker1, clock1) = ManualTicker::new();
    let (d1, _) = mock_device(vec![ticker1]);
    let (ticker2, clock2) = ManualTicker::new();
    let (d2, _) = mock_device(vec![ticker2]);

    let cable = Cable::new();
    let eth0 = iface("eth0");
    let eth1 = iface("eth1");
    connect(&cable, &d1, eth0).unwrap();
    connect(&cable, &d2, eth1).unwrap();

    let ones = vec![Bit::One; 4];
    let zeros = vec![Bit::Zero; 4];
    let sender1 = Arc::clone(&d1);
    let task1 = tokio::spawn(async move { sender1.send(eth0, &ones).await });
    let sender2 = Arc::clone(&d2);
    let task2 = tokio::spawn(async move { sender2.send(eth1, &zeros).await });

    assert_eq!(cable.read(), Bit::Zero);

    clock1.tick().await;
    assert_eq!(cable.read(), Bit::One);

    clock2.tick().await;
    assert_eq!(cable.read(), Bit::Zero);

    // Same tick on both sides: the later write holds the line
    clock2.tick().await;
    clock1.tick().await;
    assert_eq!(cable.read(), Bit::One);

    clock1.tick().await;
    clock2.tick().await;
    assert_eq!(cable.read(), Bit::Zero);

    clock1.tick().await;
    assert_eq!(cable.read(), Bit::One);
    clock2.tick().await;
    assert_eq!(cable.read(), Bit::Zero);

    assert_eq!(task1.await.unwrap(), Ok(()));
    assert_eq!(task2.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_reconnect_creates_fresh_decoder() {
    let factory = Arc::new(EchoDecoderFactory::default());
    let received = Received::default();
    let (listen_ticker, listen_clock) = ManualTicker::new();
    let device = Device::new(
        Arc::new(ManualTickerFactory::new(vec![listen_ticker])),
        SEND_PERIOD,
        LISTEN_PERIOD,
        Arc::new(PassThroughEncoder),
        Arc::clone(&factory) as Arc<dyn DecoderFactory>,
        received.handler(),
    );

    let cable = Cable::new();
    let eth0 = iface("eth0");
    connect(&cable, &device, eth0).unwrap();
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);

    // IfaceInUse must not build a decoder
    assert_eq!(connect(&cable, &device, eth0), Err(PhyError::IfaceInUse));
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);

    let listener = Arc::clone(&device);
    let listen_task = tokio::spawn(async move { listener.listen().await });

    cable.write(Bit::One);
    assert_eq!(listen_clock.tick_n(2).await, 2);
    assert_eq!(received.bits_for(eth0), vec![Bit::One, Bit::One]);

    disconnect(&cable, &device).unwrap();
    // Unbound interfaces are not sampled
    assert_eq!(listen_clock.tick_n(2).await, 2);
    assert_eq!(received.bits_for(eth0).len(), 2);

    connect(&cable, &device, eth0).unwrap();
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    listen_clock.tick().await;
    assert_eq!(received.bits_for(eth0).len(), 3);

    drop(listen_clock);
    listen_task.await.unwrap();
}

#[tokio::test]
async fn test_end_to_end_manchester() {
    const OVERSAMPLING: usize = 4;

    let (send_ticker, send_clock) = ManualTicker::new();
    let (d1, _) = manchester_device(vec![send_ticker]);
    let (listen_ticker, listen_clock) = ManualTicker::new();
    let (d2, received) = manchester_device(vec![listen_ticker]);

    let cable = Cable::new();
    let eth0 = iface("eth0");
    let eth1 = iface("eth1");
    connect(&cable, &d1, eth0).unwrap();
    connect(&cable, &d2, eth1).unwrap();

    let data = vec![Bit::One, Bit::Zero, Bit::One, Bit::Zero];

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = Arc::clone(&d2);
    let listen_task = tokio::spawn(async move { listener.listen_until(shutdown_rx).await });
    let sender = Arc::clone(&d1);
    let payload = data.clone();
    let send_task = tokio::spawn(async move { sender.send(eth0, &payload).await });

    // Idle line before the first symbol
    listen_clock.tick_n(OVERSAMPLING).await;
    for _ in 0..data.len() * 2 {
        assert!(send_clock.tick().await);
        assert_eq!(listen_clock.tick_n(OVERSAMPLING).await, OVERSAMPLING);
    }

    assert_eq!(send_task.await.unwrap(), Ok(()));
    assert_eq!(received.bits_for(eth1), data);
    assert_eq!(d1.stats().bits_written, 8);
    assert_eq!(d2.stats().listen_ticks, 36);

    shutdown_tx.send(true).unwrap();
    listen_task.await.unwrap();
}

#[tokio::test]
async fn test_end_to_end_data_after_preamble() {
    const OVERSAMPLING: usize = 10;

    let (send_ticker, send_clock) = ManualTicker::new();
    let (d1, _) = manchester_device(vec![send_ticker]);
    let (listen_ticker, listen_clock) = ManualTicker::new();
    let (d2, received) = manchester_device(vec![listen_ticker]);

    let cable = Cable::new();
    let eth0 = iface("eth0");
    let eth1 = iface("eth1");
    connect(&cable, &d1, eth0).unwrap();
    connect(&cable, &d2, eth1).unwrap();

    let data = parse_bits("11001").unwrap();
    let mut frame = ManchesterEncoder::preamble(8);
    frame.extend_from_slice(&data);
    let symbols = frame.len() * 2;

    let listener = Arc::clone(&d2);
    let listen_task = tokio::spawn(async move { listener.listen().await });
    let sender = Arc::clone(&d1);
    let send_task = tokio::spawn(async move { sender.send(eth0, &frame).await });

    listen_clock.tick_n(OVERSAMPLING).await;
    for _ in 0..symbols {
        send_clock.tick().await;
        listen_clock.tick_n(OVERSAMPLING).await;
    }

    assert_eq!(send_task.await.unwrap(), Ok(()));
    let bits = received.bits_for(eth1);
    assert_eq!(bits.len(), 8 + data.len());
    assert_eq!(&bits[8..], data.as_slice());

    drop(listen_clock);
    listen_task.await.unwrap();
}

#[tokio::test]
async fn test_handler_can_query_its_own_device() {
    let (listen_ticker, listen_clock) = ManualTicker::new();
    let owner: Arc<OnceLock<Weak<Device>>> = Arc::new(OnceLock::new());
    let observed = Arc::new(Mutex::new(Vec::new()));

    let handler_owner = Arc::clone(&owner);
    let sink = Arc::clone(&observed);
    let handler: Arc<dyn BitHandler> = Arc::new(move |bit: Bit, iface: Iface| {
        if let Some(device) = handler_owner.get().and_then(Weak::upgrade) {
            let connected = device.is_connected(iface);
            let ifaces = device.connected_ifaces().len();
            let _ = format!("{:?}", device);
            sink.lock().unwrap().push((bit, connected, ifaces));
        }
    });

    let device = Device::new(
        Arc::new(ManualTickerFactory::new(vec![listen_ticker])),
        SEND_PERIOD,
        LISTEN_PERIOD,
        Arc::new(PassThroughEncoder),
        Arc::new(EchoDecoderFactory::default()),
        handler,
    );
    owner.set(Arc::downgrade(&device)).unwrap();

    let cable = Cable::new();
    let eth0 = iface("eth0");
    connect(&cable, &device, eth0).unwrap();

    let listener = Arc::clone(&device);
    let listen_task = tokio::spawn(async move { listener.listen().await });

    cable.write(Bit::One);
    assert!(listen_clock.tick().await);
    cable.write(Bit::Zero);
    assert!(listen_clock.tick().await);

    drop(listen_clock);
    listen_task.await.unwrap();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![(Bit::One, true, 1), (Bit::Zero, true, 1)]
    );
    assert_eq!(device.stats().listen_ticks, 2);
}

#[tokio::test]
async fn test_send_on_unbound_iface() {
    let (send_ticker, send_clock) = ManualTicker::new();
    let (device, _) = mock_device(vec![send_ticker]);
    let cable = Cable::new();
    let eth0 = iface("eth0");

    assert_eq!(device.send(eth0, &[Bit::One]).await, Err(PhyError::IfaceNotInUse));

    connect(&cable, &device, eth0).unwrap();
    let sender = Arc::clone(&device);
    let task = tokio::spawn(async move { sender.send(eth0, &[Bit::One, Bit::One]).await });

    send_clock.tick().await;
    disconnect(&cable, &device).unwrap();
    send_clock.tick().await;

    assert_eq!(task.await.unwrap(), Err(PhyError::IfaceNotInUse));
    assert_eq!(device.stats().bits_written, 1);
}

#[tokio::test]
async fn test_device_requests_configured_periods() {
    let (send_ticker, send_clock) = ManualTicker::new();
    let (listen_ticker, listen_clock) = ManualTicker::new();
    let factory = Arc::new(ManualTickerFactory::new(vec![send_ticker, listen_ticker]));
    let config = DeviceConfig {
        send_clock_period_us: 800,
        listen_clock_period_us: 100,
        minimum_preamble_bit_count: 8,
    };
    let device = Device::from_config(
        &config,
        Arc::clone(&factory) as Arc<dyn TickerFactory>,
        Received::default().handler(),
    )
    .unwrap();

    let cable = Cable::new();
    let eth0 = iface("eth0");
    connect(&cable, &device, eth0).unwrap();

    let sender = Arc::clone(&device);
    let send_task = tokio::spawn(async move { sender.send(eth0, &[Bit::One]).await });
    send_clock.tick_n(2).await;
    assert_eq!(send_task.await.unwrap(), Ok(()));

    let listener = Arc::clone(&device);
    let listen_task = tokio::spawn(async move { listener.listen().await });
    listen_clock.tick().await;
    drop(listen_clock);
    listen_task.await.unwrap();

    assert_eq!(
        factory.requested_periods(),
        vec![Duration::from_micros(800), Duration::from_micros(100)]
    );
}

#[test]
fn test_from_config_rejects_undersampling() {
    let config = DeviceConfig {
        send_clock_period_us: 100,
        listen_clock_period_us: 100,
        minimum_preamble_bit_count: 8,
    };
    let result = Device::from_config(
        &config,
        Arc::new(ManualTickerFactory::new(Vec::new())),
        Received::default().handler(),
    );
    assert!(matches!(result, Err(PhyError::InvalidConfig(_))));
}
