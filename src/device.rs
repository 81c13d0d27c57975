use crate::bit::Bit;
use crate::cable::Cable;
use crate::codec::{
    BitHandler, Decoder, DecoderFactory, Encoder, ManchesterDecoderFactory, ManchesterEncoder,
};
use crate::config::DeviceConfig;
use crate::error::{PhyError, Result};
use crate::iface::Iface;
use crate::ticker::{IntervalTickerFactory, TickerFactory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Binding of one interface: the cable it is plugged into and the decoder
/// reading it. Created on connect, dropped on disconnect.
struct Port {
    cable: Arc<Cable>,
    decoder: Box<dyn Decoder>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub listen_ticks: u64,
    pub samples_read: u64,
    pub bits_written: u64,
}

// Bits decoded during the current listen cycle, in the order decoders emitted them
type Deliveries = Arc<Mutex<Vec<(Bit, Iface)>>>;

#[derive(Debug, Default)]
struct StatsCounters {
    listen_ticks: AtomicU64,
    samples_read: AtomicU64,
    bits_written: AtomicU64,
}

/// A network endpoint with any number of interfaces.
///
/// `send` drives encoded bits onto a cable at the send clock; `listen` samples
/// every bound cable at the listen clock and feeds the interface's decoder.
/// The listen clock must run several times faster than the send clock, since
/// decoders only see transitions between consecutive samples.
pub struct Device {
    ports: Mutex<BTreeMap<Iface, Port>>,

    ticker_factory: Arc<dyn TickerFactory>,
    send_clock_period: Duration,
    listen_clock_period: Duration,

    encoder: Arc<dyn Encoder>,
    decoder_factory: Arc<dyn DecoderFactory>,
    bit_handler: Arc<dyn BitHandler>,
    deliveries: Deliveries,

    stats: StatsCounters,
}

impl Device {
    #[must_use]
    pub fn new(
        ticker_factory: Arc<dyn TickerFactory>,
        send_clock_period: Duration,
        listen_clock_period: Duration,
        encoder: Arc<dyn Encoder>,
        decoder_factory: Arc<dyn DecoderFactory>,
        bit_handler: Arc<dyn BitHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ports: Mutex::new(BTreeMap::new()),
            ticker_factory,
            send_clock_period,
            listen_clock_period,
            encoder,
            decoder_factory,
            bit_handler,
            deliveries: Arc::new(Mutex::new(Vec::new())),
            stats: StatsCounters::default(),
        })
    }

    /// Manchester device with validated clock periods from `config`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails [`DeviceConfig::validate`].
    pub fn from_config(
        config: &DeviceConfig,
        ticker_factory: Arc<dyn TickerFactory>,
        bit_handler: Arc<dyn BitHandler>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        Ok(Self::new(
            ticker_factory,
            config.send_clock_period(),
            config.listen_clock_period(),
            Arc::new(ManchesterEncoder::new()),
            Arc::new(ManchesterDecoderFactory::with_minimum_preamble_bits(
                config.minimum_preamble_bit_count,
            )),
            bit_handler,
        ))
    }

    /// Manchester device on tokio interval clocks with the default periods.
    #[must_use]
    pub fn with_defaults(bit_handler: Arc<dyn BitHandler>) -> Arc<Self> {
        let config = DeviceConfig::default();
        Self::new(
            Arc::new(IntervalTickerFactory),
            config.send_clock_period(),
            config.listen_clock_period(),
            Arc::new(ManchesterEncoder::new()),
            Arc::new(ManchesterDecoderFactory::with_minimum_preamble_bits(
                config.minimum_preamble_bit_count,
            )),
            bit_handler,
        )
    }

    #[must_use]
    pub fn connected_ifaces(&self) -> Vec<Iface> {
        self.lock_ports().keys().copied().collect()
    }

    #[must_use]
    pub fn is_connected(&self, iface: Iface) -> bool {
        self.lock_ports().contains_key(&iface)
    }

    #[must_use]
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            listen_ticks: self.stats.listen_ticks.load(Ordering::Relaxed),
            samples_read: self.stats.samples_read.load(Ordering::Relaxed),
            bits_written: self.stats.bits_written.load(Ordering::Relaxed),
        }
    }

    /// Transmit `bits` on `iface`, one encoded bit per send tick.
    ///
    /// Returns once the encoded sequence is exhausted or the send clock
    /// closes.
    ///
    /// # Errors
    ///
    /// `IfaceNotInUse` if the interface is unbound when the transmission
    /// starts or becomes unbound part way through.
    pub async fn send(&self, iface: Iface, bits: &[Bit]) -> Result<()> {
        if !self.is_connected(iface) {
            return Err(PhyError::IfaceNotInUse);
        }

        let mut ticker = self.ticker_factory.new_ticker(self.send_clock_period);
        let encoding = self.encoder.encode(bits);
        debug!("{}: sending {} encoded bits", iface, encoding.len());

        for bit in encoding {
            if ticker.tick().await.is_none() {
                debug!("{}: send clock closed mid-transmission", iface);
                return Ok(());
            }

            let Some(cable) = self.cable_for(iface) else {
                warn!("{}: disconnected during transmission", iface);
                return Err(PhyError::IfaceNotInUse);
            };
            cable.write(bit);
            self.stats.bits_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Sample every bound cable once per listen tick until the listen clock
    /// closes.
    pub async fn listen(&self) {
        let mut ticker = self.ticker_factory.new_ticker(self.listen_clock_period);

        while ticker.tick().await.is_some() {
            self.handle_listen_clock_cycle();
        }

        debug!("Listen clock closed, listen loop ending");
    }

    /// Like [`Device::listen`], but also stops once `shutdown` becomes `true`
    /// or its sender is dropped.
    pub async fn listen_until(&self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        let mut ticker = self.ticker_factory.new_ticker(self.listen_clock_period);

        loop {
            tokio::select! {
                tick = ticker.tick() => match tick {
                    Some(_) => self.handle_listen_clock_cycle(),
                    None => {
                        debug!("Listen clock closed, listen loop ending");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Shutdown requested, listen loop ending");
                        break;
                    }
                }
            }
        }
    }

    fn handle_listen_clock_cycle(&self) {
        self.stats.listen_ticks.fetch_add(1, Ordering::Relaxed);

        {
            let mut ports = self.lock_ports();
            for port in ports.values_mut() {
                let bit = port.cable.read();
                port.decoder.handle(bit);
                self.stats.samples_read.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Port map is released here, so handlers may call back into this device
        let delivered = std::mem::take(&mut *lock_deliveries(&self.deliveries));
        for (bit, iface) in delivered {
            self.bit_handler.handle(bit, iface);
        }
    }

    fn cable_for(&self, iface: Iface) -> Option<Arc<Cable>> {
        self.lock_ports().get(&iface).map(|port| Arc::clone(&port.cable))
    }

    fn lock_ports(&self) -> MutexGuard<'_, BTreeMap<Iface, Port>> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `iface` to `cable` with a fresh decoder.
    pub(crate) fn attach(&self, cable: &Arc<Cable>, iface: Iface) -> Result<()> {
        let mut ports = self.lock_ports();
        if ports.contains_key(&iface) {
            return Err(PhyError::IfaceInUse);
        }

        let deliveries = Arc::clone(&self.deliveries);
        let forwarder = move |bit: Bit| lock_deliveries(&deliveries).push((bit, iface));
        let decoder = self.decoder_factory.new_decoder(Box::new(forwarder));

        ports.insert(
            iface,
            Port {
                cable: Arc::clone(cable),
                decoder,
            },
        );
        Ok(())
    }

    /// Unbind `iface` from `cable`, discarding its decoder.
    pub(crate) fn detach(&self, cable: &Arc<Cable>, iface: Iface) -> Result<()> {
        let mut ports = self.lock_ports();
        let bound_here = ports
            .get(&iface)
            .is_some_and(|port| Arc::ptr_eq(&port.cable, cable));
        if !bound_here {
            return Err(PhyError::IfaceNotInUse);
        }

        ports.remove(&iface);
        Ok(())
    }
}

fn lock_deliveries(deliveries: &Deliveries) -> MutexGuard<'_, Vec<(Bit, Iface)>> {
    deliveries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("ifaces", &self.connected_ifaces())
            .field("send_clock_period", &self.send_clock_period)
            .field("listen_clock_period", &self.listen_clock_period)
            .finish_non_exhaustive()
    }
}
