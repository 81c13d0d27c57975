//! # Physical Layer Simulator
//!
//! A model of the bottom of a network stack: devices with independent,
//! unsynchronized clocks exchange bits over a shared cable using Manchester
//! line coding. The receiver recovers both bit timing and bit values from
//! periodic samples of the medium, with no shared clock and no framing channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phylink::{connect, Bit, Cable, Device, Iface};
//! use std::sync::Arc;
//!
//! # async fn run() -> phylink::Result<()> {
//! let cable = Cable::new();
//! let sender = Device::with_defaults(Arc::new(|_bit: Bit, _iface: Iface| {}));
//! let receiver = Device::with_defaults(Arc::new(|bit: Bit, iface: Iface| {
//!     println!("{}: {}", iface, bit);
//! }));
//!
//! let eth0 = Iface::new("eth0")?;
//! connect(&cable, &sender, eth0)?;
//! connect(&cable, &receiver, Iface::new("eth1")?)?;
//!
//! let listener = Arc::clone(&receiver);
//! tokio::spawn(async move { listener.listen().await });
//! sender.send(eth0, &[Bit::One, Bit::Zero, Bit::One, Bit::Zero]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`bit`] - the bit alphabet and bit-string helpers
//! - [`cable`] - the shared, collision-prone medium
//! - [`connection`] - plugging device interfaces into cables
//! - [`codec`] - Manchester encoder and adaptive decoder
//! - [`ticker`] - injectable clock sources for the device loops
//! - [`device`] - clocked send and listen loops
//! - [`config`] - clock periods and decoder parameters

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod bit;
pub mod cable;
pub mod codec;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod iface;
pub mod ticker;

// Re-export main public types for convenience
pub use bit::{format_bits, parse_bits, Bit};
pub use cable::Cable;
pub use codec::{
    BitHandler, Decoder, DecoderFactory, Encoder, IfaceBitHandler, ManchesterDecoder,
    ManchesterDecoderFactory, ManchesterEncoder,
};
pub use config::DeviceConfig;
pub use connection::{connect, disconnect};
pub use device::{Device, DeviceStats};
pub use error::{PhyError, Result};
pub use iface::Iface;
pub use ticker::{ManualTicker, ManualTickerFactory, TickHandle, Ticker, TickerFactory};
