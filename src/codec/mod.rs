//! Line coding.
//!
//! An [`Encoder`] turns data bits into the symbols driven onto the cable. A
//! [`Decoder`] is fed one cable sample per listen tick and emits recovered data
//! bits through an [`IfaceBitHandler`]. Devices never construct decoders
//! directly; they ask a [`DecoderFactory`] for a fresh one on every connect.

pub mod decoder;
pub mod encoder;

pub use decoder::{DecoderMode, DecoderStats, ManchesterDecoder, ManchesterDecoderFactory};
pub use encoder::ManchesterEncoder;

use crate::bit::Bit;
use crate::iface::Iface;

pub trait Encoder: Send + Sync {
    fn encode(&self, bits: &[Bit]) -> Vec<Bit>;
}

/// Receives decoded bits for a single interface.
pub trait IfaceBitHandler: Send {
    fn handle(&mut self, bit: Bit);
}

impl<F> IfaceBitHandler for F
where
    F: FnMut(Bit) + Send,
{
    fn handle(&mut self, bit: Bit) {
        self(bit);
    }
}

/// Consumes one sampled cable value per listen tick.
pub trait Decoder: Send {
    fn handle(&mut self, bit: Bit);
}

pub trait DecoderFactory: Send + Sync {
    fn new_decoder(&self, handler: Box<dyn IfaceBitHandler>) -> Box<dyn Decoder>;
}

/// Device-level sink for decoded bits.
///
/// Called from the owning device's listen loop once every interface has been
/// sampled for the tick, with no device state locked. A handler may query or
/// reconfigure its own device, but one that blocks stalls sampling on every
/// interface of that device.
pub trait BitHandler: Send + Sync {
    fn handle(&self, bit: Bit, iface: Iface);
}

impl<F> BitHandler for F
where
    F: Fn(Bit, Iface) + Send + Sync,
{
    fn handle(&self, bit: Bit, iface: Iface) {
        self(bit, iface);
    }
}
