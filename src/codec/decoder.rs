use super::{Decoder, DecoderFactory, IfaceBitHandler};
use crate::bit::Bit;
use crate::config::DEFAULT_MINIMUM_PREAMBLE_BIT_COUNT;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// Interval windows as multiples of the half-period estimate T
const SINGLE_PERIOD_LOWER: f64 = 0.75;
const SINGLE_PERIOD_UPPER: f64 = 1.5;
const DOUBLE_PERIOD_UPPER: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecoderMode {
    Preamble,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DecoderStats {
    pub transitions: u32,
    pub emitted_bits: u32,
    pub data_locks: u32,
    pub relocks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interval {
    Single,
    Double,
    Invalid,
}

/// Adaptive Manchester decoder.
///
/// Samples arrive at the listen rate. Repeated values only lengthen the
/// current interval; every transition is classified against the learned
/// half-period `T` and drives the Preamble/Data state machine. Timing that
/// fits neither window throws `T` away and restarts acquisition from the
/// interval just observed, so a bad estimate never wedges the decoder.
pub struct ManchesterDecoder {
    handler: Box<dyn IfaceBitHandler>,
    mode: DecoderMode,

    // Ticks between transitions is T for a mid-cell/boundary pair of the same
    // data value and 2T for alternating data (the preamble). 0 means unknown.
    half_period: f64,

    prev_bit: Bit,
    is_first_bit: bool,
    is_first_transition: bool,
    ticks_since_last_transition: u32,

    preamble_bit_count: u32,
    minimum_preamble_bit_count: u32,

    previous_transition_reset: bool,
    stats: DecoderStats,
}

impl ManchesterDecoder {
    #[must_use]
    pub fn new(handler: Box<dyn IfaceBitHandler>) -> Self {
        Self::with_minimum_preamble_bits(handler, DEFAULT_MINIMUM_PREAMBLE_BIT_COUNT)
    }

    #[must_use]
    pub fn with_minimum_preamble_bits(
        handler: Box<dyn IfaceBitHandler>,
        minimum_preamble_bit_count: u32,
    ) -> Self {
        Self {
            handler,
            mode: DecoderMode::Preamble,
            half_period: 0.0,
            prev_bit: Bit::Zero,
            is_first_bit: true,
            is_first_transition: true,
            ticks_since_last_transition: 0,
            preamble_bit_count: 0,
            minimum_preamble_bit_count,
            previous_transition_reset: false,
            stats: DecoderStats::default(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    /// Current half-period estimate in listen ticks, `None` until learned.
    #[must_use]
    pub fn half_period(&self) -> Option<f64> {
        if self.half_period > 0.0 {
            Some(self.half_period)
        } else {
            None
        }
    }

    #[must_use]
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn classify(&self, ticks: f64) -> Interval {
        let single_upper = self.half_period * SINGLE_PERIOD_UPPER;

        if self.half_period * SINGLE_PERIOD_LOWER <= ticks && ticks <= single_upper {
            Interval::Single
        } else if single_upper < ticks && ticks <= self.half_period * DOUBLE_PERIOD_UPPER {
            Interval::Double
        } else {
            Interval::Invalid
        }
    }

    /// Drop the current estimate and re-learn from the interval just observed,
    /// treating it as a full preamble period (2T).
    fn reset_to_preamble(&mut self) {
        let previous = self.half_period;
        self.mode = DecoderMode::Preamble;
        self.half_period = f64::from(self.ticks_since_last_transition) / 2.0;
        self.preamble_bit_count = 0;
        self.previous_transition_reset = false;
        self.stats.relocks += 1;

        debug!(
            "Manchester decoder re-locking: T {:.2} -> {:.2}",
            previous, self.half_period
        );
    }

    fn move_to_data_state(&mut self, bit: Bit) {
        self.mode = DecoderMode::Data;
        self.preamble_bit_count = 0;
        // The transition that ended the preamble was a mid-cell one
        self.previous_transition_reset = true;
        self.prev_bit = bit;
        self.stats.data_locks += 1;

        debug!("Manchester decoder locked: T = {:.2}", self.half_period);
    }

    fn emit(&mut self, bit: Bit) {
        trace!("Manchester decoder emitting {}", bit);
        self.handler.handle(bit);
        self.prev_bit = bit;
        self.stats.emitted_bits += 1;
    }

    fn send_preamble_bit(&mut self, bit: Bit) {
        self.emit(bit);
        self.preamble_bit_count += 1;
    }

    fn send_data_bit(&mut self, bit: Bit) {
        self.emit(bit);
        self.previous_transition_reset = false;
    }

    fn handle_preamble_transition(&mut self, bit: Bit, interval: Interval) {
        if self.half_period().is_none() {
            if self.is_first_transition {
                // Nothing to measure against yet
                self.is_first_transition = false;
            } else {
                self.half_period = f64::from(self.ticks_since_last_transition) / 2.0;
            }
            self.send_preamble_bit(bit);
            return;
        }

        match interval {
            Interval::Single => {
                if self.preamble_bit_count >= self.minimum_preamble_bit_count {
                    // Cell boundary after a long enough preamble: data starts here.
                    // The transition itself is not a data value.
                    self.move_to_data_state(bit);
                } else {
                    self.reset_to_preamble();
                    self.send_preamble_bit(bit);
                }
            }
            Interval::Double => self.send_preamble_bit(bit),
            Interval::Invalid => {
                self.reset_to_preamble();
                self.send_preamble_bit(bit);
            }
        }
    }

    fn handle_data_transition(&mut self, bit: Bit, interval: Interval) {
        match interval {
            Interval::Single => {
                if self.previous_transition_reset {
                    self.send_data_bit(bit);
                } else {
                    self.previous_transition_reset = true;
                    self.prev_bit = bit;
                }
            }
            Interval::Double => {
                if self.previous_transition_reset {
                    // Expected mid-cell transition never came
                    self.reset_to_preamble();
                    self.send_preamble_bit(bit);
                } else {
                    self.send_data_bit(bit);
                }
            }
            Interval::Invalid => {
                self.reset_to_preamble();
                self.send_preamble_bit(bit);
            }
        }
    }
}

impl Decoder for ManchesterDecoder {
    fn handle(&mut self, bit: Bit) {
        if self.is_first_bit {
            self.is_first_bit = false;
            self.prev_bit = bit;
        }

        if self.prev_bit == bit {
            self.ticks_since_last_transition = self.ticks_since_last_transition.saturating_add(1);
            return;
        }

        self.stats.transitions += 1;
        let interval = self.classify(f64::from(self.ticks_since_last_transition));

        match self.mode {
            DecoderMode::Preamble => self.handle_preamble_transition(bit, interval),
            DecoderMode::Data => self.handle_data_transition(bit, interval),
        }

        // The sample just processed is tick 1 of the next interval
        self.ticks_since_last_transition = 1;
    }
}

impl core::fmt::Debug for ManchesterDecoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManchesterDecoder")
            .field("mode", &self.mode)
            .field("half_period", &self.half_period)
            .field("ticks_since_last_transition", &self.ticks_since_last_transition)
            .field("preamble_bit_count", &self.preamble_bit_count)
            .field("previous_transition_reset", &self.previous_transition_reset)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ManchesterDecoderFactory {
    minimum_preamble_bit_count: u32,
}

impl ManchesterDecoderFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_minimum_preamble_bits(DEFAULT_MINIMUM_PREAMBLE_BIT_COUNT)
    }

    #[must_use]
    pub fn with_minimum_preamble_bits(minimum_preamble_bit_count: u32) -> Self {
        Self {
            minimum_preamble_bit_count,
        }
    }
}

impl Default for ManchesterDecoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderFactory for ManchesterDecoderFactory {
    fn new_decoder(&self, handler: Box<dyn IfaceBitHandler>) -> Box<dyn Decoder> {
        Box::new(ManchesterDecoder::with_minimum_preamble_bits(
            handler,
            self.minimum_preamble_bit_count,
        ))
    }
}
