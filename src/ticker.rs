//! Clock sources for the device loops.
//!
//! Loops never look at wall-clock time. They await [`Ticker::tick`], do one
//! iteration of work, and wait again. Production devices use
//! [`IntervalTickerFactory`] (tokio intervals); tests hand out
//! [`ManualTicker`]s and step them with a [`TickHandle`].
//!
//! A tick source that stalls freezes its loop indefinitely. A tick source that
//! closes ends its loop.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::warn;

pub type TickFuture<'a> = Pin<Box<dyn Future<Output = Option<Instant>> + Send + 'a>>;

pub trait Ticker: Send {
    /// Wait for the next tick. `None` once the source has closed.
    fn tick(&mut self) -> TickFuture<'_>;
}

pub trait TickerFactory: Send + Sync {
    fn new_ticker(&self, period: Duration) -> Box<dyn Ticker>;
}

pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Must be called from within a tokio runtime.
    ///
    /// Ticks missed while the loop was busy are not caught up: the schedule
    /// restarts from the late tick, so a symbol is never held for less than
    /// one period.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period.max(Duration::from_nanos(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin(async move { Some(self.interval.tick().await) })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalTickerFactory;

impl TickerFactory for IntervalTickerFactory {
    fn new_ticker(&self, period: Duration) -> Box<dyn Ticker> {
        Box::new(IntervalTicker::new(period))
    }
}

type TickMessage = (Instant, oneshot::Sender<()>);

/// Tick source driven by hand through its [`TickHandle`].
pub struct ManualTicker {
    rx: mpsc::Receiver<TickMessage>,
    // Acknowledged when the loop comes back for the next tick, or on drop
    pending_ack: Option<oneshot::Sender<()>>,
}

impl ManualTicker {
    #[must_use]
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::channel(1);
        let ticker = Self {
            rx,
            pending_ack: None,
        };
        (ticker, TickHandle { tx })
    }
}

impl Ticker for ManualTicker {
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin(async move {
            if let Some(ack) = self.pending_ack.take() {
                let _ = ack.send(());
            }
            let (instant, ack) = self.rx.recv().await?;
            self.pending_ack = Some(ack);
            Some(instant)
        })
    }
}

#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::Sender<TickMessage>,
}

impl TickHandle {
    /// Deliver one tick and wait until the consuming loop has finished the
    /// iteration it triggered.
    ///
    /// Returns `false` if the ticker is gone (its loop already ended).
    pub async fn tick(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send((Instant::now(), ack_tx)).await.is_err() {
            return false;
        }
        // Err means the ticker was dropped after taking the tick: the loop ended
        let _ = ack_rx.await;
        true
    }

    pub async fn tick_n(&self, count: usize) -> usize {
        let mut delivered = 0;
        for _ in 0..count {
            if !self.tick().await {
                break;
            }
            delivered += 1;
        }
        delivered
    }
}

/// Hands out pre-built manual tickers in order, one per `new_ticker` call.
pub struct ManualTickerFactory {
    tickers: Mutex<VecDeque<ManualTicker>>,
    requested_periods: Mutex<Vec<Duration>>,
}

impl ManualTickerFactory {
    #[must_use]
    pub fn new(tickers: Vec<ManualTicker>) -> Self {
        Self {
            tickers: Mutex::new(tickers.into()),
            requested_periods: Mutex::new(Vec::new()),
        }
    }

    /// Periods passed to `new_ticker`, in call order.
    #[must_use]
    pub fn requested_periods(&self) -> Vec<Duration> {
        self.requested_periods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TickerFactory for ManualTickerFactory {
    fn new_ticker(&self, period: Duration) -> Box<dyn Ticker> {
        self.requested_periods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(period);

        let next = self
            .tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(ticker) => Box::new(ticker),
            None => {
                warn!("Manual ticker factory exhausted, returning a closed ticker");
                // Handle dropped immediately, so the first tick() yields None
                let (ticker, _) = ManualTicker::new();
                Box::new(ticker)
            }
        }
    }
}
