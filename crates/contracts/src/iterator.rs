//! Typed event iteration over historical or live logs.

use std::collections::VecDeque;
use std::marker::PhantomData;

use ethers::contract::{parse_log, EthLogDecode, LogMeta};
use ethers::types::Log;
use tokio::sync::mpsc;
use tracing::debug;

use river_common::{Error, Result};

use crate::subscription::Subscription;

/// Logs buffered between the delivery loop and the iterator
const LIVE_BUFFER: usize = 128;

/// Iterator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// More logs may still arrive
    Active,
    /// The source has ended; buffered logs are still yielded
    Exhausted,
    /// A decode or transport error occurred; nothing more is yielded
    Failed,
}

struct Live {
    rx: mpsc::Receiver<Log>,
    subscription: Subscription,
}

/// Iterator decoding logs into event `D` in the order the node produced them
pub struct LogIterator<D> {
    state: IterState,
    buffered: VecDeque<Log>,
    live: Option<Live>,
    error: Option<Error>,
    closed: bool,
    _event: PhantomData<fn() -> D>,
}

impl<D: EthLogDecode> LogIterator<D> {
    /// Iterate over an already fetched batch of logs
    pub fn from_logs(logs: Vec<Log>) -> Self {
        Self {
            state: IterState::Exhausted,
            buffered: logs.into(),
            live: None,
            error: None,
            closed: false,
            _event: PhantomData,
        }
    }

    /// Iterate over a live source. `open` receives the sink raw logs must go to.
    pub fn from_subscription<F>(open: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Log>) -> Subscription,
    {
        let (tx, rx) = mpsc::channel(LIVE_BUFFER);
        let subscription = open(tx);
        Self {
            state: IterState::Active,
            buffered: VecDeque::new(),
            live: Some(Live { rx, subscription }),
            error: None,
            closed: false,
            _event: PhantomData,
        }
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    /// Terminal failure, if any
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Next decoded event, `None` once exhausted, failed or closed
    pub async fn next(&mut self) -> Option<D> {
        self.next_with_meta().await.map(|(event, _)| event)
    }

    /// Next decoded event together with its block and transaction metadata
    pub async fn next_with_meta(&mut self) -> Option<(D, LogMeta)> {
        loop {
            if self.closed || self.state == IterState::Failed {
                return None;
            }

            if let Some(log) = self.buffered.pop_front() {
                let meta = LogMeta::from(&log);
                return match parse_log::<D>(log) {
                    Ok(event) => Some((event, meta)),
                    Err(e) => {
                        self.fail(Error::decode(format!("Failed to decode log: {}", e))).await;
                        None
                    }
                };
            }

            if self.state == IterState::Exhausted {
                return None;
            }

            let received = match self.live.as_mut() {
                Some(live) => live.rx.recv().await,
                None => None,
            };
            match received {
                Some(log) => self.buffered.push_back(log),
                None => self.finish_live().await,
            }
        }
    }

    /// Drain every remaining event
    pub async fn collect(mut self) -> Result<Vec<D>> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(events),
        }
    }

    /// Release the underlying subscription. Safe to call any number of times,
    /// including after exhaustion or failure.
    pub async fn close(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.rx.close();
            live.subscription.unsubscribe().await;
        }
        self.buffered.clear();
        self.closed = true;
    }

    async fn finish_live(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.subscription.unsubscribe().await;
            if let Some(e) = live.subscription.take_err() {
                self.state = IterState::Failed;
                self.error = Some(e);
                return;
            }
        }
        debug!("Log source exhausted");
        self.state = IterState::Exhausted;
    }

    async fn fail(&mut self, error: Error) {
        self.state = IterState::Failed;
        self.error = Some(error);
        if let Some(mut live) = self.live.take() {
            live.subscription.unsubscribe().await;
        }
    }
}
