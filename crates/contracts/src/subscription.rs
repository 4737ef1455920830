//! Background log delivery.
//!
//! Every [`Subscription`] owns exactly one delivery task. The task selects
//! over the transport stream and a quit signal, decodes each log and
//! forwards it into the caller's sink. Quitting drops the transport stream,
//! which for pubsub streams sends `eth_unsubscribe`, before the task returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ethers::contract::{parse_log, EthLogDecode, LogMeta};
use ethers::providers::{Middleware, PubsubClient};
use ethers::types::{Filter, Log};
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use river_common::{Error, Result};

/// Pass logs through undecoded
pub fn raw(log: Log) -> Result<Log> {
    Ok(log)
}

/// Decode a log into event `D` with its metadata
pub fn typed<D: EthLogDecode>(log: Log) -> Result<(D, LogMeta)> {
    let meta = LogMeta::from(&log);
    let event = parse_log::<D>(log).map_err(|e| Error::decode(format!("Failed to decode log: {}", e)))?;
    Ok((event, meta))
}

/// Handle to a running delivery loop
#[derive(Debug)]
pub struct Subscription {
    quit: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
    err: Option<Error>,
}

impl Subscription {
    /// Spawn a delivery loop. `run` receives the quit signal and must return
    /// once it fires.
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (quit_tx, quit_rx) = oneshot::channel();
        let handle = tokio::spawn(run(quit_rx));
        Self {
            quit: Some(quit_tx),
            handle: Some(handle),
            err: None,
        }
    }

    /// Deliver logs from an existing stream
    pub fn from_stream<S, T, F>(stream: S, decode: F, sink: mpsc::Sender<T>) -> Self
    where
        S: Stream<Item = Log> + Send + 'static,
        T: Send + 'static,
        F: FnMut(Log) -> Result<T> + Send + 'static,
    {
        Self::spawn(move |quit| deliver(stream, quit, decode, sink))
    }

    /// Subscribe to logs over a pubsub transport (`eth_subscribe`)
    pub fn subscribe_logs<M, T, F>(client: Arc<M>, filter: Filter, decode: F, sink: mpsc::Sender<T>) -> Self
    where
        M: Middleware + 'static,
        M::Provider: PubsubClient,
        T: Send + 'static,
        F: FnMut(Log) -> Result<T> + Send + 'static,
    {
        Self::spawn(move |quit| async move {
            let stream = client
                .subscribe_logs(&filter)
                .await
                .map_err(|e| Error::subscription(format!("Failed to subscribe to logs: {}", e)))?;
            debug!(subscription_id = ?stream.id, "Log subscription opened");
            deliver(stream, quit, decode, sink).await
        })
    }

    /// Follow logs by polling an installed filter (`eth_newFilter`)
    pub fn poll_logs<M, T, F>(
        client: Arc<M>,
        filter: Filter,
        interval: Duration,
        decode: F,
        sink: mpsc::Sender<T>,
    ) -> Self
    where
        M: Middleware + 'static,
        T: Send + 'static,
        F: FnMut(Log) -> Result<T> + Send + 'static,
    {
        Self::spawn(move |quit| async move {
            let stream = client
                .watch(&filter)
                .await
                .map_err(|e| Error::subscription(format!("Failed to install log filter: {}", e)))?
                .interval(interval);
            deliver(stream, quit, decode, sink).await
        })
    }

    /// Stop the delivery loop and wait for it to exit. Safe to call repeatedly.
    pub async fn unsubscribe(&mut self) {
        if let Some(quit) = self.quit.take() {
            // The loop may already be gone
            let _ = quit.send(());
        }
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.err = Some(e),
                Err(e) => self.err = Some(Error::subscription(format!("delivery loop aborted: {}", e))),
            }
        }
    }

    /// Terminal error of the delivery loop, available once it has been joined
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Take the terminal error out of a joined subscription
    pub fn take_err(&mut self) -> Option<Error> {
        self.err.take()
    }

    /// Whether the delivery loop is still running
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(quit) = self.quit.take() {
            let _ = quit.send(());
        }
    }
}

async fn deliver<S, T, F>(
    stream: S,
    mut quit: oneshot::Receiver<()>,
    mut decode: F,
    sink: mpsc::Sender<T>,
) -> Result<()>
where
    S: Stream<Item = Log>,
    F: FnMut(Log) -> Result<T>,
{
    let mut stream = Box::pin(stream);
    loop {
        tokio::select! {
            _ = &mut quit => {
                debug!("Log subscription cancelled");
                return Ok(());
            }
            item = stream.next() => {
                let log = match item {
                    Some(log) => log,
                    None => {
                        warn!("Log stream closed by transport");
                        return Err(Error::subscription("log stream ended"));
                    }
                };
                let value = decode(log)?;
                tokio::select! {
                    _ = &mut quit => return Ok(()),
                    sent = sink.send(value) => {
                        if sent.is_err() {
                            debug!("Log sink dropped, stopping delivery");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};

    use futures::channel::mpsc as fmpsc;

    struct Guarded {
        inner: fmpsc::UnboundedReceiver<Log>,
        dropped: Arc<AtomicBool>,
    }

    impl Stream for Guarded {
        type Item = Log;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Log>> {
            Pin::new(&mut self.inner).poll_next(cx)
        }
    }

    impl Drop for Guarded {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn guarded() -> (fmpsc::UnboundedSender<Log>, Guarded, Arc<AtomicBool>) {
        let (tx, rx) = fmpsc::unbounded();
        let dropped = Arc::new(AtomicBool::new(false));
        (tx, Guarded { inner: rx, dropped: dropped.clone() }, dropped)
    }

    fn log_at(block: u64) -> Log {
        Log {
            block_number: Some(block.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_forwards_in_order() {
        let (tx, stream, _) = guarded();
        let (sink, mut rx) = mpsc::channel(8);
        let mut sub = Subscription::from_stream(stream, raw, sink);

        for block in [3u64, 1, 2] {
            tx.unbounded_send(log_at(block)).unwrap();
        }
        for expected in [3u64, 1, 2] {
            let log = rx.recv().await.unwrap();
            assert_eq!(log.block_number, Some(expected.into()));
        }

        sub.unsubscribe().await;
        assert!(sub.err().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_stream() {
        let (_tx, stream, dropped) = guarded();
        let (sink, _rx) = mpsc::channel::<Log>(1);
        let mut sub = Subscription::from_stream(stream, raw, sink);
        assert!(sub.is_active());

        sub.unsubscribe().await;
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!sub.is_active());

        // Second call is a no-op
        sub.unsubscribe().await;
        assert!(sub.err().is_none());
    }

    #[tokio::test]
    async fn test_drop_cancels_loop() {
        let (_tx, stream, dropped) = guarded();
        let (sink, mut rx) = mpsc::channel::<Log>(1);
        let sub = Subscription::from_stream(stream, raw, sink);
        drop(sub);

        // The loop drops its sink on exit
        assert!(rx.recv().await.is_none());
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_while_sink_is_full() {
        let (tx, stream, dropped) = guarded();
        let (sink, _rx) = mpsc::channel::<Log>(1);
        let mut sub = Subscription::from_stream(stream, raw, sink);

        // First fills the buffer, second blocks inside send
        tx.unbounded_send(log_at(1)).unwrap();
        tx.unbounded_send(log_at(2)).unwrap();
        tokio::task::yield_now().await;

        sub.unsubscribe().await;
        assert!(dropped.load(Ordering::SeqCst));
        assert!(sub.err().is_none());
    }

    #[tokio::test]
    async fn test_transport_close_is_reported() {
        let (tx, stream, _) = guarded();
        let (sink, mut rx) = mpsc::channel::<Log>(1);
        let mut sub = Subscription::from_stream(stream, raw, sink);
        drop(tx);

        assert!(rx.recv().await.is_none());
        sub.unsubscribe().await;
        assert!(matches!(sub.err(), Some(Error::Subscription(_))));
    }

    #[tokio::test]
    async fn test_decode_failure_stops_delivery() {
        let (tx, stream, dropped) = guarded();
        let (sink, mut rx) = mpsc::channel(4);
        let mut sub = Subscription::from_stream(
            stream,
            |log: Log| {
                if log.block_number == Some(2u64.into()) {
                    Err(Error::decode("bad log"))
                } else {
                    Ok(log)
                }
            },
            sink,
        );

        tx.unbounded_send(log_at(1)).unwrap();
        tx.unbounded_send(log_at(2)).unwrap();
        tx.unbounded_send(log_at(3)).unwrap();

        assert_eq!(rx.recv().await.unwrap().block_number, Some(1u64.into()));
        assert!(rx.recv().await.is_none());

        sub.unsubscribe().await;
        assert!(matches!(sub.err(), Some(Error::Decode(_))));
        assert!(dropped.load(Ordering::SeqCst));
    }
}
