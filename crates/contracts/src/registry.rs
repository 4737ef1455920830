//! River registry access: nodes, streams and their on-chain events.
//!
//! Reads accept a block number where zero means latest. Stream enumeration
//! pages through `getPaginatedStreams`, optionally with several concurrent
//! readers, and retries each page with backoff. Writes wait for the receipt
//! and fail if the transaction did not succeed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ethers::contract::{parse_log, EthEvent, LogMeta};
use ethers::providers::{Middleware, PubsubClient};
use ethers::types::{Address, Filter, Log, TransactionReceipt, ValueOrArray, H256, U256};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use river_common::{stream_id_hex, BlockNum, Error, Result, StreamId};
use river_core::RegistryReaderConfig;

use crate::bindings::mock_river_registry::{
    ConfigurationChangedFilter, Node, NodeAddedFilter, NodeRemovedFilter, NodeStatusUpdatedFilter,
    NodeUrlUpdatedFilter, SetMiniblock, Stream, StreamAllocatedFilter, StreamLastMiniblockUpdateFailedFilter,
    StreamLastMiniblockUpdatedFilter, StreamPlacementUpdatedFilter, StreamWithId,
};
use crate::bindings::MockRiverRegistry;
use crate::call::{self, ensure_success, wait_for_receipt, CallOpts, TransactOpts};
use crate::evm_error::EvmErrorDecoder;
use crate::retry::Backoff;
use crate::subscription::Subscription;

/// Bit in the stream flags marking a sealed stream
pub const STREAM_SEALED_FLAG: u64 = 1;

const EVENT_BUFFER: usize = 256;

/// Stream state as recorded by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRecord {
    #[serde(with = "hex_id")]
    pub stream_id: StreamId,
    pub nodes: Vec<Address>,
    pub last_miniblock_hash: H256,
    pub last_miniblock_num: u64,
    pub is_sealed: bool,
}

impl StreamRecord {
    pub fn new(stream_id: StreamId, stream: Stream) -> Self {
        Self {
            stream_id,
            nodes: stream.nodes,
            last_miniblock_hash: H256::from(stream.last_miniblock_hash),
            last_miniblock_num: stream.last_miniblock_num,
            is_sealed: stream.flags & STREAM_SEALED_FLAG != 0,
        }
    }
}

impl From<StreamWithId> for StreamRecord {
    fn from(s: StreamWithId) -> Self {
        Self::new(s.id, s.stream)
    }
}

mod hex_id {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(id: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(id)))
    }
}

/// Stream record together with its genesis miniblock
#[derive(Debug, Clone, Serialize)]
pub struct StreamWithGenesis {
    pub stream: StreamRecord,
    pub genesis_miniblock_hash: H256,
    pub genesis_miniblock: ethers::types::Bytes,
    /// Block the read was pinned to
    pub block: u64,
}

/// New last miniblock for one stream in a batch update
#[derive(Debug, Clone)]
pub struct MiniblockUpdate {
    pub stream_id: StreamId,
    pub prev_miniblock_hash: H256,
    pub last_miniblock_hash: H256,
    pub last_miniblock_num: u64,
    pub is_sealed: bool,
}

impl From<&MiniblockUpdate> for SetMiniblock {
    fn from(mb: &MiniblockUpdate) -> Self {
        SetMiniblock {
            stream_id: mb.stream_id,
            prev_mini_block_hash: mb.prev_miniblock_hash.0,
            last_miniblock_hash: mb.last_miniblock_hash.0,
            last_miniblock_num: mb.last_miniblock_num,
            is_sealed: mb.is_sealed,
        }
    }
}

/// Registry events relevant to nodes, streams and configuration
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    NodeAdded(NodeAddedFilter),
    NodeRemoved(NodeRemovedFilter),
    NodeStatusUpdated(NodeStatusUpdatedFilter),
    NodeUrlUpdated(NodeUrlUpdatedFilter),
    StreamAllocated(StreamAllocatedFilter),
    StreamLastMiniblockUpdated(StreamLastMiniblockUpdatedFilter),
    StreamLastMiniblockUpdateFailed(StreamLastMiniblockUpdateFailedFilter),
    StreamPlacementUpdated(StreamPlacementUpdatedFilter),
    ConfigurationChanged(ConfigurationChangedFilter),
}

impl RegistryEvent {
    /// Stream the event refers to, for stream events
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            RegistryEvent::StreamAllocated(e) => Some(e.stream_id),
            RegistryEvent::StreamLastMiniblockUpdated(e) => Some(e.stream_id),
            RegistryEvent::StreamLastMiniblockUpdateFailed(e) => Some(e.stream_id),
            RegistryEvent::StreamPlacementUpdated(e) => Some(e.stream_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::NodeAdded(_) => "NodeAdded",
            RegistryEvent::NodeRemoved(_) => "NodeRemoved",
            RegistryEvent::NodeStatusUpdated(_) => "NodeStatusUpdated",
            RegistryEvent::NodeUrlUpdated(_) => "NodeUrlUpdated",
            RegistryEvent::StreamAllocated(_) => "StreamAllocated",
            RegistryEvent::StreamLastMiniblockUpdated(_) => "StreamLastMiniblockUpdated",
            RegistryEvent::StreamLastMiniblockUpdateFailed(_) => "StreamLastMiniblockUpdateFailed",
            RegistryEvent::StreamPlacementUpdated(_) => "StreamPlacementUpdated",
            RegistryEvent::ConfigurationChanged(_) => "ConfigurationChanged",
        }
    }
}

/// Topics of the node lifecycle events
pub fn node_event_topics() -> Vec<H256> {
    vec![
        NodeAddedFilter::signature(),
        NodeRemovedFilter::signature(),
        NodeStatusUpdatedFilter::signature(),
        NodeUrlUpdatedFilter::signature(),
    ]
}

/// Topics of the events that change stream state
pub fn stream_event_topics() -> Vec<H256> {
    vec![
        StreamAllocatedFilter::signature(),
        StreamLastMiniblockUpdatedFilter::signature(),
        StreamPlacementUpdatedFilter::signature(),
    ]
}

/// Decode a registry log by its first topic
pub fn parse_event(log: Log) -> Result<RegistryEvent> {
    let topic = *log
        .topics
        .first()
        .ok_or_else(|| Error::decode("log has no topics"))?;

    fn decode<D: EthEvent>(log: Log) -> Result<D> {
        parse_log::<D>(log).map_err(|e| Error::decode(format!("Failed to decode {}: {}", D::name(), e)))
    }

    let event = if topic == NodeAddedFilter::signature() {
        RegistryEvent::NodeAdded(decode(log)?)
    } else if topic == NodeRemovedFilter::signature() {
        RegistryEvent::NodeRemoved(decode(log)?)
    } else if topic == NodeStatusUpdatedFilter::signature() {
        RegistryEvent::NodeStatusUpdated(decode(log)?)
    } else if topic == NodeUrlUpdatedFilter::signature() {
        RegistryEvent::NodeUrlUpdated(decode(log)?)
    } else if topic == StreamAllocatedFilter::signature() {
        RegistryEvent::StreamAllocated(decode(log)?)
    } else if topic == StreamLastMiniblockUpdatedFilter::signature() {
        RegistryEvent::StreamLastMiniblockUpdated(decode(log)?)
    } else if topic == StreamLastMiniblockUpdateFailedFilter::signature() {
        RegistryEvent::StreamLastMiniblockUpdateFailed(decode(log)?)
    } else if topic == StreamPlacementUpdatedFilter::signature() {
        RegistryEvent::StreamPlacementUpdated(decode(log)?)
    } else if topic == ConfigurationChangedFilter::signature() {
        RegistryEvent::ConfigurationChanged(decode(log)?)
    } else {
        return Err(Error::decode(format!("unknown registry event topic {:?}", topic)));
    };
    Ok(event)
}

/// Callbacks for live stream events. Every method defaults to a no-op.
pub trait StreamEventHandler: Send + 'static {
    fn on_allocated(&mut self, _event: StreamAllocatedFilter, _meta: LogMeta) {}
    fn on_last_miniblock_updated(&mut self, _event: StreamLastMiniblockUpdatedFilter, _meta: LogMeta) {}
    fn on_placement_updated(&mut self, _event: StreamPlacementUpdatedFilter, _meta: LogMeta) {}
}

/// Running stream event dispatch
#[derive(Debug)]
pub struct StreamEventWatch {
    subscription: Subscription,
    dispatcher: Option<JoinHandle<()>>,
}

impl StreamEventWatch {
    /// Dispatch registry events from an existing log stream
    pub fn from_stream<S, H>(stream: S, handler: H) -> Self
    where
        S: futures::Stream<Item = Log> + Send + 'static,
        H: StreamEventHandler,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            subscription: Subscription::from_stream(stream, decode_with_meta, tx),
            dispatcher: Some(tokio::spawn(dispatch(rx, handler))),
        }
    }

    /// Stop watching and wait for the pending callbacks to finish. A
    /// delivery error wins over a failed handler.
    pub async fn stop(&mut self) -> Result<()> {
        self.subscription.unsubscribe().await;
        let dispatched = match self.dispatcher.take() {
            // The dispatcher ends once the delivery loop drops its sink
            Some(dispatcher) => dispatcher.await.map_err(|e| {
                warn!(error = %e, "Stream event handler did not complete");
                Error::generic(format!("stream event handler failed: {}", e))
            }),
            None => Ok(()),
        };
        match self.subscription.take_err() {
            Some(e) => Err(e),
            None => dispatched,
        }
    }
}

/// Client for the River registry contract
#[derive(Debug)]
pub struct RiverRegistry<M> {
    contract: MockRiverRegistry<M>,
    client: Arc<M>,
    config: RegistryReaderConfig,
    backoff: Backoff,
    decoder: EvmErrorDecoder,
    transact_opts: TransactOpts,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl<M: Middleware + 'static> RiverRegistry<M> {
    pub fn new(address: Address, client: Arc<M>, config: RegistryReaderConfig) -> Result<Self> {
        Ok(Self {
            contract: MockRiverRegistry::new(address, client.clone()),
            client,
            backoff: Backoff::from(&config),
            config,
            decoder: EvmErrorDecoder::with_bundled_errors()?,
            transact_opts: TransactOpts::default(),
            receipt_poll_interval: Duration::from_millis(500),
            receipt_timeout: Duration::from_secs(60),
        })
    }

    /// Options applied to every submitted transaction
    pub fn with_transact_opts(mut self, opts: TransactOpts) -> Self {
        self.transact_opts = opts;
        self
    }

    pub fn with_receipt_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &MockRiverRegistry<M> {
        &self.contract
    }

    pub fn decoder(&self) -> &EvmErrorDecoder {
        &self.decoder
    }

    pub async fn get_all_nodes(&self, block: BlockNum) -> Result<Vec<Node>> {
        Ok(call::call(self.contract.get_all_nodes(), &CallOpts::at(block)).await?)
    }

    pub async fn get_stream(&self, stream_id: StreamId, block: BlockNum) -> Result<StreamRecord> {
        let stream = call::call(self.contract.get_stream(stream_id), &CallOpts::at(block)).await?;
        Ok(StreamRecord::new(stream_id, stream))
    }

    /// Stream record and genesis miniblock, read at the current block
    pub async fn get_stream_with_genesis(&self, stream_id: StreamId) -> Result<StreamWithGenesis> {
        let block = self.client.get_block_number().await.map_err(|e| {
            Error::contract(format!("Failed to get block number: {}", e))
        })?;
        let block = block.as_u64();

        let (stream, genesis_hash, genesis) =
            call::call(self.contract.get_stream_with_genesis(stream_id), &CallOpts::at(block)).await?;
        Ok(StreamWithGenesis {
            stream: StreamRecord::new(stream_id, stream),
            genesis_miniblock_hash: H256::from(genesis_hash),
            genesis_miniblock: genesis,
            block,
        })
    }

    pub async fn get_stream_count(&self, block: BlockNum) -> Result<i64> {
        let count = call::call(self.contract.get_stream_count(), &CallOpts::at(block)).await?;
        if count > U256::from(i64::MAX) {
            return Err(Error::decode(format!("stream count {} does not fit into i64", count)));
        }
        Ok(count.as_u64() as i64)
    }

    fn page_size(&self) -> i64 {
        if self.config.page_size > 0 {
            self.config.page_size
        } else {
            RegistryReaderConfig::default().page_size
        }
    }

    /// Visit every allocated stream. `cb` returns `false` to stop early.
    pub async fn for_all_streams<F>(&self, block: BlockNum, cb: F) -> Result<()>
    where
        F: FnMut(StreamRecord) -> bool,
    {
        if self.config.parallel_readers > 1 {
            self.for_all_streams_parallel(block, cb).await
        } else {
            self.for_all_streams_sequential(block, cb).await
        }
    }

    async fn for_all_streams_sequential<F>(&self, block: BlockNum, mut cb: F) -> Result<()>
    where
        F: FnMut(StreamRecord) -> bool,
    {
        let page_size = self.page_size();
        let mut progress = Progress::new(self.config.progress_report_interval());
        let mut start = 0i64;

        loop {
            let (page, last_page) =
                fetch_page(&self.contract, &self.backoff, block, start, start + page_size).await?;
            progress.page_done();

            for stream in page {
                if stream.id == [0u8; 32] {
                    continue;
                }
                progress.stream_seen();
                if !cb(stream.into()) {
                    progress.finish(false);
                    return Ok(());
                }
            }
            if last_page {
                break;
            }
            start += page_size;
        }

        progress.finish(true);
        Ok(())
    }

    async fn for_all_streams_parallel<F>(&self, block: BlockNum, mut cb: F) -> Result<()>
    where
        F: FnMut(StreamRecord) -> bool,
    {
        // All pages must see the same state
        let block = if block.is_latest() {
            let current = self
                .client
                .get_block_number()
                .await
                .map_err(|e| Error::contract(format!("Failed to get block number: {}", e)))?;
            BlockNum(current.as_u64())
        } else {
            block
        };

        let count = self.get_stream_count(block).await?;
        let page_size = self.page_size();
        let mut pending: VecDeque<i64> = (0..count).step_by(page_size as usize).collect();
        debug!(count, pages = pending.len(), readers = self.config.parallel_readers, block = %block, "Reading streams in parallel");

        let mut progress = Progress::new(self.config.progress_report_interval());
        // Dropping the set aborts outstanding page reads
        let mut tasks = JoinSet::new();
        let spawn_next = |tasks: &mut JoinSet<Result<(Vec<StreamWithId>, bool)>>, pending: &mut VecDeque<i64>| {
            if let Some(start) = pending.pop_front() {
                let contract = self.contract.clone();
                let backoff = self.backoff.clone();
                tasks.spawn(async move { fetch_page(&contract, &backoff, block, start, start + page_size).await });
            }
        };

        for _ in 0..self.config.parallel_readers {
            spawn_next(&mut tasks, &mut pending);
        }

        while let Some(joined) = tasks.join_next().await {
            let (page, _) = joined.map_err(|e| Error::generic(format!("stream page reader failed: {}", e)))??;
            progress.page_done();
            spawn_next(&mut tasks, &mut pending);

            for stream in page {
                if stream.id == [0u8; 32] {
                    continue;
                }
                progress.stream_seen();
                if !cb(stream.into()) {
                    progress.finish(false);
                    return Ok(());
                }
            }
        }

        progress.finish(true);
        Ok(())
    }

    async fn submit_and_wait<D>(&self, what: &str, call: ethers::contract::FunctionCall<Arc<M>, M, D>) -> Result<TransactionReceipt>
    where
        D: ethers::abi::Detokenize,
    {
        let tx_hash = call::send(call, &self.transact_opts)
            .await
            .map_err(|e| self.decoder.explain(Error::from(e)))?;
        let receipt = wait_for_receipt(self.client.as_ref(), tx_hash, self.receipt_poll_interval, self.receipt_timeout).await?;
        ensure_success(&receipt)?;
        debug!(operation = what, tx_hash = ?tx_hash, block = ?receipt.block_number, "Transaction succeeded");
        Ok(receipt)
    }

    pub async fn allocate_stream(
        &self,
        stream_id: StreamId,
        nodes: Vec<Address>,
        genesis_miniblock_hash: H256,
        genesis_miniblock: ethers::types::Bytes,
    ) -> Result<TransactionReceipt> {
        let call = self
            .contract
            .allocate_stream(stream_id, nodes, genesis_miniblock_hash.0, genesis_miniblock);
        let receipt = self.submit_and_wait("allocateStream", call).await?;
        info!(stream_id = %stream_id_hex(&stream_id), "Stream allocated");
        Ok(receipt)
    }

    pub async fn set_stream_last_miniblock(&self, update: &MiniblockUpdate) -> Result<TransactionReceipt> {
        let call = self.contract.set_stream_last_miniblock(
            update.stream_id,
            update.prev_miniblock_hash.0,
            update.last_miniblock_hash.0,
            update.last_miniblock_num,
            update.is_sealed,
        );
        self.submit_and_wait("setStreamLastMiniblock", call).await
    }

    /// Submit a batch of miniblock updates, returning the stream ids that
    /// succeeded and the ones the registry rejected
    pub async fn set_stream_last_miniblock_batch(
        &self,
        updates: &[MiniblockUpdate],
    ) -> Result<(Vec<StreamId>, Vec<StreamId>)> {
        let miniblocks: Vec<SetMiniblock> = updates.iter().map(SetMiniblock::from).collect();
        let call = self.contract.set_stream_last_miniblock_batch(miniblocks);
        let receipt = self.submit_and_wait("setStreamLastMiniblockBatch", call).await?;
        Ok(split_batch_results(&receipt.logs))
    }

    /// Node events emitted in exactly `block`
    pub async fn get_node_events_for_block(&self, block: u64) -> Result<Vec<RegistryEvent>> {
        let mut filter = Filter::new().address(self.address()).from_block(block).to_block(block);
        filter.topics[0] = Some(ValueOrArray::Array(node_event_topics().into_iter().map(Some).collect()));

        let logs = self
            .client
            .get_logs(&filter)
            .await
            .map_err(|e| Error::contract(format!("Failed to get node logs for block {}: {}", block, e)))?;
        logs.into_iter().map(parse_event).collect()
    }

    /// Group the stream events among `logs` by stream id. Logs that fail to
    /// parse are returned alongside instead of aborting.
    pub fn filter_stream_events(&self, logs: Vec<Log>) -> (HashMap<StreamId, Vec<RegistryEvent>>, Vec<Error>) {
        let topics = stream_event_topics();
        let mut grouped: HashMap<StreamId, Vec<RegistryEvent>> = HashMap::new();
        let mut errors = Vec::new();

        for log in logs {
            if log.address != self.address() {
                continue;
            }
            match log.topics.first() {
                Some(topic) if topics.contains(topic) => {}
                _ => continue,
            }
            match parse_event(log) {
                Ok(event) => {
                    if let Some(id) = event.stream_id() {
                        grouped.entry(id).or_default().push(event);
                    }
                }
                Err(e) => errors.push(e),
            }
        }
        (grouped, errors)
    }

    fn stream_events_filter(&self, start_block: u64) -> Filter {
        let mut filter = Filter::new().address(self.address()).from_block(start_block);
        filter.topics[0] = Some(ValueOrArray::Array(stream_event_topics().into_iter().map(Some).collect()));
        filter
    }

    /// Follow stream events from `start_block` over a pubsub connection
    pub fn on_stream_event<H: StreamEventHandler>(&self, start_block: u64, handler: H) -> StreamEventWatch
    where
        M::Provider: PubsubClient,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let subscription = Subscription::subscribe_logs(
            self.client.clone(),
            self.stream_events_filter(start_block),
            decode_with_meta,
            tx,
        );
        StreamEventWatch {
            subscription,
            dispatcher: Some(tokio::spawn(dispatch(rx, handler))),
        }
    }

    /// Follow stream events from `start_block` by polling an installed filter
    pub fn poll_stream_events<H: StreamEventHandler>(
        &self,
        start_block: u64,
        interval: Duration,
        handler: H,
    ) -> StreamEventWatch {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let subscription = Subscription::poll_logs(
            self.client.clone(),
            self.stream_events_filter(start_block),
            interval,
            decode_with_meta,
            tx,
        );
        StreamEventWatch {
            subscription,
            dispatcher: Some(tokio::spawn(dispatch(rx, handler))),
        }
    }
}

async fn fetch_page<M: Middleware + 'static>(
    contract: &MockRiverRegistry<M>,
    backoff: &Backoff,
    block: BlockNum,
    start: i64,
    stop: i64,
) -> Result<(Vec<StreamWithId>, bool)> {
    let opts = CallOpts::at(block);
    backoff
        .retry("getPaginatedStreams", || {
            let call = opts.apply(contract.get_paginated_streams(U256::from(start), U256::from(stop)));
            async move { call.call().await.map_err(Error::from) }
        })
        .await
}

/// Split batch receipt logs into updated and rejected stream ids
pub fn split_batch_results(logs: &[Log]) -> (Vec<StreamId>, Vec<StreamId>) {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for log in logs.iter().filter(|l| l.topics.len() == 1) {
        let topic = log.topics[0];
        if topic == StreamLastMiniblockUpdatedFilter::signature() {
            match parse_log::<StreamLastMiniblockUpdatedFilter>(log.clone()) {
                Ok(event) => succeeded.push(event.stream_id),
                Err(e) => warn!(error = %e, "Failed to decode StreamLastMiniblockUpdated"),
            }
        } else if topic == StreamLastMiniblockUpdateFailedFilter::signature() {
            match parse_log::<StreamLastMiniblockUpdateFailedFilter>(log.clone()) {
                Ok(event) => {
                    warn!(
                        stream_id = %stream_id_hex(&event.stream_id),
                        miniblock = event.last_miniblock_num,
                        reason = %event.reason,
                        "Stream last miniblock update rejected"
                    );
                    failed.push(event.stream_id);
                }
                Err(e) => warn!(error = %e, "Failed to decode StreamLastMiniblockUpdateFailed"),
            }
        }
    }
    (succeeded, failed)
}

fn decode_with_meta(log: Log) -> Result<(RegistryEvent, LogMeta)> {
    let meta = LogMeta::from(&log);
    Ok((parse_event(log)?, meta))
}

async fn dispatch<H: StreamEventHandler>(mut rx: mpsc::Receiver<(RegistryEvent, LogMeta)>, mut handler: H) {
    while let Some((event, meta)) = rx.recv().await {
        match event {
            RegistryEvent::StreamAllocated(e) => handler.on_allocated(e, meta),
            RegistryEvent::StreamLastMiniblockUpdated(e) => handler.on_last_miniblock_updated(e, meta),
            RegistryEvent::StreamPlacementUpdated(e) => handler.on_placement_updated(e, meta),
            other => debug!(event = other.name(), "Ignoring non-stream registry event"),
        }
    }
}

struct Progress {
    started: Instant,
    last_report: Instant,
    interval: Duration,
    pages: usize,
    streams: usize,
}

impl Progress {
    fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_report: now,
            interval,
            pages: 0,
            streams: 0,
        }
    }

    fn page_done(&mut self) {
        self.pages += 1;
        if self.last_report.elapsed() >= self.interval {
            self.last_report = Instant::now();
            info!(pages = self.pages, streams = self.streams, elapsed = ?self.started.elapsed(), "Reading streams from registry");
        }
    }

    fn stream_seen(&mut self) {
        self.streams += 1;
    }

    fn finish(&self, complete: bool) {
        info!(
            pages = self.pages,
            streams = self.streams,
            elapsed = ?self.started.elapsed(),
            complete,
            "Finished reading streams from registry"
        );
    }
}
