/// Registry client tests against a mocked JSON-RPC provider
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::{AbiEncode, Token};
use ethers::contract::EthEvent;
use ethers::providers::{MockProvider, Provider};
use ethers::types::{Address, Bytes, Log, TransactionReceipt, TxHash, H256, U256, U64};

use river_common::BlockNum;
use river_contracts::bindings::mock_river_registry::{
    GetPaginatedStreamsReturn, Node, Stream, StreamLastMiniblockUpdateFailedFilter, StreamLastMiniblockUpdatedFilter,
    StreamWithId,
};
use river_contracts::registry::{MiniblockUpdate, RiverRegistry};
use river_contracts::TransactOpts;
use river_core::RegistryReaderConfig;

const REGISTRY: Address = Address::repeat_byte(0x11);

fn registry(config: RegistryReaderConfig) -> (RiverRegistry<Provider<MockProvider>>, MockProvider) {
    let (provider, mock) = Provider::mocked();
    let registry = RiverRegistry::new(REGISTRY, Arc::new(provider), config)
        .unwrap()
        .with_transact_opts(TransactOpts {
            legacy: true,
            gas: Some(U256::from(1_000_000)),
            gas_price: Some(U256::from(1)),
            ..Default::default()
        })
        .with_receipt_polling(Duration::from_millis(10), Duration::from_secs(5));
    (registry, mock)
}

fn stream(id: u8, num: u64) -> StreamWithId {
    StreamWithId {
        id: [id; 32],
        stream: Stream {
            last_miniblock_hash: [id; 32],
            last_miniblock_num: num,
            flags: 0,
            nodes: vec![Address::repeat_byte(id)],
            ..Default::default()
        },
    }
}

fn page(streams: Vec<StreamWithId>, last: bool) -> Bytes {
    Bytes::from(GetPaginatedStreamsReturn(streams, last).encode())
}

fn sequential_config(page_size: i64) -> RegistryReaderConfig {
    RegistryReaderConfig {
        page_size,
        parallel_readers: 1,
        ..Default::default()
    }
}

fn success_receipt(logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: TxHash::repeat_byte(0xab),
        block_number: Some(U64::from(42)),
        status: Some(U64::from(1)),
        logs,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_get_stream_count() {
    let (registry, mock) = registry(RegistryReaderConfig::default());
    mock.push::<Bytes, _>(Bytes::from(U256::from(12).encode())).unwrap();
    assert_eq!(registry.get_stream_count(BlockNum::LATEST).await.unwrap(), 12);

    mock.push::<Bytes, _>(Bytes::from(U256::MAX.encode())).unwrap();
    assert!(registry.get_stream_count(BlockNum(5)).await.is_err());
}

#[tokio::test]
async fn test_get_all_nodes() {
    let (registry, mock) = registry(RegistryReaderConfig::default());
    let nodes = vec![Node {
        status: 2,
        url: "https://node-1.river".to_string(),
        node_address: Address::repeat_byte(1),
        operator: Address::repeat_byte(2),
    }];
    let encoded = ethers::abi::encode(&[Token::Array(vec![Token::Tuple(vec![
        Token::Uint(U256::from(2)),
        Token::String("https://node-1.river".to_string()),
        Token::Address(Address::repeat_byte(1)),
        Token::Address(Address::repeat_byte(2)),
    ])])]);
    mock.push::<Bytes, _>(Bytes::from(encoded)).unwrap();

    assert_eq!(registry.get_all_nodes(BlockNum::LATEST).await.unwrap(), nodes);
}

#[tokio::test]
async fn test_get_stream_with_genesis_pins_block() {
    let (registry, mock) = registry(RegistryReaderConfig::default());
    let s = stream(3, 9);
    let encoded = ethers::abi::encode(&[
        Token::Tuple(vec![
            Token::FixedBytes(vec![3; 32]),
            Token::Uint(U256::from(9)),
            Token::Uint(U256::zero()),
            Token::Uint(U256::from(1)),
            Token::Array(vec![Token::Address(Address::repeat_byte(3))]),
        ]),
        Token::FixedBytes(vec![0xcc; 32]),
        Token::Bytes(vec![1, 2, 3]),
    ]);
    // LIFO: the block number is requested first
    mock.push::<Bytes, _>(Bytes::from(encoded)).unwrap();
    mock.push(U64::from(77)).unwrap();

    let result = registry.get_stream_with_genesis(s.id).await.unwrap();
    assert_eq!(result.block, 77);
    assert!(result.stream.is_sealed);
    assert_eq!(result.stream.last_miniblock_num, 9);
    assert_eq!(result.genesis_miniblock_hash, H256::repeat_byte(0xcc));
    assert_eq!(result.genesis_miniblock.to_vec(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_for_all_streams_pages_and_skips_zero_ids() {
    let (registry, mock) = registry(sequential_config(2));
    mock.push::<Bytes, _>(page(vec![stream(3, 30)], true)).unwrap();
    mock.push::<Bytes, _>(page(vec![stream(1, 10), stream(0, 0)], false)).unwrap();

    let mut seen = Vec::new();
    registry
        .for_all_streams(BlockNum::LATEST, |record| {
            seen.push((record.stream_id[0], record.last_miniblock_num));
            true
        })
        .await
        .unwrap();
    assert_eq!(seen, vec![(1, 10), (3, 30)]);
}

#[tokio::test]
async fn test_for_all_streams_early_stop() {
    let (registry, mock) = registry(sequential_config(5000));
    mock.push::<Bytes, _>(page(vec![stream(1, 1), stream(2, 2), stream(3, 3)], true)).unwrap();

    let mut count = 0;
    registry
        .for_all_streams(BlockNum(10), |_| {
            count += 1;
            count < 2
        })
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_for_all_streams_retries_failed_page() {
    let config = RegistryReaderConfig {
        max_retries: 3,
        ..sequential_config(10)
    };
    let (registry, mock) = registry(config);
    mock.push::<Bytes, _>(page(vec![stream(4, 4)], true)).unwrap();
    // Undecodable output fails the first attempt
    mock.push::<Bytes, _>(Bytes::from(vec![0xde, 0xad])).unwrap();

    let mut ids = Vec::new();
    registry
        .for_all_streams(BlockNum::LATEST, |record| {
            ids.push(record.stream_id[0]);
            true
        })
        .await
        .unwrap();
    assert_eq!(ids, vec![4]);
}

#[tokio::test]
async fn test_for_all_streams_parallel() {
    let config = RegistryReaderConfig {
        page_size: 2,
        parallel_readers: 2,
        ..Default::default()
    };
    let (registry, mock) = registry(config);
    // Requests: block number, stream count, then two pages in any order
    mock.push::<Bytes, _>(page(vec![stream(3, 3)], true)).unwrap();
    mock.push::<Bytes, _>(page(vec![stream(1, 1), stream(2, 2)], false)).unwrap();
    mock.push::<Bytes, _>(Bytes::from(U256::from(3).encode())).unwrap();
    mock.push(U64::from(100)).unwrap();

    let mut ids = HashSet::new();
    registry
        .for_all_streams(BlockNum::LATEST, |record| {
            ids.insert(record.stream_id[0]);
            true
        })
        .await
        .unwrap();
    assert_eq!(ids, HashSet::from([1, 2, 3]));
}

#[tokio::test]
async fn test_for_all_streams_parallel_stops_early() {
    let config = RegistryReaderConfig {
        page_size: 2,
        parallel_readers: 2,
        ..Default::default()
    };
    let (registry, mock) = registry(config);
    // Pinned block: stream count, then up to three pages
    mock.push::<Bytes, _>(page(vec![stream(5, 5), stream(6, 6)], true)).unwrap();
    mock.push::<Bytes, _>(page(vec![stream(3, 3), stream(4, 4)], false)).unwrap();
    mock.push::<Bytes, _>(page(vec![stream(1, 1), stream(2, 2)], false)).unwrap();
    mock.push::<Bytes, _>(Bytes::from(U256::from(6).encode())).unwrap();

    let mut calls = 0;
    registry
        .for_all_streams(BlockNum(10), |_| {
            calls += 1;
            false
        })
        .await
        .unwrap();
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_for_all_streams_parallel_page_failure() {
    let config = RegistryReaderConfig {
        page_size: 2,
        parallel_readers: 2,
        // No time left for a retry
        max_retry_elapsed_ms: 1,
        ..Default::default()
    };
    let (registry, mock) = registry(config);
    mock.push::<Bytes, _>(page(vec![stream(3, 3), stream(4, 4)], true)).unwrap();
    mock.push::<Bytes, _>(Bytes::from(vec![0xde, 0xad])).unwrap();
    mock.push::<Bytes, _>(Bytes::from(U256::from(4).encode())).unwrap();

    let mut ids = Vec::new();
    let result = registry
        .for_all_streams(BlockNum(10), |record| {
            ids.push(record.stream_id[0]);
            true
        })
        .await;
    assert!(result.is_err());
    // Only streams from the page that loaded can have been delivered
    assert!(ids.len() <= 2);
    assert!(ids.iter().all(|id| *id == 3 || *id == 4));
}

#[tokio::test]
async fn test_allocate_stream_waits_for_receipt() {
    let (registry, mock) = registry(RegistryReaderConfig::default());
    mock.push(success_receipt(vec![])).unwrap();
    mock.push(TxHash::repeat_byte(0xab)).unwrap();

    let receipt = registry
        .allocate_stream([9; 32], vec![Address::repeat_byte(1)], H256::repeat_byte(2), Bytes::from(vec![1]))
        .await
        .unwrap();
    assert_eq!(receipt.block_number, Some(U64::from(42)));
}

#[tokio::test]
async fn test_failed_receipt_is_an_error() {
    let (registry, mock) = registry(RegistryReaderConfig::default());
    let mut receipt = success_receipt(vec![]);
    receipt.status = Some(U64::zero());
    mock.push(receipt).unwrap();
    mock.push(TxHash::repeat_byte(0xab)).unwrap();

    let update = MiniblockUpdate {
        stream_id: [1; 32],
        prev_miniblock_hash: H256::zero(),
        last_miniblock_hash: H256::repeat_byte(1),
        last_miniblock_num: 1,
        is_sealed: false,
    };
    let err = registry.set_stream_last_miniblock(&update).await.unwrap_err();
    assert!(err.to_string().contains("transaction failed"));
}

#[tokio::test]
async fn test_batch_update_splits_results() {
    let (registry, mock) = registry(RegistryReaderConfig::default());

    let ok_log = Log {
        address: REGISTRY,
        topics: vec![StreamLastMiniblockUpdatedFilter::signature()],
        data: ethers::abi::encode(&[
            Token::FixedBytes(vec![1; 32]),
            Token::FixedBytes(vec![0xaa; 32]),
            Token::Uint(U256::from(5)),
            Token::Bool(false),
        ])
        .into(),
        ..Default::default()
    };
    let failed_log = Log {
        address: REGISTRY,
        topics: vec![StreamLastMiniblockUpdateFailedFilter::signature()],
        data: ethers::abi::encode(&[
            Token::FixedBytes(vec![2; 32]),
            Token::FixedBytes(vec![0xbb; 32]),
            Token::Uint(U256::from(6)),
            Token::String("BAD_ARG".to_string()),
        ])
        .into(),
        ..Default::default()
    };
    mock.push(success_receipt(vec![ok_log, failed_log])).unwrap();
    mock.push(TxHash::repeat_byte(0xab)).unwrap();

    let updates: Vec<MiniblockUpdate> = [1u8, 2]
        .iter()
        .map(|id| MiniblockUpdate {
            stream_id: [*id; 32],
            prev_miniblock_hash: H256::zero(),
            last_miniblock_hash: H256::repeat_byte(*id),
            last_miniblock_num: 5,
            is_sealed: false,
        })
        .collect();
    let (succeeded, failed) = registry.set_stream_last_miniblock_batch(&updates).await.unwrap();
    assert_eq!(succeeded, vec![[1u8; 32]]);
    assert_eq!(failed, vec![[2u8; 32]]);
}

#[tokio::test]
async fn test_filter_stream_events_groups_by_stream() {
    let (registry, _mock) = registry(RegistryReaderConfig::default());

    let updated = |id: u8, num: u64, address: Address| Log {
        address,
        topics: vec![StreamLastMiniblockUpdatedFilter::signature()],
        data: ethers::abi::encode(&[
            Token::FixedBytes(vec![id; 32]),
            Token::FixedBytes(vec![id; 32]),
            Token::Uint(U256::from(num)),
            Token::Bool(false),
        ])
        .into(),
        ..Default::default()
    };
    let broken = Log {
        address: REGISTRY,
        topics: vec![StreamLastMiniblockUpdatedFilter::signature()],
        data: Bytes::from(vec![1, 2, 3]),
        ..Default::default()
    };

    let logs = vec![
        updated(1, 1, REGISTRY),
        updated(2, 1, REGISTRY),
        updated(1, 2, REGISTRY),
        updated(3, 1, Address::repeat_byte(0x99)),
        broken,
    ];
    let (grouped, errors) = registry.filter_stream_events(logs);
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[&[1u8; 32]].len(), 2);
    assert_eq!(grouped[&[2u8; 32]].len(), 1);
    assert_eq!(errors.len(), 1);
}
