//! Settings stored in the registry's configuration facet.
//!
//! Each setting key can hold values scheduled for different blocks. The raw
//! view (`name -> block -> bytes`) mirrors the contract storage so
//! `ConfigurationChanged` events can be applied incrementally. From it a list
//! of snapshots is derived, one per block that changes anything, each
//! inheriting the values of the one before it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::{ParamType, Token};
use ethers::contract::parse_log;
use ethers::providers::Middleware;
use ethers::types::{Bytes, Log, H256, I256, U256};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use river_common::{BlockNum, Error, Result};

use crate::bindings::mock_river_registry::{ConfigurationChangedFilter, Setting};
use crate::bindings::MockRiverRegistry;
use crate::call::{self, CallOpts};
use crate::descriptor::keccak;

pub const STREAM_MEDIA_MAX_CHUNK_COUNT: &str = "stream.media.maxChunkCount";
pub const STREAM_MEDIA_MAX_CHUNK_SIZE: &str = "stream.media.maxChunkSize";
pub const STREAM_RECENCY_AGE_SECONDS: &str = "stream.recencyConstraints.ageSeconds";
pub const STREAM_RECENCY_GENERATIONS: &str = "stream.recencyConstraints.generations";
pub const STREAM_REPLICATION_FACTOR: &str = "stream.replicationFactor";
pub const STREAM_DEFAULT_MIN_EVENTS_PER_SNAPSHOT: &str = "stream.defaultMinEventsPerSnapshot";
pub const STREAM_MIN_EVENTS_USER_INBOX: &str = "stream.minEventsPerSnapshot.a1";
pub const STREAM_MIN_EVENTS_USER_SETTINGS: &str = "stream.minEventsPerSnapshot.a5";
pub const STREAM_MIN_EVENTS_USER: &str = "stream.minEventsPerSnapshot.a8";
pub const STREAM_MIN_EVENTS_USER_DEVICE: &str = "stream.minEventsPerSnapshot.ad";
pub const STREAM_CACHE_EXPIRATION_MS: &str = "stream.cacheExpirationMs";
pub const STREAM_CACHE_POLL_INTERVAL_MS: &str = "stream.cacheExpirationPollIntervalMs";
pub const STREAM_GET_MINIBLOCKS_MAX_PAGE_SIZE: &str = "stream.getMiniblocksMaxPageSize";
pub const STREAM_MINIBLOCK_REGISTRATION_FREQUENCY: &str = "stream.miniblockRegistrationFrequency";
pub const MEDIA_MEMBERSHIP_LIMIT_GDM: &str = "media.streamMembershipLimits.77";
pub const MEDIA_MEMBERSHIP_LIMIT_DM: &str = "media.streamMembershipLimits.88";
pub const XCHAIN_BLOCKCHAINS: &str = "xchain.blockchains";

/// Every setting key understood by [`OnChainSettings`]
pub const KNOWN_KEYS: &[&str] = &[
    STREAM_MEDIA_MAX_CHUNK_COUNT,
    STREAM_MEDIA_MAX_CHUNK_SIZE,
    STREAM_RECENCY_AGE_SECONDS,
    STREAM_RECENCY_GENERATIONS,
    STREAM_REPLICATION_FACTOR,
    STREAM_DEFAULT_MIN_EVENTS_PER_SNAPSHOT,
    STREAM_MIN_EVENTS_USER_INBOX,
    STREAM_MIN_EVENTS_USER_SETTINGS,
    STREAM_MIN_EVENTS_USER,
    STREAM_MIN_EVENTS_USER_DEVICE,
    STREAM_CACHE_EXPIRATION_MS,
    STREAM_CACHE_POLL_INTERVAL_MS,
    STREAM_GET_MINIBLOCKS_MAX_PAGE_SIZE,
    STREAM_MINIBLOCK_REGISTRATION_FREQUENCY,
    MEDIA_MEMBERSHIP_LIMIT_GDM,
    MEDIA_MEMBERSHIP_LIMIT_DM,
    XCHAIN_BLOCKCHAINS,
];

/// Stream type prefixes
pub const STREAM_USER_INBOX: u8 = 0xa1;
pub const STREAM_USER_SETTINGS: u8 = 0xa5;
pub const STREAM_USER: u8 = 0xa8;
pub const STREAM_USER_METADATA_KEY: u8 = 0xad;
pub const STREAM_GDM_CHANNEL: u8 = 0x77;
pub const STREAM_DM_CHANNEL: u8 = 0x88;

/// Setting key hash as stored on chain
pub fn hash_setting_name(name: &str) -> H256 {
    H256::from(keccak(name.to_lowercase().as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinSnapshotEvents {
    pub default: u64,
    pub user_inbox: u64,
    pub user_settings: u64,
    pub user: u64,
    pub user_device: u64,
}

impl MinSnapshotEvents {
    pub fn for_type(&self, stream_type: u8) -> u64 {
        match stream_type {
            STREAM_USER_INBOX => self.user_inbox,
            STREAM_USER_SETTINGS => self.user_settings,
            STREAM_USER => self.user,
            STREAM_USER_METADATA_KEY => self.user_device,
            _ => self.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipLimits {
    pub gdm: u64,
    pub dm: u64,
}

impl MembershipLimits {
    /// Member cap for the stream type, 0 when unlimited
    pub fn for_type(&self, stream_type: u8) -> u64 {
        match stream_type {
            STREAM_GDM_CHANNEL => self.gdm,
            STREAM_DM_CHANNEL => self.dm,
            _ => 0,
        }
    }
}

/// Decoded settings in effect from `from_block` onward
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnChainSettings {
    pub from_block: u64,
    pub media_max_chunk_count: u64,
    pub media_max_chunk_size: u64,
    pub recency_constraints_age: Duration,
    pub recency_constraints_generations: u64,
    pub replication_factor: u64,
    pub min_snapshot_events: MinSnapshotEvents,
    /// Only one in this many miniblocks is registered
    pub miniblock_registration_frequency: u64,
    pub stream_cache_expiration: Duration,
    pub stream_cache_poll_interval: Duration,
    pub get_miniblocks_max_page_size: u64,
    pub membership_limits: MembershipLimits,
    pub xchain_blockchains: Vec<u64>,
}

impl Default for OnChainSettings {
    fn default() -> Self {
        Self {
            from_block: 0,
            media_max_chunk_count: 50,
            media_max_chunk_size: 500_000,
            recency_constraints_age: Duration::from_secs(11),
            recency_constraints_generations: 5,
            replication_factor: 1,
            min_snapshot_events: MinSnapshotEvents {
                default: 100,
                user_inbox: 10,
                user_settings: 10,
                user: 10,
                user_device: 10,
            },
            miniblock_registration_frequency: 1,
            stream_cache_expiration: Duration::from_secs(5 * 60),
            stream_cache_poll_interval: Duration::from_secs(30),
            get_miniblocks_max_page_size: 0,
            membership_limits: MembershipLimits { gdm: 48, dm: 2 },
            xchain_blockchains: Vec::new(),
        }
    }
}

impl OnChainSettings {
    pub fn min_snapshot_events_for(&self, stream_type: u8) -> u64 {
        self.min_snapshot_events.for_type(stream_type)
    }

    pub fn membership_limit_for(&self, stream_type: u8) -> u64 {
        self.membership_limits.for_type(stream_type)
    }

    /// Decode `value` into the field named by `key`. Unknown keys are rejected.
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        match key {
            STREAM_MEDIA_MAX_CHUNK_COUNT => self.media_max_chunk_count = decode_uint64(value)?,
            STREAM_MEDIA_MAX_CHUNK_SIZE => self.media_max_chunk_size = decode_uint64(value)?,
            STREAM_RECENCY_AGE_SECONDS => self.recency_constraints_age = decode_duration(key, value)?,
            STREAM_RECENCY_GENERATIONS => self.recency_constraints_generations = decode_uint64(value)?,
            STREAM_REPLICATION_FACTOR => self.replication_factor = decode_uint64(value)?,
            STREAM_DEFAULT_MIN_EVENTS_PER_SNAPSHOT => self.min_snapshot_events.default = decode_uint64(value)?,
            STREAM_MIN_EVENTS_USER_INBOX => self.min_snapshot_events.user_inbox = decode_uint64(value)?,
            STREAM_MIN_EVENTS_USER_SETTINGS => self.min_snapshot_events.user_settings = decode_uint64(value)?,
            STREAM_MIN_EVENTS_USER => self.min_snapshot_events.user = decode_uint64(value)?,
            STREAM_MIN_EVENTS_USER_DEVICE => self.min_snapshot_events.user_device = decode_uint64(value)?,
            STREAM_CACHE_EXPIRATION_MS => self.stream_cache_expiration = decode_duration(key, value)?,
            STREAM_CACHE_POLL_INTERVAL_MS => self.stream_cache_poll_interval = decode_duration(key, value)?,
            STREAM_GET_MINIBLOCKS_MAX_PAGE_SIZE => self.get_miniblocks_max_page_size = decode_uint64(value)?,
            STREAM_MINIBLOCK_REGISTRATION_FREQUENCY => {
                self.miniblock_registration_frequency = decode_uint64(value)?
            }
            MEDIA_MEMBERSHIP_LIMIT_GDM => self.membership_limits.gdm = decode_uint64(value)?,
            MEDIA_MEMBERSHIP_LIMIT_DM => self.membership_limits.dm = decode_uint64(value)?,
            XCHAIN_BLOCKCHAINS => self.xchain_blockchains = decode_uint64_array(value)?,
            other => return Err(Error::validation(format!("unknown setting key {}", other))),
        }
        Ok(())
    }
}

fn single(types: &[ParamType], data: &[u8]) -> Result<Token> {
    ethers::abi::decode(types, data)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::decode("empty setting value"))
}

fn token_to_u64(token: Token) -> Result<u64> {
    match token {
        Token::Uint(v) if v <= U256::from(u64::MAX) => Ok(v.as_u64()),
        Token::Uint(v) => Err(Error::decode(format!("value {} overflows uint64", v))),
        other => Err(Error::decode(format!("expected uint64, got {:?}", other))),
    }
}

pub fn encode_uint64(v: u64) -> Bytes {
    ethers::abi::encode(&[Token::Uint(v.into())]).into()
}

pub fn decode_uint64(data: &[u8]) -> Result<u64> {
    token_to_u64(single(&[ParamType::Uint(64)], data)?)
}

pub fn encode_int64(v: i64) -> Bytes {
    ethers::abi::encode(&[Token::Int(I256::from(v).into_raw())]).into()
}

pub fn decode_int64(data: &[u8]) -> Result<i64> {
    match single(&[ParamType::Int(64)], data)? {
        Token::Int(raw) => {
            let v = I256::from_raw(raw);
            if v > I256::from(i64::MAX) || v < I256::from(i64::MIN) {
                return Err(Error::decode(format!("value {} overflows int64", v)));
            }
            Ok(v.as_i64())
        }
        other => Err(Error::decode(format!("expected int64, got {:?}", other))),
    }
}

pub fn encode_uint64_array(values: &[u64]) -> Bytes {
    let items = values.iter().map(|v| Token::Uint((*v).into())).collect();
    ethers::abi::encode(&[Token::Array(items)]).into()
}

pub fn decode_uint64_array(data: &[u8]) -> Result<Vec<u64>> {
    match single(&[ParamType::Array(Box::new(ParamType::Uint(64)))], data)? {
        Token::Array(items) => items.into_iter().map(token_to_u64).collect(),
        other => Err(Error::decode(format!("expected uint64[], got {:?}", other))),
    }
}

pub fn encode_uint256(v: U256) -> Bytes {
    ethers::abi::encode(&[Token::Uint(v)]).into()
}

pub fn decode_uint256(data: &[u8]) -> Result<U256> {
    match single(&[ParamType::Uint(256)], data)? {
        Token::Uint(v) => Ok(v),
        other => Err(Error::decode(format!("expected uint256, got {:?}", other))),
    }
}

pub fn encode_string(s: &str) -> Bytes {
    ethers::abi::encode(&[Token::String(s.to_string())]).into()
}

pub fn decode_string(data: &[u8]) -> Result<String> {
    match single(&[ParamType::String], data)? {
        Token::String(s) => Ok(s),
        other => Err(Error::decode(format!("expected string, got {:?}", other))),
    }
}

/// Keys ending in `Ms` hold milliseconds, keys ending in `Seconds` hold seconds
fn decode_duration(key: &str, data: &[u8]) -> Result<Duration> {
    let v = decode_int64(data)?;
    if v < 0 {
        return Err(Error::decode(format!("negative duration {} for {}", v, key)));
    }
    if key.ends_with("Ms") {
        Ok(Duration::from_millis(v as u64))
    } else {
        Ok(Duration::from_secs(v as u64))
    }
}

/// Setting values keyed by name, then by the block they take effect at
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    entries: BTreeMap<String, BTreeMap<u64, Bytes>>,
}

impl RawSettings {
    fn init(&mut self, names: &HashMap<H256, &'static str>, settings: Vec<Setting>) {
        for setting in settings {
            let key = H256::from(setting.key);
            if setting.block_number == u64::MAX {
                warn!(key = ?key, "Invalid block number for setting, ignoring");
                continue;
            }
            let Some(name) = names.get(&key) else {
                info!(key = ?key, block = setting.block_number, "Skipping unknown setting key");
                continue;
            };
            let blocks = self.entries.entry(name.to_string()).or_default();
            if let Some(old) = blocks.insert(setting.block_number, setting.value.clone()) {
                warn!(key = name, block = setting.block_number, old = %old, new = %setting.value, "Duplicate setting");
            }
        }
    }

    fn apply(&mut self, names: &HashMap<H256, &'static str>, event: &ConfigurationChangedFilter) {
        let key = H256::from(event.key);
        let Some(name) = names.get(&key) else {
            info!(key = ?key, block = event.block, deleted = event.deleted, "Skipping unknown setting key");
            return;
        };

        if !event.deleted {
            self.entries
                .entry(name.to_string())
                .or_default()
                .insert(event.block, event.value.clone());
            return;
        }

        let Some(blocks) = self.entries.get_mut(*name) else {
            warn!(key = name, block = event.block, "Delete event for non-existing setting");
            return;
        };
        // u64::MAX removes every scheduled value of the key
        if event.block == u64::MAX {
            self.entries.remove(*name);
        } else if blocks.remove(&event.block).is_some() {
            if blocks.is_empty() {
                self.entries.remove(*name);
            }
        } else {
            warn!(key = name, block = event.block, "Delete event for non-existing block");
        }
    }

    /// Values for `name`, ordered by block
    pub fn get(&self, name: &str) -> Option<&BTreeMap<u64, Bytes>> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn snapshots(&self) -> Vec<Arc<OnChainSettings>> {
        let mut by_block: BTreeMap<u64, Vec<(&str, &Bytes)>> = BTreeMap::new();
        for (name, blocks) in &self.entries {
            for (block, value) in blocks {
                by_block.entry(*block).or_default().push((name.as_str(), value));
            }
        }

        let mut snapshots = vec![Arc::new(OnChainSettings::default())];
        for (block, values) in by_block {
            let mut settings = snapshots.last().map(|s| (**s).clone()).unwrap_or_default();
            settings.from_block = block;
            for (name, value) in values {
                if let Err(e) = settings.set(name, value) {
                    error!(key = name, block, value = %value, error = %e, "Failed to decode setting, keeping previous value");
                }
            }
            // Block-0 entries follow the defaults, lookups take the later one
            snapshots.push(Arc::new(settings));
        }
        snapshots
    }
}

#[derive(Debug)]
struct State {
    raw: RawSettings,
    snapshots: Vec<Arc<OnChainSettings>>,
    last_applied: Option<ConfigurationChangedFilter>,
}

/// Block-versioned view of the on-chain settings
#[derive(Debug)]
pub struct OnChainConfig {
    names: HashMap<H256, &'static str>,
    active_block: AtomicU64,
    state: RwLock<State>,
}

impl OnChainConfig {
    /// Build from the settings retrieved at `applied_block`
    pub fn from_settings(settings: Vec<Setting>, applied_block: u64) -> Self {
        let names: HashMap<H256, &'static str> =
            KNOWN_KEYS.iter().map(|name| (hash_setting_name(name), *name)).collect();
        for (hash, name) in &names {
            debug!(key = name, hash = ?hash, "Monitoring on-chain setting");
        }

        let mut raw = RawSettings::default();
        raw.init(&names, settings);
        let snapshots = raw.snapshots();
        info!(snapshots = snapshots.len(), block = applied_block, "On-chain configuration loaded");

        Self {
            names,
            active_block: AtomicU64::new(applied_block),
            state: RwLock::new(State {
                raw,
                snapshots,
                last_applied: None,
            }),
        }
    }

    /// Read every setting from the registry at `block`
    pub async fn load<M: Middleware + 'static>(registry: &MockRiverRegistry<M>, block: u64) -> Result<Self> {
        let settings = call::call(registry.get_all_configuration(), &CallOpts::at(BlockNum(block)))
            .await
            .map_err(|e| Error::contract(format!("Failed to retrieve on-chain configuration: {}", e)))?;
        Ok(Self::from_settings(settings, block))
    }

    pub fn active_block(&self) -> u64 {
        self.active_block.load(Ordering::SeqCst)
    }

    /// Advance the block used by [`get`](Self::get)
    pub fn on_block(&self, block: u64) {
        self.active_block.store(block, Ordering::SeqCst);
    }

    /// Settings in effect at the active block
    pub fn get(&self) -> Arc<OnChainSettings> {
        self.get_on_block(self.active_block())
    }

    /// Settings of the latest snapshot starting at or before `block`
    pub fn get_on_block(&self, block: u64) -> Arc<OnChainSettings> {
        let state = self.state.read();
        state
            .snapshots
            .iter()
            .rev()
            .find(|s| s.from_block <= block)
            .or_else(|| state.snapshots.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<Arc<OnChainSettings>> {
        self.state.read().snapshots.clone()
    }

    /// Apply a `ConfigurationChanged` event and rebuild the snapshots
    pub fn apply_event(&self, event: ConfigurationChangedFilter) {
        let mut state = self.state.write();
        state.raw.apply(&self.names, &event);
        state.snapshots = state.raw.snapshots();
        info!(block = event.block, deleted = event.deleted, snapshots = state.snapshots.len(), "On-chain configuration changed");
        state.last_applied = Some(event);
    }

    /// Decode and apply a raw `ConfigurationChanged` log
    pub fn on_config_changed(&self, log: Log) -> Result<()> {
        let event = parse_log::<ConfigurationChangedFilter>(log)
            .map_err(|e| Error::decode(format!("Unable to decode ConfigurationChanged event: {}", e)))?;
        self.apply_event(event);
        Ok(())
    }

    pub fn last_applied_event(&self) -> Option<ConfigurationChangedFilter> {
        self.state.read().last_applied.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::contract::EthEvent;

    fn setting(name: &str, block: u64, value: Bytes) -> Setting {
        Setting {
            key: hash_setting_name(name).0,
            block_number: block,
            value,
        }
    }

    fn changed(name: &str, block: u64, value: Bytes, deleted: bool) -> ConfigurationChangedFilter {
        ConfigurationChangedFilter {
            key: hash_setting_name(name).0,
            block,
            value,
            deleted,
        }
    }

    #[test]
    fn test_key_hash_is_case_insensitive() {
        assert_eq!(
            hash_setting_name("stream.replicationFactor"),
            H256::from(keccak(b"stream.replicationfactor"))
        );
    }

    #[test]
    fn test_codec_helpers() {
        assert_eq!(decode_uint64(&encode_uint64(77)).unwrap(), 77);
        assert_eq!(decode_int64(&encode_int64(-5)).unwrap(), -5);
        assert_eq!(decode_uint64_array(&encode_uint64_array(&[1, 2, 3])).unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_string(&encode_string("river")).unwrap(), "river");
        assert_eq!(decode_uint256(&encode_uint256(U256::MAX)).unwrap(), U256::MAX);
        assert!(decode_uint64(&encode_uint256(U256::MAX)).is_err());
        assert!(decode_uint64(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_defaults_without_settings() {
        let cfg = OnChainConfig::from_settings(vec![], 10);
        let settings = cfg.get();
        assert_eq!(*settings, OnChainSettings::default());
        assert_eq!(settings.min_snapshot_events_for(STREAM_USER_INBOX), 10);
        assert_eq!(settings.min_snapshot_events_for(0x20), 100);
        assert_eq!(settings.membership_limit_for(STREAM_GDM_CHANNEL), 48);
        assert_eq!(settings.membership_limit_for(STREAM_DM_CHANNEL), 2);
        assert_eq!(settings.membership_limit_for(0x20), 0);
    }

    #[test]
    fn test_snapshots_inherit_previous_values() {
        let cfg = OnChainConfig::from_settings(
            vec![
                setting(STREAM_REPLICATION_FACTOR, 5, encode_uint64(3)),
                setting(STREAM_MEDIA_MAX_CHUNK_COUNT, 10, encode_uint64(100)),
                setting(STREAM_CACHE_EXPIRATION_MS, 10, encode_int64(1500)),
                setting(STREAM_RECENCY_AGE_SECONDS, 20, encode_int64(7)),
                setting(XCHAIN_BLOCKCHAINS, 20, encode_uint64_array(&[1, 8453])),
            ],
            0,
        );

        assert_eq!(cfg.all().len(), 4);
        assert_eq!(cfg.get_on_block(4).replication_factor, 1);

        let at_12 = cfg.get_on_block(12);
        assert_eq!(at_12.from_block, 10);
        assert_eq!(at_12.replication_factor, 3);
        assert_eq!(at_12.media_max_chunk_count, 100);
        assert_eq!(at_12.stream_cache_expiration, Duration::from_millis(1500));

        let latest = cfg.get_on_block(1_000);
        assert_eq!(latest.recency_constraints_age, Duration::from_secs(7));
        assert_eq!(latest.xchain_blockchains, vec![1, 8453]);
        assert_eq!(latest.replication_factor, 3);
    }

    #[test]
    fn test_block_zero_setting_follows_defaults() {
        let cfg = OnChainConfig::from_settings(vec![setting(STREAM_REPLICATION_FACTOR, 0, encode_uint64(3))], 0);
        let all = cfg.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].replication_factor, 1);
        assert_eq!(all[1].from_block, 0);
        assert_eq!(cfg.get_on_block(0).replication_factor, 3);
        assert_eq!(cfg.get_on_block(10).replication_factor, 3);
    }

    #[test]
    fn test_active_block_follows_on_block() {
        let cfg = OnChainConfig::from_settings(vec![setting(STREAM_REPLICATION_FACTOR, 50, encode_uint64(5))], 10);
        assert_eq!(cfg.get().replication_factor, 1);
        cfg.on_block(50);
        assert_eq!(cfg.active_block(), 50);
        assert_eq!(cfg.get().replication_factor, 5);
    }

    #[test]
    fn test_init_skips_invalid_entries() {
        let cfg = OnChainConfig::from_settings(
            vec![
                setting(STREAM_REPLICATION_FACTOR, u64::MAX, encode_uint64(9)),
                setting("no.such.key", 3, encode_uint64(9)),
                setting(STREAM_REPLICATION_FACTOR, 3, encode_uint64(2)),
                setting(STREAM_REPLICATION_FACTOR, 3, encode_uint64(4)),
            ],
            0,
        );
        assert_eq!(cfg.all().len(), 2);
        // The later duplicate wins
        assert_eq!(cfg.get_on_block(3).replication_factor, 4);
    }

    #[test]
    fn test_undecodable_value_keeps_inherited() {
        let cfg = OnChainConfig::from_settings(
            vec![
                setting(STREAM_MEDIA_MAX_CHUNK_SIZE, 5, encode_uint64(1000)),
                setting(STREAM_MEDIA_MAX_CHUNK_SIZE, 6, Bytes::from(vec![1, 2])),
            ],
            0,
        );
        assert_eq!(cfg.get_on_block(6).media_max_chunk_size, 1000);
    }

    #[test]
    fn test_apply_events() {
        let cfg = OnChainConfig::from_settings(vec![setting(STREAM_REPLICATION_FACTOR, 5, encode_uint64(3))], 0);

        cfg.apply_event(changed(STREAM_REPLICATION_FACTOR, 8, encode_uint64(4), false));
        assert_eq!(cfg.get_on_block(9).replication_factor, 4);
        assert_eq!(cfg.last_applied_event().unwrap().block, 8);

        // Deleting one block leaves the others
        cfg.apply_event(changed(STREAM_REPLICATION_FACTOR, 8, Bytes::new(), true));
        assert_eq!(cfg.get_on_block(9).replication_factor, 3);

        // Deleting a missing block changes nothing
        cfg.apply_event(changed(STREAM_REPLICATION_FACTOR, 99, Bytes::new(), true));
        assert_eq!(cfg.get_on_block(9).replication_factor, 3);

        // u64::MAX removes the key entirely
        cfg.apply_event(changed(STREAM_REPLICATION_FACTOR, 8, encode_uint64(6), false));
        cfg.apply_event(changed(STREAM_REPLICATION_FACTOR, u64::MAX, Bytes::new(), true));
        assert_eq!(cfg.get_on_block(100).replication_factor, 1);
        assert_eq!(cfg.all().len(), 1);

        // Unknown keys are ignored
        cfg.apply_event(changed("unknown", 1, encode_uint64(1), false));
        assert_eq!(cfg.all().len(), 1);
    }

    #[test]
    fn test_config_changed_log() {
        let cfg = OnChainConfig::from_settings(vec![], 0);
        let data = ethers::abi::encode(&[
            Token::FixedBytes(hash_setting_name(STREAM_MEDIA_MAX_CHUNK_COUNT).as_bytes().to_vec()),
            Token::Uint(U256::from(12)),
            Token::Bytes(encode_uint64(64).to_vec()),
            Token::Bool(false),
        ]);
        let log = Log {
            topics: vec![ConfigurationChangedFilter::signature()],
            data: data.into(),
            ..Default::default()
        };
        cfg.on_config_changed(log).unwrap();
        assert_eq!(cfg.get_on_block(12).media_max_chunk_count, 64);

        assert!(cfg.on_config_changed(Log::default()).is_err());
    }
}
