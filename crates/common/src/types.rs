use std::fmt;

use ethers::types::{BlockId, BlockNumber};
use serde::{Deserialize, Serialize};

/// Block height used to pin reads. Zero means the latest block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNum(pub u64);

impl BlockNum {
    /// Latest block marker
    pub const LATEST: BlockNum = BlockNum(0);

    pub fn is_latest(&self) -> bool {
        self.0 == 0
    }

    /// Block id to attach to an `eth_call`, `None` for latest
    pub fn as_block_id(&self) -> Option<BlockId> {
        if self.is_latest() {
            None
        } else {
            Some(BlockId::Number(BlockNumber::Number(self.0.into())))
        }
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockNum {
    fn from(n: u64) -> Self {
        BlockNum(n)
    }
}

impl fmt::Display for BlockNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            write!(f, "latest")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// 32-byte stream identifier as stored by the registry
pub type StreamId = [u8; 32];

/// Render a stream id as lowercase hex without prefix
pub fn stream_id_hex(id: &StreamId) -> String {
    hex::encode(id)
}
