// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

/// A block header row as persisted in `eth_block`. At most one row exists per `number`; a row
/// with `stable` set is immutable, an unstable one may be replaced in full by the fixer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub time: u64,
    pub stable: bool,
}

/// A transaction row as persisted in `block_transaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub block_number: u64,
    pub hash: String,
    pub from: String,
    /// Empty for contract creations.
    pub to: String,
    pub nonce: u64,
    pub data: Vec<u8>,
    /// Decimal string; wei amounts do not fit into 64 bits.
    pub value: String,
}

/// A log row as persisted in `transaction_log`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    pub block_number: u64,
    pub tx_hash: String,
    pub index: u32,
    pub data: Vec<u8>,
}

/// One block along with its transactions and their logs, assembled by a reader and consumed by
/// the writer or the fixer. Not persisted as such; it decomposes into the three tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockData {
    pub block: Block,
    pub transactions: Vec<Transaction>,
    pub logs: Vec<Log>,
}

impl BlockData {
    /// A degenerate carrier for a block that could not be fetched. It persists as an unstable
    /// row carrying only its number, which the fixer replaces on a later pass.
    pub fn placeholder(number: u64) -> Self {
        Self {
            block: Block {
                number,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Render bytes as `0x`-prefixed lowercase hex.
pub fn hex_encode(data: impl AsRef<[u8]>) -> String {
    const_hex::encode_prefixed(data)
}

#[cfg(test)]
mod tests {
    use crate::domain::{BlockData, hex_encode};

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode([]), "0x");
        assert_eq!(hex_encode([0x00, 0xab, 0xff]), "0x00abff");

        let data = [0xde, 0xad, 0xbe, 0xef];
        let rendered = hex_encode(data);
        assert_eq!(const_hex::decode(&rendered).unwrap(), data);
    }

    #[test]
    fn test_placeholder() {
        let data = BlockData::placeholder(42);
        assert_eq!(data.block.number, 42);
        assert!(!data.block.stable);
        assert!(data.block.hash.is_empty());
        assert!(data.transactions.is_empty());
        assert!(data.logs.is_empty());
    }
}
