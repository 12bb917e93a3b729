//! Ledger-facing parameter types for Stoa

/// Default stake key deposit (Shelley), in Lovelace
pub const DEFAULT_KEY_DEPOSIT: u64 = 2_000_000;

/// Default pool deposit (Shelley), in Lovelace
pub const DEFAULT_POOL_DEPOSIT: u64 = 500_000_000;

/// Default relative ttl, in slots
pub const DEFAULT_RELATIVE_TTL: u64 = 1000;

/// Protocol parameters relevant to fee and size computation
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProtocolParameters {
    /// Linear fee coefficient (per byte)
    pub min_fee_coefficient: u64,

    /// Linear fee constant
    pub min_fee_constant: u64,

    /// Lovelace per UTXO byte
    pub coins_per_utxo_size: u64,

    /// Maximum transaction size in bytes
    pub max_tx_size: u64,

    /// Maximum value size in bytes
    pub max_val_size: u64,

    /// Stake key registration deposit
    pub key_deposit: u64,

    /// Pool registration deposit
    pub pool_deposit: u64,

    /// Maximum collateral inputs
    pub max_collateral_inputs: u64,

    /// Minimum pool cost
    pub min_pool_cost: u64,

    /// Protocol major version
    pub protocol_major: u64,
}

/// Deposit amounts used for fee computation, supplied by the caller or
/// defaulted to the network standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DepositParameters {
    /// Pool registration deposit
    pub pool_deposit: u64,

    /// Stake key registration deposit
    pub key_deposit: u64,
}

impl Default for DepositParameters {
    fn default() -> Self {
        DepositParameters {
            pool_deposit: DEFAULT_POOL_DEPOSIT,
            key_deposit: DEFAULT_KEY_DEPOSIT,
        }
    }
}

/// Block identity as returned by the ledger-data collaborator
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockInfo {
    /// Block number
    pub number: u64,

    /// Slot number
    pub slot_no: u64,
}
