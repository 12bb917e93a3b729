//! Transaction body and witness definitions for Stoa

use crate::address::StakeAddress;
use crate::certificate::Certificate;
use crate::types::{Lovelace, TxHash};
use serde_with::{hex::Hex, serde_as};
use std::collections::BTreeSet;

/// Dummy Ed25519 signature used for size estimation (64 zero bytes)
pub const DUMMY_SIGNATURE: &str = "0000000000000000000000000000000000000000000000000000000000000000\
0000000000000000000000000000000000000000000000000000000000000000";

/// Dummy Ed25519 public key used for size estimation (32 zero bytes)
pub const DUMMY_PUBKEY: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Dummy Byron chain code used for size estimation (32 zero bytes)
pub const DUMMY_CHAIN_CODE: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Byron bootstrap witness address attributes (an empty CBOR map)
pub const BOOTSTRAP_ATTRIBUTES: [u8; 1] = [0xa0];

/// Reference to a UTXO being consumed
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionInput {
    /// Hash of the producing transaction
    #[serde_as(as = "Hex")]
    pub transaction_id: TxHash,

    /// Output index within it
    pub index: u64,
}

/// Tokens of a single policy within an output value
#[serde_as]
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PolicyAssets {
    /// Minting policy id (28 bytes)
    #[serde_as(as = "Hex")]
    pub policy_id: Vec<u8>,

    /// Asset name (up to 32 bytes) to quantity
    #[serde_as(as = "Vec<(Hex, _)>")]
    pub assets: Vec<(Vec<u8>, u64)>,
}

/// Value carried by an output: Lovelace plus any native tokens
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Value {
    /// Lovelace amount
    pub coin: Lovelace,

    /// Native token bundle, empty for pure-Ada outputs
    pub multi_assets: Vec<PolicyAssets>,
}

impl Value {
    pub fn coin_only(coin: Lovelace) -> Self {
        Value {
            coin,
            multi_assets: Vec::new(),
        }
    }
}

/// A produced transaction output
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionOutput {
    /// Raw address bytes as they appear on the wire
    #[serde_as(as = "Hex")]
    pub address: Vec<u8>,

    /// Value carried
    pub value: Value,
}

/// A reward withdrawal
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Withdrawal {
    /// Reward address withdrawn from
    pub address: StakeAddress,

    /// Amount withdrawn
    pub amount: Lovelace,
}

/// A transaction body ready for serialization
///
/// `ttl` 0 is the "not yet known" sentinel used during size estimation and
/// is serialized as an explicit zero field.
#[serde_as]
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionBody {
    pub inputs: Vec<TransactionInput>,

    pub outputs: Vec<TransactionOutput>,

    pub fee: Lovelace,

    pub ttl: u64,

    pub certificates: Vec<Certificate>,

    pub withdrawals: Vec<Withdrawal>,

    #[serde_as(as = "Option<Hex>")]
    pub auxiliary_data_hash: Option<Vec<u8>>,
}

/// A key witness
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VkeyWitness {
    #[serde_as(as = "Hex")]
    pub vkey: Vec<u8>,

    #[serde_as(as = "Hex")]
    pub signature: Vec<u8>,
}

/// A Byron-era bootstrap witness
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BootstrapWitness {
    #[serde_as(as = "Hex")]
    pub vkey: Vec<u8>,

    #[serde_as(as = "Hex")]
    pub signature: Vec<u8>,

    #[serde_as(as = "Hex")]
    pub chain_code: Vec<u8>,

    #[serde_as(as = "Hex")]
    pub attributes: Vec<u8>,
}

/// The witness set of a transaction
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WitnessSet {
    pub vkey_witnesses: Vec<VkeyWitness>,

    pub bootstrap_witnesses: Vec<BootstrapWitness>,
}

impl WitnessSet {
    pub fn is_empty(&self) -> bool {
        self.vkey_witnesses.is_empty() && self.bootstrap_witnesses.is_empty()
    }
}

/// A collected signature, as delivered by the signer
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signatures {
    /// Signature hex
    pub signature: String,

    /// Public key hex
    pub public_key: String,

    /// Chain code hex - required for Byron-era addresses
    pub chain_code: Option<String>,

    /// Address the signature belongs to
    pub address: Option<String>,
}

/// Result of the forward path: a body ready to be signed
///
/// Transient and single-use; owned solely by the request that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    /// Body hash (the signing payload), hex
    pub hash: String,

    /// Body CBOR, hex
    pub bytes: String,

    /// Addresses expected to sign
    pub addresses: BTreeSet<String>,

    /// Vote-registration auxiliary data CBOR, hex, if any
    pub metadata: Option<String>,
}
