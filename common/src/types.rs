//! Core type definitions for Stoa

/// Blake2b-224 key hash
pub type KeyHash = Vec<u8>;

/// Blake2b-224 script hash
pub type ScriptHash = Vec<u8>;

/// Pool operator key hash
pub type PoolId = Vec<u8>;

/// VRF key hash (32 bytes)
pub type VrfKeyHash = Vec<u8>;

/// Transaction hash (32 bytes)
pub type TxHash = Vec<u8>;

/// Amount in Lovelace
pub type Lovelace = u64;

/// Rational number as numerator/denominator
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ratio {
    /// Numerator
    pub numerator: u64,

    /// Denominator
    pub denominator: u64,
}

/// Network identity, fixing both the address network id and the protocol magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// Mainnet
    Mainnet,

    /// Legacy public testnet
    Testnet,

    /// Preprod testnet
    Preprod,

    /// Preview testnet
    Preview,
}

impl NetworkId {
    /// Network id bit carried in address headers
    pub fn network_id(&self) -> u8 {
        match self {
            Self::Mainnet => 1,
            Self::Testnet | Self::Preprod | Self::Preview => 0,
        }
    }

    /// Protocol magic used in Byron address attributes and handshakes
    pub fn protocol_magic(&self) -> u64 {
        match self {
            Self::Mainnet => 764824073,
            Self::Testnet => 1097911063,
            Self::Preprod => 1,
            Self::Preview => 2,
        }
    }

    /// Canonical lower-case network name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Preprod => "preprod",
            Self::Preview => "preview",
        }
    }

    /// Look up a network by its canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::Mainnet),
            "testnet" => Some(Self::Testnet),
            "preprod" => Some(Self::Preprod),
            "preview" => Some(Self::Preview),
            _ => None,
        }
    }
}

impl Default for NetworkId {
    fn default() -> Self {
        Self::Mainnet
    }
}
