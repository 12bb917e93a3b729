//! Cardano address definitions for Stoa
//!
//! Covers the Shelley-era bech32 forms, stake (reward) addresses and the
//! legacy Byron base58 envelope, plus derivation of each from Ed25519
//! public keys.

use crate::cip19::{VarIntDecoder, VarIntEncoder};
use crate::crypto::keyhash_224;
use crate::error::ConstructionError;
use crate::operation::{CurveType, PublicKey};
use crate::types::{KeyHash, NetworkId, ScriptHash};
use anyhow::{anyhow, bail, Result};
use serde_with::{hex::Hex, serde_as};
use std::fmt::{Display, Formatter};

/// Expected hex length of an Ed25519 public key (32 bytes)
pub const PUBLIC_KEY_HEX_LENGTH: usize = 64;

/// a Byron-era address
///
/// The payload is the complete CBOR envelope `[tag 24 (bytes), crc]` as it
/// appears in transaction outputs; the base58 rendering is of those bytes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ByronAddress {
    /// Raw payload
    pub payload: Vec<u8>,
}

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

impl ByronAddress {
    /// Read from base58 text, validating the CBOR envelope and its CRC
    pub fn from_string(text: &str) -> Result<Self> {
        let payload = bs58::decode(text).into_vec()?;

        let mut d = minicbor::Decoder::new(&payload);
        let len = d.array().map_err(|e| anyhow!("Not a Byron address: {e}"))?;
        if len != Some(2) {
            bail!("Bad Byron address envelope");
        }
        let tag = d.tag().map_err(|e| anyhow!("Not a Byron address: {e}"))?;
        if tag.as_u64() != 24 {
            bail!("Bad Byron address tag {}", tag.as_u64());
        }
        let inner = d.bytes().map_err(|e| anyhow!("Not a Byron address: {e}"))?;
        let checksum = d.u32().map_err(|e| anyhow!("Not a Byron address: {e}"))?;
        if CRC32.checksum(inner) != checksum {
            bail!("Byron address CRC mismatch");
        }

        Ok(ByronAddress { payload })
    }

    /// Wrap inner address bytes into the tagged CBOR envelope with CRC
    pub fn from_inner(inner: &[u8]) -> Self {
        let mut payload = Vec::new();
        let mut e = minicbor::Encoder::new(&mut payload);
        // Writing into a Vec cannot fail
        let _ = e.array(2);
        let _ = e.tag(minicbor::data::Tag::new(24));
        let _ = e.bytes(inner);
        let _ = e.u32(CRC32.checksum(inner));
        ByronAddress { payload }
    }

    /// Convert to the base58 string form
    pub fn to_string(&self) -> String {
        bs58::encode(&self.payload).into_string()
    }
}

/// Address network identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AddressNetwork {
    /// Mainnet
    Main,

    /// Testnet
    Test,
}

impl From<NetworkId> for AddressNetwork {
    fn from(network: NetworkId) -> Self {
        match network.network_id() {
            1 => Self::Main,
            _ => Self::Test,
        }
    }
}

impl Default for AddressNetwork {
    fn default() -> Self {
        Self::Main
    }
}

/// A Shelley-era address - payment part
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ShelleyAddressPaymentPart {
    /// Payment to a key
    PaymentKeyHash(KeyHash),

    /// Payment to a script
    ScriptHash(ScriptHash),
}

impl Default for ShelleyAddressPaymentPart {
    fn default() -> Self {
        Self::PaymentKeyHash(Vec::new())
    }
}

/// Delegation pointer
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShelleyAddressPointer {
    /// Slot number
    pub slot: u64,

    /// Transaction index within the slot
    pub tx_index: u64,

    /// Certificate index within the transaction
    pub cert_index: u64,
}

/// A Shelley-era address - delegation part
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ShelleyAddressDelegationPart {
    /// No delegation (enterprise addresses)
    None,

    /// Delegation to stake key
    StakeKeyHash(KeyHash),

    /// Delegation to script key
    ScriptHash(ScriptHash),

    /// Delegation to pointer
    Pointer(ShelleyAddressPointer),
}

impl Default for ShelleyAddressDelegationPart {
    fn default() -> Self {
        Self::None
    }
}

/// A Shelley-era address
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ShelleyAddress {
    /// Network id
    pub network: AddressNetwork,

    /// Payment part
    pub payment: ShelleyAddressPaymentPart,

    /// Delegation part
    pub delegation: ShelleyAddressDelegationPart,
}

impl ShelleyAddress {
    /// Read from string format
    pub fn from_string(text: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(text)?;
        let network = match hrp.as_str().contains("test") {
            true => AddressNetwork::Test,
            false => AddressNetwork::Main,
        };
        Self::from_payload(network, &data)
    }

    /// Read from the raw header+hashes payload
    pub fn from_payload(network: AddressNetwork, data: &[u8]) -> Result<Self> {
        let Some(header) = data.first() else {
            bail!("Empty address data");
        };
        let header = *header;

        if data.len() < 29 {
            bail!("Short Shelley address: {} bytes", data.len());
        }

        let payment_part = match (header >> 4) & 0x01 {
            0 => ShelleyAddressPaymentPart::PaymentKeyHash(data[1..29].to_vec()),
            _ => ShelleyAddressPaymentPart::ScriptHash(data[1..29].to_vec()),
        };

        let delegation_part = match (header >> 5) & 0x03 {
            0 | 1 if data.len() < 57 => {
                bail!("Short base address: {} bytes", data.len())
            }
            0 => ShelleyAddressDelegationPart::StakeKeyHash(data[29..57].to_vec()),
            1 => ShelleyAddressDelegationPart::ScriptHash(data[29..57].to_vec()),
            2 => {
                let mut decoder = VarIntDecoder::new(&data[29..]);
                let slot = decoder.read()?;
                let tx_index = decoder.read()?;
                let cert_index = decoder.read()?;

                ShelleyAddressDelegationPart::Pointer(ShelleyAddressPointer {
                    slot,
                    tx_index,
                    cert_index,
                })
            }
            _ => ShelleyAddressDelegationPart::None,
        };

        Ok(ShelleyAddress {
            network,
            payment: payment_part,
            delegation: delegation_part,
        })
    }

    /// Convert to the raw header+hashes payload as used in transaction outputs
    pub fn to_bytes(&self) -> Vec<u8> {
        let network_bits = match self.network {
            AddressNetwork::Main => 1u8,
            AddressNetwork::Test => 0u8,
        };

        let (payment_hash, payment_bits): (&Vec<u8>, u8) = match &self.payment {
            ShelleyAddressPaymentPart::PaymentKeyHash(data) => (data, 0),
            ShelleyAddressPaymentPart::ScriptHash(data) => (data, 1),
        };

        let delegation_bits: u8 = match &self.delegation {
            ShelleyAddressDelegationPart::None => 3,
            ShelleyAddressDelegationPart::StakeKeyHash(_) => 0,
            ShelleyAddressDelegationPart::ScriptHash(_) => 1,
            ShelleyAddressDelegationPart::Pointer(_) => 2,
        };

        let mut data = vec![network_bits | (payment_bits << 4) | (delegation_bits << 5)];
        data.extend(payment_hash);
        match &self.delegation {
            ShelleyAddressDelegationPart::StakeKeyHash(hash)
            | ShelleyAddressDelegationPart::ScriptHash(hash) => data.extend(hash),
            ShelleyAddressDelegationPart::Pointer(pointer) => {
                let mut encoder = VarIntEncoder::new();
                encoder.push(pointer.slot);
                encoder.push(pointer.tx_index);
                encoder.push(pointer.cert_index);
                data.extend(encoder.to_vec());
            }
            ShelleyAddressDelegationPart::None => {}
        }
        data
    }

    /// Convert to addr1xxx form
    pub fn to_string(&self) -> Result<String> {
        let hrp = match self.network {
            AddressNetwork::Main => bech32::Hrp::parse("addr")?,
            AddressNetwork::Test => bech32::Hrp::parse("addr_test")?,
        };

        Ok(bech32::encode::<bech32::Bech32>(hrp, &self.to_bytes())?)
    }
}

/// A stake credential - hash of a stake key or of a script
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Hash)]
pub enum StakeCredential {
    /// Stake key hash
    AddrKeyHash(#[serde_as(as = "Hex")] KeyHash),

    /// Script hash
    ScriptHash(#[serde_as(as = "Hex")] ScriptHash),
}

impl Default for StakeCredential {
    fn default() -> Self {
        StakeCredential::AddrKeyHash(KeyHash::default())
    }
}

impl StakeCredential {
    /// Get the underlying 28-byte hash
    pub fn get_hash(&self) -> &[u8] {
        match self {
            Self::AddrKeyHash(hash) => hash,
            Self::ScriptHash(hash) => hash,
        }
    }
}

/// A stake (reward) address
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StakeAddress {
    /// Network id
    pub network: AddressNetwork,

    /// Credential
    pub credential: StakeCredential,
}

impl StakeAddress {
    pub fn new(credential: StakeCredential, network: AddressNetwork) -> Self {
        StakeAddress {
            network,
            credential,
        }
    }

    /// Get the underlying hash
    pub fn get_hash(&self) -> &[u8] {
        self.credential.get_hash()
    }

    /// Convert to string stake1xxx format
    pub fn to_string(&self) -> Result<String> {
        let hrp = match self.network {
            AddressNetwork::Main => bech32::Hrp::parse("stake")?,
            AddressNetwork::Test => bech32::Hrp::parse("stake_test")?,
        };

        let data = self.to_binary();
        Ok(bech32::encode::<bech32::Bech32>(hrp, &data)?)
    }

    /// Read from a string format ("stake1xxx...")
    pub fn from_string(text: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(text)?;
        if data.is_empty() {
            bail!("Empty stake address data");
        }

        let network = match hrp.as_str().contains("test") {
            true => AddressNetwork::Test,
            false => AddressNetwork::Main,
        };

        let credential = match (data[0] >> 4) & 0x0Fu8 {
            0b1110 => StakeCredential::AddrKeyHash(data[1..].to_vec()),
            0b1111 => StakeCredential::ScriptHash(data[1..].to_vec()),
            _ => bail!("Unknown header {:x} in stake address", data[0]),
        };

        Ok(StakeAddress {
            network,
            credential,
        })
    }

    /// Convert to binary format (29 bytes)
    pub fn to_binary(&self) -> Vec<u8> {
        let network_bits = match self.network {
            AddressNetwork::Main => 0b1u8,
            AddressNetwork::Test => 0b0u8,
        };

        let (stake_bits, stake_hash): (u8, &Vec<u8>) = match &self.credential {
            StakeCredential::AddrKeyHash(data) => (0b1110, data),
            StakeCredential::ScriptHash(data) => (0b1111, data),
        };

        let mut data = vec![network_bits | (stake_bits << 4)];
        data.extend(stake_hash);
        data
    }

    /// Read from binary format (29 bytes)
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        if data.len() != 29 {
            bail!("Bad stake address length: {}", data.len());
        }

        let network = match data[0] & 0x01 {
            0b1 => AddressNetwork::Main,
            _ => AddressNetwork::Test,
        };

        let credential = match (data[0] >> 4) & 0x0F {
            0b1110 => StakeCredential::AddrKeyHash(data[1..].to_vec()),
            0b1111 => StakeCredential::ScriptHash(data[1..].to_vec()),
            _ => bail!("Unknown header byte {:x} in stake address", data[0]),
        };

        Ok(StakeAddress {
            network,
            credential,
        })
    }
}

impl Display for StakeAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_string() {
            Ok(text) => write!(f, "{text}"),
            Err(_) => write!(f, "<invalid stake address>"),
        }
    }
}

/// A Cardano address
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Address {
    Byron(ByronAddress),
    Shelley(ShelleyAddress),
    Stake(StakeAddress),
}

impl Address {
    /// Read from string format ("addr1...", "stake1...", or base58)
    pub fn from_string(text: &str) -> Result<Self> {
        if text.starts_with("addr1") || text.starts_with("addr_test1") {
            Ok(Self::Shelley(ShelleyAddress::from_string(text)?))
        } else if text.starts_with("stake1") || text.starts_with("stake_test1") {
            Ok(Self::Stake(StakeAddress::from_string(text)?))
        } else {
            Ok(Self::Byron(ByronAddress::from_string(text)?))
        }
    }

    /// Read from the raw bytes used in transaction outputs
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let Some(header) = data.first() else {
            bail!("Empty address bytes");
        };

        match header >> 4 {
            0..=7 => {
                let network = match header & 0x01 {
                    1 => AddressNetwork::Main,
                    _ => AddressNetwork::Test,
                };
                Ok(Self::Shelley(ShelleyAddress::from_payload(network, data)?))
            }
            0b1110 | 0b1111 => Ok(Self::Stake(StakeAddress::from_binary(data)?)),
            _ => Ok(Self::Byron(ByronAddress {
                payload: data.to_vec(),
            })),
        }
    }

    /// Convert to the raw bytes used in transaction outputs
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Byron(byron) => byron.payload.clone(),
            Self::Shelley(shelley) => shelley.to_bytes(),
            Self::Stake(stake) => stake.to_binary(),
        }
    }

    /// Convert to standard string representation
    pub fn to_string(&self) -> Result<String> {
        match self {
            Self::Byron(byron) => Ok(byron.to_string()),
            Self::Shelley(shelley) => shelley.to_string(),
            Self::Stake(stake) => stake.to_string(),
        }
    }
}

/// Address era, deciding witness shape and dummy-signature sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressEra {
    Byron,
    Shelley,
}

/// Classify the era of a textual address, `None` if unparseable
///
/// Shelley-era strings containing upper-case characters are rejected - the
/// casing is ambiguous once the string leaves the bech32 domain.
pub fn classify_era(address: &str) -> Option<AddressEra> {
    if address.starts_with("addr") || address.starts_with("stake") {
        if address.chars().any(|c| c.is_ascii_uppercase()) {
            return None;
        }
        return match Address::from_string(address) {
            Ok(_) => Some(AddressEra::Shelley),
            Err(_) => None,
        };
    }

    match ByronAddress::from_string(address) {
        Ok(_) => Some(AddressEra::Byron),
        Err(_) => None,
    }
}

/// Check an address is syntactically valid for its declared era
pub fn verify_address(address: &str) -> bool {
    classify_era(address).is_some()
}

/// Check a textual hash could be an Ed25519 key hash (as used for pool keys)
pub fn is_ed25519_key_hash(hash: &str) -> bool {
    hash.len() == 56 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Check a public key has a valid Ed25519 shape
pub fn is_key_valid(hex_bytes: &str, curve_type: &CurveType) -> bool {
    hex_bytes.len() == PUBLIC_KEY_HEX_LENGTH
        && hex_bytes.chars().all(|c| c.is_ascii_hexdigit())
        && *curve_type == CurveType::Edwards25519
}

/// Rosetta-facing address types for derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AddressType {
    /// Payment + stake parts
    #[serde(rename = "Base")]
    Base,

    /// Payment part only
    #[serde(rename = "Ent")]
    Enterprise,

    /// Stake part only
    #[serde(rename = "Reward")]
    Reward,
}

fn validated_keyhash(key: &PublicKey) -> Result<KeyHash, ConstructionError> {
    if !is_key_valid(&key.hex_bytes, &key.curve_type) {
        return Err(ConstructionError::InvalidStakingKeyFormat);
    }
    let bytes = hex::decode(&key.hex_bytes)
        .map_err(|_| ConstructionError::InvalidStakingKeyFormat)?;
    Ok(keyhash_224(&bytes))
}

/// Derive the stake credential of a public key
pub fn stake_credential(key: &PublicKey) -> Result<StakeCredential, ConstructionError> {
    Ok(StakeCredential::AddrKeyHash(validated_keyhash(key)?))
}

/// Derive the reward address of a stake credential
pub fn reward_address(network: NetworkId, credential: StakeCredential) -> StakeAddress {
    StakeAddress::new(credential, network.into())
}

/// Derive the bech32 address for the given network, keys and address type
///
/// Base addresses need both keys; the other types only the payment key.
pub fn derive_address(
    network: NetworkId,
    payment_key: &PublicKey,
    staking_key: Option<&PublicKey>,
    address_type: AddressType,
) -> Result<String, ConstructionError> {
    if !is_key_valid(&payment_key.hex_bytes, &payment_key.curve_type) {
        return Err(ConstructionError::InvalidAddress(format!(
            "bad public key {}",
            payment_key.hex_bytes
        )));
    }
    let payment_bytes = hex::decode(&payment_key.hex_bytes)
        .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;
    let payment_hash = keyhash_224(&payment_bytes);

    let address = match address_type {
        AddressType::Reward => {
            return reward_address(network, StakeCredential::AddrKeyHash(payment_hash))
                .to_string()
                .map_err(|e| ConstructionError::InvalidAddress(e.to_string()));
        }
        AddressType::Base => {
            let staking_key = staking_key.ok_or(ConstructionError::MissingStakingKey)?;
            let staking_hash = validated_keyhash(staking_key)?;
            ShelleyAddress {
                network: network.into(),
                payment: ShelleyAddressPaymentPart::PaymentKeyHash(payment_hash),
                delegation: ShelleyAddressDelegationPart::StakeKeyHash(staking_hash),
            }
        }
        AddressType::Enterprise => ShelleyAddress {
            network: network.into(),
            payment: ShelleyAddressPaymentPart::PaymentKeyHash(payment_hash),
            delegation: ShelleyAddressDelegationPart::None,
        },
    };

    address
        .to_string()
        .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))
}
