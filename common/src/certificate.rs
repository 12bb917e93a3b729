//! Certificate type definitions for Stoa

use crate::address::{StakeAddress, StakeCredential};
use crate::types::{Lovelace, PoolId, Ratio, VrfKeyHash};
use serde_with::{hex::Hex, serde_as};
use std::net::{Ipv4Addr, Ipv6Addr};

// === Relay types ===

/// Relay addressed by IP
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SingleHostAddr {
    /// Port number
    pub port: Option<u16>,

    /// IPv4 address
    pub ipv4: Option<Ipv4Addr>,

    /// IPv6 address
    pub ipv6: Option<Ipv6Addr>,
}

/// Relay addressed by a resolvable name
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SingleHostName {
    /// Port number
    pub port: Option<u16>,

    /// An A or AAAA DNS record
    pub dns_name: String,
}

/// Relay addressed by a name resolving to multiple hosts
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MultiHostName {
    /// A SRV DNS record
    pub dns_name: String,
}

/// A pool relay
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Relay {
    SingleHostAddr(SingleHostAddr),
    SingleHostName(SingleHostName),
    MultiHostName(MultiHostName),
}

// === Pool certificate types ===

/// Off-chain pool metadata reference
#[serde_as]
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolMetadata {
    /// Metadata URL
    pub url: String,

    /// Metadata content hash
    #[serde_as(as = "Hex")]
    pub hash: Vec<u8>,
}

/// Pool registration data
#[serde_as]
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolRegistration {
    /// Operator pool key hash - used as ID
    #[serde_as(as = "Hex")]
    pub operator: PoolId,

    /// VRF key hash
    #[serde_as(as = "Hex")]
    pub vrf_key_hash: VrfKeyHash,

    /// Pledged Ada
    pub pledge: Lovelace,

    /// Fixed cost
    pub cost: Lovelace,

    /// Marginal cost (fraction)
    pub margin: Ratio,

    /// Reward account
    pub reward_account: StakeAddress,

    /// Pool owners by their stake key hash
    #[serde_as(as = "Vec<Hex>")]
    pub pool_owners: Vec<Vec<u8>>,

    /// Relays
    pub relays: Vec<Relay>,

    /// Metadata
    pub pool_metadata: Option<PoolMetadata>,
}

/// Pool retirement data
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolRetirement {
    /// Operator pool key hash - used as ID
    #[serde_as(as = "Hex")]
    pub operator: PoolId,

    /// Epoch it will retire at the end of
    pub epoch: u64,
}

// === Stake delegation types ===

/// Stake delegation data
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StakeDelegation {
    /// Stake credential delegating
    pub credential: StakeCredential,

    /// Pool ID to delegate to
    #[serde_as(as = "Hex")]
    pub operator: PoolId,
}

/// A certificate in a transaction body
///
/// Each variant corresponds 1:1 to one Rosetta operation type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Certificate {
    /// Stake key registration
    StakeRegistration(StakeCredential),

    /// Stake key de-registration
    StakeDeregistration(StakeCredential),

    /// Stake delegation to a pool
    StakeDelegation(StakeDelegation),

    /// Pool registration (or re-registration)
    PoolRegistration(Box<PoolRegistration>),

    /// Pool retirement notice
    PoolRetirement(PoolRetirement),
}
