//! Rosetta operation model for Stoa
//!
//! These are the wire shapes exchanged with Rosetta callers; a request-scoped
//! ordered sequence of `Operation`s is the unit of translation in both
//! directions. All values are immutable once constructed.

use crate::error::ConstructionError;

/// Currency symbol used for the main unit
pub const ADA: &str = "ADA";

/// Decimal places of the main unit
pub const ADA_DECIMALS: u32 = 6;

/// Sentinel for an empty hex string in token names
pub const EMPTY_HEX: &str = "\\x";

/// Coin action marking a consumed coin
pub const COIN_SPENT_ACTION: &str = "coin_spent";

/// Coin action marking a created coin
pub const COIN_CREATED_ACTION: &str = "coin_created";

/// Hex length of a native-asset policy id (28 bytes)
pub const POLICY_ID_HEX_LENGTH: usize = 56;

/// Maximum hex length of a native-asset name (32 bytes)
pub const ASSET_NAME_MAX_HEX_LENGTH: usize = 64;

/// Hex length of an Ed25519 signature (64 bytes)
pub const SIGNATURE_HEX_LENGTH: usize = 128;

/// The closed set of operation kinds this engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    Input,
    Output,
    StakeKeyRegistration,
    StakeKeyDeregistration,
    StakeDelegation,
    Withdrawal,
    PoolRegistration,
    PoolRegistrationWithCert,
    PoolRetirement,
    VoteRegistration,
}

impl OperationType {
    /// Wire tag of this operation type
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::StakeKeyRegistration => "stakeKeyRegistration",
            Self::StakeKeyDeregistration => "stakeKeyDeregistration",
            Self::StakeDelegation => "stakeDelegation",
            Self::Withdrawal => "withdrawal",
            Self::PoolRegistration => "poolRegistration",
            Self::PoolRegistrationWithCert => "poolRegistrationWithCert",
            Self::PoolRetirement => "poolRetirement",
            Self::VoteRegistration => "voteRegistration",
        }
    }

    /// Parse a wire tag; unknown tags are a hard validation error
    pub fn from_tag(tag: &str) -> Result<Self, ConstructionError> {
        match tag {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "stakeKeyRegistration" => Ok(Self::StakeKeyRegistration),
            "stakeKeyDeregistration" => Ok(Self::StakeKeyDeregistration),
            "stakeDelegation" => Ok(Self::StakeDelegation),
            "withdrawal" => Ok(Self::Withdrawal),
            "poolRegistration" => Ok(Self::PoolRegistration),
            "poolRegistrationWithCert" => Ok(Self::PoolRegistrationWithCert),
            "poolRetirement" => Ok(Self::PoolRetirement),
            "voteRegistration" => Ok(Self::VoteRegistration),
            other => Err(ConstructionError::InvalidOperationType(other.to_string())),
        }
    }

    /// Staking family: stake key and withdrawal operations
    pub fn is_staking(&self) -> bool {
        matches!(
            self,
            Self::StakeKeyRegistration
                | Self::StakeKeyDeregistration
                | Self::StakeDelegation
                | Self::Withdrawal
        )
    }

    /// Pool family: pool registration and retirement operations
    pub fn is_pool(&self) -> bool {
        matches!(
            self,
            Self::PoolRegistration | Self::PoolRegistrationWithCert | Self::PoolRetirement
        )
    }

    /// Vote family
    pub fn is_vote(&self) -> bool {
        matches!(self, Self::VoteRegistration)
    }

    /// Operations that translate to a certificate in the transaction body
    pub fn produces_certificate(&self) -> bool {
        matches!(
            self,
            Self::StakeKeyRegistration
                | Self::StakeKeyDeregistration
                | Self::StakeDelegation
                | Self::PoolRegistration
                | Self::PoolRegistrationWithCert
                | Self::PoolRetirement
        )
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// Supported signature curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CurveType {
    #[serde(rename = "edwards25519")]
    Edwards25519,

    #[serde(rename = "secp256k1")]
    Secp256k1,
}

/// A public key with its curve
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PublicKey {
    /// Key bytes in hex
    pub hex_bytes: String,

    /// Curve the key lives on
    pub curve_type: CurveType,
}

impl PublicKey {
    pub fn edwards(hex_bytes: impl Into<String>) -> Self {
        PublicKey {
            hex_bytes: hex_bytes.into(),
            curve_type: CurveType::Edwards25519,
        }
    }
}

/// Transaction-local position of an operation
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OperationIdentifier {
    /// Index within the transaction
    pub index: u64,

    /// Network-level index (e.g. UTXO index), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_index: Option<u64>,
}

impl OperationIdentifier {
    pub fn new(index: u64) -> Self {
        OperationIdentifier {
            index,
            network_index: None,
        }
    }
}

/// Chain-code carrying metadata of an account identifier
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccountIdentifierMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_code: Option<String>,
}

/// Sub-account of an account identifier
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubAccountIdentifier {
    pub address: String,
}

/// An account taking part in an operation
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccountIdentifier {
    /// Textual address
    pub address: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_account: Option<SubAccountIdentifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AccountIdentifierMetadata>,
}

impl AccountIdentifier {
    pub fn new(address: impl Into<String>) -> Self {
        AccountIdentifier {
            address: address.into(),
            sub_account: None,
            metadata: None,
        }
    }
}

/// Policy id metadata of a currency
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CurrencyMetadata {
    #[serde(rename = "policyId", skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

/// A currency an amount is denominated in
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Currency {
    /// Symbol: "ADA" or a hex asset name
    pub symbol: String,

    /// Decimal places
    pub decimals: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CurrencyMetadata>,
}

impl Currency {
    /// The main unit
    pub fn ada() -> Self {
        Currency {
            symbol: ADA.to_string(),
            decimals: ADA_DECIMALS,
            metadata: None,
        }
    }
}

/// A signed decimal amount
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Amount {
    /// Signed decimal string
    pub value: String,

    pub currency: Currency,
}

impl Amount {
    /// An amount in the main unit
    pub fn ada(value: impl Into<String>) -> Self {
        Amount {
            value: value.into(),
            currency: Currency::ada(),
        }
    }

    /// A native-token amount; empty symbols use the `\x` sentinel
    pub fn token(value: impl Into<String>, symbol: &str, policy_id: Option<String>) -> Self {
        let symbol = if symbol.is_empty() {
            EMPTY_HEX.to_string()
        } else {
            symbol.to_string()
        };
        Amount {
            value: value.into(),
            currency: Currency {
                symbol,
                decimals: 0,
                metadata: policy_id.map(|policy_id| CurrencyMetadata {
                    policy_id: Some(policy_id),
                }),
            },
        }
    }
}

/// Identifier of a coin: "txhash:index"
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoinIdentifier {
    pub identifier: String,
}

/// Coin creation/spend marker
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoinChange {
    pub coin_identifier: CoinIdentifier,

    /// "coin_spent" or "coin_created"
    pub coin_action: String,
}

impl CoinChange {
    pub fn spent(identifier: impl Into<String>) -> Self {
        CoinChange {
            coin_identifier: CoinIdentifier {
                identifier: identifier.into(),
            },
            coin_action: COIN_SPENT_ACTION.to_string(),
        }
    }

    pub fn is_spent(&self) -> bool {
        self.coin_action == COIN_SPENT_ACTION
    }
}

/// One policy's worth of tokens within an output
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenBundleItem {
    #[serde(rename = "policyId")]
    pub policy_id: String,

    pub tokens: Vec<Amount>,
}

/// Pool margin as decimal strings
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolMargin {
    pub numerator: String,

    pub denominator: String,
}

/// Off-chain pool metadata reference, wire form
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolMetadataParams {
    pub url: String,

    pub hash: String,
}

/// Relay parameters, wire form
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RelayParams {
    /// "single_host_addr", "single_host_name" or "multi_host_name"
    #[serde(rename = "type")]
    pub relay_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,

    #[serde(rename = "dnsName", skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

/// Full pool registration parameter block, wire form
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolRegistrationParams {
    #[serde(rename = "vrfKeyHash")]
    pub vrf_key_hash: String,

    #[serde(rename = "rewardAddress")]
    pub reward_address: String,

    pub pledge: String,

    pub cost: String,

    #[serde(rename = "poolOwners")]
    pub pool_owners: Vec<String>,

    pub relays: Vec<RelayParams>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<PoolMargin>,

    #[serde(rename = "margin_percentage", skip_serializing_if = "Option::is_none")]
    pub margin_percentage: Option<String>,

    #[serde(rename = "poolMetadata", skip_serializing_if = "Option::is_none")]
    pub pool_metadata: Option<PoolMetadataParams>,
}

/// CIP-15 vote registration block, wire form
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VoteRegistrationMetadata {
    #[serde(rename = "votingKey")]
    pub voting_key: PublicKey,

    #[serde(rename = "stakeKey")]
    pub stake_key: PublicKey,

    #[serde(rename = "rewardAddress")]
    pub reward_address: String,

    #[serde(rename = "votingNonce")]
    pub voting_nonce: u64,

    #[serde(rename = "votingSignature")]
    pub voting_signature: String,
}

/// Type-specific operation metadata
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OperationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staking_credential: Option<PublicKey>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_key_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,

    #[serde(rename = "tokenBundle", skip_serializing_if = "Option::is_none")]
    pub token_bundle: Option<Vec<TokenBundleItem>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal_amount: Option<Amount>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<Amount>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Amount>,

    #[serde(rename = "poolRegistrationCert", skip_serializing_if = "Option::is_none")]
    pub pool_registration_cert: Option<String>,

    #[serde(
        rename = "poolRegistrationParams",
        skip_serializing_if = "Option::is_none"
    )]
    pub pool_registration_params: Option<PoolRegistrationParams>,

    #[serde(
        rename = "voteRegistrationMetadata",
        skip_serializing_if = "Option::is_none"
    )]
    pub vote_registration_metadata: Option<VoteRegistrationMetadata>,
}

impl OperationMetadata {
    pub fn with_staking_credential(credential: PublicKey) -> Self {
        OperationMetadata {
            staking_credential: Some(credential),
            ..Default::default()
        }
    }
}

/// One economic effect within a transaction
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Operation {
    pub operation_identifier: OperationIdentifier,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_operations: Option<Vec<OperationIdentifier>>,

    #[serde(rename = "type")]
    pub operation_type: OperationType,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountIdentifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin_change: Option<CoinChange>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OperationMetadata>,
}

impl Operation {
    /// A bare operation of the given type at the given index
    pub fn new(index: u64, operation_type: OperationType) -> Self {
        Operation {
            operation_identifier: OperationIdentifier::new(index),
            related_operations: None,
            operation_type,
            status: String::new(),
            account: None,
            amount: None,
            coin_change: None,
            metadata: None,
        }
    }

    /// Whether this operation belongs in the extra-data envelope: its
    /// information cannot be reconstructed from the transaction bytes alone
    pub fn is_extra_data_relevant(&self) -> bool {
        let spends_coin = self
            .coin_change
            .as_ref()
            .map(|change| change.is_spent())
            .unwrap_or(false);

        spends_coin
            || self.operation_type.is_staking()
            || self.operation_type.is_pool()
            || self.operation_type.is_vote()
    }
}

/// Transaction-level data carried beside the transaction bytes because it is
/// not recoverable from them
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionExtraData {
    /// The non-recoverable subset of the original operations
    pub operations: Vec<Operation>,

    /// Raw vote-registration metadata CBOR, if any
    #[serde(
        rename = "transactionMetadataHex",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_metadata_hex: Option<String>,
}
