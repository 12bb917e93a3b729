//! Typed construction errors for Stoa
//!
//! Every failure carries a stable machine-readable tag (and numeric code)
//! alongside its human message; callers surface them unchanged. None of
//! these are retried - they all describe invalid input or corrupt bytes.

use thiserror::Error;

/// Validation and codec failures of the construction engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("Address is invalid: {0}")]
    InvalidAddress(String),

    #[error("Staking key is required for this type of address")]
    MissingStakingKey,

    #[error("Invalid staking key format")]
    InvalidStakingKeyFormat,

    #[error("Invalid operation type: {0}")]
    InvalidOperationType(String),

    #[error("Transaction inputs parameters errors in operations array: {0}")]
    TransactionInputsParametersMissing(String),

    #[error("Transaction outputs parameters errors in operations array: {0}")]
    TransactionOutputsParametersMissing(String),

    #[error("The transaction you are trying to build has more outputs than inputs")]
    OutputsAreBiggerThanInputs,

    #[error("Missing chain code for Byron address signature")]
    MissingChainCode,

    #[error("Pool key hash is required to operate")]
    MissingPoolKey,

    #[error("Provided pool key hash has invalid format")]
    InvalidPoolKey,

    #[error("Pool registration certificate is required for pool registration")]
    MissingPoolCert,

    #[error("Invalid pool registration certificate: {0}")]
    InvalidPoolRegistrationCert(String),

    #[error("Invalid pool registration certificate type")]
    InvalidPoolRegistrationCertType,

    #[error("Invalid pool registration parameters: {0}")]
    InvalidPoolRegistrationParameters(String),

    #[error("Pool relays are invalid: {0}")]
    InvalidPoolRelays(String),

    #[error("Invalid pool relay type")]
    InvalidPoolRelayType,

    #[error("Dns name expected for pool relay")]
    MissingDnsName,

    #[error("Invalid pool owners received: {0}")]
    InvalidPoolOwners(String),

    #[error("Invalid pool metadata")]
    InvalidPoolMetadata,

    #[error("Epoch is required for pool retirement")]
    MissingMetadataParametersForPoolRetirement,

    #[error("Missing vote registration metadata")]
    MissingVoteRegistrationMetadata,

    #[error("Voting key is missing")]
    MissingVotingKey,

    #[error("Voting key format is invalid")]
    InvalidVotingKeyFormat,

    #[error("Voting signature format is invalid")]
    InvalidVotingSignature,

    #[error("Voting nonce is not valid")]
    VotingNonceNotValid,

    #[error("Cant create unsigned transaction probably because of unsigned transaction bytes")]
    CantCreateUnsignedTransactionFromBytes,

    #[error("Cant create signed transaction probably because of transaction bytes")]
    CantCreateSignedTransactionFromBytes,

    #[error("Cant build signed transaction: {0}")]
    CantBuildSignedTransaction(String),

    #[error("Cant build witnesses set for transaction probably because of provided signatures")]
    CantBuildWitnessesSet(String),

    #[error("Cant deserialize transaction envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Parse signed transaction error")]
    ParseSignedTransactionError,

    #[error("Block not found")]
    BlockNotFound,

    #[error("Ledger data query failed: {0}")]
    LedgerQueryFailed(String),
}

impl ConstructionError {
    /// Stable machine-readable tag for this error
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalidAddressError",
            Self::MissingStakingKey => "missingStakingKeyError",
            Self::InvalidStakingKeyFormat => "invalidStakingKeyFormat",
            Self::InvalidOperationType(_) => "invalidOperationTypeError",
            Self::TransactionInputsParametersMissing(_) => {
                "transactionInputsParametersMissingError"
            }
            Self::TransactionOutputsParametersMissing(_) => {
                "transactionOutputsParametersMissingError"
            }
            Self::OutputsAreBiggerThanInputs => "outputsAreBiggerThanInputsError",
            Self::MissingChainCode => "missingChainCodeError",
            Self::MissingPoolKey => "missingPoolKeyError",
            Self::InvalidPoolKey => "invalidPoolKeyError",
            Self::MissingPoolCert => "missingPoolCertError",
            Self::InvalidPoolRegistrationCert(_) => "invalidPoolRegistrationCert",
            Self::InvalidPoolRegistrationCertType => "invalidPoolRegistrationCertType",
            Self::InvalidPoolRegistrationParameters(_) => "invalidPoolRegistrationParameters",
            Self::InvalidPoolRelays(_) => "invalidPoolRelaysError",
            Self::InvalidPoolRelayType => "invalidPoolRelayTypeError",
            Self::MissingDnsName => "missingDnsNameError",
            Self::InvalidPoolOwners(_) => "invalidPoolOwnersError",
            Self::InvalidPoolMetadata => "invalidPoolMetadataError",
            Self::MissingMetadataParametersForPoolRetirement => {
                "missingMetadataParametersForPoolRetirement"
            }
            Self::MissingVoteRegistrationMetadata => "missingVoteRegistrationMetadata",
            Self::MissingVotingKey => "missingVotingKeyError",
            Self::InvalidVotingKeyFormat => "invalidVotingKeyFormat",
            Self::InvalidVotingSignature => "invalidVotingSignature",
            Self::VotingNonceNotValid => "votingNonceNotValid",
            Self::CantCreateUnsignedTransactionFromBytes => {
                "cantCreateUnsignedTransactionFromBytes"
            }
            Self::CantCreateSignedTransactionFromBytes => "cantCreateSignedTransactionFromBytes",
            Self::CantBuildSignedTransaction(_) => "cantBuildSignedTransaction",
            Self::CantBuildWitnessesSet(_) => "cantBuildWitnessesSet",
            Self::MalformedEnvelope(_) => "malformedTransactionEnvelope",
            Self::ParseSignedTransactionError => "parseSignedTransactionError",
            Self::BlockNotFound => "blockNotFoundError",
            Self::LedgerQueryFailed(_) => "ledgerQueryFailed",
        }
    }

    /// Numeric code: 4xxx for malformed input, 5xxx for codec/collaborator
    /// failures
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidAddress(_) => 4001,
            Self::MissingStakingKey => 4002,
            Self::InvalidStakingKeyFormat => 4003,
            Self::InvalidOperationType(_) => 4004,
            Self::TransactionInputsParametersMissing(_) => 4005,
            Self::TransactionOutputsParametersMissing(_) => 4006,
            Self::OutputsAreBiggerThanInputs => 4007,
            Self::MissingChainCode => 4008,
            Self::MissingPoolKey => 4009,
            Self::InvalidPoolKey => 4010,
            Self::MissingPoolCert => 4011,
            Self::InvalidPoolRegistrationCert(_) => 4012,
            Self::InvalidPoolRegistrationCertType => 4013,
            Self::InvalidPoolRegistrationParameters(_) => 4014,
            Self::InvalidPoolRelays(_) => 4015,
            Self::InvalidPoolRelayType => 4016,
            Self::MissingDnsName => 4017,
            Self::InvalidPoolOwners(_) => 4018,
            Self::InvalidPoolMetadata => 4019,
            Self::MissingMetadataParametersForPoolRetirement => 4020,
            Self::MissingVoteRegistrationMetadata => 4021,
            Self::MissingVotingKey => 4022,
            Self::InvalidVotingKeyFormat => 4023,
            Self::InvalidVotingSignature => 4024,
            Self::VotingNonceNotValid => 4025,
            Self::CantCreateUnsignedTransactionFromBytes => 5001,
            Self::CantCreateSignedTransactionFromBytes => 5002,
            Self::CantBuildSignedTransaction(_) => 5003,
            Self::CantBuildWitnessesSet(_) => 5004,
            Self::MalformedEnvelope(_) => 5005,
            Self::ParseSignedTransactionError => 5006,
            Self::BlockNotFound => 5007,
            Self::LedgerQueryFailed(_) => 5008,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_partition_by_category() {
        assert!(ConstructionError::MissingStakingKey.code() < 5000);
        assert!(ConstructionError::OutputsAreBiggerThanInputs.code() < 5000);
        assert!(ConstructionError::CantCreateSignedTransactionFromBytes.code() >= 5000);
    }

    #[test]
    fn tags_are_stable() {
        assert_eq!(
            ConstructionError::OutputsAreBiggerThanInputs.tag(),
            "outputsAreBiggerThanInputsError"
        );
        assert_eq!(
            ConstructionError::InvalidOperationType("x".into()).tag(),
            "invalidOperationTypeError"
        );
    }
}
