//! Construction-flow entry points
//!
//! One function per step of the Rosetta construction flow. All steps are
//! pure and synchronous; the only external dependency is the ledger-data
//! collaborator injected into the metadata step.

use crate::build::{
    build_signed_transaction, create_unsigned_transaction, estimate_signed_transaction_size,
    hash_signed_transaction,
};
use crate::fees::{calculate_min_fee, updated_tx_size};
use crate::parse::{parse_signed_transaction, parse_unsigned_transaction, ParsedTransaction};
use stoa_codec::{decode_extra_data, encode_extra_data};
use stoa_common::{
    derive_address, AccountIdentifier, AddressType, BlockInfo, ConstructionError,
    DepositParameters, NetworkId, Operation, ProtocolParameters, PublicKey, Signatures,
    TransactionExtraData, DEFAULT_RELATIVE_TTL,
};

/// Signature scheme of every signing payload this engine produces
pub const SIGNATURE_TYPE: &str = "ed25519";

/// Ledger-data collaborator consumed by the metadata step
pub trait LedgerDataProvider {
    /// Current protocol parameters
    fn protocol_parameters(&self) -> Result<ProtocolParameters, ConstructionError>;

    /// Number of the latest known block
    fn latest_block_number(&self) -> Result<u64, ConstructionError>;

    /// Block identity by number, `None` when unknown
    fn block(&self, block_number: u64) -> Result<Option<BlockInfo>, ConstructionError>;
}

/// Options produced by preprocess for the metadata step
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PreprocessResult {
    /// Relative ttl, defaulted when the caller supplied none
    pub relative_ttl: u64,

    /// Estimated signed transaction size in bytes (ttl-0 sentinel)
    pub transaction_size: u64,
}

/// Estimate transaction size and fix the relative ttl
pub fn preprocess(
    network: NetworkId,
    operations: &[Operation],
    relative_ttl: Option<u64>,
    deposit_parameters: Option<DepositParameters>,
) -> Result<PreprocessResult, ConstructionError> {
    let relative_ttl = relative_ttl.unwrap_or(DEFAULT_RELATIVE_TTL);
    let deposit_parameters = deposit_parameters.unwrap_or_default();
    let transaction_size =
        estimate_signed_transaction_size(network, operations, &deposit_parameters)?;
    Ok(PreprocessResult {
        relative_ttl,
        transaction_size,
    })
}

/// Metadata needed to build the real payloads
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConstructionMetadata {
    /// Absolute ttl slot
    pub ttl: u64,

    /// Protocol parameters at the time of the query
    pub protocol_parameters: ProtocolParameters,

    /// Linear fee for the size-adjusted transaction
    pub suggested_fee: u64,
}

/// Query the ledger collaborator and compute ttl and suggested fee
pub fn metadata(
    ledger: &dyn LedgerDataProvider,
    relative_ttl: u64,
    transaction_size: u64,
) -> Result<ConstructionMetadata, ConstructionError> {
    tracing::debug!("Looking for latest block to compute ttl");
    let latest_block_number = ledger.latest_block_number()?;
    let block = ledger
        .block(latest_block_number)?
        .ok_or(ConstructionError::BlockNotFound)?;
    let ttl = block.slot_no + relative_ttl;

    let protocol_parameters = ledger.protocol_parameters()?;
    let updated_size = updated_tx_size(transaction_size, 0, ttl);
    let suggested_fee = calculate_min_fee(updated_size, &protocol_parameters);

    Ok(ConstructionMetadata {
        ttl,
        protocol_parameters,
        suggested_fee,
    })
}

/// One payload to be signed by one address
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SigningPayload {
    /// Signer account
    pub account_identifier: AccountIdentifier,

    /// Body hash to sign
    pub hex_bytes: String,

    /// Signature scheme
    pub signature_type: String,
}

/// Result of the payloads step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadsResult {
    /// The unsigned transaction envelope, hex-encoded
    pub unsigned_transaction: String,

    /// One signing payload per signer address
    pub payloads: Vec<SigningPayload>,
}

/// Build the unsigned transaction and its signing payloads
pub fn payloads(
    network: NetworkId,
    operations: &[Operation],
    ttl: u64,
    deposit_parameters: Option<DepositParameters>,
) -> Result<PayloadsResult, ConstructionError> {
    let deposit_parameters = deposit_parameters.unwrap_or_default();
    let unsigned = create_unsigned_transaction(network, operations, ttl, &deposit_parameters)?;

    let extra = TransactionExtraData {
        operations: operations.to_vec(),
        transaction_metadata_hex: unsigned.metadata.clone(),
    };
    let unsigned_transaction = encode_extra_data(&unsigned.bytes, &extra);

    let payloads = unsigned
        .addresses
        .iter()
        .map(|address| SigningPayload {
            account_identifier: AccountIdentifier::new(address.clone()),
            hex_bytes: unsigned.hash.clone(),
            signature_type: SIGNATURE_TYPE.to_string(),
        })
        .collect();

    Ok(PayloadsResult {
        unsigned_transaction,
        payloads,
    })
}

/// Assemble collected signatures into the signed transaction envelope
pub fn combine(
    unsigned_transaction: &str,
    signatures: &[Signatures],
) -> Result<String, ConstructionError> {
    let (transaction_hex, extra) = decode_extra_data(unsigned_transaction)?;
    let signed = build_signed_transaction(
        &transaction_hex,
        signatures,
        extra.transaction_metadata_hex.as_deref(),
    )?;
    Ok(encode_extra_data(&signed, &extra))
}

/// Parse a transaction envelope back into operations (and signers when
/// signed)
pub fn parse(
    network: NetworkId,
    signed: bool,
    transaction: &str,
) -> Result<ParsedTransaction, ConstructionError> {
    let (transaction_hex, extra) = decode_extra_data(transaction)?;
    if signed {
        parse_signed_transaction(network, &transaction_hex, &extra)
    } else {
        parse_unsigned_transaction(network, &transaction_hex, &extra)
    }
}

/// Hash a signed transaction envelope
pub fn transaction_hash(signed_transaction: &str) -> Result<String, ConstructionError> {
    let (transaction_hex, _) = decode_extra_data(signed_transaction)?;
    hash_signed_transaction(&transaction_hex)
}

/// Derive the account address for a public key (the derive step)
pub fn derive(
    network: NetworkId,
    public_key: &PublicKey,
    staking_credential: Option<&PublicKey>,
    address_type: Option<AddressType>,
) -> Result<AccountIdentifier, ConstructionError> {
    let address = derive_address(
        network,
        public_key,
        staking_credential,
        address_type.unwrap_or(AddressType::Enterprise),
    )?;
    Ok(AccountIdentifier::new(address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoa_common::{Amount, CoinChange, OperationType};

    const TX_ID: &str = "2f23fd8cca835af21f3ac375bac601f97ead75f2e79143bdf71fe2c4be043e8f";
    const OUTPUT_ADDRESS: &str = "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8";

    struct FixedLedger {
        parameters: ProtocolParameters,
        latest: u64,
        block: Option<BlockInfo>,
    }

    impl LedgerDataProvider for FixedLedger {
        fn protocol_parameters(&self) -> Result<ProtocolParameters, ConstructionError> {
            Ok(self.parameters.clone())
        }

        fn latest_block_number(&self) -> Result<u64, ConstructionError> {
            Ok(self.latest)
        }

        fn block(&self, block_number: u64) -> Result<Option<BlockInfo>, ConstructionError> {
            assert_eq!(block_number, self.latest);
            Ok(self.block.clone())
        }
    }

    fn ledger() -> FixedLedger {
        FixedLedger {
            parameters: ProtocolParameters {
                min_fee_coefficient: 44,
                min_fee_constant: 155_381,
                key_deposit: 2_000_000,
                pool_deposit: 500_000_000,
                max_tx_size: 16_384,
                ..Default::default()
            },
            latest: 8_000_000,
            block: Some(BlockInfo {
                number: 8_000_000,
                slot_no: 90_000_000,
            }),
        }
    }

    fn transfer_operations() -> Vec<Operation> {
        let mut input = Operation::new(0, OperationType::Input);
        input.account = Some(AccountIdentifier::new(OUTPUT_ADDRESS));
        input.amount = Some(Amount::ada("5000000"));
        input.coin_change = Some(CoinChange::spent(format!("{TX_ID}:0")));

        let mut output = Operation::new(1, OperationType::Output);
        output.account = Some(AccountIdentifier::new(OUTPUT_ADDRESS));
        output.amount = Some(Amount::ada("4800000"));

        vec![input, output]
    }

    #[test]
    fn preprocess_defaults_relative_ttl() {
        let result = preprocess(NetworkId::Mainnet, &transfer_operations(), None, None).unwrap();
        assert_eq!(result.relative_ttl, DEFAULT_RELATIVE_TTL);
        assert!(result.transaction_size > 0);
    }

    #[test]
    fn metadata_computes_ttl_and_fee() {
        let result = metadata(&ledger(), 1000, 300).unwrap();
        assert_eq!(result.ttl, 90_001_000);
        // ttl 90_001_000 costs 5 CBOR bytes where the sentinel cost 1
        assert_eq!(result.suggested_fee, 44 * 304 + 155_381);
    }

    #[test]
    fn metadata_without_block_fails() {
        let mut ledger = ledger();
        ledger.block = None;
        assert_eq!(
            metadata(&ledger, 1000, 300).err(),
            Some(ConstructionError::BlockNotFound)
        );
    }

    #[test]
    fn full_flow_round_trips() {
        let operations = transfer_operations();

        let preprocessed =
            preprocess(NetworkId::Mainnet, &operations, Some(1000), None).unwrap();
        let metadata_result =
            metadata(&ledger(), preprocessed.relative_ttl, preprocessed.transaction_size)
                .unwrap();

        let payloads_result =
            payloads(NetworkId::Mainnet, &operations, metadata_result.ttl, None).unwrap();
        assert_eq!(payloads_result.payloads.len(), 1);
        assert_eq!(
            payloads_result.payloads[0].account_identifier.address,
            OUTPUT_ADDRESS
        );
        assert_eq!(payloads_result.payloads[0].signature_type, SIGNATURE_TYPE);

        // Parse the unsigned envelope
        let parsed = parse(
            NetworkId::Mainnet,
            false,
            &payloads_result.unsigned_transaction,
        )
        .unwrap();
        assert_eq!(parsed.operations.len(), 2);
        assert!(parsed.account_identifier_signers.is_empty());

        // Sign with length-correct placeholder material and combine
        let signatures: Vec<Signatures> = payloads_result
            .payloads
            .iter()
            .map(|payload| Signatures {
                signature: "ab".repeat(64),
                public_key: "cd".repeat(32),
                chain_code: None,
                address: Some(payload.account_identifier.address.clone()),
            })
            .collect();
        let signed_envelope =
            combine(&payloads_result.unsigned_transaction, &signatures).unwrap();

        // Parse the signed envelope; the input address must sign
        let parsed_signed = parse(NetworkId::Mainnet, true, &signed_envelope).unwrap();
        assert_eq!(parsed_signed.operations.len(), 2);
        assert_eq!(
            parsed_signed.account_identifier_signers,
            vec![AccountIdentifier::new(OUTPUT_ADDRESS)]
        );

        // The signed envelope hashes to the original signing payload
        let hash = transaction_hash(&signed_envelope).unwrap();
        assert_eq!(hash, payloads_result.payloads[0].hex_bytes);
    }

    #[test]
    fn derive_defaults_to_enterprise_addresses() {
        let key = PublicKey::edwards(
            "1b400d60aaf34eaf6dcbab9bba46001a23497886cf11066f7846933d30e5ad3f",
        );
        let account = derive(NetworkId::Mainnet, &key, None, None).unwrap();
        assert!(account.address.starts_with("addr1"));

        let reward = derive(NetworkId::Mainnet, &key, None, Some(AddressType::Reward)).unwrap();
        assert!(reward.address.starts_with("stake1"));
    }
}
