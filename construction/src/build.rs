//! Transaction assembly: unsigned bodies, witness sets and signed bytes
//!
//! Size estimation signs the body with fixed-length dummy material so the
//! estimate is byte-identical to the eventually signed transaction.

use crate::translate::process_operations;
use stoa_common::{
    classify_era, is_ed25519_key_hash, AddressEra, BootstrapWitness, ConstructionError,
    DepositParameters, NetworkId, Operation, Signatures, TransactionBody, UnsignedTransaction,
    VkeyWitness, WitnessSet, BOOTSTRAP_ATTRIBUTES, DUMMY_CHAIN_CODE, DUMMY_PUBKEY,
    DUMMY_SIGNATURE,
};

/// Build an unsigned transaction from operations
///
/// `ttl` 0 is the estimation sentinel; callers pass the real ttl once the
/// metadata step has computed it.
pub fn create_unsigned_transaction(
    network: NetworkId,
    operations: &[Operation],
    ttl: u64,
    deposit_parameters: &DepositParameters,
) -> Result<UnsignedTransaction, ConstructionError> {
    tracing::debug!(
        "Creating unsigned transaction from {} operations, ttl {ttl}",
        operations.len()
    );

    let (processed, fee) = process_operations(network, operations, deposit_parameters)?;

    if processed.transaction_inputs.is_empty() {
        return Err(ConstructionError::TransactionInputsParametersMissing(
            "No transaction inputs were provided".to_string(),
        ));
    }

    let auxiliary_data = processed.vote_registration_metadata;
    let auxiliary_data_hash = auxiliary_data.as_deref().map(stoa_codec::aux_data_hash);

    let body = TransactionBody {
        inputs: processed.transaction_inputs,
        outputs: processed.transaction_outputs,
        fee,
        ttl,
        certificates: processed.certificates,
        withdrawals: processed.withdrawals,
        auxiliary_data_hash,
    };

    let body_bytes = stoa_codec::encode_transaction_body(&body);
    let hash = stoa_codec::body_hash(&body_bytes);

    Ok(UnsignedTransaction {
        hash: hex::encode(hash),
        bytes: hex::encode(body_bytes),
        addresses: processed.addresses,
        metadata: auxiliary_data.map(hex::encode),
    })
}

/// Partition collected signatures into a witness set by address era
///
/// Byron-era signatures must carry a chain code and become bootstrap
/// witnesses; everything else becomes a vkey witness.
pub fn witness_set_from_signatures(
    signatures: &[Signatures],
) -> Result<WitnessSet, ConstructionError> {
    let mut witnesses = WitnessSet::default();

    for signature in signatures {
        let vkey = hex::decode(&signature.public_key)
            .map_err(|e| ConstructionError::CantBuildWitnessesSet(e.to_string()))?;
        let signature_bytes = hex::decode(&signature.signature)
            .map_err(|e| ConstructionError::CantBuildWitnessesSet(e.to_string()))?;

        let era = signature.address.as_deref().and_then(classify_era);
        if era == Some(AddressEra::Byron) {
            let chain_code = signature
                .chain_code
                .as_deref()
                .ok_or(ConstructionError::MissingChainCode)?;
            let chain_code = hex::decode(chain_code)
                .map_err(|e| ConstructionError::CantBuildWitnessesSet(e.to_string()))?;
            witnesses.bootstrap_witnesses.push(BootstrapWitness {
                vkey,
                signature: signature_bytes,
                chain_code,
                attributes: BOOTSTRAP_ATTRIBUTES.to_vec(),
            });
        } else {
            witnesses.vkey_witnesses.push(VkeyWitness {
                vkey,
                signature: signature_bytes,
            });
        }
    }

    tracing::debug!(
        "Extracted {} vkey and {} bootstrap witnesses",
        witnesses.vkey_witnesses.len(),
        witnesses.bootstrap_witnesses.len()
    );
    Ok(witnesses)
}

/// Produce fixed-length placeholder signatures for the given signer
/// addresses, chosen by era (pool key hashes get the cold-key shape)
pub fn dummy_signatures<'a>(
    addresses: impl IntoIterator<Item = &'a String>,
) -> Result<Vec<Signatures>, ConstructionError> {
    addresses
        .into_iter()
        .map(|address| match classify_era(address) {
            Some(AddressEra::Shelley) => Ok(Signatures {
                signature: DUMMY_SIGNATURE.to_string(),
                public_key: DUMMY_PUBKEY.to_string(),
                chain_code: None,
                address: Some(address.clone()),
            }),
            Some(AddressEra::Byron) => Ok(Signatures {
                signature: DUMMY_SIGNATURE.to_string(),
                public_key: DUMMY_PUBKEY.to_string(),
                chain_code: Some(DUMMY_CHAIN_CODE.to_string()),
                address: Some(address.clone()),
            }),
            // Pool cold keys are passed as bare key hashes
            None if is_ed25519_key_hash(address) => Ok(Signatures {
                signature: DUMMY_SIGNATURE.to_string(),
                public_key: DUMMY_PUBKEY.to_string(),
                chain_code: None,
                address: None,
            }),
            None => Err(ConstructionError::InvalidAddress(address.clone())),
        })
        .collect()
}

/// Assemble a signed transaction from body hex, signatures and optional
/// vote-registration metadata
pub fn build_signed_transaction(
    unsigned_transaction_hex: &str,
    signatures: &[Signatures],
    transaction_metadata_hex: Option<&str>,
) -> Result<String, ConstructionError> {
    tracing::debug!("Signing a transaction with {} signatures", signatures.len());

    let body_bytes = hex::decode(unsigned_transaction_hex)
        .map_err(|e| ConstructionError::CantBuildSignedTransaction(e.to_string()))?;
    // Reject bodies that do not even parse, rather than emitting garbage
    stoa_codec::decode_transaction_body_bytes(&body_bytes)
        .map_err(|e| ConstructionError::CantBuildSignedTransaction(e.to_string()))?;

    let witnesses = witness_set_from_signatures(signatures)?;

    let aux_bytes = match transaction_metadata_hex {
        Some(metadata_hex) => Some(hex::decode(metadata_hex).map_err(|e| {
            ConstructionError::CantBuildSignedTransaction(e.to_string())
        })?),
        None => None,
    };

    let signed = stoa_codec::encode_transaction(&body_bytes, &witnesses, aux_bytes.as_deref());
    Ok(hex::encode(signed))
}

/// Estimate the byte size of the eventually signed transaction
///
/// Built with the ttl-0 sentinel and dummy signatures; the metadata step
/// later adjusts for the real ttl width.
pub fn estimate_signed_transaction_size(
    network: NetworkId,
    operations: &[Operation],
    deposit_parameters: &DepositParameters,
) -> Result<u64, ConstructionError> {
    let unsigned = create_unsigned_transaction(network, operations, 0, deposit_parameters)?;
    let signatures = dummy_signatures(unsigned.addresses.iter())?;
    let signed =
        build_signed_transaction(&unsigned.bytes, &signatures, unsigned.metadata.as_deref())?;
    Ok(signed.len() as u64 / 2)
}

/// Hash a signed transaction: re-derive the body bytes and hash them
pub fn hash_signed_transaction(signed_transaction_hex: &str) -> Result<String, ConstructionError> {
    let bytes = hex::decode(signed_transaction_hex)
        .map_err(|_| ConstructionError::ParseSignedTransactionError)?;
    let decoded = stoa_codec::decode_transaction(&bytes)
        .map_err(|_| ConstructionError::ParseSignedTransactionError)?;
    Ok(hex::encode(stoa_codec::body_hash(&decoded.body_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoa_common::{
        AccountIdentifier, Amount, CoinChange, Operation, OperationMetadata, OperationType,
        PublicKey,
    };

    const TX_ID: &str = "2f23fd8cca835af21f3ac375bac601f97ead75f2e79143bdf71fe2c4be043e8f";
    const OUTPUT_ADDRESS: &str = "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8";
    const STAKE_KEY: &str = "1b400d60aaf34eaf6dcbab9bba46001a23497886cf11066f7846933d30e5ad3f";

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

    fn zero_deposits() -> DepositParameters {
        DepositParameters {
            pool_deposit: 0,
            key_deposit: 0,
        }
    }

    #[test]
    fn unsigned_transaction_is_deterministic() {
        let operations = transfer_operations();
        let first =
            create_unsigned_transaction(NetworkId::Mainnet, &operations, 0, &zero_deposits())
                .unwrap();
        let second =
            create_unsigned_transaction(NetworkId::Mainnet, &operations, 0, &zero_deposits())
                .unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.addresses.len(), 1);
        assert_eq!(first.metadata, None);
    }

    #[test]
    fn unsigned_transaction_body_carries_computed_fee() {
        let unsigned = create_unsigned_transaction(
            NetworkId::Mainnet,
            &transfer_operations(),
            0,
            &zero_deposits(),
        )
        .unwrap();
        let body =
            stoa_codec::decode_transaction_body_bytes(&hex::decode(&unsigned.bytes).unwrap())
                .unwrap();
        assert_eq!(body.fee, 200_000);
        assert_eq!(body.ttl, 0);
    }

    #[test]
    fn operations_without_inputs_cannot_build_a_body() {
        let operations = vec![{
            let mut op = Operation::new(0, OperationType::StakeKeyRegistration);
            op.metadata = Some(OperationMetadata::with_staking_credential(
                PublicKey::edwards(STAKE_KEY),
            ));
            op
        }];
        let result =
            create_unsigned_transaction(NetworkId::Mainnet, &operations, 0, &zero_deposits());
        assert!(matches!(
            result,
            Err(ConstructionError::TransactionInputsParametersMissing(_))
        ));
    }

    fn byron_address() -> String {
        stoa_common::ByronAddress::from_inner(&[0x83, 0x00, 0x00]).to_string()
    }

    #[test]
    fn witness_set_partitions_by_era() {
        let signatures = vec![
            Signatures {
                signature: DUMMY_SIGNATURE.to_string(),
                public_key: DUMMY_PUBKEY.to_string(),
                chain_code: None,
                address: Some(OUTPUT_ADDRESS.to_string()),
            },
            Signatures {
                signature: DUMMY_SIGNATURE.to_string(),
                public_key: DUMMY_PUBKEY.to_string(),
                chain_code: Some(DUMMY_CHAIN_CODE.to_string()),
                address: Some(byron_address()),
            },
        ];

        let witnesses = witness_set_from_signatures(&signatures).unwrap();
        assert_eq!(witnesses.vkey_witnesses.len(), 1);
        assert_eq!(witnesses.bootstrap_witnesses.len(), 1);
        assert_eq!(
            witnesses.bootstrap_witnesses[0].attributes,
            BOOTSTRAP_ATTRIBUTES.to_vec()
        );
    }

    #[test]
    fn byron_signature_without_chain_code_is_rejected() {
        let signatures = vec![Signatures {
            signature: DUMMY_SIGNATURE.to_string(),
            public_key: DUMMY_PUBKEY.to_string(),
            chain_code: None,
            address: Some(byron_address()),
        }];
        assert_eq!(
            witness_set_from_signatures(&signatures).err(),
            Some(ConstructionError::MissingChainCode)
        );
    }

    #[test]
    fn combine_produces_one_witness_per_distinct_signer() {
        let unsigned = create_unsigned_transaction(
            NetworkId::Mainnet,
            &transfer_operations(),
            1000,
            &zero_deposits(),
        )
        .unwrap();
        let signatures = dummy_signatures(unsigned.addresses.iter()).unwrap();
        let signed = build_signed_transaction(&unsigned.bytes, &signatures, None).unwrap();

        let decoded = stoa_codec::decode_transaction(&hex::decode(&signed).unwrap()).unwrap();
        assert_eq!(
            decoded.witnesses.vkey_witnesses.len(),
            unsigned.addresses.len()
        );
        assert!(decoded.witnesses.bootstrap_witnesses.is_empty());
    }

    #[test]
    fn dummy_size_estimate_matches_equal_length_real_signatures() {
        let operations = transfer_operations();
        let estimated =
            estimate_signed_transaction_size(NetworkId::Mainnet, &operations, &zero_deposits())
                .unwrap();

        // "Real" signatures of the correct Ed25519 lengths, different bytes
        let unsigned =
            create_unsigned_transaction(NetworkId::Mainnet, &operations, 0, &zero_deposits())
                .unwrap();
        let signatures: Vec<Signatures> = unsigned
            .addresses
            .iter()
            .map(|address| Signatures {
                signature: "ab".repeat(64),
                public_key: "cd".repeat(32),
                chain_code: None,
                address: Some(address.clone()),
            })
            .collect();
        let signed =
            build_signed_transaction(&unsigned.bytes, &signatures, None).unwrap();

        assert_eq!(estimated, signed.len() as u64 / 2);
    }

    #[test]
    fn signed_transaction_hash_equals_body_hash() {
        let unsigned = create_unsigned_transaction(
            NetworkId::Mainnet,
            &transfer_operations(),
            1000,
            &zero_deposits(),
        )
        .unwrap();
        let signatures = dummy_signatures(unsigned.addresses.iter()).unwrap();
        let signed = build_signed_transaction(&unsigned.bytes, &signatures, None).unwrap();

        assert_eq!(hash_signed_transaction(&signed).unwrap(), unsigned.hash);
    }

    #[test]
    fn corrupt_signed_bytes_cannot_be_hashed() {
        assert_eq!(
            hash_signed_transaction("0011"),
            Err(ConstructionError::ParseSignedTransactionError)
        );
    }
}
