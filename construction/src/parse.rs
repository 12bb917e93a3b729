//! The reverse direction: transaction bytes back to Rosetta operations
//!
//! Body lists are zipped positionally against the filtered operations the
//! envelope carries; everything the envelope does not carry (output
//! addresses, token bundles, certificate content) is re-derived from the
//! body itself.

use crate::translate::pool_registration_signers;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use stoa_common::{
    reward_address, stake_credential, AccountIdentifier, Address, Amount, Certificate,
    ConstructionError, NetworkId, Operation, OperationIdentifier, OperationMetadata,
    OperationType, PoolMargin, PoolMetadataParams, PoolRegistration, PoolRegistrationParams,
    PublicKey, Relay, RelayParams, StakeAddress, TokenBundleItem, TransactionBody,
    TransactionExtraData, Value, VoteRegistrationMetadata,
};

/// Result of parsing transaction bytes: the reconstructed operations and,
/// for signed transactions, the signer account identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub operations: Vec<Operation>,

    pub account_identifier_signers: Vec<AccountIdentifier>,
}

/// Parse unsigned transaction bytes back into operations
pub fn parse_unsigned_transaction(
    network: NetworkId,
    transaction_hex: &str,
    extra: &TransactionExtraData,
) -> Result<ParsedTransaction, ConstructionError> {
    let bytes = hex::decode(transaction_hex)
        .map_err(|_| ConstructionError::CantCreateUnsignedTransactionFromBytes)?;
    let body = stoa_codec::decode_transaction_body_bytes(&bytes)
        .map_err(|_| ConstructionError::CantCreateUnsignedTransactionFromBytes)?;

    let operations = operations_from_body(network, &body, extra)?;
    Ok(ParsedTransaction {
        operations,
        account_identifier_signers: Vec::new(),
    })
}

/// Parse signed transaction bytes back into operations and signers
pub fn parse_signed_transaction(
    network: NetworkId,
    transaction_hex: &str,
    extra: &TransactionExtraData,
) -> Result<ParsedTransaction, ConstructionError> {
    let bytes = hex::decode(transaction_hex)
        .map_err(|_| ConstructionError::CantCreateSignedTransactionFromBytes)?;
    let decoded = stoa_codec::decode_transaction(&bytes)
        .map_err(|_| ConstructionError::CantCreateSignedTransactionFromBytes)?;

    let operations = operations_from_body(network, &decoded.body, extra)?;
    let account_identifier_signers = signers_from_extra(network, extra)?;
    Ok(ParsedTransaction {
        operations,
        account_identifier_signers,
    })
}

fn operations_from_body(
    network: NetworkId,
    body: &TransactionBody,
    extra: &TransactionExtraData,
) -> Result<Vec<Operation>, ConstructionError> {
    let mut operations: Vec<Operation> = Vec::new();

    // Inputs come back verbatim from the envelope
    let input_ops: Vec<&Operation> = extra
        .operations
        .iter()
        .filter(|op| op.operation_type == OperationType::Input)
        .collect();
    tracing::debug!("Parsing {} inputs", body.inputs.len());
    for index in 0..body.inputs.len() {
        let original = input_ops.get(index).ok_or_else(|| {
            ConstructionError::MalformedEnvelope(format!("input operation {index} not carried"))
        })?;
        let mut operation = (*original).clone();
        operation.status = String::new();
        operations.push(operation);
    }

    let related_operations: Vec<OperationIdentifier> = operations
        .iter()
        .map(|op| OperationIdentifier::new(op.operation_identifier.index))
        .collect();

    // Outputs are rebuilt from body content alone
    tracing::debug!("Parsing {} outputs", body.outputs.len());
    for output in &body.outputs {
        let address = Address::from_bytes(&output.address)
            .and_then(|address| address.to_string())
            .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;

        let mut operation = Operation::new(operations.len() as u64, OperationType::Output);
        if !related_operations.is_empty() {
            operation.related_operations = Some(related_operations.clone());
        }
        operation.account = Some(AccountIdentifier::new(address));
        operation.amount = Some(Amount::ada(output.value.coin.to_string()));
        if let Some(bundle) = token_bundle_from_value(&output.value) {
            operation.metadata = Some(OperationMetadata {
                token_bundle: Some(bundle),
                ..Default::default()
            });
        }
        operations.push(operation);
    }

    parse_certificates(network, body, extra, &mut operations)?;
    parse_withdrawals(network, body, extra, &mut operations)?;
    parse_vote_registration(extra, &mut operations)?;

    Ok(operations)
}

/// Merge same-policy entries and flatten to sorted token bundle items
fn token_bundle_from_value(value: &Value) -> Option<Vec<TokenBundleItem>> {
    if value.multi_assets.is_empty() {
        return None;
    }

    let mut merged: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for policy in &value.multi_assets {
        let by_name = merged.entry(hex::encode(&policy.policy_id)).or_default();
        for (name, quantity) in &policy.assets {
            *by_name.entry(hex::encode(name)).or_insert(0) += quantity;
        }
    }

    // BTreeMap iteration makes the policy-then-symbol ordering deterministic
    Some(
        merged
            .into_iter()
            .map(|(policy_id, assets)| TokenBundleItem {
                policy_id,
                tokens: assets
                    .into_iter()
                    .map(|(symbol, quantity)| {
                        Amount::token(quantity.to_string(), &symbol, None)
                    })
                    .collect(),
            })
            .collect(),
    )
}

fn staking_credential_of(operation: &Operation) -> Result<&PublicKey, ConstructionError> {
    operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.staking_credential.as_ref())
        .ok_or(ConstructionError::MissingStakingKey)
}

fn parse_certificates(
    network: NetworkId,
    body: &TransactionBody,
    extra: &TransactionExtraData,
    operations: &mut Vec<Operation>,
) -> Result<(), ConstructionError> {
    let cert_ops: Vec<&Operation> = extra
        .operations
        .iter()
        .filter(|op| op.operation_type.produces_certificate())
        .collect();
    tracing::debug!("Parsing {} certificates", body.certificates.len());

    for (index, certificate) in body.certificates.iter().enumerate() {
        let original = cert_ops.get(index).ok_or_else(|| {
            ConstructionError::MalformedEnvelope(format!(
                "certificate operation {index} not carried"
            ))
        })?;

        let mut operation = Operation::new(
            original.operation_identifier.index,
            original.operation_type,
        );
        operation.operation_identifier = original.operation_identifier.clone();

        if original.operation_type.is_staking() {
            let credential = staking_credential_of(original)?;
            let address = reward_address(network, stake_credential(credential)?)
                .to_string()
                .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;
            operation.account = Some(AccountIdentifier::new(address));

            let mut metadata = OperationMetadata::with_staking_credential(credential.clone());
            if let Certificate::StakeDelegation(delegation) = certificate {
                metadata.pool_key_hash = Some(hex::encode(&delegation.operator));
            }
            operation.metadata = Some(metadata);
        } else {
            operation.account = original.account.clone();
            match (original.operation_type, certificate) {
                (OperationType::PoolRetirement, Certificate::PoolRetirement(retirement)) => {
                    operation.metadata = Some(OperationMetadata {
                        epoch: Some(retirement.epoch),
                        ..Default::default()
                    });
                }
                (OperationType::PoolRegistration, Certificate::PoolRegistration(reg)) => {
                    operation.metadata = Some(OperationMetadata {
                        pool_registration_params: Some(pool_registration_params_from_cert(
                            network, reg,
                        )?),
                        ..Default::default()
                    });
                }
                (
                    OperationType::PoolRegistrationWithCert,
                    certificate @ Certificate::PoolRegistration(_),
                ) => {
                    operation.metadata = Some(OperationMetadata {
                        pool_registration_cert: Some(hex::encode(
                            stoa_codec::certificate_to_bytes(certificate),
                        )),
                        ..Default::default()
                    });
                }
                _ => {
                    return Err(ConstructionError::MalformedEnvelope(format!(
                        "certificate {index} does not match operation type {}",
                        original.operation_type
                    )))
                }
            }
        }

        operations.push(operation);
    }

    Ok(())
}

fn pool_registration_params_from_cert(
    network: NetworkId,
    registration: &PoolRegistration,
) -> Result<PoolRegistrationParams, ConstructionError> {
    let mut pool_owners = Vec::with_capacity(registration.pool_owners.len());
    for owner in &registration.pool_owners {
        let address = reward_address(
            network,
            stoa_common::StakeCredential::AddrKeyHash(owner.clone()),
        );
        pool_owners.push(
            address
                .to_string()
                .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?,
        );
    }

    let relays = registration.relays.iter().map(relay_params_from_relay).collect();

    Ok(PoolRegistrationParams {
        vrf_key_hash: hex::encode(&registration.vrf_key_hash),
        reward_address: registration
            .reward_account
            .to_string()
            .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?,
        pledge: registration.pledge.to_string(),
        cost: registration.cost.to_string(),
        pool_owners,
        relays,
        margin: Some(PoolMargin {
            numerator: registration.margin.numerator.to_string(),
            denominator: registration.margin.denominator.to_string(),
        }),
        margin_percentage: None,
        pool_metadata: registration.pool_metadata.as_ref().map(|metadata| {
            PoolMetadataParams {
                url: metadata.url.clone(),
                hash: hex::encode(&metadata.hash),
            }
        }),
    })
}

fn relay_params_from_relay(relay: &Relay) -> RelayParams {
    match relay {
        Relay::SingleHostAddr(host) => RelayParams {
            relay_type: "single_host_addr".to_string(),
            ipv4: host.ipv4.map(|ip| ip.to_string()),
            ipv6: host.ipv6.map(|ip| ip.to_string()),
            dns_name: None,
            port: host.port.map(|port| port.to_string()),
        },
        Relay::SingleHostName(host) => RelayParams {
            relay_type: "single_host_name".to_string(),
            ipv4: None,
            ipv6: None,
            dns_name: Some(host.dns_name.clone()),
            port: host.port.map(|port| port.to_string()),
        },
        Relay::MultiHostName(host) => RelayParams {
            relay_type: "multi_host_name".to_string(),
            ipv4: None,
            ipv6: None,
            dns_name: Some(host.dns_name.clone()),
            port: None,
        },
    }
}

fn parse_withdrawals(
    network: NetworkId,
    body: &TransactionBody,
    extra: &TransactionExtraData,
    operations: &mut Vec<Operation>,
) -> Result<(), ConstructionError> {
    let withdrawal_ops: Vec<&Operation> = extra
        .operations
        .iter()
        .filter(|op| op.operation_type == OperationType::Withdrawal)
        .collect();
    tracing::debug!("Parsing {} withdrawals", body.withdrawals.len());

    for index in 0..body.withdrawals.len() {
        let original = withdrawal_ops.get(index).ok_or_else(|| {
            ConstructionError::MalformedEnvelope(format!(
                "withdrawal operation {index} not carried"
            ))
        })?;

        let credential = staking_credential_of(original)?;
        let address = reward_address(network, stake_credential(credential)?)
            .to_string()
            .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;
        let value = original
            .amount
            .as_ref()
            .map(|amount| amount.value.clone())
            .unwrap_or_else(|| body.withdrawals[index].amount.to_string());

        let mut operation = Operation::new(
            original.operation_identifier.index,
            OperationType::Withdrawal,
        );
        operation.operation_identifier = original.operation_identifier.clone();
        operation.account = Some(AccountIdentifier::new(address));
        operation.amount = Some(Amount::ada(value));
        operation.metadata = Some(OperationMetadata::with_staking_credential(
            credential.clone(),
        ));
        operations.push(operation);
    }

    Ok(())
}

fn parse_vote_registration(
    extra: &TransactionExtraData,
    operations: &mut Vec<Operation>,
) -> Result<(), ConstructionError> {
    let Some(vote_op) = extra
        .operations
        .iter()
        .find(|op| op.operation_type == OperationType::VoteRegistration)
    else {
        return Ok(());
    };

    let metadata_hex = extra
        .transaction_metadata_hex
        .as_ref()
        .ok_or(ConstructionError::MissingVoteRegistrationMetadata)?;
    let metadata_bytes = hex::decode(metadata_hex)
        .map_err(|_| ConstructionError::MissingVoteRegistrationMetadata)?;
    let data = stoa_codec::decode_vote_registration_aux(&metadata_bytes)?;

    let reward_address = StakeAddress::from_binary(&data.reward_address)
        .and_then(|address| address.to_string())
        .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;

    let mut operation = Operation::new(
        vote_op.operation_identifier.index,
        OperationType::VoteRegistration,
    );
    operation.operation_identifier = vote_op.operation_identifier.clone();
    operation.metadata = Some(OperationMetadata {
        vote_registration_metadata: Some(VoteRegistrationMetadata {
            voting_key: PublicKey::edwards(hex::encode(&data.voting_key)),
            stake_key: PublicKey::edwards(hex::encode(&data.stake_key)),
            reward_address,
            voting_nonce: data.voting_nonce,
            voting_signature: hex::encode(&data.voting_signature),
        }),
        ..Default::default()
    });
    operations.push(operation);

    Ok(())
}

/// Compute the minimal unique signer set of a signed transaction from its
/// envelope operations
fn signers_from_extra(
    network: NetworkId,
    extra: &TransactionExtraData,
) -> Result<Vec<AccountIdentifier>, ConstructionError> {
    let mut signers: Vec<String> = Vec::new();

    for operation in &extra.operations {
        if operation.operation_type.is_pool() {
            signers.extend(pool_signers(network, operation)?);
            continue;
        }
        if let Some(account) = &operation.account {
            signers.push(account.address.clone());
            continue;
        }
        if operation.operation_type.is_vote() {
            continue;
        }
        let credential = staking_credential_of(operation)?;
        let address = reward_address(network, stake_credential(credential)?)
            .to_string()
            .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;
        signers.push(address);
    }

    let mut seen = BTreeSet::new();
    Ok(signers
        .into_iter()
        .filter(|address| seen.insert(address.clone()))
        .map(AccountIdentifier::new)
        .collect())
}

fn pool_signers(
    network: NetworkId,
    operation: &Operation,
) -> Result<Vec<String>, ConstructionError> {
    let mut signers = Vec::new();
    match operation.operation_type {
        OperationType::PoolRegistration => {
            if let Some(account) = &operation.account {
                signers.push(account.address.clone());
            }
            if let Some(params) = operation
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.pool_registration_params.as_ref())
            {
                signers.push(params.reward_address.clone());
                signers.extend(params.pool_owners.iter().cloned());
            }
        }
        OperationType::PoolRegistrationWithCert => {
            let cert_hex = operation
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.pool_registration_cert.as_ref())
                .ok_or(ConstructionError::MissingPoolCert)?;
            let cert_bytes = hex::decode(cert_hex)
                .map_err(|e| ConstructionError::InvalidPoolRegistrationCert(e.to_string()))?;
            let certificate = stoa_codec::certificate_from_bytes(&cert_bytes)
                .map_err(|e| ConstructionError::InvalidPoolRegistrationCert(e.to_string()))?;
            let Certificate::PoolRegistration(registration) = &certificate else {
                return Err(ConstructionError::InvalidPoolRegistrationCertType);
            };
            signers.extend(pool_registration_signers(network, registration)?);
            if let Some(account) = &operation.account {
                signers.push(account.address.clone());
            }
        }
        // Pool retirement signs with the cold key alone
        _ => {
            if let Some(account) = &operation.account {
                signers.push(account.address.clone());
            }
        }
    }
    Ok(signers)
}
