//! The forward direction: folding Rosetta operations into transaction
//! structure
//!
//! Dispatch is an exhaustive match over the closed operation type set; each
//! step validates its operation fully and returns a new accumulator, so a
//! failing operation aborts the whole translation with no partial results.

use crate::fees::{calculate_fee, DepositSums};
use regex::Regex;
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;
use stoa_codec::{certificate_from_bytes, encode_vote_registration_aux, VoteRegistrationData};
use stoa_common::{
    classify_era, is_key_valid, reward_address, stake_credential, Address, Certificate,
    ConstructionError, DepositParameters, MultiHostName, NetworkId, Operation, OperationType,
    PolicyAssets, PoolMetadata, PoolRegistration, PoolRetirement, PublicKey, Ratio, Relay,
    RelayParams, SingleHostAddr, SingleHostName, StakeCredential, StakeDelegation,
    TransactionInput, TransactionOutput, Value, VoteRegistrationMetadata, Withdrawal,
    ASSET_NAME_MAX_HEX_LENGTH, EMPTY_HEX, POLICY_ID_HEX_LENGTH, SIGNATURE_HEX_LENGTH,
};

fn positive_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d+$").expect("valid regex"))
}

fn is_positive_number(value: &str) -> bool {
    positive_number().is_match(value)
}

fn is_hex_of_length(value: &str, length: usize) -> bool {
    value.len() == length && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Accumulator of the operation fold
#[derive(Debug, Default, Clone)]
pub struct ProcessedOperations {
    /// Transaction inputs, in operation order
    pub transaction_inputs: Vec<TransactionInput>,

    /// Transaction outputs, in operation order
    pub transaction_outputs: Vec<TransactionOutput>,

    /// Certificates, in operation order
    pub certificates: Vec<Certificate>,

    /// Withdrawals, in operation order
    pub withdrawals: Vec<Withdrawal>,

    /// Addresses that must witness the transaction
    pub addresses: BTreeSet<String>,

    /// Declared input amounts (signed, folded by magnitude)
    pub input_amounts: Vec<i128>,

    /// Declared output amounts
    pub output_amounts: Vec<u64>,

    /// Declared withdrawal amounts
    pub withdrawal_amounts: Vec<u64>,

    /// Stake key registration count, for deposit sums
    pub stake_key_registrations: u32,

    /// Stake key deregistration count, for refund sums
    pub stake_key_deregistrations: u32,

    /// Pool registration count, for deposit sums
    pub pool_registrations: u32,

    /// Encoded vote-registration auxiliary data, if any
    pub vote_registration_metadata: Option<Vec<u8>>,
}

/// Fold a list of operations into transaction structure and compute the fee
pub fn process_operations(
    network: NetworkId,
    operations: &[Operation],
    deposit_parameters: &DepositParameters,
) -> Result<(ProcessedOperations, u64), ConstructionError> {
    tracing::debug!("Processing {} operations", operations.len());

    let processed = operations
        .iter()
        .try_fold(ProcessedOperations::default(), |accumulator, operation| {
            process_operation(network, accumulator, operation)
        })?;

    let deposits = DepositSums {
        key_refunds: processed.stake_key_deregistrations as u64 * deposit_parameters.key_deposit,
        key_deposits: processed.stake_key_registrations as u64 * deposit_parameters.key_deposit,
        pool_deposits: processed.pool_registrations as u64 * deposit_parameters.pool_deposit,
    };

    let fee = calculate_fee(
        &processed.input_amounts,
        &processed.output_amounts,
        &processed.withdrawal_amounts,
        &deposits,
    )?;

    tracing::debug!("Calculated fee {fee}");
    Ok((processed, fee))
}

fn process_operation(
    network: NetworkId,
    mut accumulator: ProcessedOperations,
    operation: &Operation,
) -> Result<ProcessedOperations, ConstructionError> {
    match operation.operation_type {
        OperationType::Input => {
            let (input, amount) = validate_and_parse_input(operation)?;
            accumulator.transaction_inputs.push(input);
            accumulator.input_amounts.push(amount);
            if let Some(account) = &operation.account {
                accumulator.addresses.insert(account.address.clone());
            }
        }
        OperationType::Output => {
            let (output, amount) = validate_and_parse_output(operation)?;
            accumulator.transaction_outputs.push(output);
            accumulator.output_amounts.push(amount);
        }
        OperationType::StakeKeyRegistration => {
            let credential = staking_credential(operation)?;
            accumulator
                .certificates
                .push(Certificate::StakeRegistration(credential));
            accumulator.stake_key_registrations += 1;
        }
        OperationType::StakeKeyDeregistration => {
            let credential = staking_credential(operation)?;
            let address = reward_address_string(network, &credential)?;
            accumulator
                .certificates
                .push(Certificate::StakeDeregistration(credential));
            accumulator.addresses.insert(address);
            accumulator.stake_key_deregistrations += 1;
        }
        OperationType::StakeDelegation => {
            let credential = staking_credential(operation)?;
            let address = reward_address_string(network, &credential)?;
            let operator = pool_key_hash(operation)?;
            accumulator
                .certificates
                .push(Certificate::StakeDelegation(StakeDelegation {
                    credential,
                    operator,
                }));
            accumulator.addresses.insert(address);
        }
        OperationType::Withdrawal => {
            let credential = staking_credential(operation)?;
            let address = reward_address(network, credential);
            let amount = withdrawal_amount(operation)?;
            let address_string = address.to_string().map_err(|e| {
                ConstructionError::InvalidAddress(e.to_string())
            })?;
            accumulator.withdrawals.push(Withdrawal { address, amount });
            accumulator.withdrawal_amounts.push(amount);
            accumulator.addresses.insert(address_string);
        }
        OperationType::PoolRegistration => {
            let (certificate, signers) = validate_and_parse_pool_registration(operation)?;
            accumulator.certificates.push(certificate);
            accumulator.addresses.extend(signers);
            accumulator.pool_registrations += 1;
        }
        OperationType::PoolRegistrationWithCert => {
            let (certificate, signers) =
                validate_and_parse_pool_registration_cert(network, operation)?;
            accumulator.certificates.push(certificate);
            accumulator.addresses.extend(signers);
            accumulator.pool_registrations += 1;
        }
        OperationType::PoolRetirement => {
            let (certificate, pool_key) = validate_and_parse_pool_retirement(operation)?;
            accumulator.certificates.push(certificate);
            accumulator.addresses.insert(pool_key);
        }
        OperationType::VoteRegistration => {
            let data = validate_and_parse_vote_registration(operation)?;
            accumulator.vote_registration_metadata = Some(encode_vote_registration_aux(&data));
        }
    }

    Ok(accumulator)
}

fn validate_and_parse_input(
    operation: &Operation,
) -> Result<(TransactionInput, i128), ConstructionError> {
    let coin_change = operation.coin_change.as_ref().ok_or_else(|| {
        ConstructionError::TransactionInputsParametersMissing(
            "Input has missing coin_change field".to_string(),
        )
    })?;

    let identifier = &coin_change.coin_identifier.identifier;
    let (transaction_id, index) = identifier.split_once(':').ok_or_else(|| {
        ConstructionError::TransactionInputsParametersMissing(
            "Input has invalid coin_identifier field".to_string(),
        )
    })?;

    if !is_hex_of_length(transaction_id, 64) {
        return Err(ConstructionError::TransactionInputsParametersMissing(
            "Input has invalid transaction id".to_string(),
        ));
    }
    let transaction_id = hex::decode(transaction_id).map_err(|_| {
        ConstructionError::TransactionInputsParametersMissing(
            "Input has invalid transaction id".to_string(),
        )
    })?;
    let index: u64 = index.parse().map_err(|_| {
        ConstructionError::TransactionInputsParametersMissing(
            "Input has invalid coin_identifier field".to_string(),
        )
    })?;

    let value = operation.amount.as_ref().map(|amount| amount.value.as_str()).ok_or_else(|| {
        ConstructionError::TransactionInputsParametersMissing(
            "Input has missing amount value field".to_string(),
        )
    })?;
    let amount: i128 = value.parse().map_err(|_| {
        ConstructionError::TransactionInputsParametersMissing(
            "Input has invalid amount value field".to_string(),
        )
    })?;

    Ok((
        TransactionInput {
            transaction_id,
            index,
        },
        amount,
    ))
}

fn validate_and_parse_output(
    operation: &Operation,
) -> Result<(TransactionOutput, u64), ConstructionError> {
    let account = operation.account.as_ref().ok_or_else(|| {
        ConstructionError::TransactionOutputsParametersMissing(
            "Output has missing address field".to_string(),
        )
    })?;

    if classify_era(&account.address).is_none() {
        return Err(ConstructionError::TransactionOutputsParametersMissing(format!(
            "Output has invalid address {}",
            account.address
        )));
    }
    let address = Address::from_string(&account.address)
        .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?;

    let value = operation.amount.as_ref().map(|amount| amount.value.as_str()).ok_or_else(|| {
        ConstructionError::TransactionOutputsParametersMissing(
            "Output has missing amount value field".to_string(),
        )
    })?;
    if !is_positive_number(value) {
        return Err(ConstructionError::TransactionOutputsParametersMissing(
            "Output has negative amount value".to_string(),
        ));
    }
    let coin: u64 = value.trim_start_matches('+').parse().map_err(|_| {
        ConstructionError::TransactionOutputsParametersMissing(
            "Output has invalid amount value field".to_string(),
        )
    })?;

    let multi_assets = match operation.metadata.as_ref().and_then(|m| m.token_bundle.as_ref()) {
        Some(bundle) => validate_and_parse_token_bundle(bundle)?,
        None => Vec::new(),
    };

    Ok((
        TransactionOutput {
            address: address.to_bytes(),
            value: Value { coin, multi_assets },
        },
        coin,
    ))
}

fn validate_and_parse_token_bundle(
    bundle: &[stoa_common::TokenBundleItem],
) -> Result<Vec<PolicyAssets>, ConstructionError> {
    let mut multi_assets = Vec::with_capacity(bundle.len());
    for item in bundle {
        if !is_hex_of_length(&item.policy_id, POLICY_ID_HEX_LENGTH) {
            return Err(ConstructionError::TransactionOutputsParametersMissing(format!(
                "PolicyId {} is not valid",
                item.policy_id
            )));
        }
        let policy_id = hex::decode(&item.policy_id).map_err(|_| {
            ConstructionError::TransactionOutputsParametersMissing(format!(
                "PolicyId {} is not valid",
                item.policy_id
            ))
        })?;

        let mut assets = Vec::with_capacity(item.tokens.len());
        let mut seen_names = BTreeSet::new();
        for token in &item.tokens {
            let symbol = token.currency.symbol.as_str();
            let name_hex = if symbol == EMPTY_HEX { "" } else { symbol };
            let hex_ok = name_hex.len() <= ASSET_NAME_MAX_HEX_LENGTH
                && name_hex.len() % 2 == 0
                && name_hex.chars().all(|c| c.is_ascii_hexdigit());
            if !hex_ok {
                return Err(ConstructionError::TransactionOutputsParametersMissing(format!(
                    "Token name {symbol} is not valid"
                )));
            }
            if !seen_names.insert(name_hex.to_string()) {
                return Err(ConstructionError::TransactionOutputsParametersMissing(format!(
                    "Token name {symbol} has already been added for policy {}",
                    item.policy_id
                )));
            }
            if !is_positive_number(&token.value) {
                return Err(ConstructionError::TransactionOutputsParametersMissing(format!(
                    "Asset {symbol} has negative or invalid value {}",
                    token.value
                )));
            }
            let quantity: u64 = token.value.trim_start_matches('+').parse().map_err(|_| {
                ConstructionError::TransactionOutputsParametersMissing(format!(
                    "Asset {symbol} has negative or invalid value {}",
                    token.value
                ))
            })?;
            let name = hex::decode(name_hex).map_err(|_| {
                ConstructionError::TransactionOutputsParametersMissing(format!(
                    "Token name {symbol} is not valid"
                ))
            })?;
            assets.push((name, quantity));
        }
        multi_assets.push(PolicyAssets { policy_id, assets });
    }
    Ok(multi_assets)
}

fn staking_credential(operation: &Operation) -> Result<StakeCredential, ConstructionError> {
    let key = operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.staking_credential.as_ref())
        .ok_or(ConstructionError::MissingStakingKey)?;
    stake_credential(key)
}

fn reward_address_string(
    network: NetworkId,
    credential: &StakeCredential,
) -> Result<String, ConstructionError> {
    reward_address(network, credential.clone())
        .to_string()
        .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))
}

fn pool_key_hash(operation: &Operation) -> Result<Vec<u8>, ConstructionError> {
    let hash = operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.pool_key_hash.as_ref())
        .ok_or(ConstructionError::MissingPoolKey)?;
    if !is_hex_of_length(hash, 56) {
        return Err(ConstructionError::InvalidPoolKey);
    }
    hex::decode(hash).map_err(|_| ConstructionError::InvalidPoolKey)
}

fn withdrawal_amount(operation: &Operation) -> Result<u64, ConstructionError> {
    let value = operation.amount.as_ref().map(|amount| amount.value.as_str()).ok_or_else(|| {
        ConstructionError::TransactionOutputsParametersMissing(
            "Withdrawal has missing amount value field".to_string(),
        )
    })?;
    if !is_positive_number(value) {
        return Err(ConstructionError::TransactionOutputsParametersMissing(
            "Withdrawal has negative amount value".to_string(),
        ));
    }
    value.trim_start_matches('+').parse().map_err(|_| {
        ConstructionError::TransactionOutputsParametersMissing(
            "Withdrawal has invalid amount value field".to_string(),
        )
    })
}

fn validate_and_parse_pool_registration(
    operation: &Operation,
) -> Result<(Certificate, Vec<String>), ConstructionError> {
    let params = operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.pool_registration_params.as_ref())
        .ok_or_else(|| {
            ConstructionError::InvalidPoolRegistrationParameters(
                "Pool registration parameters were not provided".to_string(),
            )
        })?;

    let cold_key = operation
        .account
        .as_ref()
        .map(|account| account.address.clone())
        .ok_or(ConstructionError::MissingPoolKey)?;
    if !is_hex_of_length(&cold_key, 56) {
        return Err(ConstructionError::InvalidPoolKey);
    }
    let operator = hex::decode(&cold_key).map_err(|_| ConstructionError::InvalidPoolKey)?;

    let margin = params.margin.as_ref().ok_or_else(|| {
        ConstructionError::InvalidPoolRegistrationParameters(
            "Missing margin parameter at pool registration parameters".to_string(),
        )
    })?;
    let margin = Ratio {
        numerator: parse_pool_number(&margin.numerator)?,
        denominator: parse_pool_number(&margin.denominator)?,
    };
    let pledge = parse_pool_number(&params.pledge)?;
    let cost = parse_pool_number(&params.cost)?;

    if !is_hex_of_length(&params.vrf_key_hash, 64) {
        return Err(ConstructionError::InvalidPoolRegistrationParameters(format!(
            "Given vrfKeyHash {} is invalid",
            params.vrf_key_hash
        )));
    }
    let vrf_key_hash = hex::decode(&params.vrf_key_hash).map_err(|_| {
        ConstructionError::InvalidPoolRegistrationParameters("Invalid vrfKeyHash".to_string())
    })?;

    let reward_account = match Address::from_string(&params.reward_address) {
        Ok(Address::Stake(stake)) => stake,
        _ => {
            return Err(ConstructionError::InvalidAddress(
                params.reward_address.clone(),
            ))
        }
    };

    if params.pool_owners.is_empty() {
        return Err(ConstructionError::InvalidPoolOwners(
            "Empty pool owners received".to_string(),
        ));
    }
    let mut pool_owners = Vec::with_capacity(params.pool_owners.len());
    for owner in &params.pool_owners {
        pool_owners.push(owner_key_hash(owner)?);
    }

    let relays = validate_and_parse_pool_relays(&params.relays)?;

    let pool_metadata = match &params.pool_metadata {
        Some(metadata) => Some(PoolMetadata {
            url: metadata.url.clone(),
            hash: hex::decode(&metadata.hash)
                .map_err(|_| ConstructionError::InvalidPoolMetadata)?,
        }),
        None => None,
    };

    let certificate = Certificate::PoolRegistration(Box::new(PoolRegistration {
        operator,
        vrf_key_hash,
        pledge,
        cost,
        margin,
        reward_account,
        pool_owners,
        relays,
        pool_metadata,
    }));

    let mut signers: Vec<String> = params.pool_owners.clone();
    signers.push(params.reward_address.clone());
    signers.push(cold_key);

    Ok((certificate, signers))
}

fn parse_pool_number(value: &str) -> Result<u64, ConstructionError> {
    if !is_positive_number(value) {
        return Err(ConstructionError::InvalidPoolRegistrationParameters(format!(
            "Given value {value} is invalid"
        )));
    }
    value.trim_start_matches('+').parse().map_err(|_| {
        ConstructionError::InvalidPoolRegistrationParameters(format!(
            "Given value {value} is invalid"
        ))
    })
}

// Owners arrive as stake addresses or base addresses; either way the
// certificate carries their stake key hash
fn owner_key_hash(owner: &str) -> Result<Vec<u8>, ConstructionError> {
    match Address::from_string(owner) {
        Ok(Address::Stake(stake)) => Ok(stake.get_hash().to_vec()),
        Ok(Address::Shelley(shelley)) => match shelley.delegation {
            stoa_common::ShelleyAddressDelegationPart::StakeKeyHash(hash) => Ok(hash),
            _ => Err(ConstructionError::InvalidPoolOwners(format!(
                "Invalid pool owner address {owner}"
            ))),
        },
        _ => Err(ConstructionError::InvalidPoolOwners(format!(
            "Invalid pool owner address {owner}"
        ))),
    }
}

fn validate_and_parse_pool_relays(
    relays: &[RelayParams],
) -> Result<Vec<Relay>, ConstructionError> {
    if relays.is_empty() {
        return Err(ConstructionError::InvalidPoolRelays(
            "Empty relays received".to_string(),
        ));
    }

    let mut parsed = Vec::with_capacity(relays.len());
    for relay in relays {
        let port = match &relay.port {
            Some(port) => {
                if !is_positive_number(port) {
                    return Err(ConstructionError::InvalidPoolRelays(format!(
                        "Invalid port {port} received"
                    )));
                }
                Some(port.trim_start_matches('+').parse::<u16>().map_err(|_| {
                    ConstructionError::InvalidPoolRelays(format!("Invalid port {port} received"))
                })?)
            }
            None => None,
        };

        parsed.push(match relay.relay_type.as_str() {
            "single_host_addr" => {
                let ipv4 = match &relay.ipv4 {
                    Some(ip) => Some(ip.parse::<Ipv4Addr>().map_err(|_| {
                        ConstructionError::InvalidPoolRelays(format!("ipv4 {ip} invalid"))
                    })?),
                    None => None,
                };
                let ipv6 = match &relay.ipv6 {
                    Some(ip) => Some(ip.parse::<Ipv6Addr>().map_err(|_| {
                        ConstructionError::InvalidPoolRelays(format!("ipv6 {ip} invalid"))
                    })?),
                    None => None,
                };
                Relay::SingleHostAddr(SingleHostAddr { port, ipv4, ipv6 })
            }
            "single_host_name" => {
                let dns_name = relay.dns_name.clone().ok_or(ConstructionError::MissingDnsName)?;
                Relay::SingleHostName(SingleHostName { port, dns_name })
            }
            "multi_host_name" => {
                let dns_name = relay.dns_name.clone().ok_or(ConstructionError::MissingDnsName)?;
                Relay::MultiHostName(MultiHostName { dns_name })
            }
            _ => return Err(ConstructionError::InvalidPoolRelayType),
        });
    }
    Ok(parsed)
}

fn validate_and_parse_pool_registration_cert(
    network: NetworkId,
    operation: &Operation,
) -> Result<(Certificate, Vec<String>), ConstructionError> {
    let cold_key = operation
        .account
        .as_ref()
        .map(|account| account.address.clone())
        .ok_or(ConstructionError::MissingPoolKey)?;

    let cert_hex = operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.pool_registration_cert.as_ref())
        .ok_or(ConstructionError::MissingPoolCert)?;

    let cert_bytes = hex::decode(cert_hex)
        .map_err(|e| ConstructionError::InvalidPoolRegistrationCert(e.to_string()))?;
    let certificate = certificate_from_bytes(&cert_bytes)
        .map_err(|e| ConstructionError::InvalidPoolRegistrationCert(e.to_string()))?;

    let registration = match &certificate {
        Certificate::PoolRegistration(registration) => registration,
        _ => return Err(ConstructionError::InvalidPoolRegistrationCertType),
    };

    let mut signers = pool_registration_signers(network, registration)?;
    signers.push(cold_key);

    Ok((certificate.clone(), signers))
}

/// Owners and reward account of a decoded pool registration, as addresses
pub fn pool_registration_signers(
    network: NetworkId,
    registration: &PoolRegistration,
) -> Result<Vec<String>, ConstructionError> {
    let mut signers = Vec::with_capacity(registration.pool_owners.len() + 1);
    for owner in &registration.pool_owners {
        let address = reward_address(network, StakeCredential::AddrKeyHash(owner.clone()));
        signers.push(
            address
                .to_string()
                .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?,
        );
    }
    signers.push(
        registration
            .reward_account
            .to_string()
            .map_err(|e| ConstructionError::InvalidAddress(e.to_string()))?,
    );
    Ok(signers)
}

fn validate_and_parse_pool_retirement(
    operation: &Operation,
) -> Result<(Certificate, String), ConstructionError> {
    let epoch = operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.epoch)
        .ok_or(ConstructionError::MissingMetadataParametersForPoolRetirement)?;

    let pool_key = operation
        .account
        .as_ref()
        .map(|account| account.address.clone())
        .ok_or(ConstructionError::MissingPoolKey)?;
    if !is_hex_of_length(&pool_key, 56) {
        return Err(ConstructionError::InvalidPoolKey);
    }
    let operator = hex::decode(&pool_key).map_err(|_| ConstructionError::InvalidPoolKey)?;

    Ok((
        Certificate::PoolRetirement(PoolRetirement { operator, epoch }),
        pool_key,
    ))
}

fn validate_and_parse_vote_registration(
    operation: &Operation,
) -> Result<VoteRegistrationData, ConstructionError> {
    let metadata: &VoteRegistrationMetadata = operation
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.vote_registration_metadata.as_ref())
        .ok_or(ConstructionError::MissingVoteRegistrationMetadata)?;

    let voting_key = validate_voting_key(&metadata.voting_key)?;

    if metadata.stake_key.hex_bytes.is_empty() {
        return Err(ConstructionError::MissingStakingKey);
    }
    if !is_key_valid(&metadata.stake_key.hex_bytes, &metadata.stake_key.curve_type) {
        return Err(ConstructionError::InvalidStakingKeyFormat);
    }
    let stake_key = hex::decode(&metadata.stake_key.hex_bytes)
        .map_err(|_| ConstructionError::InvalidStakingKeyFormat)?;

    // The registration rewards a stake address, never a payment address
    let reward_address = match Address::from_string(&metadata.reward_address) {
        Ok(Address::Stake(stake)) => stake.to_binary(),
        _ => {
            return Err(ConstructionError::InvalidAddress(
                metadata.reward_address.clone(),
            ))
        }
    };

    if metadata.voting_nonce == 0 {
        return Err(ConstructionError::VotingNonceNotValid);
    }

    if !is_hex_of_length(&metadata.voting_signature, SIGNATURE_HEX_LENGTH) {
        return Err(ConstructionError::InvalidVotingSignature);
    }
    let voting_signature = hex::decode(&metadata.voting_signature)
        .map_err(|_| ConstructionError::InvalidVotingSignature)?;

    Ok(VoteRegistrationData {
        voting_key,
        stake_key,
        reward_address,
        voting_nonce: metadata.voting_nonce,
        voting_signature,
    })
}

fn validate_voting_key(key: &PublicKey) -> Result<Vec<u8>, ConstructionError> {
    if key.hex_bytes.is_empty() {
        return Err(ConstructionError::MissingVotingKey);
    }
    if !is_key_valid(&key.hex_bytes, &key.curve_type) {
        return Err(ConstructionError::InvalidVotingKeyFormat);
    }
    hex::decode(&key.hex_bytes).map_err(|_| ConstructionError::InvalidVotingKeyFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoa_common::{
        AccountIdentifier, Amount, CoinChange, Currency, OperationIdentifier, OperationMetadata,
        PoolMargin, PoolRegistrationParams, TokenBundleItem,
    };

    const TX_ID: &str = "2f23fd8cca835af21f3ac375bac601f97ead75f2e79143bdf71fe2c4be043e8f";
    const STAKE_KEY: &str = "1b400d60aaf34eaf6dcbab9bba46001a23497886cf11066f7846933d30e5ad3f";
    const OUTPUT_ADDRESS: &str = "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8";

    fn input_operation(index: u64, value: &str) -> Operation {
        let mut op = Operation::new(index, OperationType::Input);
        op.account = Some(AccountIdentifier::new(OUTPUT_ADDRESS));
        op.amount = Some(Amount::ada(value));
        op.coin_change = Some(CoinChange::spent(format!("{TX_ID}:0")));
        op
    }

    fn output_operation(index: u64, value: &str) -> Operation {
        let mut op = Operation::new(index, OperationType::Output);
        op.account = Some(AccountIdentifier::new(OUTPUT_ADDRESS));
        op.amount = Some(Amount::ada(value));
        op
    }

    fn stake_registration_operation(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::StakeKeyRegistration);
        op.metadata = Some(OperationMetadata::with_staking_credential(
            PublicKey::edwards(STAKE_KEY),
        ));
        op
    }

    fn zero_deposits() -> DepositParameters {
        DepositParameters {
            pool_deposit: 0,
            key_deposit: 0,
        }
    }

    #[test]
    fn simple_transfer_produces_expected_fee() {
        let operations = vec![
            input_operation(0, "5000000"),
            output_operation(1, "4800000"),
        ];
        let (processed, fee) =
            process_operations(NetworkId::Mainnet, &operations, &zero_deposits()).unwrap();

        assert_eq!(fee, 200_000);
        assert_eq!(processed.transaction_inputs.len(), 1);
        assert_eq!(processed.transaction_outputs.len(), 1);
        assert!(processed.certificates.is_empty());
        assert!(processed.withdrawals.is_empty());
        assert_eq!(
            processed.addresses.iter().collect::<Vec<_>>(),
            vec![OUTPUT_ADDRESS]
        );
    }

    #[test]
    fn negative_signed_input_amounts_are_accepted() {
        let operations = vec![
            input_operation(0, "-5000000"),
            output_operation(1, "4800000"),
        ];
        let (_, fee) =
            process_operations(NetworkId::Mainnet, &operations, &zero_deposits()).unwrap();
        assert_eq!(fee, 200_000);
    }

    #[test]
    fn empty_operation_list_translates_to_empty_accumulator() {
        let (processed, fee) =
            process_operations(NetworkId::Mainnet, &[], &zero_deposits()).unwrap();
        assert_eq!(fee, 0);
        assert!(processed.transaction_inputs.is_empty());
        assert!(processed.certificates.is_empty());
        assert!(processed.withdrawals.is_empty());
    }

    #[test]
    fn input_without_coin_change_is_rejected() {
        let mut op = input_operation(0, "5000000");
        op.coin_change = None;
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert!(matches!(
            result,
            Err(ConstructionError::TransactionInputsParametersMissing(_))
        ));
    }

    #[test]
    fn output_with_negative_amount_is_rejected() {
        let operations = vec![
            input_operation(0, "5000000"),
            output_operation(1, "-4800000"),
        ];
        let result = process_operations(NetworkId::Mainnet, &operations, &zero_deposits());
        assert!(matches!(
            result,
            Err(ConstructionError::TransactionOutputsParametersMissing(_))
        ));
    }

    #[test]
    fn outputs_bigger_than_inputs_is_an_error() {
        let operations = vec![
            input_operation(0, "1000000"),
            output_operation(1, "2000000"),
        ];
        let result = process_operations(NetworkId::Mainnet, &operations, &zero_deposits());
        assert_eq!(result.err(), Some(ConstructionError::OutputsAreBiggerThanInputs));
    }

    #[test]
    fn stake_key_registration_produces_one_cert_and_no_signers() {
        let operations = vec![stake_registration_operation(0)];
        let (processed, fee) =
            process_operations(NetworkId::Mainnet, &operations, &zero_deposits()).unwrap();

        assert_eq!(fee, 0);
        assert_eq!(processed.stake_key_registrations, 1);
        assert_eq!(processed.certificates.len(), 1);
        assert!(matches!(
            processed.certificates[0],
            Certificate::StakeRegistration(_)
        ));
        assert!(processed.addresses.is_empty());
    }

    #[test]
    fn registration_deposit_reduces_fee() {
        let deposits = DepositParameters {
            pool_deposit: 0,
            key_deposit: 2_000_000,
        };
        let operations = vec![
            input_operation(0, "5000000"),
            output_operation(1, "2000000"),
            stake_registration_operation(2),
        ];
        let (_, fee) = process_operations(NetworkId::Mainnet, &operations, &deposits).unwrap();
        assert_eq!(fee, 1_000_000);
    }

    #[test]
    fn deregistration_adds_refund_and_signer() {
        let mut op = Operation::new(0, OperationType::StakeKeyDeregistration);
        op.metadata = Some(OperationMetadata::with_staking_credential(
            PublicKey::edwards(STAKE_KEY),
        ));
        let deposits = DepositParameters {
            pool_deposit: 0,
            key_deposit: 2_000_000,
        };
        let (processed, fee) =
            process_operations(NetworkId::Mainnet, &[op], &deposits).unwrap();

        assert_eq!(fee, 2_000_000);
        assert_eq!(processed.stake_key_deregistrations, 1);
        assert_eq!(processed.addresses.len(), 1);
        assert!(processed.addresses.iter().next().unwrap().starts_with("stake1"));
    }

    #[test]
    fn delegation_requires_pool_key_hash() {
        let mut op = Operation::new(0, OperationType::StakeDelegation);
        op.metadata = Some(OperationMetadata::with_staking_credential(
            PublicKey::edwards(STAKE_KEY),
        ));
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert_eq!(result.err(), Some(ConstructionError::MissingPoolKey));
    }

    #[test]
    fn withdrawal_contributes_to_fee_and_signers() {
        let mut withdrawal = Operation::new(0, OperationType::Withdrawal);
        withdrawal.amount = Some(Amount::ada("500000"));
        withdrawal.metadata = Some(OperationMetadata::with_staking_credential(
            PublicKey::edwards(STAKE_KEY),
        ));
        let operations = vec![withdrawal, output_operation(1, "500000")];
        let (processed, fee) =
            process_operations(NetworkId::Mainnet, &operations, &zero_deposits()).unwrap();

        assert_eq!(fee, 0);
        assert_eq!(processed.withdrawals.len(), 1);
        assert_eq!(processed.withdrawals[0].amount, 500_000);
        assert_eq!(processed.addresses.len(), 1);
    }

    #[test]
    fn missing_staking_key_is_reported() {
        let op = Operation::new(0, OperationType::StakeKeyRegistration);
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert_eq!(result.err(), Some(ConstructionError::MissingStakingKey));
    }

    fn token(value: &str, symbol: &str) -> Amount {
        Amount {
            value: value.to_string(),
            currency: Currency {
                symbol: symbol.to_string(),
                decimals: 0,
                metadata: None,
            },
        }
    }

    #[test]
    fn token_bundle_validation() {
        let policy = "b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a7";

        // 65 hex chars: too long
        let mut bad_name = output_operation(1, "1000000");
        bad_name.metadata = Some(OperationMetadata {
            token_bundle: Some(vec![TokenBundleItem {
                policy_id: policy.to_string(),
                tokens: vec![token("10", &"a".repeat(65))],
            }]),
            ..Default::default()
        });
        let result = process_operations(
            NetworkId::Mainnet,
            &[input_operation(0, "2000000"), bad_name],
            &zero_deposits(),
        );
        assert!(result.is_err());

        // 55-char policy id: too short
        let mut bad_policy = output_operation(1, "1000000");
        bad_policy.metadata = Some(OperationMetadata {
            token_bundle: Some(vec![TokenBundleItem {
                policy_id: policy[1..].to_string(),
                tokens: vec![token("10", "abcd")],
            }]),
            ..Default::default()
        });
        let result = process_operations(
            NetworkId::Mainnet,
            &[input_operation(0, "2000000"), bad_policy],
            &zero_deposits(),
        );
        assert!(result.is_err());

        // Duplicate asset name within one policy
        let mut duplicate = output_operation(1, "1000000");
        duplicate.metadata = Some(OperationMetadata {
            token_bundle: Some(vec![TokenBundleItem {
                policy_id: policy.to_string(),
                tokens: vec![token("10", "abcd"), token("20", "abcd")],
            }]),
            ..Default::default()
        });
        let result = process_operations(
            NetworkId::Mainnet,
            &[input_operation(0, "2000000"), duplicate],
            &zero_deposits(),
        );
        assert!(result.is_err());

        // A valid bundle with the empty-name sentinel
        let mut valid = output_operation(1, "1000000");
        valid.metadata = Some(OperationMetadata {
            token_bundle: Some(vec![TokenBundleItem {
                policy_id: policy.to_string(),
                tokens: vec![token("10", "abcd"), token("7", EMPTY_HEX)],
            }]),
            ..Default::default()
        });
        let (processed, _) = process_operations(
            NetworkId::Mainnet,
            &[input_operation(0, "2000000"), valid],
            &zero_deposits(),
        )
        .unwrap();
        assert_eq!(processed.transaction_outputs[0].value.multi_assets.len(), 1);
        assert_eq!(
            processed.transaction_outputs[0].value.multi_assets[0]
                .assets
                .len(),
            2
        );
    }

    fn pool_registration_operation(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::PoolRegistration);
        op.account = Some(AccountIdentifier::new(
            "1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5",
        ));
        op.metadata = Some(OperationMetadata {
            pool_registration_params: Some(PoolRegistrationParams {
                vrf_key_hash:
                    "8dd154228946bd12967c12bedb1cb6038b78f8b84a1760b1a788fa72a4af3db0"
                        .to_string(),
                reward_address:
                    "stake178phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gtcccycj5".to_string(),
                pledge: "5000000".to_string(),
                cost: "340000000".to_string(),
                pool_owners: vec![
                    "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw".to_string(),
                ],
                relays: vec![RelayParams {
                    relay_type: "single_host_addr".to_string(),
                    ipv4: Some("127.0.0.1".to_string()),
                    ipv6: None,
                    dns_name: None,
                    port: Some("3001".to_string()),
                }],
                margin: Some(PoolMargin {
                    numerator: "1".to_string(),
                    denominator: "100".to_string(),
                }),
                margin_percentage: None,
                pool_metadata: None,
            }),
            ..Default::default()
        });
        op
    }

    #[test]
    fn pool_registration_collects_all_signers() {
        let operations = vec![
            input_operation(0, "600000000"),
            output_operation(1, "99000000"),
            pool_registration_operation(2),
        ];
        let deposits = DepositParameters {
            pool_deposit: 500_000_000,
            key_deposit: 2_000_000,
        };
        let (processed, fee) =
            process_operations(NetworkId::Mainnet, &operations, &deposits).unwrap();

        assert_eq!(fee, 1_000_000);
        assert_eq!(processed.pool_registrations, 1);
        // owner + reward address + cold key + input address
        assert_eq!(processed.addresses.len(), 4);
        assert!(processed
            .addresses
            .contains("1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5"));
        assert!(processed
            .addresses
            .contains("stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw"));
        assert!(processed
            .addresses
            .contains("stake178phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gtcccycj5"));
    }

    #[test]
    fn pool_registration_with_zero_relays_is_rejected() {
        let mut op = pool_registration_operation(0);
        op.metadata
            .as_mut()
            .unwrap()
            .pool_registration_params
            .as_mut()
            .unwrap()
            .relays
            .clear();
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert!(matches!(result, Err(ConstructionError::InvalidPoolRelays(_))));
    }

    #[test]
    fn unknown_relay_type_is_rejected() {
        let mut op = pool_registration_operation(0);
        op.metadata
            .as_mut()
            .unwrap()
            .pool_registration_params
            .as_mut()
            .unwrap()
            .relays[0]
            .relay_type = "round_robin".to_string();
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert_eq!(result.err(), Some(ConstructionError::InvalidPoolRelayType));
    }

    #[test]
    fn relay_port_must_be_numeric() {
        let mut op = pool_registration_operation(0);
        op.metadata
            .as_mut()
            .unwrap()
            .pool_registration_params
            .as_mut()
            .unwrap()
            .relays[0]
            .port = Some("30a1".to_string());
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert!(matches!(result, Err(ConstructionError::InvalidPoolRelays(_))));
    }

    #[test]
    fn pool_retirement_needs_epoch() {
        let mut op = Operation::new(0, OperationType::PoolRetirement);
        op.account = Some(AccountIdentifier::new(
            "1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5",
        ));
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert_eq!(
            result.err(),
            Some(ConstructionError::MissingMetadataParametersForPoolRetirement)
        );
    }

    #[test]
    fn pool_registration_with_cert_round_trips_through_codec() {
        let registration = PoolRegistration {
            operator: vec![1; 28],
            vrf_key_hash: vec![2; 32],
            pledge: 1_000_000,
            cost: 340_000_000,
            margin: Ratio {
                numerator: 1,
                denominator: 10,
            },
            reward_account: stoa_common::StakeAddress::new(
                StakeCredential::AddrKeyHash(vec![3; 28]),
                stoa_common::AddressNetwork::Main,
            ),
            pool_owners: vec![vec![4; 28]],
            relays: vec![Relay::MultiHostName(MultiHostName {
                dns_name: "relays.example.com".to_string(),
            })],
            pool_metadata: None,
        };
        let cert_hex = hex::encode(stoa_codec::certificate_to_bytes(
            &Certificate::PoolRegistration(Box::new(registration)),
        ));

        let mut op = Operation::new(0, OperationType::PoolRegistrationWithCert);
        op.account = Some(AccountIdentifier::new(hex::encode(vec![1u8; 28])));
        op.metadata = Some(OperationMetadata {
            pool_registration_cert: Some(cert_hex),
            ..Default::default()
        });

        let deposits = DepositParameters {
            pool_deposit: 0,
            key_deposit: 0,
        };
        let (processed, _) =
            process_operations(NetworkId::Mainnet, &[op], &deposits).unwrap();

        assert_eq!(processed.pool_registrations, 1);
        assert_eq!(processed.certificates.len(), 1);
        // owner + reward account + cold key
        assert_eq!(processed.addresses.len(), 3);
    }

    #[test]
    fn vote_registration_builds_auxiliary_data() {
        let mut op = Operation::new(0, OperationType::VoteRegistration);
        op.metadata = Some(OperationMetadata {
            vote_registration_metadata: Some(VoteRegistrationMetadata {
                voting_key: PublicKey::edwards(
                    "0036ef3e1f0d3f5989e2d155ea54bdb2a72c4c456ccb959af4c94868f473f5a0",
                ),
                stake_key: PublicKey::edwards(STAKE_KEY),
                reward_address:
                    "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw".to_string(),
                voting_nonce: 1234,
                voting_signature: "a".repeat(SIGNATURE_HEX_LENGTH),
            }),
            ..Default::default()
        });

        let (processed, _) =
            process_operations(NetworkId::Mainnet, &[op], &zero_deposits()).unwrap();
        let aux = processed.vote_registration_metadata.unwrap();
        let decoded = stoa_codec::decode_vote_registration_aux(&aux).unwrap();
        assert_eq!(decoded.voting_nonce, 1234);
        assert!(processed.addresses.is_empty());
    }

    #[test]
    fn vote_registration_nonce_must_be_positive() {
        let mut op = Operation::new(0, OperationType::VoteRegistration);
        op.metadata = Some(OperationMetadata {
            vote_registration_metadata: Some(VoteRegistrationMetadata {
                voting_key: PublicKey::edwards(
                    "0036ef3e1f0d3f5989e2d155ea54bdb2a72c4c456ccb959af4c94868f473f5a0",
                ),
                stake_key: PublicKey::edwards(STAKE_KEY),
                reward_address:
                    "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw".to_string(),
                voting_nonce: 0,
                voting_signature: "a".repeat(SIGNATURE_HEX_LENGTH),
            }),
            ..Default::default()
        });
        let result = process_operations(NetworkId::Mainnet, &[op], &zero_deposits());
        assert_eq!(result.err(), Some(ConstructionError::VotingNonceNotValid));
    }

    #[test]
    fn related_operations_do_not_disturb_the_fold() {
        let mut input = input_operation(0, "5000000");
        input.related_operations = Some(vec![OperationIdentifier::new(9)]);
        let operations = vec![input, output_operation(1, "4800000")];
        let (_, fee) =
            process_operations(NetworkId::Mainnet, &operations, &zero_deposits()).unwrap();
        assert_eq!(fee, 200_000);
    }
}
