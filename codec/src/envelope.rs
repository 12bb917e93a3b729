//! Extra-data envelope codec
//!
//! The wire form exchanged with Rosetta callers is a two-element CBOR
//! array `[tx_hex, extra_data]` where `extra_data` is a map of named
//! fields carrying the subset of operations whose information cannot be
//! recovered from the transaction bytes alone (spent coins and the
//! staking/pool/vote families), plus the raw vote-registration metadata
//! hex. The schema is fixed: every field written here has a reader below.

use minicbor::{Decoder, Encoder};
use stoa_common::{
    AccountIdentifier, AccountIdentifierMetadata, Amount, CoinChange, CoinIdentifier,
    ConstructionError, Currency, CurrencyMetadata, CurveType, Operation, OperationIdentifier,
    OperationMetadata, OperationType, PoolMargin, PoolMetadataParams, PoolRegistrationParams,
    PublicKey, RelayParams, SubAccountIdentifier, TokenBundleItem, TransactionExtraData,
    VoteRegistrationMetadata,
};

type EncodeError = minicbor::encode::Error<std::convert::Infallible>;
type Result2<T> = Result<T, minicbor::decode::Error>;

/// Wrap transaction hex and its extra data into the envelope, hex-encoded
///
/// Operations are filtered down to the non-recoverable subset.
pub fn encode_extra_data(tx_hex: &str, extra: &TransactionExtraData) -> String {
    let relevant: Vec<&Operation> =
        extra.operations.iter().filter(|op| op.is_extra_data_relevant()).collect();

    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    // Writing into a Vec cannot fail
    let _ = write_envelope(tx_hex, &relevant, extra.transaction_metadata_hex.as_deref(), &mut e);
    hex::encode(buf)
}

fn write_envelope(
    tx_hex: &str,
    operations: &[&Operation],
    transaction_metadata_hex: Option<&str>,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    e.array(2)?;
    e.str(tx_hex)?;

    let mut fields = 1u64;
    if transaction_metadata_hex.is_some() {
        fields += 1;
    }
    e.map(fields)?;

    e.str("operations")?;
    e.array(operations.len() as u64)?;
    for op in operations.iter().copied() {
        write_operation(op, e)?;
    }

    if let Some(metadata_hex) = transaction_metadata_hex {
        e.str("transactionMetadataHex")?;
        e.str(metadata_hex)?;
    }

    Ok(())
}

fn write_operation_identifier(
    identifier: &OperationIdentifier,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    let mut fields = 1u64;
    if identifier.network_index.is_some() {
        fields += 1;
    }
    e.map(fields)?;
    e.str("index")?;
    e.u64(identifier.index)?;
    if let Some(network_index) = identifier.network_index {
        e.str("network_index")?;
        e.u64(network_index)?;
    }
    Ok(())
}

fn write_public_key(key: &PublicKey, e: &mut Encoder<&mut Vec<u8>>) -> Result<(), EncodeError> {
    e.map(2)?;
    e.str("hex_bytes")?;
    e.str(&key.hex_bytes)?;
    e.str("curve_type")?;
    e.str(match key.curve_type {
        CurveType::Edwards25519 => "edwards25519",
        CurveType::Secp256k1 => "secp256k1",
    })?;
    Ok(())
}

fn write_amount(amount: &Amount, e: &mut Encoder<&mut Vec<u8>>) -> Result<(), EncodeError> {
    e.map(2)?;
    e.str("value")?;
    e.str(&amount.value)?;
    e.str("currency")?;

    let mut currency_fields = 2u64;
    if amount.currency.metadata.is_some() {
        currency_fields += 1;
    }
    e.map(currency_fields)?;
    e.str("symbol")?;
    e.str(&amount.currency.symbol)?;
    e.str("decimals")?;
    e.u64(amount.currency.decimals as u64)?;
    if let Some(metadata) = &amount.currency.metadata {
        e.str("metadata")?;
        let mut metadata_fields = 0u64;
        if metadata.policy_id.is_some() {
            metadata_fields += 1;
        }
        e.map(metadata_fields)?;
        if let Some(policy_id) = &metadata.policy_id {
            e.str("policyId")?;
            e.str(policy_id)?;
        }
    }
    Ok(())
}

fn write_account(
    account: &AccountIdentifier,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    let mut fields = 1u64;
    if account.sub_account.is_some() {
        fields += 1;
    }
    if account.metadata.is_some() {
        fields += 1;
    }
    e.map(fields)?;
    e.str("address")?;
    e.str(&account.address)?;
    if let Some(sub_account) = &account.sub_account {
        e.str("sub_account")?;
        e.map(1)?;
        e.str("address")?;
        e.str(&sub_account.address)?;
    }
    if let Some(metadata) = &account.metadata {
        e.str("metadata")?;
        let mut metadata_fields = 0u64;
        if metadata.chain_code.is_some() {
            metadata_fields += 1;
        }
        e.map(metadata_fields)?;
        if let Some(chain_code) = &metadata.chain_code {
            e.str("chain_code")?;
            e.str(chain_code)?;
        }
    }
    Ok(())
}

fn write_coin_change(
    coin_change: &CoinChange,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    e.map(2)?;
    e.str("coin_identifier")?;
    e.map(1)?;
    e.str("identifier")?;
    e.str(&coin_change.coin_identifier.identifier)?;
    e.str("coin_action")?;
    e.str(&coin_change.coin_action)?;
    Ok(())
}

fn write_token_bundle(
    bundle: &[TokenBundleItem],
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    e.array(bundle.len() as u64)?;
    for item in bundle {
        e.map(2)?;
        e.str("policyId")?;
        e.str(&item.policy_id)?;
        e.str("tokens")?;
        e.array(item.tokens.len() as u64)?;
        for token in &item.tokens {
            write_amount(token, e)?;
        }
    }
    Ok(())
}

fn write_relay_params(
    relay: &RelayParams,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    let mut fields = 1u64;
    for present in [
        relay.ipv4.is_some(),
        relay.ipv6.is_some(),
        relay.dns_name.is_some(),
        relay.port.is_some(),
    ] {
        if present {
            fields += 1;
        }
    }
    e.map(fields)?;
    e.str("type")?;
    e.str(&relay.relay_type)?;
    if let Some(ipv4) = &relay.ipv4 {
        e.str("ipv4")?;
        e.str(ipv4)?;
    }
    if let Some(ipv6) = &relay.ipv6 {
        e.str("ipv6")?;
        e.str(ipv6)?;
    }
    if let Some(dns_name) = &relay.dns_name {
        e.str("dnsName")?;
        e.str(dns_name)?;
    }
    if let Some(port) = &relay.port {
        e.str("port")?;
        e.str(port)?;
    }
    Ok(())
}

fn write_pool_registration_params(
    params: &PoolRegistrationParams,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    let mut fields = 6u64;
    if params.margin.is_some() {
        fields += 1;
    }
    if params.margin_percentage.is_some() {
        fields += 1;
    }
    if params.pool_metadata.is_some() {
        fields += 1;
    }
    e.map(fields)?;

    e.str("vrfKeyHash")?;
    e.str(&params.vrf_key_hash)?;
    e.str("rewardAddress")?;
    e.str(&params.reward_address)?;
    e.str("pledge")?;
    e.str(&params.pledge)?;
    e.str("cost")?;
    e.str(&params.cost)?;

    e.str("poolOwners")?;
    e.array(params.pool_owners.len() as u64)?;
    for owner in &params.pool_owners {
        e.str(owner)?;
    }

    e.str("relays")?;
    e.array(params.relays.len() as u64)?;
    for relay in &params.relays {
        write_relay_params(relay, e)?;
    }

    if let Some(margin) = &params.margin {
        e.str("margin")?;
        e.map(2)?;
        e.str("numerator")?;
        e.str(&margin.numerator)?;
        e.str("denominator")?;
        e.str(&margin.denominator)?;
    }
    if let Some(margin_percentage) = &params.margin_percentage {
        e.str("margin_percentage")?;
        e.str(margin_percentage)?;
    }
    if let Some(pool_metadata) = &params.pool_metadata {
        e.str("poolMetadata")?;
        e.map(2)?;
        e.str("url")?;
        e.str(&pool_metadata.url)?;
        e.str("hash")?;
        e.str(&pool_metadata.hash)?;
    }
    Ok(())
}

fn write_vote_registration_metadata(
    metadata: &VoteRegistrationMetadata,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    e.map(5)?;
    e.str("rewardAddress")?;
    e.str(&metadata.reward_address)?;
    e.str("stakeKey")?;
    write_public_key(&metadata.stake_key, e)?;
    e.str("votingKey")?;
    write_public_key(&metadata.voting_key, e)?;
    e.str("votingNonce")?;
    e.u64(metadata.voting_nonce)?;
    e.str("votingSignature")?;
    e.str(&metadata.voting_signature)?;
    Ok(())
}

fn write_operation_metadata(
    metadata: &OperationMetadata,
    e: &mut Encoder<&mut Vec<u8>>,
) -> Result<(), EncodeError> {
    let mut fields = 0u64;
    for present in [
        metadata.withdrawal_amount.is_some(),
        metadata.deposit_amount.is_some(),
        metadata.refund_amount.is_some(),
        metadata.staking_credential.is_some(),
        metadata.pool_key_hash.is_some(),
        metadata.epoch.is_some(),
        metadata.token_bundle.is_some(),
        metadata.pool_registration_cert.is_some(),
        metadata.pool_registration_params.is_some(),
        metadata.vote_registration_metadata.is_some(),
    ] {
        if present {
            fields += 1;
        }
    }
    e.map(fields)?;

    if let Some(amount) = &metadata.withdrawal_amount {
        e.str("withdrawal_amount")?;
        write_amount(amount, e)?;
    }
    if let Some(amount) = &metadata.deposit_amount {
        e.str("deposit_amount")?;
        write_amount(amount, e)?;
    }
    if let Some(amount) = &metadata.refund_amount {
        e.str("refund_amount")?;
        write_amount(amount, e)?;
    }
    if let Some(credential) = &metadata.staking_credential {
        e.str("staking_credential")?;
        write_public_key(credential, e)?;
    }
    if let Some(pool_key_hash) = &metadata.pool_key_hash {
        e.str("pool_key_hash")?;
        e.str(pool_key_hash)?;
    }
    if let Some(epoch) = metadata.epoch {
        e.str("epoch")?;
        e.u64(epoch)?;
    }
    if let Some(bundle) = &metadata.token_bundle {
        e.str("tokenBundle")?;
        write_token_bundle(bundle, e)?;
    }
    if let Some(cert) = &metadata.pool_registration_cert {
        e.str("poolRegistrationCert")?;
        e.str(cert)?;
    }
    if let Some(params) = &metadata.pool_registration_params {
        e.str("poolRegistrationParams")?;
        write_pool_registration_params(params, e)?;
    }
    if let Some(vote) = &metadata.vote_registration_metadata {
        e.str("voteRegistrationMetadata")?;
        write_vote_registration_metadata(vote, e)?;
    }
    Ok(())
}

fn write_operation(op: &Operation, e: &mut Encoder<&mut Vec<u8>>) -> Result<(), EncodeError> {
    let mut fields = 2u64; // operation_identifier + type
    if op.related_operations.is_some() {
        fields += 1;
    }
    if !op.status.is_empty() {
        fields += 1;
    }
    if op.account.is_some() {
        fields += 1;
    }
    if op.amount.is_some() {
        fields += 1;
    }
    if op.coin_change.is_some() {
        fields += 1;
    }
    if op.metadata.is_some() {
        fields += 1;
    }
    e.map(fields)?;

    e.str("operation_identifier")?;
    write_operation_identifier(&op.operation_identifier, e)?;

    if let Some(related) = &op.related_operations {
        e.str("related_operations")?;
        e.array(related.len() as u64)?;
        for identifier in related {
            write_operation_identifier(identifier, e)?;
        }
    }

    e.str("type")?;
    e.str(op.operation_type.as_tag())?;

    if !op.status.is_empty() {
        e.str("status")?;
        e.str(&op.status)?;
    }
    if let Some(account) = &op.account {
        e.str("account")?;
        write_account(account, e)?;
    }
    if let Some(amount) = &op.amount {
        e.str("amount")?;
        write_amount(amount, e)?;
    }
    if let Some(coin_change) = &op.coin_change {
        e.str("coin_change")?;
        write_coin_change(coin_change, e)?;
    }
    if let Some(metadata) = &op.metadata {
        e.str("metadata")?;
        write_operation_metadata(metadata, e)?;
    }
    Ok(())
}

// --- Readers ---

fn read_map(d: &mut Decoder, what: &str) -> Result2<u64> {
    crate::util::expect_map(d, what)
}

fn read_array(d: &mut Decoder, what: &str) -> Result2<u64> {
    crate::util::expect_any_array(d, what)
}

fn read_operation_identifier(d: &mut Decoder) -> Result2<OperationIdentifier> {
    let fields = read_map(d, "operation identifier")?;
    let mut identifier = OperationIdentifier::default();
    for _ in 0..fields {
        match d.str()? {
            "index" => identifier.index = d.u64()?,
            "network_index" => identifier.network_index = Some(d.u64()?),
            _ => d.skip()?,
        }
    }
    Ok(identifier)
}

fn read_public_key(d: &mut Decoder) -> Result2<PublicKey> {
    let fields = read_map(d, "public key")?;
    let mut hex_bytes = String::new();
    let mut curve_type = CurveType::Edwards25519;
    for _ in 0..fields {
        match d.str()? {
            "hex_bytes" => hex_bytes = d.str()?.to_string(),
            "curve_type" => {
                curve_type = match d.str()? {
                    "secp256k1" => CurveType::Secp256k1,
                    _ => CurveType::Edwards25519,
                }
            }
            _ => d.skip()?,
        }
    }
    Ok(PublicKey {
        hex_bytes,
        curve_type,
    })
}

fn read_currency_metadata(d: &mut Decoder) -> Result2<CurrencyMetadata> {
    let fields = read_map(d, "currency metadata")?;
    let mut metadata = CurrencyMetadata::default();
    for _ in 0..fields {
        match d.str()? {
            "policyId" => metadata.policy_id = Some(d.str()?.to_string()),
            _ => d.skip()?,
        }
    }
    Ok(metadata)
}

fn read_amount(d: &mut Decoder) -> Result2<Amount> {
    let fields = read_map(d, "amount")?;
    let mut value = String::new();
    let mut currency = Currency::ada();
    for _ in 0..fields {
        match d.str()? {
            "value" => value = d.str()?.to_string(),
            "currency" => {
                let currency_fields = read_map(d, "currency")?;
                let mut symbol = String::new();
                let mut decimals = 0u32;
                let mut metadata = None;
                for _ in 0..currency_fields {
                    match d.str()? {
                        "symbol" => symbol = d.str()?.to_string(),
                        "decimals" => decimals = d.u64()? as u32,
                        "metadata" => metadata = Some(read_currency_metadata(d)?),
                        _ => d.skip()?,
                    }
                }
                currency = Currency {
                    symbol,
                    decimals,
                    metadata,
                };
            }
            _ => d.skip()?,
        }
    }
    Ok(Amount { value, currency })
}

fn read_account(d: &mut Decoder) -> Result2<AccountIdentifier> {
    let fields = read_map(d, "account")?;
    let mut account = AccountIdentifier::default();
    for _ in 0..fields {
        match d.str()? {
            "address" => account.address = d.str()?.to_string(),
            "sub_account" => {
                let sub_fields = read_map(d, "sub account")?;
                let mut sub_account = SubAccountIdentifier::default();
                for _ in 0..sub_fields {
                    match d.str()? {
                        "address" => sub_account.address = d.str()?.to_string(),
                        _ => d.skip()?,
                    }
                }
                account.sub_account = Some(sub_account);
            }
            "metadata" => {
                let metadata_fields = read_map(d, "account metadata")?;
                let mut metadata = AccountIdentifierMetadata::default();
                for _ in 0..metadata_fields {
                    match d.str()? {
                        "chain_code" => metadata.chain_code = Some(d.str()?.to_string()),
                        _ => d.skip()?,
                    }
                }
                account.metadata = Some(metadata);
            }
            _ => d.skip()?,
        }
    }
    Ok(account)
}

fn read_coin_change(d: &mut Decoder) -> Result2<CoinChange> {
    let fields = read_map(d, "coin change")?;
    let mut identifier = CoinIdentifier::default();
    let mut coin_action = String::new();
    for _ in 0..fields {
        match d.str()? {
            "coin_identifier" => {
                let id_fields = read_map(d, "coin identifier")?;
                for _ in 0..id_fields {
                    match d.str()? {
                        "identifier" => identifier.identifier = d.str()?.to_string(),
                        _ => d.skip()?,
                    }
                }
            }
            "coin_action" => coin_action = d.str()?.to_string(),
            _ => d.skip()?,
        }
    }
    Ok(CoinChange {
        coin_identifier: identifier,
        coin_action,
    })
}

fn read_token_bundle(d: &mut Decoder) -> Result2<Vec<TokenBundleItem>> {
    let count = read_array(d, "token bundle")?;
    let mut bundle = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let fields = read_map(d, "token bundle item")?;
        let mut item = TokenBundleItem::default();
        for _ in 0..fields {
            match d.str()? {
                "policyId" => item.policy_id = d.str()?.to_string(),
                "tokens" => {
                    let token_count = read_array(d, "tokens")?;
                    for _ in 0..token_count {
                        item.tokens.push(read_amount(d)?);
                    }
                }
                _ => d.skip()?,
            }
        }
        bundle.push(item);
    }
    Ok(bundle)
}

fn read_relay_params(d: &mut Decoder) -> Result2<RelayParams> {
    let fields = read_map(d, "relay")?;
    let mut relay = RelayParams::default();
    for _ in 0..fields {
        match d.str()? {
            "type" => relay.relay_type = d.str()?.to_string(),
            "ipv4" => relay.ipv4 = Some(d.str()?.to_string()),
            "ipv6" => relay.ipv6 = Some(d.str()?.to_string()),
            "dnsName" => relay.dns_name = Some(d.str()?.to_string()),
            "port" => relay.port = Some(d.str()?.to_string()),
            _ => d.skip()?,
        }
    }
    Ok(relay)
}

fn read_pool_registration_params(d: &mut Decoder) -> Result2<PoolRegistrationParams> {
    let fields = read_map(d, "pool registration params")?;
    let mut params = PoolRegistrationParams::default();
    for _ in 0..fields {
        match d.str()? {
            "vrfKeyHash" => params.vrf_key_hash = d.str()?.to_string(),
            "rewardAddress" => params.reward_address = d.str()?.to_string(),
            "pledge" => params.pledge = d.str()?.to_string(),
            "cost" => params.cost = d.str()?.to_string(),
            "poolOwners" => {
                let count = read_array(d, "pool owners")?;
                for _ in 0..count {
                    params.pool_owners.push(d.str()?.to_string());
                }
            }
            "relays" => {
                let count = read_array(d, "relays")?;
                for _ in 0..count {
                    params.relays.push(read_relay_params(d)?);
                }
            }
            "margin" => {
                let margin_fields = read_map(d, "margin")?;
                let mut margin = PoolMargin::default();
                for _ in 0..margin_fields {
                    match d.str()? {
                        "numerator" => margin.numerator = d.str()?.to_string(),
                        "denominator" => margin.denominator = d.str()?.to_string(),
                        _ => d.skip()?,
                    }
                }
                params.margin = Some(margin);
            }
            "margin_percentage" => params.margin_percentage = Some(d.str()?.to_string()),
            "poolMetadata" => {
                let metadata_fields = read_map(d, "pool metadata")?;
                let mut metadata = PoolMetadataParams::default();
                for _ in 0..metadata_fields {
                    match d.str()? {
                        "url" => metadata.url = d.str()?.to_string(),
                        "hash" => metadata.hash = d.str()?.to_string(),
                        _ => d.skip()?,
                    }
                }
                params.pool_metadata = Some(metadata);
            }
            _ => d.skip()?,
        }
    }
    Ok(params)
}

fn read_vote_registration_metadata(d: &mut Decoder) -> Result2<VoteRegistrationMetadata> {
    let fields = read_map(d, "vote registration metadata")?;
    let mut reward_address = String::new();
    let mut stake_key = PublicKey::edwards("");
    let mut voting_key = PublicKey::edwards("");
    let mut voting_nonce = 0u64;
    let mut voting_signature = String::new();
    for _ in 0..fields {
        match d.str()? {
            "rewardAddress" => reward_address = d.str()?.to_string(),
            "stakeKey" => stake_key = read_public_key(d)?,
            "votingKey" => voting_key = read_public_key(d)?,
            "votingNonce" => voting_nonce = d.u64()?,
            "votingSignature" => voting_signature = d.str()?.to_string(),
            _ => d.skip()?,
        }
    }
    Ok(VoteRegistrationMetadata {
        voting_key,
        stake_key,
        reward_address,
        voting_nonce,
        voting_signature,
    })
}

fn read_operation_metadata(d: &mut Decoder) -> Result2<OperationMetadata> {
    let fields = read_map(d, "operation metadata")?;
    let mut metadata = OperationMetadata::default();
    for _ in 0..fields {
        match d.str()? {
            "withdrawal_amount" => metadata.withdrawal_amount = Some(read_amount(d)?),
            "deposit_amount" => metadata.deposit_amount = Some(read_amount(d)?),
            "refund_amount" => metadata.refund_amount = Some(read_amount(d)?),
            "staking_credential" => metadata.staking_credential = Some(read_public_key(d)?),
            "pool_key_hash" => metadata.pool_key_hash = Some(d.str()?.to_string()),
            "epoch" => metadata.epoch = Some(d.u64()?),
            "tokenBundle" => metadata.token_bundle = Some(read_token_bundle(d)?),
            "poolRegistrationCert" => {
                metadata.pool_registration_cert = Some(d.str()?.to_string())
            }
            "poolRegistrationParams" => {
                metadata.pool_registration_params = Some(read_pool_registration_params(d)?)
            }
            "voteRegistrationMetadata" => {
                metadata.vote_registration_metadata = Some(read_vote_registration_metadata(d)?)
            }
            _ => d.skip()?,
        }
    }
    Ok(metadata)
}

fn read_operation(d: &mut Decoder) -> Result2<Operation> {
    let fields = read_map(d, "operation")?;
    let mut identifier = OperationIdentifier::default();
    let mut related_operations = None;
    let mut operation_type = None;
    let mut status = String::new();
    let mut account = None;
    let mut amount = None;
    let mut coin_change = None;
    let mut metadata = None;

    for _ in 0..fields {
        match d.str()? {
            "operation_identifier" => identifier = read_operation_identifier(d)?,
            "related_operations" => {
                let count = read_array(d, "related operations")?;
                let mut related = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    related.push(read_operation_identifier(d)?);
                }
                related_operations = Some(related);
            }
            "type" => {
                let tag = d.str()?;
                operation_type = Some(OperationType::from_tag(tag).map_err(|_| {
                    minicbor::decode::Error::message(format!("unknown operation type {tag}"))
                })?);
            }
            "status" => status = d.str()?.to_string(),
            "account" => account = Some(read_account(d)?),
            "amount" => amount = Some(read_amount(d)?),
            "coin_change" => coin_change = Some(read_coin_change(d)?),
            "metadata" => metadata = Some(read_operation_metadata(d)?),
            _ => d.skip()?,
        }
    }

    let operation_type = operation_type
        .ok_or_else(|| minicbor::decode::Error::message("operation missing type"))?;

    Ok(Operation {
        operation_identifier: identifier,
        related_operations,
        operation_type,
        status,
        account,
        amount,
        coin_change,
        metadata,
    })
}

/// Unwrap the envelope back into transaction hex and extra data
pub fn decode_extra_data(
    envelope_hex: &str,
) -> Result<(String, TransactionExtraData), ConstructionError> {
    let bytes = hex::decode(envelope_hex)
        .map_err(|e| ConstructionError::MalformedEnvelope(e.to_string()))?;

    decode_envelope(&bytes).map_err(|e| ConstructionError::MalformedEnvelope(e.to_string()))
}

fn decode_envelope(bytes: &[u8]) -> Result2<(String, TransactionExtraData)> {
    let mut d = Decoder::new(bytes);
    let elements = read_array(&mut d, "envelope")?;
    if elements != 2 {
        return Err(minicbor::decode::Error::message(format!(
            "envelope: expected 2 elements, got {elements}"
        )));
    }

    let tx_hex = d.str()?.to_string();
    let mut extra = TransactionExtraData::default();

    let fields = read_map(&mut d, "extra data")?;
    for _ in 0..fields {
        match d.str()? {
            "operations" => {
                let count = read_array(&mut d, "operations")?;
                for _ in 0..count {
                    extra.operations.push(read_operation(&mut d)?);
                }
            }
            "transactionMetadataHex" => {
                extra.transaction_metadata_hex = Some(d.str()?.to_string())
            }
            _ => d.skip()?,
        }
    }

    Ok((tx_hex, extra))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spent_input(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::Input);
        op.account = Some(AccountIdentifier::new(
            "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8",
        ));
        op.amount = Some(Amount::ada("-5000000"));
        op.coin_change = Some(CoinChange::spent(
            "2f23fd8cca835af21f3ac375bac601f97ead75f2e79143bdf71fe2c4be043e8f:0",
        ));
        op
    }

    fn stake_registration(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::StakeKeyRegistration);
        op.metadata = Some(OperationMetadata::with_staking_credential(
            PublicKey::edwards(
                "1b400d60aaf34eaf6dcbab9bba46001a23497886cf11066f7846933d30e5ad3f",
            ),
        ));
        op
    }

    fn delegation(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::StakeDelegation);
        let mut metadata = OperationMetadata::with_staking_credential(PublicKey::edwards(
            "1b400d60aaf34eaf6dcbab9bba46001a23497886cf11066f7846933d30e5ad3f",
        ));
        metadata.pool_key_hash =
            Some("1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5".to_string());
        op.metadata = Some(metadata);
        op
    }

    fn pool_registration(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::PoolRegistration);
        op.account = Some(AccountIdentifier::new(
            "1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5",
        ));
        let mut metadata = OperationMetadata::default();
        metadata.pool_registration_params = Some(PoolRegistrationParams {
            vrf_key_hash:
                "8dd154228946bd12967c12bedb1cb6038b78f8b84a1760b1a788fa72a4af3db0".to_string(),
            reward_address: "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw"
                .to_string(),
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
                denominator: "1".to_string(),
            }),
            margin_percentage: None,
            pool_metadata: Some(PoolMetadataParams {
                url: "https://example.com/pool.json".to_string(),
                hash: "11111111111111111111111111111111".to_string(),
            }),
        });
        op.metadata = Some(metadata);
        op
    }

    fn vote_registration(index: u64) -> Operation {
        let mut op = Operation::new(index, OperationType::VoteRegistration);
        let mut metadata = OperationMetadata::default();
        metadata.vote_registration_metadata = Some(VoteRegistrationMetadata {
            voting_key: PublicKey::edwards(
                "0036ef3e1f0d3f5989e2d155ea54bdb2a72c4c456ccb959af4c94868f473f5a0",
            ),
            stake_key: PublicKey::edwards(
                "86870efc99c453a873a16492ce87738ec79a0ebd064379a62e2c9cf4e119219e",
            ),
            reward_address: "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw"
                .to_string(),
            voting_nonce: 1234,
            voting_signature: "f75f7a54a79352f9d0e2c4d4e98d54bd15e2c4fd9be2c4d4e98d54bd15e2c4fdf75f7a54a79352f9d0e2c4d4e98d54bd15e2c4fd9be2c4d4e98d54bd15e2c4fd".to_string(),
        });
        op.metadata = Some(metadata);
        op
    }

    #[test]
    fn envelope_round_trips_every_nested_shape() {
        let mut withdrawal = Operation::new(5, OperationType::Withdrawal);
        withdrawal.account = Some(AccountIdentifier {
            address: "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw".to_string(),
            sub_account: Some(SubAccountIdentifier {
                address: "sub".to_string(),
            }),
            metadata: Some(AccountIdentifierMetadata {
                chain_code: Some("0011".to_string()),
            }),
        });
        withdrawal.amount = Some(Amount::ada("1000000"));
        withdrawal.metadata = Some(OperationMetadata::with_staking_credential(
            PublicKey::edwards(
                "1b400d60aaf34eaf6dcbab9bba46001a23497886cf11066f7846933d30e5ad3f",
            ),
        ));
        withdrawal.related_operations = Some(vec![OperationIdentifier::new(0)]);

        let extra = TransactionExtraData {
            operations: vec![
                spent_input(0),
                stake_registration(2),
                delegation(3),
                pool_registration(4),
                withdrawal,
                vote_registration(6),
            ],
            transaction_metadata_hex: Some("82a219ef64a40158200036ef".to_string()),
        };

        let envelope = encode_extra_data("deadbeef", &extra);
        let (tx_hex, decoded) = decode_extra_data(&envelope).unwrap();

        assert_eq!(tx_hex, "deadbeef");
        assert_eq!(decoded, extra);
    }

    #[test]
    fn recoverable_operations_are_filtered_out() {
        let mut output = Operation::new(1, OperationType::Output);
        output.account = Some(AccountIdentifier::new(
            "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8",
        ));
        output.amount = Some(Amount::ada("4800000"));

        let extra = TransactionExtraData {
            operations: vec![spent_input(0), output],
            transaction_metadata_hex: None,
        };

        let envelope = encode_extra_data("00", &extra);
        let (_, decoded) = decode_extra_data(&envelope).unwrap();

        assert_eq!(decoded.operations.len(), 1);
        assert_eq!(decoded.operations[0].operation_type, OperationType::Input);
    }

    #[test]
    fn token_bundles_survive_the_envelope() {
        let mut input = spent_input(0);
        let mut metadata = OperationMetadata::default();
        metadata.token_bundle = Some(vec![TokenBundleItem {
            policy_id: "b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a7".to_string(),
            tokens: vec![Amount::token(
                "10",
                "76657273652d746f6b656e",
                Some("b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a7".to_string()),
            )],
        }]);
        input.metadata = Some(metadata);

        let extra = TransactionExtraData {
            operations: vec![input],
            transaction_metadata_hex: None,
        };

        let envelope = encode_extra_data("00", &extra);
        let (_, decoded) = decode_extra_data(&envelope).unwrap();
        assert_eq!(decoded, extra);
    }

    #[test]
    fn garbage_envelope_is_rejected() {
        assert!(matches!(
            decode_extra_data("zz"),
            Err(ConstructionError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode_extra_data("00"),
            Err(ConstructionError::MalformedEnvelope(_))
        ));
    }
}
