//! Transaction body and full transaction CBOR codec
//!
//! The body is a CDDL map: 0 inputs, 1 outputs, 2 fee, 3 ttl, 4
//! certificates, 5 withdrawals, 7 auxiliary data hash. The ttl field is
//! always written, even when 0, to keep size estimates stable between the
//! estimation and the real-ttl pass.

use crate::certs::{decode_certificate, encode_certificate};
use crate::util::{expect_any_array, expect_map, nullable_u64};
use crate::witness::{decode_witness_set, encode_witness_set};
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};
use stoa_common::crypto::hash_256;
use stoa_common::{
    PolicyAssets, StakeAddress, TransactionBody, TransactionInput, TransactionOutput, Value,
    Withdrawal, WitnessSet,
};

fn encode_value<W: minicbor::encode::Write>(
    value: &Value,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    if value.multi_assets.is_empty() {
        e.u64(value.coin)?;
        return Ok(());
    }

    e.array(2)?;
    e.u64(value.coin)?;
    e.map(value.multi_assets.len() as u64)?;
    for policy in &value.multi_assets {
        e.bytes(&policy.policy_id)?;
        e.map(policy.assets.len() as u64)?;
        for (name, quantity) in &policy.assets {
            e.bytes(name)?;
            e.u64(*quantity)?;
        }
    }
    Ok(())
}

fn decode_value(d: &mut Decoder) -> Result<Value, minicbor::decode::Error> {
    if d.datatype()? != Type::Array {
        return Ok(Value::coin_only(d.u64()?));
    }

    expect_any_array(d, "output value")?;
    let coin = d.u64()?;
    let policy_count = expect_map(d, "multi assets")?;
    let mut multi_assets = Vec::with_capacity(policy_count as usize);
    for _ in 0..policy_count {
        let policy_id = d.bytes()?.to_vec();
        let asset_count = expect_map(d, "policy assets")?;
        let mut assets = Vec::with_capacity(asset_count as usize);
        for _ in 0..asset_count {
            let name = d.bytes()?.to_vec();
            let quantity = d.u64()?;
            assets.push((name, quantity));
        }
        multi_assets.push(PolicyAssets { policy_id, assets });
    }
    Ok(Value { coin, multi_assets })
}

/// Serialize a transaction body to CBOR
pub fn encode_transaction_body(body: &TransactionBody) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    // Writing into a Vec cannot fail
    let _ = encode_body_inner(body, &mut e);
    buf
}

fn encode_body_inner<W: minicbor::encode::Write>(
    body: &TransactionBody,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    let mut fields = 4u64;
    if !body.certificates.is_empty() {
        fields += 1;
    }
    if !body.withdrawals.is_empty() {
        fields += 1;
    }
    if body.auxiliary_data_hash.is_some() {
        fields += 1;
    }
    e.map(fields)?;

    e.u8(0)?;
    e.array(body.inputs.len() as u64)?;
    for input in &body.inputs {
        e.array(2)?;
        e.bytes(&input.transaction_id)?;
        e.u64(input.index)?;
    }

    e.u8(1)?;
    e.array(body.outputs.len() as u64)?;
    for output in &body.outputs {
        e.array(2)?;
        e.bytes(&output.address)?;
        encode_value(&output.value, e)?;
    }

    e.u8(2)?;
    e.u64(body.fee)?;

    e.u8(3)?;
    e.u64(body.ttl)?;

    if !body.certificates.is_empty() {
        e.u8(4)?;
        e.array(body.certificates.len() as u64)?;
        for cert in &body.certificates {
            encode_certificate(cert, e)?;
        }
    }

    if !body.withdrawals.is_empty() {
        e.u8(5)?;
        e.map(body.withdrawals.len() as u64)?;
        for withdrawal in &body.withdrawals {
            e.bytes(&withdrawal.address.to_binary())?;
            e.u64(withdrawal.amount)?;
        }
    }

    if let Some(hash) = &body.auxiliary_data_hash {
        e.u8(7)?;
        e.bytes(hash)?;
    }

    Ok(())
}

/// Decode a transaction body from the given decoder
///
/// Unknown body fields are skipped.
pub fn decode_transaction_body(d: &mut Decoder) -> Result<TransactionBody, minicbor::decode::Error> {
    let fields = expect_map(d, "transaction body")?;
    let mut body = TransactionBody::default();

    for _ in 0..fields {
        let key = d.u32()?;
        match key {
            0 => {
                let count = expect_any_array(d, "inputs")?;
                for _ in 0..count {
                    expect_any_array(d, "input")?;
                    body.inputs.push(TransactionInput {
                        transaction_id: d.bytes()?.to_vec(),
                        index: d.u64()?,
                    });
                }
            }
            1 => {
                let count = expect_any_array(d, "outputs")?;
                for _ in 0..count {
                    let elements = expect_any_array(d, "output")?;
                    let address = d.bytes()?.to_vec();
                    let value = decode_value(d)?;
                    // Skip datum fields of later-era outputs
                    for _ in 2..elements {
                        d.skip()?;
                    }
                    body.outputs.push(TransactionOutput { address, value });
                }
            }
            2 => body.fee = d.u64()?,
            3 => body.ttl = nullable_u64(d)?.unwrap_or(0),
            4 => {
                let count = expect_any_array(d, "certificates")?;
                for _ in 0..count {
                    body.certificates.push(decode_certificate(d)?);
                }
            }
            5 => {
                let count = expect_map(d, "withdrawals")?;
                for _ in 0..count {
                    let address = StakeAddress::from_binary(d.bytes()?).map_err(|e| {
                        minicbor::decode::Error::message(format!("withdrawal address: {e}"))
                    })?;
                    let amount = d.u64()?;
                    body.withdrawals.push(Withdrawal { address, amount });
                }
            }
            7 => body.auxiliary_data_hash = Some(d.bytes()?.to_vec()),
            _ => {
                d.skip()?;
            }
        }
    }

    Ok(body)
}

/// Decode a transaction body from raw bytes
pub fn decode_transaction_body_bytes(
    bytes: &[u8],
) -> Result<TransactionBody, minicbor::decode::Error> {
    let mut d = Decoder::new(bytes);
    decode_transaction_body(&mut d)
}

/// Hash serialized body bytes into the signing payload / transaction id
pub fn body_hash(body_bytes: &[u8]) -> Vec<u8> {
    hash_256(body_bytes)
}

/// Assemble a full transaction from already-serialized parts
///
/// The layout is `[body, witness_set, true, auxiliary_data / null]`; the
/// body and auxiliary data are spliced in verbatim so signing payloads stay
/// byte-identical.
pub fn encode_transaction(
    body_bytes: &[u8],
    witnesses: &WitnessSet,
    aux_data: Option<&[u8]>,
) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut e = Encoder::new(&mut buf);
        let _ = e.array(4);
    }
    buf.extend_from_slice(body_bytes);
    {
        let mut e = Encoder::new(&mut buf);
        let _ = encode_witness_set(witnesses, &mut e);
        let _ = e.bool(true);
        if aux_data.is_none() {
            let _ = e.null();
        }
    }
    if let Some(aux) = aux_data {
        buf.extend_from_slice(aux);
    }
    buf
}

/// A decoded transaction, keeping the raw body bytes for stable hashing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    /// Parsed body
    pub body: TransactionBody,

    /// Body bytes exactly as they appeared on the wire
    pub body_bytes: Vec<u8>,

    /// Witness set
    pub witnesses: WitnessSet,

    /// Raw auxiliary data bytes, if any
    pub auxiliary_data: Option<Vec<u8>>,
}

/// Decode a signed transaction (3- or 4-element array)
pub fn decode_transaction(bytes: &[u8]) -> Result<DecodedTransaction, minicbor::decode::Error> {
    let mut d = Decoder::new(bytes);
    let elements = expect_any_array(&mut d, "transaction")?;
    if elements < 3 || elements > 4 {
        return Err(minicbor::decode::Error::message(format!(
            "transaction: expected 3 or 4 elements, got {elements}"
        )));
    }

    let body_start = d.position();
    let body = decode_transaction_body(&mut d)?;
    let body_bytes = bytes[body_start..d.position()].to_vec();

    let witnesses = decode_witness_set(&mut d)?;

    if elements == 4 {
        // Alonzo-era validity flag
        d.bool()?;
    }

    let auxiliary_data = if d.datatype()? == Type::Null {
        d.skip()?;
        None
    } else {
        let aux_start = d.position();
        d.skip()?;
        Some(bytes[aux_start..d.position()].to_vec())
    };

    Ok(DecodedTransaction {
        body,
        body_bytes,
        witnesses,
        auxiliary_data,
    })
}
