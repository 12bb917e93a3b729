//! Fee computation
//!
//! The fee of a constructed transaction is whatever the declared amounts
//! leave over:
//!
//! `fee = inputs + withdrawals + key refunds - outputs - key deposits - pool deposits`
//!
//! Input amounts arrive as Rosetta signed decimals and are folded by
//! absolute value. A negative balance is an economic invariant violation
//! and aborts the request.

use stoa_common::{ConstructionError, ProtocolParameters};

/// Deposit and refund totals implied by the certificates of a request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DepositSums {
    /// Refunds from stake key deregistrations
    pub key_refunds: u64,

    /// Deposits for stake key registrations
    pub key_deposits: u64,

    /// Deposits for pool registrations
    pub pool_deposits: u64,
}

/// Compute the fee left over by the declared amounts
pub fn calculate_fee(
    input_amounts: &[i128],
    output_amounts: &[u64],
    withdrawal_amounts: &[u64],
    deposits: &DepositSums,
) -> Result<u64, ConstructionError> {
    let inputs_sum: i128 = input_amounts.iter().map(|amount| amount.abs()).sum();
    let outputs_sum: i128 = output_amounts.iter().map(|amount| *amount as i128).sum();
    let withdrawals_sum: i128 = withdrawal_amounts.iter().map(|amount| *amount as i128).sum();

    let fee = inputs_sum + withdrawals_sum + deposits.key_refunds as i128
        - outputs_sum
        - deposits.key_deposits as i128
        - deposits.pool_deposits as i128;

    if fee < 0 {
        return Err(ConstructionError::OutputsAreBiggerThanInputs);
    }
    Ok(fee as u64)
}

/// Linear minimum fee for a transaction of the given size
pub fn calculate_min_fee(transaction_size: u64, parameters: &ProtocolParameters) -> u64 {
    parameters.min_fee_coefficient * transaction_size + parameters.min_fee_constant
}

/// Serialized length of a CBOR unsigned integer
fn cbor_uint_length(value: u64) -> u64 {
    match value {
        0..=23 => 1,
        24..=0xff => 2,
        0x100..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Adjust a transaction size estimated with one ttl to another ttl
///
/// Used by the metadata step: the preprocess estimate is made with the
/// ttl-0 sentinel, and only the width of the ttl integer changes once the
/// real value is known.
pub fn updated_tx_size(previous_size: u64, previous_ttl: u64, updated_ttl: u64) -> u64 {
    previous_size + cbor_uint_length(updated_ttl) - cbor_uint_length(previous_ttl)
}
