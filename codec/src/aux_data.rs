//! CIP-15 vote-registration auxiliary data codec
//!
//! The registration lives under metadata label 61284, its signature under
//! 61285; the whole block is wrapped as `[metadata, []]` and its
//! Blake2b-256 hash goes into the transaction body.

use crate::util::{expect_any_array, expect_map};
use minicbor::{Decoder, Encoder};
use stoa_common::crypto::hash_256;
use stoa_common::ConstructionError;

/// Metadata label of the registration data map
pub const CATALYST_LABEL_DATA: u64 = 61284;

/// Metadata label of the registration signature map
pub const CATALYST_LABEL_SIG: u64 = 61285;

const INDEX_VOTING_KEY: u8 = 1;
const INDEX_STAKE_KEY: u8 = 2;
const INDEX_REWARD_ADDRESS: u8 = 3;
const INDEX_VOTING_NONCE: u8 = 4;
const INDEX_VOTING_SIGNATURE: u8 = 1;

/// Validated, byte-level vote registration content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRegistrationData {
    /// Catalyst voting key
    pub voting_key: Vec<u8>,

    /// Staking public key
    pub stake_key: Vec<u8>,

    /// Reward address bytes (29-byte stake address form)
    pub reward_address: Vec<u8>,

    /// Nonce, must be positive
    pub voting_nonce: u64,

    /// Registration signature
    pub voting_signature: Vec<u8>,
}

/// Build the auxiliary data block `[{61284: .., 61285: ..}, []]`
pub fn encode_vote_registration_aux(data: &VoteRegistrationData) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    // Writing into a Vec cannot fail
    let _ = encode_inner(data, &mut e);
    buf
}

fn encode_inner<W: minicbor::encode::Write>(
    data: &VoteRegistrationData,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(2)?;
    e.map(2)?;

    e.u64(CATALYST_LABEL_DATA)?;
    e.map(4)?;
    e.u8(INDEX_VOTING_KEY)?;
    e.bytes(&data.voting_key)?;
    e.u8(INDEX_STAKE_KEY)?;
    e.bytes(&data.stake_key)?;
    e.u8(INDEX_REWARD_ADDRESS)?;
    e.bytes(&data.reward_address)?;
    e.u8(INDEX_VOTING_NONCE)?;
    e.u64(data.voting_nonce)?;

    e.u64(CATALYST_LABEL_SIG)?;
    e.map(1)?;
    e.u8(INDEX_VOTING_SIGNATURE)?;
    e.bytes(&data.voting_signature)?;

    // No auxiliary scripts
    e.array(0)?;
    Ok(())
}

/// Hash of an auxiliary data block, for the body's auxiliary-data-hash field
pub fn aux_data_hash(aux_bytes: &[u8]) -> Vec<u8> {
    hash_256(aux_bytes)
}

/// Parse a vote registration back out of auxiliary data bytes
pub fn decode_vote_registration_aux(
    bytes: &[u8],
) -> Result<VoteRegistrationData, ConstructionError> {
    decode_inner(bytes).map_err(|e| match e {
        DecodeFailure::MissingData => ConstructionError::MissingVoteRegistrationMetadata,
        DecodeFailure::MissingSignature => ConstructionError::InvalidVotingSignature,
        DecodeFailure::Cbor(message) => {
            tracing::error!("Invalid vote registration metadata: {message}");
            ConstructionError::MissingVoteRegistrationMetadata
        }
    })
}

enum DecodeFailure {
    MissingData,
    MissingSignature,
    Cbor(String),
}

impl From<minicbor::decode::Error> for DecodeFailure {
    fn from(e: minicbor::decode::Error) -> Self {
        DecodeFailure::Cbor(e.to_string())
    }
}

fn decode_inner(bytes: &[u8]) -> Result<VoteRegistrationData, DecodeFailure> {
    let mut d = Decoder::new(bytes);
    expect_any_array(&mut d, "auxiliary data")?;
    let labels = expect_map(&mut d, "metadata")?;

    let mut voting_key = None;
    let mut stake_key = None;
    let mut reward_address = None;
    let mut voting_nonce = None;
    let mut voting_signature = None;
    let mut saw_data = false;
    let mut saw_sig = false;

    for _ in 0..labels {
        let label = d.u64()?;
        match label {
            CATALYST_LABEL_DATA => {
                saw_data = true;
                let entries = expect_map(&mut d, "registration data")?;
                for _ in 0..entries {
                    let index = d.u32()?;
                    match index as u8 {
                        INDEX_VOTING_KEY => voting_key = Some(d.bytes()?.to_vec()),
                        INDEX_STAKE_KEY => stake_key = Some(d.bytes()?.to_vec()),
                        INDEX_REWARD_ADDRESS => reward_address = Some(d.bytes()?.to_vec()),
                        INDEX_VOTING_NONCE => voting_nonce = Some(d.u64()?),
                        _ => d.skip()?,
                    }
                }
            }
            CATALYST_LABEL_SIG => {
                saw_sig = true;
                let entries = expect_map(&mut d, "registration signature")?;
                for _ in 0..entries {
                    let index = d.u32()?;
                    if index as u8 == INDEX_VOTING_SIGNATURE {
                        voting_signature = Some(d.bytes()?.to_vec());
                    } else {
                        d.skip()?;
                    }
                }
            }
            _ => d.skip()?,
        }
    }

    if !saw_data {
        return Err(DecodeFailure::MissingData);
    }
    if !saw_sig {
        return Err(DecodeFailure::MissingSignature);
    }

    match (
        voting_key,
        stake_key,
        reward_address,
        voting_nonce,
        voting_signature,
    ) {
        (
            Some(voting_key),
            Some(stake_key),
            Some(reward_address),
            Some(voting_nonce),
            Some(voting_signature),
        ) => Ok(VoteRegistrationData {
            voting_key,
            stake_key,
            reward_address,
            voting_nonce,
            voting_signature,
        }),
        (None, ..) => Err(DecodeFailure::MissingData),
        (_, None, ..) => Err(DecodeFailure::MissingData),
        (_, _, None, ..) => Err(DecodeFailure::MissingData),
        (_, _, _, None, _) => Err(DecodeFailure::MissingData),
        (_, _, _, _, None) => Err(DecodeFailure::MissingSignature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VoteRegistrationData {
        VoteRegistrationData {
            voting_key: vec![1; 32],
            stake_key: vec![2; 32],
            reward_address: vec![0xe1]
                .into_iter()
                .chain(std::iter::repeat(3).take(28))
                .collect(),
            voting_nonce: 1234,
            voting_signature: vec![4; 64],
        }
    }

    #[test]
    fn aux_data_round_trip() {
        let data = sample();
        let bytes = encode_vote_registration_aux(&data);
        let decoded = decode_vote_registration_aux(&bytes).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn aux_data_hash_is_32_bytes_and_stable() {
        let bytes = encode_vote_registration_aux(&sample());
        let hash = aux_data_hash(&bytes);
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, aux_data_hash(&bytes));
    }

    #[test]
    fn missing_signature_map_is_rejected() {
        // [{61284: {}}, []]
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        e.array(2).unwrap();
        e.map(1).unwrap();
        e.u64(CATALYST_LABEL_DATA).unwrap();
        e.map(0).unwrap();
        e.array(0).unwrap();

        assert_eq!(
            decode_vote_registration_aux(&buf),
            Err(ConstructionError::InvalidVotingSignature)
        );
    }

    #[test]
    fn missing_data_map_is_rejected() {
        // [{}, []]
        let buf = vec![0x82, 0xa0, 0x80];
        assert_eq!(
            decode_vote_registration_aux(&buf),
            Err(ConstructionError::MissingVoteRegistrationMetadata)
        );
    }
}
