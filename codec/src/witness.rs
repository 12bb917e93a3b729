//! Witness set CBOR codec
//!
//! Key 0 carries vkey witnesses, key 2 bootstrap (Byron) witnesses; each
//! group is only present when non-empty.

use crate::util::{expect_any_array, expect_array, expect_map};
use minicbor::{Decoder, Encoder};
use stoa_common::{BootstrapWitness, VkeyWitness, WitnessSet};

/// Encode a witness set into the given encoder
pub fn encode_witness_set<W: minicbor::encode::Write>(
    witnesses: &WitnessSet,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    let mut groups = 0u64;
    if !witnesses.vkey_witnesses.is_empty() {
        groups += 1;
    }
    if !witnesses.bootstrap_witnesses.is_empty() {
        groups += 1;
    }
    e.map(groups)?;

    if !witnesses.vkey_witnesses.is_empty() {
        e.u8(0)?;
        e.array(witnesses.vkey_witnesses.len() as u64)?;
        for witness in &witnesses.vkey_witnesses {
            e.array(2)?;
            e.bytes(&witness.vkey)?;
            e.bytes(&witness.signature)?;
        }
    }

    if !witnesses.bootstrap_witnesses.is_empty() {
        e.u8(2)?;
        e.array(witnesses.bootstrap_witnesses.len() as u64)?;
        for witness in &witnesses.bootstrap_witnesses {
            e.array(4)?;
            e.bytes(&witness.vkey)?;
            e.bytes(&witness.signature)?;
            e.bytes(&witness.chain_code)?;
            e.bytes(&witness.attributes)?;
        }
    }

    Ok(())
}

/// Decode a witness set from the given decoder
///
/// Unknown witness groups (native scripts etc.) are skipped.
pub fn decode_witness_set(d: &mut Decoder) -> Result<WitnessSet, minicbor::decode::Error> {
    let groups = expect_map(d, "witness set")?;
    let mut witnesses = WitnessSet::default();

    for _ in 0..groups {
        let key = d.u32()?;
        match key {
            0 => {
                let count = expect_any_array(d, "vkey witnesses")?;
                for _ in 0..count {
                    expect_array(d, 2, "vkey witness")?;
                    witnesses.vkey_witnesses.push(VkeyWitness {
                        vkey: d.bytes()?.to_vec(),
                        signature: d.bytes()?.to_vec(),
                    });
                }
            }
            2 => {
                let count = expect_any_array(d, "bootstrap witnesses")?;
                for _ in 0..count {
                    expect_array(d, 4, "bootstrap witness")?;
                    witnesses.bootstrap_witnesses.push(BootstrapWitness {
                        vkey: d.bytes()?.to_vec(),
                        signature: d.bytes()?.to_vec(),
                        chain_code: d.bytes()?.to_vec(),
                        attributes: d.bytes()?.to_vec(),
                    });
                }
            }
            _ => {
                d.skip()?;
            }
        }
    }

    Ok(witnesses)
}
