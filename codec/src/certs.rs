//! Certificate CBOR codec, per the ledger CDDL for the Shelley-era
//! certificate group

use crate::util::{expect_any_array, expect_array, nullable_bytes, nullable_u64};
use minicbor::data::{Tag, Type};
use minicbor::{Decoder, Encoder};
use stoa_common::{
    Certificate, MultiHostName, PoolMetadata, PoolRegistration, PoolRetirement, Ratio, Relay,
    SingleHostAddr, SingleHostName, StakeAddress, StakeCredential, StakeDelegation,
};
use std::net::{Ipv4Addr, Ipv6Addr};

fn encode_stake_credential<W: minicbor::encode::Write>(
    credential: &StakeCredential,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(2)?;
    match credential {
        StakeCredential::AddrKeyHash(hash) => {
            e.u8(0)?;
            e.bytes(hash)?;
        }
        StakeCredential::ScriptHash(hash) => {
            e.u8(1)?;
            e.bytes(hash)?;
        }
    }
    Ok(())
}

fn decode_stake_credential(d: &mut Decoder) -> Result<StakeCredential, minicbor::decode::Error> {
    expect_array(d, 2, "stake credential")?;
    let kind = d.u32()?;
    let hash = d.bytes()?.to_vec();
    match kind {
        0 => Ok(StakeCredential::AddrKeyHash(hash)),
        1 => Ok(StakeCredential::ScriptHash(hash)),
        n => Err(minicbor::decode::Error::message(format!(
            "unknown stake credential kind {n}"
        ))),
    }
}

fn encode_relay<W: minicbor::encode::Write>(
    relay: &Relay,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    match relay {
        Relay::SingleHostAddr(host) => {
            e.array(4)?;
            e.u8(0)?;
            match host.port {
                Some(port) => e.u64(port as u64)?,
                None => e.null()?,
            };
            match &host.ipv4 {
                Some(ipv4) => e.bytes(&ipv4.octets())?,
                None => e.null()?,
            };
            match &host.ipv6 {
                Some(ipv6) => e.bytes(&ipv6.octets())?,
                None => e.null()?,
            };
        }
        Relay::SingleHostName(host) => {
            e.array(3)?;
            e.u8(1)?;
            match host.port {
                Some(port) => e.u64(port as u64)?,
                None => e.null()?,
            };
            e.str(&host.dns_name)?;
        }
        Relay::MultiHostName(host) => {
            e.array(2)?;
            e.u8(2)?;
            e.str(&host.dns_name)?;
        }
    }
    Ok(())
}

fn decode_relay(d: &mut Decoder) -> Result<Relay, minicbor::decode::Error> {
    expect_any_array(d, "relay")?;
    let kind = d.u32()?;
    match kind {
        0 => {
            let port = nullable_u64(d)?.map(|p| p as u16);
            let ipv4 = match nullable_bytes(d)? {
                Some(bytes) => Some(
                    <[u8; 4]>::try_from(bytes.as_slice())
                        .map(Ipv4Addr::from)
                        .map_err(|_| minicbor::decode::Error::message("bad ipv4 length"))?,
                ),
                None => None,
            };
            let ipv6 = match nullable_bytes(d)? {
                Some(bytes) => Some(
                    <[u8; 16]>::try_from(bytes.as_slice())
                        .map(Ipv6Addr::from)
                        .map_err(|_| minicbor::decode::Error::message("bad ipv6 length"))?,
                ),
                None => None,
            };
            Ok(Relay::SingleHostAddr(SingleHostAddr { port, ipv4, ipv6 }))
        }
        1 => {
            let port = nullable_u64(d)?.map(|p| p as u16);
            let dns_name = d.str()?.to_string();
            Ok(Relay::SingleHostName(SingleHostName { port, dns_name }))
        }
        2 => {
            let dns_name = d.str()?.to_string();
            Ok(Relay::MultiHostName(MultiHostName { dns_name }))
        }
        n => Err(minicbor::decode::Error::message(format!(
            "unknown relay kind {n}"
        ))),
    }
}

/// Encode a certificate into the given encoder
pub fn encode_certificate<W: minicbor::encode::Write>(
    cert: &Certificate,
    e: &mut Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    match cert {
        Certificate::StakeRegistration(credential) => {
            e.array(2)?;
            e.u8(0)?;
            encode_stake_credential(credential, e)?;
        }
        Certificate::StakeDeregistration(credential) => {
            e.array(2)?;
            e.u8(1)?;
            encode_stake_credential(credential, e)?;
        }
        Certificate::StakeDelegation(delegation) => {
            e.array(3)?;
            e.u8(2)?;
            encode_stake_credential(&delegation.credential, e)?;
            e.bytes(&delegation.operator)?;
        }
        Certificate::PoolRegistration(reg) => {
            e.array(10)?;
            e.u8(3)?;
            e.bytes(&reg.operator)?;
            e.bytes(&reg.vrf_key_hash)?;
            e.u64(reg.pledge)?;
            e.u64(reg.cost)?;
            e.tag(Tag::new(30))?;
            e.array(2)?;
            e.u64(reg.margin.numerator)?;
            e.u64(reg.margin.denominator)?;
            e.bytes(&reg.reward_account.to_binary())?;
            e.array(reg.pool_owners.len() as u64)?;
            for owner in &reg.pool_owners {
                e.bytes(owner)?;
            }
            e.array(reg.relays.len() as u64)?;
            for relay in &reg.relays {
                encode_relay(relay, e)?;
            }
            match &reg.pool_metadata {
                Some(metadata) => {
                    e.array(2)?;
                    e.str(&metadata.url)?;
                    e.bytes(&metadata.hash)?;
                }
                None => {
                    e.null()?;
                }
            }
        }
        Certificate::PoolRetirement(retirement) => {
            e.array(3)?;
            e.u8(4)?;
            e.bytes(&retirement.operator)?;
            e.u64(retirement.epoch)?;
        }
    }
    Ok(())
}

/// Decode one certificate from the given decoder
pub fn decode_certificate(d: &mut Decoder) -> Result<Certificate, minicbor::decode::Error> {
    expect_any_array(d, "certificate")?;
    let kind = d.u32()?;
    match kind {
        0 => Ok(Certificate::StakeRegistration(decode_stake_credential(d)?)),
        1 => Ok(Certificate::StakeDeregistration(decode_stake_credential(
            d,
        )?)),
        2 => Ok(Certificate::StakeDelegation(StakeDelegation {
            credential: decode_stake_credential(d)?,
            operator: d.bytes()?.to_vec(),
        })),
        3 => {
            let operator = d.bytes()?.to_vec();
            let vrf_key_hash = d.bytes()?.to_vec();
            let pledge = d.u64()?;
            let cost = d.u64()?;
            let tag = d.tag()?;
            if tag.as_u64() != 30 {
                return Err(minicbor::decode::Error::message(format!(
                    "pool margin: expected tag 30, got {}",
                    tag.as_u64()
                )));
            }
            expect_array(d, 2, "pool margin")?;
            let margin = Ratio {
                numerator: d.u64()?,
                denominator: d.u64()?,
            };
            let reward_account = StakeAddress::from_binary(d.bytes()?)
                .map_err(|e| minicbor::decode::Error::message(format!("reward account: {e}")))?;
            let owner_count = expect_any_array(d, "pool owners")?;
            let mut pool_owners = Vec::with_capacity(owner_count as usize);
            for _ in 0..owner_count {
                pool_owners.push(d.bytes()?.to_vec());
            }
            let relay_count = expect_any_array(d, "pool relays")?;
            let mut relays = Vec::with_capacity(relay_count as usize);
            for _ in 0..relay_count {
                relays.push(decode_relay(d)?);
            }
            let pool_metadata = if d.datatype()? == Type::Null {
                d.skip()?;
                None
            } else {
                expect_array(d, 2, "pool metadata")?;
                Some(PoolMetadata {
                    url: d.str()?.to_string(),
                    hash: d.bytes()?.to_vec(),
                })
            };
            Ok(Certificate::PoolRegistration(Box::new(PoolRegistration {
                operator,
                vrf_key_hash,
                pledge,
                cost,
                margin,
                reward_account,
                pool_owners,
                relays,
                pool_metadata,
            })))
        }
        4 => Ok(Certificate::PoolRetirement(PoolRetirement {
            operator: d.bytes()?.to_vec(),
            epoch: d.u64()?,
        })),
        n => Err(minicbor::decode::Error::message(format!(
            "unknown certificate kind {n}"
        ))),
    }
}

/// Encode a single certificate to bytes
pub fn certificate_to_bytes(cert: &Certificate) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    // Writing into a Vec cannot fail
    let _ = encode_certificate(cert, &mut e);
    buf
}

/// Decode a single certificate from bytes
pub fn certificate_from_bytes(bytes: &[u8]) -> Result<Certificate, minicbor::decode::Error> {
    let mut d = Decoder::new(bytes);
    decode_certificate(&mut d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoa_common::AddressNetwork;

    fn round_trip(cert: &Certificate) -> Certificate {
        let bytes = certificate_to_bytes(cert);
        certificate_from_bytes(&bytes).unwrap()
    }

    fn key_hash(fill: u8) -> Vec<u8> {
        vec![fill; 28]
    }

    #[test]
    fn stake_registration_round_trip() {
        let cert = Certificate::StakeRegistration(StakeCredential::AddrKeyHash(key_hash(1)));
        assert_eq!(round_trip(&cert), cert);
    }

    #[test]
    fn stake_delegation_round_trip() {
        let cert = Certificate::StakeDelegation(StakeDelegation {
            credential: StakeCredential::ScriptHash(key_hash(2)),
            operator: key_hash(3),
        });
        assert_eq!(round_trip(&cert), cert);
    }

    #[test]
    fn pool_registration_round_trip() {
        let cert = Certificate::PoolRegistration(Box::new(PoolRegistration {
            operator: key_hash(4),
            vrf_key_hash: vec![5; 32],
            pledge: 100_000_000,
            cost: 340_000_000,
            margin: Ratio {
                numerator: 3,
                denominator: 100,
            },
            reward_account: StakeAddress::new(
                StakeCredential::AddrKeyHash(key_hash(6)),
                AddressNetwork::Main,
            ),
            pool_owners: vec![key_hash(7), key_hash(8)],
            relays: vec![
                Relay::SingleHostAddr(SingleHostAddr {
                    port: Some(3001),
                    ipv4: Some(Ipv4Addr::new(127, 0, 0, 1)),
                    ipv6: None,
                }),
                Relay::SingleHostName(SingleHostName {
                    port: None,
                    dns_name: "relay.example.com".to_string(),
                }),
                Relay::MultiHostName(MultiHostName {
                    dns_name: "relays.example.com".to_string(),
                }),
            ],
            pool_metadata: Some(PoolMetadata {
                url: "https://example.com/pool.json".to_string(),
                hash: vec![9; 32],
            }),
        }));
        assert_eq!(round_trip(&cert), cert);
    }

    #[test]
    fn pool_registration_without_metadata_round_trip() {
        let cert = Certificate::PoolRegistration(Box::new(PoolRegistration {
            operator: key_hash(1),
            vrf_key_hash: vec![2; 32],
            pledge: 0,
            cost: 0,
            margin: Ratio {
                numerator: 0,
                denominator: 1,
            },
            reward_account: StakeAddress::new(
                StakeCredential::AddrKeyHash(key_hash(3)),
                AddressNetwork::Test,
            ),
            pool_owners: vec![],
            relays: vec![],
            pool_metadata: None,
        }));
        assert_eq!(round_trip(&cert), cert);
    }

    #[test]
    fn pool_retirement_round_trip() {
        let cert = Certificate::PoolRetirement(PoolRetirement {
            operator: key_hash(9),
            epoch: 250,
        });
        assert_eq!(round_trip(&cert), cert);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(certificate_from_bytes(&[0xff, 0x00]).is_err());
        // An array with an unknown certificate kind
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        e.array(2).unwrap();
        e.u8(9).unwrap();
        e.u8(0).unwrap();
        assert!(certificate_from_bytes(&buf).is_err());
    }
}
