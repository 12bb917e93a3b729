//! Shared decoding helpers for the CBOR codecs

use minicbor::data::Type;
use minicbor::decode::Error;
use minicbor::Decoder;

/// Expect a definite-length array of exactly `len` elements
pub fn expect_array(d: &mut Decoder, len: u64, what: &str) -> Result<(), Error> {
    match d.array()? {
        Some(actual) if actual == len => Ok(()),
        Some(actual) => Err(Error::message(format!(
            "{what}: expected array of {len}, got {actual}"
        ))),
        None => Err(Error::message(format!(
            "{what}: indefinite arrays not supported"
        ))),
    }
}

/// Expect a definite-length array of any size, returning it
pub fn expect_any_array(d: &mut Decoder, what: &str) -> Result<u64, Error> {
    match d.array()? {
        Some(len) => Ok(len),
        None => Err(Error::message(format!(
            "{what}: indefinite arrays not supported"
        ))),
    }
}

/// Expect a definite-length map of any size, returning it
pub fn expect_map(d: &mut Decoder, what: &str) -> Result<u64, Error> {
    match d.map()? {
        Some(len) => Ok(len),
        None => Err(Error::message(format!(
            "{what}: indefinite maps not supported"
        ))),
    }
}

/// Read a nullable unsigned integer
pub fn nullable_u64(d: &mut Decoder) -> Result<Option<u64>, Error> {
    if d.datatype()? == Type::Null {
        d.skip()?;
        Ok(None)
    } else {
        Ok(Some(d.u64()?))
    }
}

/// Read a nullable byte string
pub fn nullable_bytes(d: &mut Decoder) -> Result<Option<Vec<u8>>, Error> {
    if d.datatype()? == Type::Null {
        d.skip()?;
        Ok(None)
    } else {
        Ok(Some(d.bytes()?.to_vec()))
    }
}
