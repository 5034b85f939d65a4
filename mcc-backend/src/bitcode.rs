//! Binary module artifact
//!
//! Layout: the magic `MCBC`, a little-endian `u32` format version, then the
//! bincode encoding of the module.

use log::debug;
use mcc_frontend::ir::Module;
use std::fs;
use std::path::Path;
use crate::error::BitcodeError;

pub const MAGIC: &[u8; 4] = b"MCBC";
pub const VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

pub fn write_bitcode(module: &Module) -> Result<Vec<u8>, BitcodeError> {
    let payload = bincode::serialize(module)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn read_bitcode(bytes: &[u8]) -> Result<Module, BitcodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(BitcodeError::Truncated { len: bytes.len() });
    }
    if &bytes[..4] != MAGIC {
        return Err(BitcodeError::BadMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(BitcodeError::UnsupportedVersion {
            found: version,
            expected: VERSION,
        });
    }
    Ok(bincode::deserialize(&bytes[HEADER_LEN..])?)
}

pub fn write_bitcode_to_file(module: &Module, path: impl AsRef<Path>) -> Result<(), BitcodeError> {
    let path = path.as_ref();
    let bytes = write_bitcode(module)?;
    fs::write(path, &bytes)?;
    debug!("Wrote {} byte(s) of bitcode to {}", bytes.len(), path.display());
    Ok(())
}

pub fn read_bitcode_file(path: impl AsRef<Path>) -> Result<Module, BitcodeError> {
    let bytes = fs::read(path)?;
    read_bitcode(&bytes)
}
