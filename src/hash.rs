use std::io::Read;
use std::path::Path;

use crate::error::{MergeError, Result};

/// 64-bit FNV-1a. The digest format (16 lowercase hex chars, big-endian
/// nibble order) is part of the external interface: any two implementations
/// must agree byte-for-byte on identical inputs.
const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Read buffer for streaming hashes.
const HASH_BUF_SIZE: usize = 4096;

fn fold(state: u64, bytes: &[u8]) -> u64 {
    let mut state = state;
    for &byte in bytes {
        state ^= byte as u64;
        state = state.wrapping_mul(FNV_PRIME);
    }
    state
}

fn to_hex(state: u64) -> String {
    format!("{state:016x}")
}

/// Stream-hash a file through a fixed 4 KiB buffer.
/// Never truncates: a short read mid-file is an error, not a partial digest.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| MergeError::io(path, e))?;
    let mut buf = [0u8; HASH_BUF_SIZE];
    let mut state = FNV_OFFSET_BASIS;

    loop {
        let n = file.read(&mut buf).map_err(|e| MergeError::io(path, e))?;
        if n == 0 {
            break;
        }
        state = fold(state, &buf[..n]);
    }

    Ok(to_hex(state))
}

/// Hash an in-memory buffer with the same digest format as `hash_file`.
pub fn hash_bytes(data: &[u8]) -> String {
    to_hex(fold(FNV_OFFSET_BASIS, data))
}
