//! Bytecode file format.
//!
//! Serialises a [`Program`] to a binary format that can be reloaded without
//! re-lowering. The payload is bincode; a trailing SHA-256 digest guards the
//! whole payload, and a failed check is the unrecoverable bytecode-corruption
//! condition (the loader refuses the file, it never reaches the interpreter).
//!
//! # File Format
//!
//! ```text
//! +---------------------+
//! | Magic (4 bytes)     |  "SJCB"
//! +---------------------+
//! | Version (4 bytes)   |  u32 little-endian format version
//! +---------------------+
//! | Length (8 bytes)    |  u64 little-endian payload length
//! +---------------------+
//! | Payload (N bytes)   |  bincode-serialized Program
//! +---------------------+
//! | Digest (32 bytes)   |  SHA-256 over the payload
//! +---------------------+
//! ```
//!
//! Programs reference registered types by name, so the embedder must have
//! performed the same type registrations before loading a saved program.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::ir::Program;

/// Magic bytes identifying a core bytecode file.
pub const MAGIC: &[u8; 4] = b"SJCB";

/// Current bytecode format version.
pub const VERSION: u32 = 1;

/// Bytecode format error.
#[derive(Debug)]
pub enum BytecodeError {
    /// I/O error during file operations
    IoError(std::io::Error),
    /// Invalid magic bytes - not a valid bytecode file
    InvalidMagic,
    /// Unsupported format version
    UnsupportedVersion(u32),
    /// Truncated file
    UnexpectedEof,
    /// Payload digest does not match - the file is corrupt
    ChecksumMismatch,
    /// Deserialization error
    DeserializeError(String),
    /// Serialization error
    SerializeError(String),
}

impl std::fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BytecodeError::IoError(e) => write!(f, "I/O error: {}", e),
            BytecodeError::InvalidMagic => {
                write!(f, "Invalid magic bytes - not a valid bytecode file")
            }
            BytecodeError::UnsupportedVersion(v) => {
                write!(
                    f,
                    "Unsupported bytecode version: {} (current: {})",
                    v, VERSION
                )
            }
            BytecodeError::UnexpectedEof => write!(f, "Truncated bytecode file"),
            BytecodeError::ChecksumMismatch => {
                write!(f, "Bytecode payload digest mismatch - file is corrupt")
            }
            BytecodeError::DeserializeError(e) => write!(f, "Failed to deserialize: {}", e),
            BytecodeError::SerializeError(e) => write!(f, "Failed to serialize: {}", e),
        }
    }
}

impl std::error::Error for BytecodeError {}

impl From<std::io::Error> for BytecodeError {
    fn from(e: std::io::Error) -> Self {
        BytecodeError::IoError(e)
    }
}

/// Encode a program to the binary container format.
pub fn encode(program: &Program) -> Result<Vec<u8>, BytecodeError> {
    let payload =
        bincode::serialize(program).map_err(|e| BytecodeError::SerializeError(e.to_string()))?;
    let mut out = Vec::with_capacity(16 + payload.len() + 32);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&payload);
    let digest = Sha256::digest(&payload);
    out.extend_from_slice(&digest);
    Ok(out)
}

/// Decode a program from the binary container format, verifying magic,
/// version, and payload digest.
pub fn decode(bytes: &[u8]) -> Result<Program, BytecodeError> {
    if bytes.len() < 16 {
        return Err(BytecodeError::UnexpectedEof);
    }
    if &bytes[0..4] != MAGIC {
        return Err(BytecodeError::InvalidMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }
    let len = u64::from_le_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]) as usize;
    let payload_end = 16usize.checked_add(len).ok_or(BytecodeError::UnexpectedEof)?;
    if bytes.len() < payload_end + 32 {
        return Err(BytecodeError::UnexpectedEof);
    }
    let payload = &bytes[16..payload_end];
    let stored_digest = &bytes[payload_end..payload_end + 32];
    let digest = Sha256::digest(payload);
    if digest.as_slice() != stored_digest {
        return Err(BytecodeError::ChecksumMismatch);
    }
    bincode::deserialize(payload).map_err(|e| BytecodeError::DeserializeError(e.to_string()))
}

/// Save a program to a bytecode file.
pub fn save(program: &Program, path: impl AsRef<Path>) -> Result<(), BytecodeError> {
    let bytes = encode(program)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

/// Load a program from a bytecode file.
pub fn load(path: impl AsRef<Path>) -> Result<Program, BytecodeError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instr, ProgramBuilder};
    use crate::vm::value::Value;

    fn sample_program() -> Program {
        let mut pb = ProgramBuilder::new();
        let k = pb.constant(Value::I64(7));
        pb.entry(vec![Instr::LoadConst(k), Instr::Return]);
        pb.finish()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let program = sample_program();
        let bytes = encode(&program).expect("encode");
        let back = decode(&bytes).expect("decode");
        assert_eq!(program, back);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = encode(&sample_program()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(BytecodeError::InvalidMagic)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = encode(&sample_program()).unwrap();
        bytes[4] = 0xFF;
        assert!(matches!(
            decode(&bytes),
            Err(BytecodeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_flipped_payload_bit_detected_by_checksum() {
        let mut bytes = encode(&sample_program()).unwrap();
        // Flip one bit inside the payload region
        let idx = 20.min(bytes.len() - 33);
        bytes[idx] ^= 0x01;
        assert!(matches!(
            decode(&bytes),
            Err(BytecodeError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let bytes = encode(&sample_program()).unwrap();
        let truncated = &bytes[..bytes.len() - 5];
        assert!(matches!(
            decode(truncated),
            Err(BytecodeError::UnexpectedEof)
        ));
    }
}
