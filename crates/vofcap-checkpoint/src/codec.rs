//! Binary encode/decode for the checkpoint format.
//!
//! All integers and floats are little-endian. Strings and arrays are
//! length-prefixed with a `u32` (names) or `u64` (field data) count.

use std::io::{Read, Write};

use indexmap::IndexMap;
use vofcap_fields::{FieldKind, FieldRecord};

use crate::error::CheckpointError;
use crate::hash::checkpoint_hash;
use crate::types::{Checkpoint, CheckpointHeader};
use crate::{FORMAT_VERSION, MAGIC};

/// Upper bound on a decoded length, guarding allocations on corrupt data.
const MAX_LEN: u64 = 1 << 32;

// ── Primitives ──────────────────────────────────────────────────

fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), CheckpointError> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), CheckpointError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), CheckpointError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), CheckpointError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8(r: &mut dyn Read) -> Result<u8, CheckpointError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, CheckpointError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64_le(r: &mut dyn Read) -> Result<u64, CheckpointError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, CheckpointError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_len(r: &mut dyn Read, what: &str) -> Result<usize, CheckpointError> {
    let len = read_u64_le(r)?;
    if len > MAX_LEN {
        return Err(CheckpointError::Malformed {
            detail: format!("{what} length {len} exceeds limit"),
        });
    }
    Ok(len as usize)
}

// ── Checkpoint encode/decode ────────────────────────────────────

/// Encode `checkpoint`, including its integrity hash.
pub fn encode(w: &mut dyn Write, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;

    let h = &checkpoint.header;
    write_f64_le(w, h.time)?;
    write_u64_le(w, h.time_index)?;
    write_f64_le(w, h.delta_t)?;
    write_f64_le(w, h.delta_t0)?;
    write_u64_le(w, h.n_cells)?;
    write_u64_le(w, h.n_faces)?;

    write_u32_le(w, checkpoint.fields.len() as u32)?;
    for (name, record) in &checkpoint.fields {
        write_u32_le(w, name.len() as u32)?;
        w.write_all(name.as_bytes())?;
        write_u8(w, record.kind.tag())?;
        write_u64_le(w, record.data.len() as u64)?;
        for v in &record.data {
            write_f64_le(w, *v)?;
        }
    }

    write_u64_le(w, checkpoint_hash(checkpoint))?;
    Ok(())
}

/// Decode and verify a checkpoint.
pub fn decode(r: &mut dyn Read) -> Result<Checkpoint, CheckpointError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CheckpointError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(CheckpointError::UnsupportedVersion { found: version });
    }

    let header = CheckpointHeader {
        time: read_f64_le(r)?,
        time_index: read_u64_le(r)?,
        delta_t: read_f64_le(r)?,
        delta_t0: read_f64_le(r)?,
        n_cells: read_u64_le(r)?,
        n_faces: read_u64_le(r)?,
    };

    let count = read_u32_le(r)? as usize;
    let mut fields = IndexMap::with_capacity(count);
    for _ in 0..count {
        let name_len = read_u32_le(r)? as usize;
        let mut name = vec![0u8; name_len];
        r.read_exact(&mut name)?;
        let name = String::from_utf8(name).map_err(|e| CheckpointError::Malformed {
            detail: format!("invalid UTF-8 field name: {e}"),
        })?;
        let tag = read_u8(r)?;
        let kind = FieldKind::from_tag(tag).ok_or_else(|| CheckpointError::Malformed {
            detail: format!("unknown kind tag {tag} for field '{name}'"),
        })?;
        let len = read_len(r, "field data")?;
        let mut data = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            data.push(read_f64_le(r)?);
        }
        if fields.insert(name.clone(), FieldRecord { kind, data }).is_some() {
            return Err(CheckpointError::Malformed {
                detail: format!("duplicate field '{name}'"),
            });
        }
    }

    let checkpoint = Checkpoint { header, fields };
    let recorded = read_u64_le(r)?;
    let computed = checkpoint_hash(&checkpoint);
    if recorded != computed {
        return Err(CheckpointError::HashMismatch { recorded, computed });
    }
    Ok(checkpoint)
}
