//! FNV-1a integrity hash over checkpoint content.
//!
//! Not cryptographic; it guards against truncation and corruption only.

use crate::types::Checkpoint;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = (hash ^ b as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

#[inline]
fn fnv1a_u64(hash: u64, v: u64) -> u64 {
    fnv1a_bytes(hash, &v.to_le_bytes())
}

/// Hash of the header and every field, in field order.
///
/// Field names and kinds are folded in, so renaming or reordering fields
/// changes the hash.
pub fn checkpoint_hash(checkpoint: &Checkpoint) -> u64 {
    let h = &checkpoint.header;
    let mut hash = FNV_OFFSET;
    hash = fnv1a_u64(hash, h.time.to_bits());
    hash = fnv1a_u64(hash, h.time_index);
    hash = fnv1a_u64(hash, h.delta_t.to_bits());
    hash = fnv1a_u64(hash, h.delta_t0.to_bits());
    hash = fnv1a_u64(hash, h.n_cells);
    hash = fnv1a_u64(hash, h.n_faces);
    for (name, record) in &checkpoint.fields {
        hash = fnv1a_bytes(hash, name.as_bytes());
        hash = fnv1a_bytes(hash, &[record.kind.tag()]);
        hash = fnv1a_u64(hash, record.data.len() as u64);
        for v in &record.data {
            hash = fnv1a_u64(hash, v.to_bits());
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckpointHeader;
    use indexmap::IndexMap;
    use vofcap_fields::{FieldKind, FieldRecord};

    fn checkpoint(values: Vec<f64>) -> Checkpoint {
        let mut fields = IndexMap::new();
        fields.insert(
            "alpha1".to_string(),
            FieldRecord {
                kind: FieldKind::VolScalar,
                data: values,
            },
        );
        Checkpoint {
            header: CheckpointHeader {
                time: 0.5,
                time_index: 5,
                delta_t: 0.1,
                delta_t0: 0.1,
                n_cells: 3,
                n_faces: 0,
            },
            fields,
        }
    }

    #[test]
    fn same_content_same_hash() {
        assert_eq!(
            checkpoint_hash(&checkpoint(vec![1.0, 2.0, 3.0])),
            checkpoint_hash(&checkpoint(vec![1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn one_bit_changes_hash() {
        let a = checkpoint(vec![1.0, 2.0, 3.0]);
        let mut b = a.clone();
        b.fields[0].data[2] = f64::from_bits(3.0f64.to_bits() ^ 1);
        assert_ne!(checkpoint_hash(&a), checkpoint_hash(&b));
        let mut c = a.clone();
        c.header.time_index = 6;
        assert_ne!(checkpoint_hash(&a), checkpoint_hash(&c));
    }
}
