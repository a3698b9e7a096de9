//! Whole-structure transforms between the serialized and deserialized representations.
//!
//! Leaves are copied one by one in declaration order, so byte order flips, bit packing and
//! alignment padding are all handled by the per-leaf read and write of each side.

use crate::access::{DataRepresentation, StructAccess};
use crate::codec::{Codec, CodecError, Decoder};
use crate::walk;
use std::sync::Arc;

/// Copy every leaf of `source` into the leaf with the same full name in `destination`.
///
/// Returns the number of leaves copied. The destination placement is the one fixed when it
/// was bound, so its dynamic array sizes must already match the source.
pub fn transform(source: &Decoder<'_>, destination: &mut Codec<'_>) -> Result<usize, CodecError> {
    let mut copied = 0usize;
    for leaf in source.leaf_elements() {
        let value = leaf.get_variant_value()?;
        destination
            .element_mut(leaf.full_name())
            .map_err(|_| CodecError::NotFound(format!("destination element '{}'", leaf.full_name())))?
            .set_variant_value(value)?;
        copied += 1;
    }
    log::debug!(
        "[transform] {} leaf(s) {:?} -> {:?}",
        copied,
        source.representation(),
        destination.representation()
    );
    Ok(copied)
}

/// Write `source` in the other representation into `destination`.
///
/// The destination size comes from the source instance's placement in the target
/// representation. A shorter buffer is grown when `resize` is set and rejected otherwise.
/// The covered range is zeroed before writing; returns its length.
pub fn transform_to_buffer(source: &Decoder<'_>, destination: &mut Vec<u8>, resize: bool) -> Result<usize, CodecError> {
    let from = source.representation();
    let to = from.opposite();
    let flat = source.layout().flat();
    let required = flat.buffer_size(to);
    if destination.len() < required {
        if !resize {
            return Err(CodecError::BufferTooSmall {
                required,
                actual: destination.len(),
            });
        }
        log::debug!("[transform] growing destination {} -> {} byte(s)", destination.len(), required);
        destination.resize(required, 0);
    }
    let out = &mut destination[..required];
    out.fill(0);
    for &n in flat.leaves() {
        let node = &flat.nodes()[n];
        let value = walk::read_leaf(source.data(), node, from)?;
        walk::write_leaf(out, node, to, &value)?;
    }
    log::debug!(
        "[transform] {} {:?} -> {:?}: {} leaf(s), {} byte(s)",
        source.access().name(),
        from,
        to,
        flat.leaves().len(),
        required
    );
    Ok(required)
}

/// Deserialized bytes to a new serialized buffer.
pub fn serialize(access: &Arc<StructAccess>, deserialized: &[u8]) -> Result<Vec<u8>, CodecError> {
    let decoder = access.make_decoder(deserialized, DataRepresentation::Deserialized)?;
    let mut out = Vec::new();
    transform_to_buffer(&decoder, &mut out, true)?;
    Ok(out)
}

/// Serialized bytes to a new deserialized buffer.
pub fn deserialize(access: &Arc<StructAccess>, serialized: &[u8]) -> Result<Vec<u8>, CodecError> {
    let decoder = access.make_decoder(serialized, DataRepresentation::Serialized)?;
    let mut out = Vec::new();
    transform_to_buffer(&decoder, &mut out, true)?;
    Ok(out)
}
