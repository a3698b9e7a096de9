//! Bit-level packing and unpacking of up to 64-bit values into byte buffers.
//!
//! Bit positions are absolute from the start of the buffer (`byte * 8 + bit`), and bit 0 of
//! every byte is its least significant bit, whatever the field's byte order. A field therefore
//! always covers the same physical bits, so little and big endian fields can share a byte.
//!
//! The byte order only decides how the value's bytes are laid out over the field: a big endian
//! field whose width is a whole number of bytes stores its most significant byte first. Fields
//! of other widths are packed LSB first in both orders.
//!
//! Byte-aligned fields whose width is a multiple of 8 therefore read and write exactly like
//! plain LE/BE integers. Values wider than the field are truncated silently.

use crate::codec::CodecError;
use crate::definition::ByteOrder;
use byteorder::{ByteOrder as _, LittleEndian};

/// Largest field width handled in one call.
pub const MAX_BITS: usize = 64;

#[inline]
pub fn mask_bits(len: usize) -> u64 {
    if len >= 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// Byte range `(first, count)` covering the bit span; errors when the span is empty, too wide
/// or leaves `[0, buffer_len)`.
fn span(buffer_len: usize, bit_offset: usize, bit_count: usize) -> Result<(usize, usize), CodecError> {
    if bit_count == 0 || bit_count > MAX_BITS {
        return Err(CodecError::InvalidLayout(format!(
            "bit count {} outside 1..={}",
            bit_count, MAX_BITS
        )));
    }
    let end = bit_offset
        .checked_add(bit_count)
        .ok_or_else(|| CodecError::InvalidLayout("bit offset overflow".to_string()))?;
    if end > buffer_len.saturating_mul(8) {
        return Err(CodecError::OutOfBounds {
            offset_bits: bit_offset,
            bit_count,
            buffer_len,
        });
    }
    let first = bit_offset / 8;
    let count = (bit_offset % 8 + bit_count).div_ceil(8);
    Ok((first, count))
}

/// Reverse the byte order of a value that is `bit_count / 8` bytes wide.
#[inline]
fn swap_value_bytes(value: u64, bit_count: usize) -> u64 {
    value.swap_bytes() >> (MAX_BITS - bit_count)
}

/// Whether the field stores its value bytes in reverse of the LSB-first bit order.
#[inline]
fn swaps_bytes(order: ByteOrder, bit_count: usize) -> bool {
    order == ByteOrder::BigEndian && bit_count > 8 && bit_count % 8 == 0
}

/// Read `bit_count` bits starting at `bit_offset`; the result is right-aligned.
pub fn read_bits(data: &[u8], bit_offset: usize, bit_count: usize, order: ByteOrder) -> Result<u64, CodecError> {
    let (first, nbytes) = span(data.len(), bit_offset, bit_count)?;
    let bytes = &data[first..first + nbytes];
    let raw = (LittleEndian::read_uint128(bytes, nbytes) >> (bit_offset % 8)) as u64 & mask_bits(bit_count);
    if swaps_bytes(order, bit_count) {
        Ok(swap_value_bytes(raw, bit_count))
    } else {
        Ok(raw)
    }
}

/// Write the low `bit_count` bits of `value` at `bit_offset`; bits outside the field are untouched.
pub fn write_bits(
    data: &mut [u8],
    bit_offset: usize,
    bit_count: usize,
    order: ByteOrder,
    value: u64,
) -> Result<(), CodecError> {
    let (first, nbytes) = span(data.len(), bit_offset, bit_count)?;
    let bytes = &mut data[first..first + nbytes];
    let mut field = value & mask_bits(bit_count);
    if swaps_bytes(order, bit_count) {
        field = swap_value_bytes(field, bit_count);
    }
    let shift = bit_offset % 8;
    let mask = (mask_bits(bit_count) as u128) << shift;
    let current = LittleEndian::read_uint128(bytes, nbytes);
    let merged = (current & !mask) | ((field as u128) << shift);
    LittleEndian::write_uint128(bytes, merged, nbytes);
    Ok(())
}
