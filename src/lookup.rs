//! Probing helpers: name lookups that report failure as `None` / `false`.
//!
//! Use these from tools that try paths optimistically. The typed element API on
//! [`Decoder`] / [`Codec`] returns [`CodecError`](crate::codec::CodecError) instead.

use crate::access::StructAccess;
use crate::codec::{Codec, Decoder};
use crate::value::{Primitive, Value};

/// Leaf index of a name path.
pub fn find_index(access: &StructAccess, path: &str) -> Option<usize> {
    access.find_index(path)
}

pub fn get_value<T: Primitive>(decoder: &Decoder<'_>, path: &str) -> Option<T> {
    match decoder.get_value(path) {
        Ok(v) => Some(v),
        Err(e) => {
            log::trace!("[lookup] get_value({}) failed: {}", path, e);
            None
        }
    }
}

pub fn get_variant_value(decoder: &Decoder<'_>, path: &str) -> Option<Value> {
    decoder.element(path).ok()?.get_variant_value().ok()
}

/// Cast and write `value`; `false` when the path is not a writable leaf.
pub fn set_value<T: Primitive>(codec: &mut Codec<'_>, path: &str, value: T) -> bool {
    match codec.set_value(path, value) {
        Ok(()) => true,
        Err(e) => {
            log::trace!("[lookup] set_value({}) failed: {}", path, e);
            false
        }
    }
}

pub fn set_string_value(codec: &mut Codec<'_>, path: &str, text: &str) -> bool {
    codec
        .element_mut(path)
        .and_then(|mut e| e.set_string_value(text))
        .is_ok()
}

/// Value of `symbol` in the enum type of the element at `path`.
pub fn get_enum_value_by_name(access: &StructAccess, path: &str, symbol: &str) -> Option<Value> {
    access.element_by_name(path).ok()?.info()?.enum_table()?.value_of(symbol)
}

/// Bytes of the element at `path`; `None` when missing or not byte aligned.
pub fn get_element_address<'a>(decoder: &'a Decoder<'_>, path: &str) -> Option<&'a [u8]> {
    decoder.element(path).ok()?.address().ok()
}
