//! Buffer-bound views and element handles.
//!
//! A [`Decoder`] reads and a [`Codec`] reads and writes one caller-owned buffer in one
//! [`DataRepresentation`]. Both are thin wrappers over the same core: the shared
//! [`StructAccess`], the placement used for this buffer and the representation. Elements are
//! addressed by name path (`a.b[2].c`), by leaf index or by [`CodecIndex`]; every access on
//! this surface returns a [`CodecError`] when the element cannot be used. The probing
//! counterparts that return `Option`/`bool` live in [`crate::lookup`].

use crate::access::{CodecIndex, DataRepresentation, LayoutSource, StructAccess};
use crate::definition::{ByteOrder, UnitInfo};
use crate::layout::{ElementTypeInfo, EnumTable};
use crate::problem::Problem;
use crate::types::PrimitiveType;
use crate::value::{Primitive, Value, Variant};
use crate::walk::{self, FlatLayout, LayoutNode, NodeKind};
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
    #[error("Out of bounds: {bit_count} bit(s) at bit {offset_bits} in a {buffer_len} byte buffer")]
    OutOfBounds {
        offset_bits: usize,
        bit_count: usize,
        buffer_len: usize,
    },
    #[error("Size too small: element needs {required} byte(s), {provided} given")]
    SizeTooSmall { required: usize, provided: usize },
    #[error("Buffer too small: {required} byte(s) required, {actual} available")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("Invalid structure '{type_name}': {}", crate::problem::join(.problems))]
    Structural { type_name: String, problems: Vec<Problem> },
    #[error("Conversion: {0}")]
    Conversion(String),
}

/// State shared by both view kinds.
#[derive(Debug)]
struct ViewCore {
    access: Arc<StructAccess>,
    layout: LayoutSource,
    repr: DataRepresentation,
}

impl ViewCore {
    fn new(access: Arc<StructAccess>, data: &[u8], repr: DataRepresentation) -> Result<Self, CodecError> {
        let layout = access.layout_for(data, repr)?;
        Ok(ViewCore { access, layout, repr })
    }

    fn flat(&self) -> &FlatLayout {
        self.layout.flat()
    }

    fn node(&self, node: usize) -> &LayoutNode {
        &self.flat().nodes()[node]
    }

    fn find(&self, path: &str) -> Result<usize, CodecError> {
        self.flat()
            .find(path)
            .ok_or_else(|| CodecError::NotFound(format!("{}: element '{}'", self.access.name(), path)))
    }

    fn leaf(&self, index: usize) -> Result<usize, CodecError> {
        self.flat().leaves().get(index).copied().ok_or_else(|| {
            CodecError::NotFound(format!(
                "{}: leaf index {} of {}",
                self.access.name(),
                index,
                self.flat().leaves().len()
            ))
        })
    }

    fn byte_range(&self, node: usize) -> Result<Range<usize>, CodecError> {
        let n = self.node(node);
        n.byte_range(self.repr)
            .ok_or_else(|| CodecError::InvalidLayout(format!("'{}' is not byte aligned", n.full_name)))
    }

    /// Byte range honoring the caller's declared size; `size == 0` skips the size check.
    fn raw_range(&self, node: usize, available: usize, size: usize) -> Result<Range<usize>, CodecError> {
        let range = self.byte_range(node)?;
        let required = range.len();
        if size == 0 {
            return Ok(range.start..range.start + required.min(available));
        }
        if size < required {
            return Err(CodecError::SizeTooSmall { required, provided: size });
        }
        if available < required {
            return Err(CodecError::SizeTooSmall {
                required,
                provided: available,
            });
        }
        Ok(range)
    }

    fn read_value(&self, data: &[u8], node: usize) -> Result<Value, CodecError> {
        walk::read_leaf(data, self.node(node), self.repr)
    }

    fn write_value(&self, data: &mut [u8], node: usize, value: &Value) -> Result<(), CodecError> {
        walk::write_leaf(data, self.node(node), self.repr, value)
    }

    fn read_string(&self, data: &[u8], node: usize) -> Result<String, CodecError> {
        let value = self.read_value(data, node)?;
        if let Some(symbol) = self.enum_table(node).and_then(|t| t.symbol_of(&value)) {
            return Ok(symbol.to_string());
        }
        Ok(value.to_string())
    }

    fn write_string(&self, data: &mut [u8], node: usize, text: &str) -> Result<(), CodecError> {
        let n = self.node(node);
        let primitive = n
            .info()
            .and_then(ElementTypeInfo::leaf_primitive)
            .filter(|_| n.is_leaf())
            .ok_or_else(|| CodecError::InvalidLayout(format!("'{}' is not a leaf element", n.full_name)))?;
        let value = match self.enum_table(node) {
            Some(table) => match table.value_of(text.trim()) {
                Some(v) => v,
                None => Value::parse(primitive, text).map_err(|_| {
                    CodecError::NotFound(format!("symbol '{}' in enum {}", text.trim(), table.name))
                })?,
            },
            None => Value::parse(primitive, text).map_err(CodecError::Conversion)?,
        };
        self.write_value(data, node, &value)
    }

    fn enum_table(&self, node: usize) -> Option<&Arc<EnumTable>> {
        self.node(node).info()?.enum_table()
    }
}

/// Read-only view over a buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    core: Arc<ViewCore>,
    data: &'a [u8],
}

/// Read-write view over a buffer.
#[derive(Debug)]
pub struct Codec<'a> {
    core: Arc<ViewCore>,
    data: &'a mut [u8],
}

/// Read-only handle on one element of a [`Decoder`] or [`Codec`].
#[derive(Debug, Clone, Copy)]
pub struct DecoderElement<'v> {
    core: &'v ViewCore,
    data: &'v [u8],
    node: usize,
}

/// Read-write handle on one element of a [`Codec`].
#[derive(Debug)]
pub struct CodecElement<'v> {
    core: &'v ViewCore,
    data: &'v mut [u8],
    node: usize,
}

macro_rules! impl_view_read {
    ($view:ident) => {
        impl<'a> $view<'a> {
            pub fn access(&self) -> &Arc<StructAccess> {
                &self.core.access
            }

            pub fn representation(&self) -> DataRepresentation {
                self.core.repr
            }

            pub fn layout(&self) -> &LayoutSource {
                &self.core.layout
            }

            pub fn data(&self) -> &[u8] {
                &self.data[..]
            }

            /// Bytes this instance needs in `repr`, dynamic arrays included.
            pub fn buffer_size(&self, repr: DataRepresentation) -> usize {
                self.core.flat().buffer_size(repr)
            }

            /// Number of leaf elements of this instance.
            pub fn element_count(&self) -> usize {
                self.core.flat().leaves().len()
            }

            pub fn root(&self) -> DecoderElement<'_> {
                self.handle(0)
            }

            pub fn element(&self, path: &str) -> Result<DecoderElement<'_>, CodecError> {
                Ok(self.handle(self.core.find(path)?))
            }

            pub fn leaf(&self, index: usize) -> Result<DecoderElement<'_>, CodecError> {
                Ok(self.handle(self.core.leaf(index)?))
            }

            pub fn element_at(&self, index: &CodecIndex) -> Result<DecoderElement<'_>, CodecError> {
                Ok(self.handle(index.resolve(self.core.flat())?))
            }

            /// Immediate children of the root, in declaration order.
            pub fn elements(&self) -> impl Iterator<Item = DecoderElement<'_>> + '_ {
                self.core.flat().root().children.iter().map(move |&n| self.handle(n))
            }

            /// Leaf elements, depth first in declaration order.
            pub fn leaf_elements(&self) -> impl Iterator<Item = DecoderElement<'_>> + '_ {
                self.core.flat().leaves().iter().map(move |&n| self.handle(n))
            }

            pub fn get_value<T: Primitive>(&self, path: &str) -> Result<T, CodecError> {
                self.element(path)?.get_value()
            }

            fn handle(&self, node: usize) -> DecoderElement<'_> {
                DecoderElement {
                    core: &self.core,
                    data: &self.data[..],
                    node,
                }
            }
        }
    };
}

impl_view_read!(Decoder);
impl_view_read!(Codec);

impl<'a> Decoder<'a> {
    pub fn new(access: Arc<StructAccess>, data: &'a [u8], repr: DataRepresentation) -> Result<Self, CodecError> {
        let core = ViewCore::new(access, data, repr)?;
        Ok(Decoder {
            core: Arc::new(core),
            data,
        })
    }
}

impl<'a> Codec<'a> {
    /// Bind to `data`; dynamic array sizes are read once, here, from the current content.
    pub fn new(access: Arc<StructAccess>, data: &'a mut [u8], repr: DataRepresentation) -> Result<Self, CodecError> {
        let core = ViewCore::new(access, data, repr)?;
        Ok(Codec {
            core: Arc::new(core),
            data,
        })
    }

    /// Read-only view of the same buffer and placement.
    pub fn as_decoder(&self) -> Decoder<'_> {
        Decoder {
            core: self.core.clone(),
            data: &self.data[..],
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    pub fn element_mut(&mut self, path: &str) -> Result<CodecElement<'_>, CodecError> {
        let node = self.core.find(path)?;
        Ok(self.handle_mut(node))
    }

    pub fn leaf_mut(&mut self, index: usize) -> Result<CodecElement<'_>, CodecError> {
        let node = self.core.leaf(index)?;
        Ok(self.handle_mut(node))
    }

    pub fn element_at_mut(&mut self, index: &CodecIndex) -> Result<CodecElement<'_>, CodecError> {
        let node = index.resolve(self.core.flat())?;
        Ok(self.handle_mut(node))
    }

    pub fn set_value<T: Primitive>(&mut self, path: &str, value: T) -> Result<(), CodecError> {
        self.element_mut(path)?.set_value(value)
    }

    /// Call `f` for every leaf, depth first in declaration order; stops at the first error.
    pub fn for_each_leaf_element_mut<F>(&mut self, mut f: F) -> Result<(), CodecError>
    where
        F: FnMut(CodecElement<'_>) -> Result<(), CodecError>,
    {
        let core: &ViewCore = &self.core;
        for &node in core.flat().leaves() {
            f(CodecElement {
                core,
                data: &mut *self.data,
                node,
            })?;
        }
        Ok(())
    }

    /// Write every leaf's constant, else its default, else zero when `zero_values` is set.
    /// Leaves with none of these keep their bytes.
    pub fn reset_values(&mut self, zero_values: bool) -> Result<(), CodecError> {
        let core: &ViewCore = &self.core;
        for &node in core.flat().leaves() {
            let Some(info) = core.node(node).info() else {
                continue;
            };
            let value = match (info.constant, info.default, info.leaf_primitive()) {
                (Some(c), _, _) => c,
                (None, Some(d), _) => d,
                (None, None, Some(p)) if zero_values => Value::zero(p),
                _ => continue,
            };
            core.write_value(self.data, node, &value)?;
        }
        Ok(())
    }

    fn handle_mut(&mut self, node: usize) -> CodecElement<'_> {
        CodecElement {
            core: &self.core,
            data: &mut *self.data,
            node,
        }
    }
}

macro_rules! impl_element_read {
    ($elem:ident) => {
        impl<'v> $elem<'v> {
            pub fn node(&self) -> &'v LayoutNode {
                self.core.node(self.node)
            }

            pub fn name(&self) -> &'v str {
                &self.node().name
            }

            /// Dot/bracket path from the root; empty for the root itself.
            pub fn full_name(&self) -> &'v str {
                &self.node().full_name
            }

            /// Layout facts of the declaring element; `None` for the root.
            pub fn info(&self) -> Option<&'v ElementTypeInfo> {
                self.node().info()
            }

            pub fn type_name(&self) -> &'v str {
                match self.info() {
                    Some(info) => &info.type_name,
                    None => self.core.access.name(),
                }
            }

            /// Stored primitive of a leaf (an enum's underlying type).
            pub fn primitive_type(&self) -> Option<PrimitiveType> {
                self.info()
                    .and_then(ElementTypeInfo::leaf_primitive)
                    .filter(|_| self.is_leaf())
            }

            pub fn is_leaf(&self) -> bool {
                self.node().kind == NodeKind::Leaf
            }

            pub fn is_array(&self) -> bool {
                self.node().kind == NodeKind::Array
            }

            pub fn is_struct(&self) -> bool {
                self.node().kind == NodeKind::Struct
            }

            /// Cell count of an array element, as resolved for this buffer.
            pub fn array_size(&self) -> Option<usize> {
                self.is_array().then(|| self.node().children.len())
            }

            pub fn leaf_index(&self) -> Option<usize> {
                self.node().leaf_index
            }

            pub fn child_count(&self) -> usize {
                self.node().children.len()
            }

            /// Byte order used in the bound representation.
            pub fn byte_order(&self) -> ByteOrder {
                match (self.core.repr, self.info()) {
                    (DataRepresentation::Serialized, Some(info)) => info.byte_order,
                    _ => ByteOrder::native(),
                }
            }

            /// Offset in bits from the buffer start in the bound representation.
            pub fn bit_offset(&self) -> usize {
                match self.core.repr {
                    DataRepresentation::Serialized => self.node().serialized_bit_offset,
                    DataRepresentation::Deserialized => self.node().deserialized_offset * 8,
                }
            }

            /// Size in bits in the bound representation.
            pub fn bit_size(&self) -> usize {
                match self.core.repr {
                    DataRepresentation::Serialized => self.node().serialized_bit_size,
                    DataRepresentation::Deserialized => self.node().deserialized_size * 8,
                }
            }

            pub fn enum_table(&self) -> Option<&'v Arc<EnumTable>> {
                self.core.enum_table(self.node)
            }

            pub fn constant(&self) -> Option<Value> {
                self.info().and_then(|i| i.constant)
            }

            pub fn default_value(&self) -> Option<Value> {
                self.info().and_then(|i| i.default)
            }

            pub fn unit(&self) -> Option<&'v UnitInfo> {
                self.info().and_then(|i| i.unit.as_ref())
            }

            /// Read a leaf and convert it to `T`.
            pub fn get_value<T: Primitive>(&self) -> Result<T, CodecError> {
                Ok(T::from_value(&self.get_variant_value()?))
            }

            /// Read a leaf as a type-erased value of its stored type.
            pub fn get_variant_value(&self) -> Result<Value, CodecError> {
                self.core.read_value(&self.data[..], self.node)
            }

            /// Read a leaf as text; enum values print as their symbol when one matches.
            pub fn get_string_value(&self) -> Result<String, CodecError> {
                self.core.read_string(&self.data[..], self.node)
            }

            /// Copy the element's bytes into `dst`; returns the count copied.
            ///
            /// `size` is the caller's declared capacity and must cover the element. A `size` of 0
            /// skips that check and copies as much as `dst` holds.
            pub fn get_raw_value(&self, dst: &mut [u8], size: usize) -> Result<usize, CodecError> {
                let range = self.core.raw_range(self.node, dst.len(), size)?;
                let n = range.len();
                dst[..n].copy_from_slice(&self.data[range]);
                Ok(n)
            }
        }
    };
}

impl_element_read!(DecoderElement);
impl_element_read!(CodecElement);

impl<'v> DecoderElement<'v> {
    /// Immediate children (struct members or array cells).
    pub fn children(&self) -> impl Iterator<Item = DecoderElement<'v>> + 'v {
        let (core, data) = (self.core, self.data);
        core.node(self.node)
            .children
            .iter()
            .map(move |&node| DecoderElement { core, data, node })
    }

    pub fn child(&self, position: usize) -> Option<DecoderElement<'v>> {
        let node = *self.core.node(self.node).children.get(position)?;
        Some(DecoderElement {
            core: self.core,
            data: self.data,
            node,
        })
    }

    /// The element's bytes in the bound buffer.
    pub fn address(&self) -> Result<&'v [u8], CodecError> {
        let range = self.core.byte_range(self.node)?;
        Ok(&self.data[range])
    }
}

impl<'v> CodecElement<'v> {
    pub fn as_decoder_element(&self) -> DecoderElement<'_> {
        DecoderElement {
            core: self.core,
            data: &self.data[..],
            node: self.node,
        }
    }

    pub fn child_mut(&mut self, position: usize) -> Option<CodecElement<'_>> {
        let node = *self.core.node(self.node).children.get(position)?;
        Some(CodecElement {
            core: self.core,
            data: &mut *self.data,
            node,
        })
    }

    /// Cast `value` to the element's type and write it. Constants accept writes too.
    pub fn set_value<T: Primitive>(&mut self, value: T) -> Result<(), CodecError> {
        self.core.write_value(self.data, self.node, &value.into_value())
    }

    /// Write a value, or an enum symbol which must exist in the element's enum.
    pub fn set_variant_value(&mut self, value: impl Into<Variant>) -> Result<(), CodecError> {
        match value.into() {
            Variant::Value(v) => self.core.write_value(self.data, self.node, &v),
            Variant::Symbol(s) => match self.core.enum_table(self.node) {
                Some(table) => {
                    let v = table
                        .value_of(&s)
                        .ok_or_else(|| CodecError::NotFound(format!("symbol '{}' in enum {}", s, table.name)))?;
                    self.core.write_value(self.data, self.node, &v)
                }
                None => self.core.write_string(self.data, self.node, &s),
            },
        }
    }

    /// Parse `text` (enum symbol or literal) and write it.
    pub fn set_string_value(&mut self, text: &str) -> Result<(), CodecError> {
        self.core.write_string(self.data, self.node, text)
    }

    /// Copy `src` over the element's bytes; returns the count copied. `size` works as in
    /// [`get_raw_value`](Self::get_raw_value).
    pub fn set_raw_value(&mut self, src: &[u8], size: usize) -> Result<usize, CodecError> {
        let range = self.core.raw_range(self.node, src.len(), size)?;
        let n = range.len();
        self.data[range].copy_from_slice(&src[..n]);
        Ok(n)
    }

    pub fn address(&self) -> Result<&[u8], CodecError> {
        let range = self.core.byte_range(self.node)?;
        Ok(&self.data[range])
    }

    pub fn address_mut(&mut self) -> Result<&mut [u8], CodecError> {
        let range = self.core.byte_range(self.node)?;
        Ok(&mut self.data[range])
    }
}
