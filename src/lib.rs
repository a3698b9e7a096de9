//! # ddlcodec: layout resolution and element access for DDL-described data
//!
//! Given struct descriptions from a DDL data definition (element names, types, fixed or
//! dynamic array sizes, byte/bit positions, alignment, byte order), the codec computes two
//! layouts per struct and gives typed access to every element in a caller-owned buffer:
//!
//! - **Deserialized**: host memory layout, C-like alignment and padding, native byte order.
//! - **Serialized**: packed and bit exact, per-element byte order, optional pinned positions.
//!
//! ## Pipeline
//!
//! 1. [`DataDefinition`] holds the (already validated) struct and enum descriptions.
//! 2. [`LayoutResolver`](layout::LayoutResolver) computes [`TypeInfo`](layout::TypeInfo) and
//!    [`ElementTypeInfo`](layout::ElementTypeInfo) per type, memoized and collecting
//!    [`Problem`]s instead of failing.
//! 3. [`StructAccessFactory`] turns a valid layout into a shared [`StructAccess`].
//! 4. [`Decoder`] / [`Codec`] bind a buffer; dynamic array sizes are read from it at bind time.
//! 5. [`transform`](transform::transform) and [`transform_to_buffer`] convert whole buffers
//!    between the two representations.
//!
//! ## Language versions
//!
//! Before DDL 3.0 every array cell is padded to the element alignment and the struct tail is
//! not; from 3.0 on array cells are packed at their type's aligned size and the struct size is
//! rounded up to the struct alignment. A struct may override the document version.
//!
//! ## Example
//!
//! ```
//! use ddlcodec::{DataDefinition, DataRepresentation, DdlVersion, ElementDescriptor, StructAccessFactory, StructDescription};
//!
//! let mut dd = DataDefinition::new(DdlVersion::V4_1);
//! dd.add_struct(
//!     StructDescription::new("tPoint")
//!         .element(ElementDescriptor::new("x", "tUInt16").big_endian())
//!         .element(ElementDescriptor::new("y", "tUInt16").big_endian()),
//! )
//! .unwrap();
//! let access = StructAccessFactory::new().build_default(&dd, "tPoint").unwrap();
//! let mut buf = vec![0u8; access.static_buffer_size(DataRepresentation::Serialized)];
//! let mut codec = access.make_codec(&mut buf, DataRepresentation::Serialized).unwrap();
//! codec.set_value("y", 0x0102u16).unwrap();
//! assert_eq!(buf, [0, 0, 1, 2]);
//! ```

pub mod access;
pub mod bits;
pub mod codec;
pub mod definition;
pub mod layout;
pub mod lookup;
pub mod problem;
pub mod transform;
pub mod types;
pub mod value;
pub mod walk;

pub use access::{CodecIndex, DataRepresentation, IndexStep, LayoutSource, StructAccess, StructAccessFactory};
pub use codec::{Codec, CodecElement, CodecError, Decoder, DecoderElement};
pub use definition::{
    ArraySize, ByteOrder, DataDefinition, DdlVersion, ElementDescriptor, EnumDescription, StructDescription, UnitInfo,
};
pub use layout::{ElementTypeInfo, LayoutResolver, StructLayout, TypeInfo};
pub use problem::{Problem, Severity};
pub use transform::{deserialize, serialize, transform_to_buffer};
pub use types::PrimitiveType;
pub use value::{Primitive, Value, Variant};
pub use walk::{get_resolve_profile, reset_resolve_profile, FlatLayout};
