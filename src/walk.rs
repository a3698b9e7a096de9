//! Placement walk: lays a [`StructLayout`] tree out into a flat node table.
//!
//! The walk visits elements in declaration order and produces one [`LayoutNode`] per
//! element, per array cell and per nested struct member, each carrying its absolute offsets in
//! **both** representations. Node 0 is the root struct.
//!
//! ## Static vs bound walks
//!
//! - [`FlatLayout::build_static`] treats every dynamic array as empty. For structs without
//!   dynamic elements this is the final layout and is shared by every view.
//! - [`FlatLayout::build_bound`] reads each dynamic array's size element out of the buffer at
//!   its already placed position, so everything after it moves with the data. The result is
//!   private to the view that requested it.
//!
//! Placement follows the same rules as [`crate::layout`]; for static structs both agree.
//!
//! ## Profiling
//!
//! Enable the **`resolve_profile`** feature and use [`reset_resolve_profile`] /
//! [`get_resolve_profile`] to get nanoseconds spent per node kind (`"leaf"`, `"struct"`,
//! `"array"`). The `codec_access` bench prints the breakdown when the feature is on.

use crate::access::DataRepresentation;
use crate::bits;
use crate::codec::CodecError;
use crate::definition::ByteOrder;
use crate::layout::{deserialized_cells_extent, ElementArray, ElementTypeInfo, StructLayout, TypeKind};
use crate::types::{align_up, PrimitiveType};
use crate::value::Value;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

#[cfg(feature = "resolve_profile")]
use std::cell::RefCell;
#[cfg(feature = "resolve_profile")]
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Struct,
    Array,
}

/// One placed element, array cell or nested member.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    /// Local name: `value` or `value[3]` for cells.
    pub name: String,
    /// Dot/bracket path from the root, e.g. `child.value[3]`; empty for the root.
    pub full_name: String,
    pub kind: NodeKind,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub leaf_index: Option<usize>,
    /// Struct declaring the element (the root layout itself for node 0).
    pub owner: Arc<StructLayout>,
    pub element: Option<usize>,
    pub array_index: Option<usize>,
    pub deserialized_offset: usize,
    pub deserialized_size: usize,
    pub serialized_bit_offset: usize,
    pub serialized_bit_size: usize,
}

impl LayoutNode {
    /// Layout facts of the declaring element; `None` for the root.
    pub fn info(&self) -> Option<&ElementTypeInfo> {
        self.element.map(|i| &self.owner.elements[i])
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// Byte range in the given representation; `None` when the node is not byte aligned.
    pub fn byte_range(&self, repr: DataRepresentation) -> Option<Range<usize>> {
        match repr {
            DataRepresentation::Deserialized => {
                Some(self.deserialized_offset..self.deserialized_offset + self.deserialized_size)
            }
            DataRepresentation::Serialized => {
                if self.serialized_bit_offset % 8 == 0 && self.serialized_bit_size % 8 == 0 {
                    let start = self.serialized_bit_offset / 8;
                    Some(start..start + self.serialized_bit_size / 8)
                } else {
                    None
                }
            }
        }
    }

    /// Position, width, order and stored type of a leaf in one representation.
    pub(crate) fn leaf_span(&self, repr: DataRepresentation) -> Result<(usize, usize, ByteOrder, PrimitiveType), CodecError> {
        let info = self
            .info()
            .filter(|_| self.is_leaf())
            .ok_or_else(|| CodecError::InvalidLayout(format!("'{}' is not a leaf element", self.full_name)))?;
        let primitive = info
            .leaf_primitive()
            .ok_or_else(|| CodecError::InvalidLayout(format!("'{}' has no primitive type", self.full_name)))?;
        Ok(match repr {
            DataRepresentation::Deserialized => (
                self.deserialized_offset * 8,
                primitive.bit_size(),
                ByteOrder::native(),
                primitive,
            ),
            DataRepresentation::Serialized => (self.serialized_bit_offset, info.bit_count, info.byte_order, primitive),
        })
    }
}

/// Read a leaf's value out of `data`.
pub fn read_leaf(data: &[u8], node: &LayoutNode, repr: DataRepresentation) -> Result<Value, CodecError> {
    let (offset, bit_count, order, primitive) = node.leaf_span(repr)?;
    let raw = bits::read_bits(data, offset, bit_count, order)?;
    Ok(Value::from_bits(primitive, raw, bit_count))
}

/// Cast `value` to the leaf's type and write it into `data`.
pub fn write_leaf(data: &mut [u8], node: &LayoutNode, repr: DataRepresentation, value: &Value) -> Result<(), CodecError> {
    let (offset, bit_count, order, primitive) = node.leaf_span(repr)?;
    bits::write_bits(data, offset, bit_count, order, value.cast(primitive).to_bits())
}

/// Flattened placement of one struct instance.
#[derive(Debug, Clone)]
pub struct FlatLayout {
    nodes: Vec<LayoutNode>,
    leaves: Vec<usize>,
    by_name: HashMap<String, usize>,
    deserialized_size: usize,
    serialized_bit_size: usize,
}

impl FlatLayout {
    /// Placement without data; dynamic arrays are empty.
    pub fn build_static(root: &Arc<StructLayout>) -> Result<Self, CodecError> {
        Walker::new(None).run(root)
    }

    /// Placement for one buffer; dynamic array sizes are read from `data`.
    pub fn build_bound(root: &Arc<StructLayout>, data: &[u8], repr: DataRepresentation) -> Result<Self, CodecError> {
        let flat = Walker::new(Some((data, repr))).run(root)?;
        log::debug!(
            "[walk] {} bound to {} byte(s) ({:?}): {} node(s), {} leaf(s), {} / {} bytes",
            root.name,
            data.len(),
            repr,
            flat.nodes.len(),
            flat.leaves.len(),
            flat.deserialized_size,
            flat.serialized_bit_size.div_ceil(8)
        );
        Ok(flat)
    }

    pub fn root(&self) -> &LayoutNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&LayoutNode> {
        self.nodes.get(index)
    }

    /// Node indices of the leaves, depth first in declaration order.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    pub fn find(&self, full_name: &str) -> Option<usize> {
        self.by_name.get(full_name).copied()
    }

    /// Bytes a buffer must hold in the given representation.
    pub fn buffer_size(&self, repr: DataRepresentation) -> usize {
        match repr {
            DataRepresentation::Deserialized => self.deserialized_size,
            DataRepresentation::Serialized => self.serialized_bit_size.div_ceil(8),
        }
    }
}

struct Walker<'a> {
    data: Option<(&'a [u8], DataRepresentation)>,
    nodes: Vec<LayoutNode>,
    leaves: Vec<usize>,
}

impl<'a> Walker<'a> {
    fn new(data: Option<(&'a [u8], DataRepresentation)>) -> Self {
        Walker {
            data,
            nodes: Vec::new(),
            leaves: Vec::new(),
        }
    }

    fn run(mut self, root: &Arc<StructLayout>) -> Result<FlatLayout, CodecError> {
        self.nodes.push(LayoutNode {
            name: root.name.clone(),
            full_name: String::new(),
            kind: NodeKind::Struct,
            parent: None,
            children: Vec::new(),
            leaf_index: None,
            owner: root.clone(),
            element: None,
            array_index: None,
            deserialized_offset: 0,
            deserialized_size: 0,
            serialized_bit_offset: 0,
            serialized_bit_size: 0,
        });
        let (children, deserialized_size, serialized_bits) = self.members(root, "", 0, 0, 0)?;
        let root_node = &mut self.nodes[0];
        root_node.children = children;
        root_node.deserialized_size = deserialized_size;
        root_node.serialized_bit_size = serialized_bits.div_ceil(8) * 8;

        let by_name = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.full_name.clone(), i))
            .collect();
        Ok(FlatLayout {
            nodes: self.nodes,
            leaves: self.leaves,
            by_name,
            deserialized_size,
            serialized_bit_size: serialized_bits,
        })
    }

    /// Place the elements of `layout` under `parent`; returns the child nodes, the struct's
    /// deserialized size and its serialized extent in bits.
    fn members(
        &mut self,
        layout: &Arc<StructLayout>,
        prefix: &str,
        parent: usize,
        deserialized_base: usize,
        serialized_base: usize,
    ) -> Result<(Vec<usize>, usize, usize), CodecError> {
        let mut children = Vec::with_capacity(layout.elements.len());
        let mut deserialized_end = 0usize;
        let mut serialized_end = 0usize;
        let mut serialized_max = 0usize;

        for (i, e) in layout.elements.iter().enumerate() {
            let deserialized_start = align_up(deserialized_end, e.alignment);
            let serialized_start = e.serialized_start(serialized_end);
            let full_name = format!("{}{}", prefix, e.name);
            let abs_deserialized = deserialized_base + deserialized_start;
            let abs_serialized = serialized_base + serialized_start;

            let (node, extent) = match &e.array {
                ElementArray::Scalar => {
                    let node = self.cell(layout, i, e.name.clone(), full_name, None, parent, abs_deserialized, abs_serialized)?;
                    let extent = deserialized_cells_extent(
                        layout.version,
                        e.alignment,
                        e.type_info.alignment.max(1),
                        self.nodes[node].deserialized_size,
                        1,
                    );
                    (node, extent)
                }
                ElementArray::Fixed(n) => {
                    let node = self.array(layout, i, *n, full_name, parent, abs_deserialized, abs_serialized)?;
                    (node, self.nodes[node].deserialized_size)
                }
                ElementArray::Dynamic { size_element, size_index } => {
                    let count = self.dynamic_count(layout, e, size_element, *size_index, &children)?;
                    let node = self.array(layout, i, count, full_name, parent, abs_deserialized, abs_serialized)?;
                    (node, self.nodes[node].deserialized_size)
                }
            };
            if extent > 0 {
                deserialized_end = deserialized_start + extent;
            }
            serialized_end = serialized_start + self.nodes[node].serialized_bit_size;
            serialized_max = serialized_max.max(serialized_end);
            children.push(node);
        }
        Ok((children, layout.finish_deserialized_size(deserialized_end), serialized_max))
    }

    fn dynamic_count(
        &self,
        layout: &StructLayout,
        e: &ElementTypeInfo,
        size_element: &str,
        size_index: Option<usize>,
        placed: &[usize],
    ) -> Result<usize, CodecError> {
        let sibling = size_index.and_then(|j| placed.get(j)).ok_or_else(|| {
            CodecError::InvalidLayout(format!(
                "{}.{}: array size element '{}' cannot be used",
                layout.name, e.name, size_element
            ))
        })?;
        let Some((data, repr)) = self.data else {
            return Ok(0);
        };
        let count = read_leaf(data, &self.nodes[*sibling], repr)?;
        match count.as_i64() {
            // Every cell takes at least one bit, so a count above the buffer's bits cannot fit.
            Some(n) if n >= 0 && n as u64 > (data.len() as u64).saturating_mul(8) => {
                Err(CodecError::BufferTooSmall {
                    required: (n as u64).div_ceil(8) as usize,
                    actual: data.len(),
                })
            }
            Some(n) if n >= 0 => Ok(n as usize),
            _ => Err(CodecError::InvalidLayout(format!(
                "{}.{}: array size element '{}' holds {}",
                layout.name, e.name, size_element, count
            ))),
        }
    }

    fn push(&mut self, node: LayoutNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Place a scalar element or one array cell.
    #[allow(clippy::too_many_arguments)]
    fn cell(
        &mut self,
        layout: &Arc<StructLayout>,
        element: usize,
        name: String,
        full_name: String,
        array_index: Option<usize>,
        parent: usize,
        deserialized_offset: usize,
        serialized_bit_offset: usize,
    ) -> Result<usize, CodecError> {
        let e = &layout.elements[element];
        let idx = self.push(LayoutNode {
            name,
            full_name,
            kind: NodeKind::Leaf,
            parent: Some(parent),
            children: Vec::new(),
            leaf_index: None,
            owner: layout.clone(),
            element: Some(element),
            array_index,
            deserialized_offset,
            deserialized_size: 0,
            serialized_bit_offset,
            serialized_bit_size: 0,
        });
        match &e.type_info.kind {
            TypeKind::Primitive(_) | TypeKind::Enum(_) => {
                #[cfg(feature = "resolve_profile")]
                let _g = ProfileGuard::new("leaf");
                let size = e.type_info.deserialized_byte_size;
                let leaf_index = self.leaves.len();
                self.leaves.push(idx);
                let node = &mut self.nodes[idx];
                node.leaf_index = Some(leaf_index);
                node.deserialized_size = size;
                node.serialized_bit_size = e.bit_count;
            }
            TypeKind::Struct(inner) => {
                #[cfg(feature = "resolve_profile")]
                let _g = ProfileGuard::new("struct");
                let prefix = format!("{}.", self.nodes[idx].full_name);
                let (children, size, bits) =
                    self.members(inner, &prefix, idx, deserialized_offset, serialized_bit_offset)?;
                let node = &mut self.nodes[idx];
                node.kind = NodeKind::Struct;
                node.children = children;
                node.deserialized_size = size;
                node.serialized_bit_size = bits.div_ceil(8) * 8;
            }
            TypeKind::Unresolved => {
                return Err(CodecError::InvalidLayout(format!(
                    "{}.{}: type '{}' is unresolved",
                    layout.name, e.name, e.type_name
                )))
            }
        }
        Ok(idx)
    }

    #[allow(clippy::too_many_arguments)]
    fn array(
        &mut self,
        layout: &Arc<StructLayout>,
        element: usize,
        count: usize,
        full_name: String,
        parent: usize,
        deserialized_offset: usize,
        serialized_bit_offset: usize,
    ) -> Result<usize, CodecError> {
        #[cfg(feature = "resolve_profile")]
        let _g = ProfileGuard::new("array");
        let e = &layout.elements[element];
        let idx = self.push(LayoutNode {
            name: e.name.clone(),
            full_name: full_name.clone(),
            kind: NodeKind::Array,
            parent: Some(parent),
            children: Vec::new(),
            leaf_index: None,
            owner: layout.clone(),
            element: Some(element),
            array_index: None,
            deserialized_offset,
            deserialized_size: 0,
            serialized_bit_offset,
            serialized_bit_size: 0,
        });
        let pads_cells = layout.version.pads_array_cells();
        let type_alignment = e.type_info.alignment.max(1);
        let mut children = Vec::new();
        let mut deserialized_end = 0usize;
        let mut serialized_end = 0usize;
        for k in 0..count {
            let start = if pads_cells {
                align_up(deserialized_end, e.alignment)
            } else {
                deserialized_end
            };
            let cell = self.cell(
                layout,
                element,
                format!("{}[{}]", e.name, k),
                format!("{}[{}]", full_name, k),
                Some(k),
                idx,
                deserialized_offset + start,
                serialized_bit_offset + serialized_end,
            )?;
            let size = self.nodes[cell].deserialized_size;
            deserialized_end = start + if pads_cells { size } else { align_up(size, type_alignment) };
            serialized_end += self.nodes[cell].serialized_bit_size;
            children.push(cell);
            self.check_bound(deserialized_offset + deserialized_end, serialized_bit_offset + serialized_end)?;
        }
        let node = &mut self.nodes[idx];
        node.children = children;
        node.deserialized_size = deserialized_end;
        node.serialized_bit_size = serialized_end;
        Ok(idx)
    }

    /// Stop early when array cells already run past the bound buffer.
    fn check_bound(&self, deserialized_end: usize, serialized_end_bits: usize) -> Result<(), CodecError> {
        if let Some((data, repr)) = self.data {
            let required = match repr {
                DataRepresentation::Deserialized => deserialized_end,
                DataRepresentation::Serialized => serialized_end_bits.div_ceil(8),
            };
            if required > data.len() {
                return Err(CodecError::BufferTooSmall {
                    required,
                    actual: data.len(),
                });
            }
        }
        Ok(())
    }
}

// Bind-time walk timing, enabled by the "resolve_profile" feature. Times are kept per
// thread and per node kind; a struct or array span includes the nodes placed below it.

#[cfg(feature = "resolve_profile")]
thread_local!(static WALK_NANOS: RefCell<HashMap<&'static str, u64>> = RefCell::new(HashMap::new()));

/// Clears the walk timings of the current thread.
#[cfg(feature = "resolve_profile")]
pub fn reset_resolve_profile() {
    WALK_NANOS.with(|t| t.borrow_mut().clear());
}

/// Walk timings of the current thread: node kind to nanoseconds.
#[cfg(feature = "resolve_profile")]
pub fn get_resolve_profile() -> HashMap<String, u64> {
    WALK_NANOS.with(|t| t.borrow().iter().map(|(k, v)| (k.to_string(), *v)).collect())
}

/// Adds the time until drop to one node kind.
#[cfg(feature = "resolve_profile")]
struct ProfileGuard {
    kind: &'static str,
    since: Instant,
}

#[cfg(feature = "resolve_profile")]
impl ProfileGuard {
    fn new(kind: &'static str) -> Self {
        ProfileGuard {
            kind,
            since: Instant::now(),
        }
    }
}

#[cfg(feature = "resolve_profile")]
impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let nanos = self.since.elapsed().as_nanos() as u64;
        WALK_NANOS.with(|t| *t.borrow_mut().entry(self.kind).or_default() += nanos);
    }
}

/// Without the `resolve_profile` feature there is nothing to reset.
#[cfg(not(feature = "resolve_profile"))]
pub fn reset_resolve_profile() {}

/// Without the `resolve_profile` feature no timings are recorded.
#[cfg(not(feature = "resolve_profile"))]
pub fn get_resolve_profile() -> HashMap<String, u64> {
    HashMap::new()
}
