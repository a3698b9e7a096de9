//! Layout resolution: memoized [`TypeInfo`] per type and [`ElementTypeInfo`] per struct element.
//!
//! ## Rules
//!
//! Elements are resolved strictly left to right; element *i* depends only on element *i-1*
//! and its own descriptor.
//!
//! - **Alignment**: declared alignment when it is `>= 1` and a power of two, else the type's
//!   natural alignment (an invalid declaration is recorded as a problem).
//! - **Deserialized position**: end of the previous element rounded up to the alignment.
//! - **Serialized position**: the pinned `byte_pos * 8 + bit_pos` when declared, else the end
//!   of the previous element (bit packed, no padding).
//! - **Array cells**: before DDL 3.0 every cell but the last is padded to the element alignment;
//!   from 3.0 on cells are packed at the type's aligned size and the struct tail is padded to
//!   the struct alignment instead.
//! - **Dynamic elements**: an element whose count comes from a sibling, or whose type contains
//!   such an element, is dynamic. Everything after it has no static position (except pinned
//!   serialized positions) and needs a buffer-bound walk, see [`crate::walk`]. Cells of a
//!   dynamic array must take at least one serialized bit.
//! - **Pinned positions**: a declared `byte_pos` pins the serialized position only, so a pinned
//!   element after a dynamic one keeps a static `serialized_bit_pos`. Its deserialized position
//!   still follows the aligned end of the previous element and is `None` after a dynamic one.
//!
//! Static sizes of dynamic structs count every dynamic array as empty.

use crate::definition::{ArraySize, ByteOrder, DataDefinition, DdlVersion, StructDescription, TypeRef, UnitInfo};
use crate::problem::{self, Problem};
use crate::types::{align_up, is_valid_alignment, PrimitiveType};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Symbol table of an enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumTable {
    pub name: String,
    pub base: PrimitiveType,
    entries: Vec<(String, Value)>,
}

impl EnumTable {
    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    /// Value of a symbol, cast to the underlying type.
    pub fn value_of(&self, symbol: &str) -> Option<Value> {
        self.entries.iter().find(|(n, _)| n == symbol).map(|(_, v)| *v)
    }

    /// First symbol whose value equals `value` after casting to the underlying type.
    pub fn symbol_of(&self, value: &Value) -> Option<&str> {
        let v = value.cast(self.base);
        self.entries.iter().find(|(_, e)| *e == v).map(|(n, _)| n.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    Enum(Arc<EnumTable>),
    Struct(Arc<StructLayout>),
    /// Missing or cyclic type; never part of a usable layout.
    Unresolved,
}

/// Resolved size and alignment facts of one named type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    pub alignment: usize,
    pub deserialized_byte_size: usize,
    /// `deserialized_byte_size` rounded up to `alignment`.
    pub deserialized_aligned_byte_size: usize,
    pub serialized_bit_size: usize,
    pub serialized_byte_size: usize,
    pub is_dynamic: bool,
    pub is_valid: bool,
}

impl TypeInfo {
    fn primitive(p: PrimitiveType) -> Self {
        TypeInfo {
            name: p.name().to_string(),
            kind: TypeKind::Primitive(p),
            alignment: p.alignment(),
            deserialized_byte_size: p.byte_size(),
            deserialized_aligned_byte_size: p.byte_size(),
            serialized_bit_size: p.bit_size(),
            serialized_byte_size: p.byte_size(),
            is_dynamic: false,
            is_valid: true,
        }
    }

    fn unresolved(name: &str) -> Self {
        TypeInfo {
            name: name.to_string(),
            kind: TypeKind::Unresolved,
            alignment: 1,
            deserialized_byte_size: 0,
            deserialized_aligned_byte_size: 0,
            serialized_bit_size: 0,
            serialized_byte_size: 0,
            is_dynamic: false,
            is_valid: false,
        }
    }

    /// Primitive used to store the value: the type itself, or an enum's underlying type.
    pub fn leaf_primitive(&self) -> Option<PrimitiveType> {
        match &self.kind {
            TypeKind::Primitive(p) => Some(*p),
            TypeKind::Enum(e) => Some(e.base),
            _ => None,
        }
    }

    pub fn struct_layout(&self) -> Option<&Arc<StructLayout>> {
        match &self.kind {
            TypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }
}

/// Array shape of a resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementArray {
    Scalar,
    Fixed(usize),
    /// Count read from the sibling at `size_index` (`None` when that sibling is unusable).
    Dynamic { size_element: String, size_index: Option<usize> },
}

/// Resolved layout of one element inside its struct; positions are relative to the struct start.
#[derive(Debug, Clone)]
pub struct ElementTypeInfo {
    pub name: String,
    pub index: usize,
    pub type_name: String,
    pub type_info: Arc<TypeInfo>,
    pub array: ElementArray,
    pub alignment: usize,
    pub byte_order: ByteOrder,
    /// Serialized width of one cell.
    pub bit_count: usize,
    pub declared_byte_pos: Option<usize>,
    pub declared_bit_pos: Option<usize>,
    pub deserialized_byte_pos: Option<usize>,
    pub deserialized_byte_size: Option<usize>,
    pub serialized_bit_pos: Option<usize>,
    pub serialized_bit_size: Option<usize>,
    pub is_dynamic: bool,
    pub is_after_dynamic: bool,
    pub constant: Option<Value>,
    pub default: Option<Value>,
    pub unit: Option<UnitInfo>,
}

impl ElementTypeInfo {
    pub fn leaf_primitive(&self) -> Option<PrimitiveType> {
        self.type_info.leaf_primitive()
    }

    pub fn enum_table(&self) -> Option<&Arc<EnumTable>> {
        match &self.type_info.kind {
            TypeKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn struct_layout(&self) -> Option<&Arc<StructLayout>> {
        self.type_info.struct_layout()
    }

    pub fn is_array(&self) -> bool {
        !matches!(self.array, ElementArray::Scalar)
    }

    /// Cell count when known without a buffer.
    pub fn static_count(&self) -> Option<usize> {
        match self.array {
            ElementArray::Scalar => Some(1),
            ElementArray::Fixed(n) => Some(n),
            ElementArray::Dynamic { .. } => None,
        }
    }

    /// Serialized start: the pinned position, else `append_at`.
    pub(crate) fn serialized_start(&self, append_at: usize) -> usize {
        match self.declared_byte_pos {
            Some(byte) => byte * 8 + self.declared_bit_pos.unwrap_or(0),
            None => append_at,
        }
    }
}

/// Deserialized bytes taken by `count` cells of `cell_size` bytes, see the module rules.
pub(crate) fn deserialized_cells_extent(
    version: DdlVersion,
    element_alignment: usize,
    type_alignment: usize,
    cell_size: usize,
    count: usize,
) -> usize {
    if count == 0 {
        return 0;
    }
    if version.pads_array_cells() {
        align_up(cell_size, element_alignment) * (count - 1) + cell_size
    } else {
        align_up(cell_size, type_alignment) * count
    }
}

/// Running end positions while placing elements in declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementCursor {
    pub deserialized_end: usize,
    pub serialized_end_bits: usize,
}

/// Resolved struct type: element layouts plus folded struct facts.
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub name: String,
    pub version: DdlVersion,
    pub alignment: usize,
    pub elements: Vec<ElementTypeInfo>,
    pub deserialized_byte_size: usize,
    pub serialized_byte_size: usize,
    pub is_dynamic: bool,
    pub is_valid: bool,
    /// Own problems followed by those of nested types.
    pub problems: Vec<Problem>,
}

impl StructLayout {
    pub fn element_index(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Round a deserialized end position into the struct size for this version.
    pub(crate) fn finish_deserialized_size(&self, end: usize) -> usize {
        if self.version.pads_struct_tail() {
            align_up(end, self.alignment)
        } else {
            end
        }
    }
}

enum CacheEntry {
    InProgress,
    Done(Arc<TypeInfo>),
}

/// Memoizing resolver for one default language version.
///
/// The cache is dropped whenever the definition's generation differs from the one it was
/// filled with, so edits made by the definition owner are picked up on the next request.
pub struct LayoutResolver {
    version: DdlVersion,
    generation: Option<u64>,
    cache: HashMap<String, CacheEntry>,
}

impl LayoutResolver {
    pub fn new(version: DdlVersion) -> Self {
        LayoutResolver {
            version,
            generation: None,
            cache: HashMap::new(),
        }
    }

    pub fn version(&self) -> DdlVersion {
        self.version
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.generation = None;
    }

    fn sync(&mut self, dd: &DataDefinition) {
        if self.generation != Some(dd.generation()) {
            if self.generation.is_some() {
                log::debug!("[layout] definition changed, dropping {} cached type(s)", self.cache.len());
            }
            self.cache.clear();
            self.generation = Some(dd.generation());
        }
    }

    /// Type info for any named type; `None` when the name is unknown.
    pub fn type_info(&mut self, dd: &DataDefinition, name: &str) -> Option<Arc<TypeInfo>> {
        self.sync(dd);
        self.resolve_type(dd, name, &mut Vec::new())
    }

    /// Layout of a named struct type; `None` when no such struct exists.
    pub fn resolve_struct(&mut self, dd: &DataDefinition, name: &str) -> Option<Arc<StructLayout>> {
        dd.get_struct(name)?;
        self.type_info(dd, name)?.struct_layout().cloned()
    }

    /// Layout of a description that is not (necessarily) registered in `dd`; not cached.
    pub fn resolve_description(&mut self, dd: &DataDefinition, s: &StructDescription) -> Arc<StructLayout> {
        self.sync(dd);
        Arc::new(self.compute_struct(dd, s))
    }

    /// Every problem found for a type and the types it references.
    pub fn problems(&mut self, dd: &DataDefinition, name: &str) -> Vec<Problem> {
        match self.type_info(dd, name) {
            Some(t) => match &t.kind {
                TypeKind::Struct(s) => s.problems.clone(),
                _ if t.is_valid => Vec::new(),
                _ => vec![Problem::invalid(name, None, "type could not be resolved")],
            },
            None => vec![Problem::invalid(name, None, "unknown type")],
        }
    }

    fn resolve_type(&mut self, dd: &DataDefinition, name: &str, cycle: &mut Vec<Problem>) -> Option<Arc<TypeInfo>> {
        match self.cache.get(name) {
            Some(CacheEntry::Done(t)) => return Some(t.clone()),
            Some(CacheEntry::InProgress) => {
                log::warn!("[layout] recursive reference to type '{}'", name);
                cycle.push(Problem::invalid(name, None, format!("type '{}' contains itself", name)));
                return Some(Arc::new(TypeInfo::unresolved(name)));
            }
            None => {}
        }
        let info = match dd.lookup(name)? {
            TypeRef::Primitive(p) => TypeInfo::primitive(p),
            TypeRef::Enum(e) => {
                let base = PrimitiveType::from_name(&e.type_name);
                match base {
                    Some(base) => {
                        let mut entries = Vec::with_capacity(e.elements.len());
                        let mut valid = true;
                        for (symbol, literal) in &e.elements {
                            match Value::parse(base, literal) {
                                Ok(v) => entries.push((symbol.clone(), v)),
                                Err(msg) => {
                                    log::warn!("[layout] enum {}: {}: {}", e.name, symbol, msg);
                                    valid = false;
                                }
                            }
                        }
                        let mut info = TypeInfo::primitive(base);
                        info.name = e.name.clone();
                        info.is_valid = valid;
                        info.kind = TypeKind::Enum(Arc::new(EnumTable {
                            name: e.name.clone(),
                            base,
                            entries,
                        }));
                        info
                    }
                    None => TypeInfo::unresolved(&e.name),
                }
            }
            TypeRef::Struct(s) => {
                self.cache.insert(name.to_string(), CacheEntry::InProgress);
                let layout = self.compute_struct(dd, s);
                TypeInfo {
                    name: layout.name.clone(),
                    alignment: layout.alignment,
                    deserialized_byte_size: layout.deserialized_byte_size,
                    deserialized_aligned_byte_size: align_up(layout.deserialized_byte_size, layout.alignment),
                    serialized_bit_size: layout.serialized_byte_size * 8,
                    serialized_byte_size: layout.serialized_byte_size,
                    is_dynamic: layout.is_dynamic,
                    is_valid: layout.is_valid,
                    kind: TypeKind::Struct(Arc::new(layout)),
                }
            }
        };
        let info = Arc::new(info);
        self.cache.insert(name.to_string(), CacheEntry::Done(info.clone()));
        Some(info)
    }

    fn compute_struct(&mut self, dd: &DataDefinition, s: &StructDescription) -> StructLayout {
        let version = s.version.unwrap_or(self.version);
        let mut problems: Vec<Problem> = Vec::new();
        let mut nested: Vec<Problem> = Vec::new();
        let mut elements: Vec<ElementTypeInfo> = Vec::with_capacity(s.elements.len());
        let mut cursor = PlacementCursor::default();
        let mut serialized_max = 0usize;
        let mut prev_dynamic = false;
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (i, d) in s.elements.iter().enumerate() {
            let elem_name = Some(d.name.as_str());
            if seen.insert(d.name.as_str(), i).is_some() {
                problems.push(Problem::invalid(&s.name, elem_name, "duplicate element name"));
            }

            let mut cycle_hits = Vec::new();
            let type_info = match self.resolve_type(dd, &d.type_name, &mut cycle_hits) {
                Some(t) => {
                    if cycle_hits.is_empty() && !t.is_valid {
                        problems.push(Problem::invalid(
                            &s.name,
                            elem_name,
                            format!("type '{}' is invalid", d.type_name),
                        ));
                    }
                    t
                }
                None => {
                    problems.push(Problem::invalid(
                        &s.name,
                        elem_name,
                        format!("unknown type '{}'", d.type_name),
                    ));
                    Arc::new(TypeInfo::unresolved(&d.type_name))
                }
            };
            for hit in cycle_hits {
                problems.push(Problem::invalid(&s.name, elem_name, hit.message));
            }
            if let TypeKind::Struct(inner) = &type_info.kind {
                nested.extend(inner.problems.iter().cloned());
            }

            let alignment = match d.alignment {
                Some(a) if is_valid_alignment(a) => a,
                Some(a) => {
                    problems.push(Problem::invalid(
                        &s.name,
                        elem_name,
                        format!("alignment {} is not a power of two >= 1", a),
                    ));
                    type_info.alignment.max(1)
                }
                None => type_info.alignment.max(1),
            };

            let array = match &d.array_size {
                ArraySize::Fixed(0) => {
                    problems.push(Problem::invalid(&s.name, elem_name, "array size 0"));
                    ElementArray::Fixed(0)
                }
                ArraySize::Fixed(1) => ElementArray::Scalar,
                ArraySize::Fixed(n) => ElementArray::Fixed(*n),
                ArraySize::Dynamic(size_element) => {
                    let size_index = match seen.get(size_element.as_str()) {
                        Some(&j) if j < i => {
                            let sibling: &ElementTypeInfo = &elements[j];
                            let integer = sibling.leaf_primitive().map(PrimitiveType::is_integer).unwrap_or(false);
                            if integer && !sibling.is_array() {
                                Some(j)
                            } else {
                                problems.push(Problem::invalid(
                                    &s.name,
                                    elem_name,
                                    format!("array size element '{}' is not a scalar integer", size_element),
                                ));
                                None
                            }
                        }
                        _ => {
                            let message = if s.elements.iter().any(|e| &e.name == size_element) {
                                format!("array size element '{}' must precede the array", size_element)
                            } else {
                                format!("array size element '{}' not found", size_element)
                            };
                            problems.push(Problem::invalid(&s.name, elem_name, message));
                            None
                        }
                    };
                    ElementArray::Dynamic {
                        size_element: size_element.clone(),
                        size_index,
                    }
                }
            };

            let leaf = type_info.leaf_primitive();
            let bit_count = match (d.num_bits, leaf) {
                (Some(0), _) => {
                    problems.push(Problem::invalid(&s.name, elem_name, "bit count 0"));
                    type_info.serialized_bit_size
                }
                (Some(n), Some(p)) if n > p.bit_size() => {
                    problems.push(Problem::invalid(
                        &s.name,
                        elem_name,
                        format!("bit count {} exceeds the {} bits of {}", n, p.bit_size(), p),
                    ));
                    p.bit_size()
                }
                (Some(n), Some(_)) => n,
                (Some(_), None) => {
                    problems.push(Problem::invalid(
                        &s.name,
                        elem_name,
                        "bit count is only allowed for primitive and enum types",
                    ));
                    type_info.serialized_bit_size
                }
                (None, _) => type_info.serialized_bit_size,
            };
            if matches!(array, ElementArray::Dynamic { .. }) && type_info.is_valid && bit_count == 0 {
                problems.push(Problem::invalid(
                    &s.name,
                    elem_name,
                    format!("dynamic array of zero-size type '{}'", d.type_name),
                ));
            }

            match (d.byte_pos, d.bit_pos) {
                (_, Some(b)) if b > 7 => {
                    problems.push(Problem::invalid(&s.name, elem_name, format!("bit position {} outside 0..=7", b)))
                }
                (None, Some(_)) => problems.push(Problem::good_enough(
                    &s.name,
                    elem_name,
                    "bit position without byte position is ignored",
                )),
                _ => {}
            }

            let constant = parse_literal(&s.name, &d.name, "constant", d.constant_value.as_deref(), &type_info, &mut problems);
            let default = parse_literal(&s.name, &d.name, "default", d.default_value.as_deref(), &type_info, &mut problems);

            let is_dynamic = matches!(array, ElementArray::Dynamic { .. }) || type_info.is_dynamic;
            let is_after_dynamic = prev_dynamic;
            let count = match array {
                ElementArray::Scalar => 1,
                ElementArray::Fixed(n) => n,
                ElementArray::Dynamic { .. } => 0,
            };

            let deserialized_start = align_up(cursor.deserialized_end, alignment);
            let deserialized_size = deserialized_cells_extent(
                version,
                alignment,
                type_info.alignment.max(1),
                type_info.deserialized_byte_size,
                count,
            );
            let declared_bit_pos = d.byte_pos.and(d.bit_pos);
            let serialized_start = match d.byte_pos {
                Some(byte) => byte * 8 + declared_bit_pos.unwrap_or(0),
                None => cursor.serialized_end_bits,
            };
            let serialized_size = bit_count * count;
            if deserialized_size > 0 {
                cursor.deserialized_end = deserialized_start + deserialized_size;
            }
            cursor.serialized_end_bits = serialized_start + serialized_size;
            serialized_max = serialized_max.max(cursor.serialized_end_bits);

            elements.push(ElementTypeInfo {
                name: d.name.clone(),
                index: i,
                type_name: d.type_name.clone(),
                type_info,
                array,
                alignment,
                byte_order: d.byte_order,
                bit_count,
                declared_byte_pos: d.byte_pos,
                declared_bit_pos,
                deserialized_byte_pos: (!is_after_dynamic).then_some(deserialized_start),
                deserialized_byte_size: (!is_dynamic).then_some(deserialized_size),
                serialized_bit_pos: (!is_after_dynamic || d.byte_pos.is_some()).then_some(serialized_start),
                serialized_bit_size: (!is_dynamic).then_some(serialized_size),
                is_dynamic,
                is_after_dynamic,
                constant,
                default,
                unit: d.unit.clone(),
            });
            prev_dynamic = is_dynamic || is_after_dynamic;
        }

        let alignment = match s.alignment {
            Some(a) if is_valid_alignment(a) => a,
            Some(a) => {
                problems.push(Problem::invalid(
                    &s.name,
                    None,
                    format!("struct alignment {} is not a power of two >= 1", a),
                ));
                elements.iter().map(|e| e.alignment).max().unwrap_or(1)
            }
            None => elements.iter().map(|e| e.alignment).max().unwrap_or(1),
        };

        let is_valid = problem::all_usable(&problems) && problem::all_usable(&nested);
        problems.extend(nested);
        if !is_valid {
            log::warn!("[layout] struct {} is invalid: {}", s.name, problem::join(&problems));
        }

        let mut layout = StructLayout {
            name: s.name.clone(),
            version,
            alignment,
            is_dynamic: elements.iter().any(|e| e.is_dynamic),
            elements,
            deserialized_byte_size: 0,
            serialized_byte_size: serialized_max.div_ceil(8),
            is_valid,
            problems,
        };
        layout.deserialized_byte_size = layout.finish_deserialized_size(cursor.deserialized_end);
        log::trace!(
            "[layout] {} v{}: {} element(s), {} / {} bytes (deserialized / serialized), dynamic={}",
            layout.name,
            layout.version,
            layout.elements.len(),
            layout.deserialized_byte_size,
            layout.serialized_byte_size,
            layout.is_dynamic
        );
        layout
    }
}

fn parse_literal(
    struct_name: &str,
    element_name: &str,
    what: &str,
    literal: Option<&str>,
    type_info: &TypeInfo,
    problems: &mut Vec<Problem>,
) -> Option<Value> {
    let literal = literal?;
    let result = match &type_info.kind {
        TypeKind::Enum(table) => match table.value_of(literal.trim()) {
            Some(v) => Ok(v),
            None => Value::parse(table.base, literal),
        },
        TypeKind::Primitive(p) => Value::parse(*p, literal),
        _ => Err(format!("{} value on a non-leaf element is ignored", what)),
    };
    match result {
        Ok(v) => Some(v),
        Err(msg) => {
            problems.push(Problem::good_enough(
                struct_name,
                Some(element_name),
                format!("{} '{}': {}", what, literal, msg),
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ElementDescriptor, EnumDescription};

    fn dd() -> DataDefinition {
        DataDefinition::new(DdlVersion::V4_1)
    }

    #[test]
    fn cells_extent_by_version() {
        assert_eq!(deserialized_cells_extent(DdlVersion::V2_0, 4, 2, 2, 3), 4 + 4 + 2);
        assert_eq!(deserialized_cells_extent(DdlVersion::V3_0, 4, 2, 2, 3), 6);
        assert_eq!(deserialized_cells_extent(DdlVersion::V3_0, 4, 8, 9, 2), 32);
        assert_eq!(deserialized_cells_extent(DdlVersion::V2_0, 4, 2, 2, 0), 0);
    }

    #[test]
    fn primitive_elements_are_placed_in_order() {
        let mut dd = dd();
        dd.add_struct(
            StructDescription::new("tS")
                .element(ElementDescriptor::new("a", "tUInt8"))
                .element(ElementDescriptor::new("b", "tUInt32"))
                .element(ElementDescriptor::new("c", "tUInt16")),
        )
        .unwrap();
        let mut r = LayoutResolver::new(DdlVersion::V4_1);
        let s = r.resolve_struct(&dd, "tS").unwrap();
        let pos: Vec<_> = s.elements.iter().map(|e| e.deserialized_byte_pos).collect();
        assert_eq!(pos, vec![Some(0), Some(4), Some(8)]);
        let bits: Vec<_> = s.elements.iter().map(|e| e.serialized_bit_pos).collect();
        assert_eq!(bits, vec![Some(0), Some(8), Some(40)]);
        assert_eq!(s.deserialized_byte_size, 12);
        assert_eq!(s.serialized_byte_size, 7);
        assert!(s.is_valid);
    }

    #[test]
    fn enum_constant_resolves_symbol() {
        let mut dd = dd();
        dd.add_enum(EnumDescription::new("tMode", "tUInt8").value("OFF", "0").value("ON", "1"))
            .unwrap();
        dd.add_struct(StructDescription::new("tS").element(ElementDescriptor::new("m", "tMode").constant("ON")))
            .unwrap();
        let mut r = LayoutResolver::new(DdlVersion::V4_1);
        let s = r.resolve_struct(&dd, "tS").unwrap();
        assert_eq!(s.elements[0].constant, Some(Value::U8(1)));
        assert_eq!(s.elements[0].enum_table().unwrap().symbol_of(&Value::I32(0)), Some("OFF"));
    }

    #[test]
    fn cache_follows_generation() {
        let mut dd = dd();
        dd.add_struct(StructDescription::new("tS").element(ElementDescriptor::new("a", "tUInt8")))
            .unwrap();
        let mut r = LayoutResolver::new(DdlVersion::V4_1);
        let first = r.resolve_struct(&dd, "tS").unwrap();
        let again = r.resolve_struct(&dd, "tS").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        dd.set_struct(StructDescription::new("tS").element(ElementDescriptor::new("a", "tUInt64")));
        let changed = r.resolve_struct(&dd, "tS").unwrap();
        assert_eq!(changed.deserialized_byte_size, 8);
    }

    #[test]
    fn cycles_are_problems_not_crashes() {
        let mut dd = dd();
        dd.add_struct(StructDescription::new("tA").element(ElementDescriptor::new("b", "tB")))
            .unwrap();
        dd.add_struct(StructDescription::new("tB").element(ElementDescriptor::new("a", "tA")))
            .unwrap();
        let mut r = LayoutResolver::new(DdlVersion::V4_1);
        let a = r.resolve_struct(&dd, "tA").unwrap();
        assert!(!a.is_valid);
        assert!(a.problems.iter().any(|p| p.message.contains("contains itself")));
    }
}
