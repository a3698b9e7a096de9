//! Data-definition input model: the validated element lists the codec lays out.
//!
//! The codec never edits a description. A [`DataDefinition`] bumps its generation on every
//! change so layout caches built from it know when to re-resolve.

use crate::types::PrimitiveType;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Byte order of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the host; used for the deserialized representation.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

/// DDL language version (`"2.00"`, `"3.00"`, `"4.01"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DdlVersion {
    pub major: u8,
    pub minor: u8,
}

impl DdlVersion {
    pub const V2_0: DdlVersion = DdlVersion { major: 2, minor: 0 };
    pub const V3_0: DdlVersion = DdlVersion { major: 3, minor: 0 };
    pub const V4_0: DdlVersion = DdlVersion { major: 4, minor: 0 };
    pub const V4_1: DdlVersion = DdlVersion { major: 4, minor: 1 };

    pub const fn new(major: u8, minor: u8) -> Self {
        DdlVersion { major, minor }
    }

    /// Before 3.0 every array cell except the last is padded to the element alignment.
    pub fn pads_array_cells(self) -> bool {
        self < DdlVersion::V3_0
    }

    /// From 3.0 on the deserialized struct size is rounded up to the struct alignment.
    pub fn pads_struct_tail(self) -> bool {
        self >= DdlVersion::V3_0
    }
}

impl Default for DdlVersion {
    fn default() -> Self {
        DdlVersion::V4_1
    }
}

impl std::fmt::Display for DdlVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

impl std::str::FromStr for DdlVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (major, minor) = match s.split_once('.') {
            Some((a, b)) => (a, b),
            None => (s, "0"),
        };
        let major = major.parse::<u8>().map_err(|_| format!("invalid DDL version '{}'", s))?;
        let minor = minor
            .trim_end_matches('+')
            .parse::<u8>()
            .map_err(|_| format!("invalid DDL version '{}'", s))?;
        Ok(DdlVersion { major, minor })
    }
}

/// Declared array size: a constant, or the name of a sibling element holding the count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArraySize {
    Fixed(usize),
    Dynamic(String),
}

impl Default for ArraySize {
    fn default() -> Self {
        ArraySize::Fixed(1)
    }
}

/// Physical-unit metadata; carried through for callers, not layout relevant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UnitInfo {
    pub unit: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub scale: Option<String>,
    pub offset: Option<String>,
}

/// One element of a struct description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementDescriptor {
    pub name: String,
    /// Primitive, enum or struct type name.
    pub type_name: String,
    pub array_size: ArraySize,
    /// Serialized byte position; `None` appends after the previous element.
    pub byte_pos: Option<usize>,
    pub bit_pos: Option<usize>,
    /// Serialized bit width of one cell; defaults to the full type width.
    pub num_bits: Option<usize>,
    /// Deserialized alignment; defaults to the type's natural alignment.
    pub alignment: Option<usize>,
    pub byte_order: ByteOrder,
    pub default_value: Option<String>,
    pub constant_value: Option<String>,
    pub unit: Option<UnitInfo>,
}

impl ElementDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        ElementDescriptor {
            name: name.into(),
            type_name: type_name.into(),
            array_size: ArraySize::Fixed(1),
            byte_pos: None,
            bit_pos: None,
            num_bits: None,
            alignment: None,
            byte_order: ByteOrder::LittleEndian,
            default_value: None,
            constant_value: None,
            unit: None,
        }
    }

    pub fn array(mut self, size: usize) -> Self {
        self.array_size = ArraySize::Fixed(size);
        self
    }

    pub fn dynamic_array(mut self, size_element: impl Into<String>) -> Self {
        self.array_size = ArraySize::Dynamic(size_element.into());
        self
    }

    /// Pin the serialized byte position; a negative value is the legacy "append" sentinel.
    pub fn byte_pos(mut self, pos: i64) -> Self {
        self.byte_pos = usize::try_from(pos).ok();
        self
    }

    pub fn bit_pos(mut self, pos: usize) -> Self {
        self.bit_pos = Some(pos);
        self
    }

    pub fn num_bits(mut self, bits: usize) -> Self {
        self.num_bits = Some(bits);
        self
    }

    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn big_endian(self) -> Self {
        self.byte_order(ByteOrder::BigEndian)
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn constant(mut self, value: impl Into<String>) -> Self {
        self.constant_value = Some(value.into());
        self
    }

    pub fn unit(mut self, unit: UnitInfo) -> Self {
        self.unit = Some(unit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructDescription {
    pub name: String,
    /// Declared struct alignment; defaults to the largest element alignment.
    pub alignment: Option<usize>,
    /// Overrides the version the struct is resolved with.
    pub version: Option<DdlVersion>,
    pub elements: Vec<ElementDescriptor>,
}

impl StructDescription {
    pub fn new(name: impl Into<String>) -> Self {
        StructDescription {
            name: name.into(),
            alignment: None,
            version: None,
            elements: Vec::new(),
        }
    }

    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn version(mut self, version: DdlVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn element(mut self, element: ElementDescriptor) -> Self {
        self.elements.push(element);
        self
    }
}

/// Enum type: symbol names mapped to literal values of an underlying primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumDescription {
    pub name: String,
    pub type_name: String,
    pub elements: Vec<(String, String)>,
}

impl EnumDescription {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        EnumDescription {
            name: name.into(),
            type_name: type_name.into(),
            elements: Vec::new(),
        }
    }

    pub fn value(mut self, symbol: impl Into<String>, literal: impl Into<String>) -> Self {
        self.elements.push((symbol.into(), literal.into()));
        self
    }
}

/// What a type name refers to.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    Primitive(PrimitiveType),
    Enum(&'a EnumDescription),
    Struct(&'a StructDescription),
}

/// Named struct and enum descriptions plus the document language version.
#[derive(Debug, Clone, Default)]
pub struct DataDefinition {
    pub version: DdlVersion,
    structs: Vec<StructDescription>,
    enums: Vec<EnumDescription>,
    structs_by_name: HashMap<String, usize>,
    enums_by_name: HashMap<String, usize>,
    generation: u64,
}

impl DataDefinition {
    pub fn new(version: DdlVersion) -> Self {
        DataDefinition {
            version,
            ..Default::default()
        }
    }

    pub fn add_struct(&mut self, s: StructDescription) -> Result<(), String> {
        if self.structs_by_name.contains_key(&s.name) || self.enums_by_name.contains_key(&s.name) {
            return Err(format!("Duplicate type name: {}", s.name));
        }
        self.structs_by_name.insert(s.name.clone(), self.structs.len());
        self.structs.push(s);
        self.generation += 1;
        Ok(())
    }

    pub fn add_enum(&mut self, e: EnumDescription) -> Result<(), String> {
        if self.structs_by_name.contains_key(&e.name) || self.enums_by_name.contains_key(&e.name) {
            return Err(format!("Duplicate type name: {}", e.name));
        }
        self.enums_by_name.insert(e.name.clone(), self.enums.len());
        self.enums.push(e);
        self.generation += 1;
        Ok(())
    }

    /// Insert or replace a struct description.
    pub fn set_struct(&mut self, s: StructDescription) {
        match self.structs_by_name.get(&s.name) {
            Some(&i) => self.structs[i] = s,
            None => {
                self.structs_by_name.insert(s.name.clone(), self.structs.len());
                self.structs.push(s);
            }
        }
        self.generation += 1;
    }

    pub fn remove_struct(&mut self, name: &str) -> Option<StructDescription> {
        let idx = self.structs_by_name.remove(name)?;
        let removed = self.structs.remove(idx);
        for v in self.structs_by_name.values_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
        self.generation += 1;
        Some(removed)
    }

    /// Monotonic change counter; any edit invalidates caches keyed on an older value.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get_struct(&self, name: &str) -> Option<&StructDescription> {
        self.structs_by_name.get(name).map(|&i| &self.structs[i])
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumDescription> {
        self.enums_by_name.get(name).map(|&i| &self.enums[i])
    }

    pub fn structs(&self) -> &[StructDescription] {
        &self.structs
    }

    pub fn lookup(&self, name: &str) -> Option<TypeRef<'_>> {
        if let Some(p) = PrimitiveType::from_name(name) {
            return Some(TypeRef::Primitive(p));
        }
        if let Some(e) = self.get_enum(name) {
            return Some(TypeRef::Enum(e));
        }
        self.get_struct(name).map(TypeRef::Struct)
    }

    /// Hash over a type and every type it references; equal content gives an equal hash.
    pub fn content_hash(&self, name: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        let mut visited = HashSet::new();
        self.hash_type(name, &mut hasher, &mut visited);
        hasher.finish()
    }

    fn hash_type(&self, name: &str, hasher: &mut DefaultHasher, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            name.hash(hasher);
            return;
        }
        match self.lookup(name) {
            Some(TypeRef::Primitive(p)) => p.hash(hasher),
            Some(TypeRef::Enum(e)) => e.hash(hasher),
            Some(TypeRef::Struct(s)) => {
                s.hash(hasher);
                for e in &s.elements {
                    self.hash_type(&e.type_name, hasher, visited);
                }
            }
            None => {
                "<missing>".hash(hasher);
                name.hash(hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parse_and_order() {
        assert_eq!("2.00".parse::<DdlVersion>(), Ok(DdlVersion::V2_0));
        assert_eq!("4.01".parse::<DdlVersion>(), Ok(DdlVersion::V4_1));
        assert_eq!("3".parse::<DdlVersion>(), Ok(DdlVersion::V3_0));
        assert!("x.1".parse::<DdlVersion>().is_err());
        assert!(DdlVersion::V2_0.pads_array_cells());
        assert!(DdlVersion::V3_0.pads_struct_tail());
        assert_eq!(DdlVersion::V4_1.to_string(), "4.01");
    }

    #[test]
    fn append_sentinel() {
        let e = ElementDescriptor::new("a", "tUInt8").byte_pos(-1);
        assert_eq!(e.byte_pos, None);
        let e = ElementDescriptor::new("a", "tUInt8").byte_pos(3);
        assert_eq!(e.byte_pos, Some(3));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut dd = DataDefinition::new(DdlVersion::V4_1);
        dd.add_struct(StructDescription::new("tA")).unwrap();
        assert!(dd.add_struct(StructDescription::new("tA")).is_err());
        assert!(dd.add_enum(EnumDescription::new("tA", "tUInt8")).is_err());
    }

    #[test]
    fn content_hash_follows_referenced_types() {
        let mut dd = DataDefinition::new(DdlVersion::V4_1);
        dd.add_struct(StructDescription::new("tInner").element(ElementDescriptor::new("v", "tUInt8")))
            .unwrap();
        dd.add_struct(StructDescription::new("tOuter").element(ElementDescriptor::new("i", "tInner")))
            .unwrap();
        let before = dd.content_hash("tOuter");
        let generation = dd.generation();
        dd.set_struct(StructDescription::new("tInner").element(ElementDescriptor::new("v", "tUInt8")));
        assert_eq!(dd.content_hash("tOuter"), before);
        assert!(dd.generation() > generation);
        dd.set_struct(StructDescription::new("tInner").element(ElementDescriptor::new("v", "tUInt16")));
        assert_ne!(dd.content_hash("tOuter"), before);
    }
}
