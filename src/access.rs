//! Shared struct layouts and the factory that builds and caches them.
//!
//! A [`StructAccess`] is resolved once per (struct type, language version) and handed out as
//! `Arc<StructAccess>`; every [`Decoder`] / [`Codec`] built from it keeps it alive. It is never
//! mutated after construction: per-buffer dynamic array sizes live on the view, see
//! [`LayoutSource`].

use crate::codec::{Codec, CodecError, Decoder};
use crate::definition::{DataDefinition, DdlVersion, StructDescription};
use crate::layout::{LayoutResolver, StructLayout};
use crate::problem::Problem;
use crate::walk::{FlatLayout, LayoutNode, NodeKind};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Which of the two buffer layouts a view works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRepresentation {
    /// Packed, bit exact, per-element byte order.
    Serialized,
    /// Host memory layout: aligned, native byte order.
    Deserialized,
}

impl DataRepresentation {
    pub fn opposite(self) -> Self {
        match self {
            DataRepresentation::Serialized => DataRepresentation::Deserialized,
            DataRepresentation::Deserialized => DataRepresentation::Serialized,
        }
    }
}

/// Where a view takes its placement from.
#[derive(Debug, Clone)]
pub enum LayoutSource {
    /// The struct has no dynamic elements: the shared static layout.
    Static(Arc<FlatLayout>),
    /// Resolved for one buffer instance.
    Instance(FlatLayout),
}

impl LayoutSource {
    pub fn flat(&self) -> &FlatLayout {
        match self {
            LayoutSource::Static(flat) => flat,
            LayoutSource::Instance(flat) => flat,
        }
    }

    pub fn is_instance(&self) -> bool {
        matches!(self, LayoutSource::Instance(_))
    }
}

/// One step of a [`CodecIndex`]: element position inside its struct, optional array cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexStep {
    pub element: usize,
    pub array_index: Option<usize>,
}

/// Position path from the root struct to an element; empty addresses the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodecIndex {
    steps: Vec<IndexStep>,
}

impl CodecIndex {
    pub fn root() -> Self {
        CodecIndex::default()
    }

    pub fn new(steps: Vec<IndexStep>) -> Self {
        CodecIndex { steps }
    }

    pub fn push(mut self, element: usize, array_index: Option<usize>) -> Self {
        self.steps.push(IndexStep { element, array_index });
        self
    }

    pub fn steps(&self) -> &[IndexStep] {
        &self.steps
    }

    /// Turn a `a.b[2].c` name path into positions, following nested struct types.
    pub fn parse_path(layout: &StructLayout, path: &str) -> Result<CodecIndex, CodecError> {
        let mut steps = Vec::new();
        if path.is_empty() {
            return Ok(CodecIndex { steps });
        }
        let mut current = layout;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let (name, array_index) = split_segment(segment)
                .ok_or_else(|| CodecError::NotFound(format!("malformed path segment '{}' in '{}'", segment, path)))?;
            let element = current
                .element_index(name)
                .ok_or_else(|| CodecError::NotFound(format!("element '{}' in '{}'", name, path)))?;
            steps.push(IndexStep { element, array_index });
            if segments.peek().is_some() {
                let info = &current.elements[element];
                if info.is_array() && array_index.is_none() {
                    return Err(CodecError::NotFound(format!("'{}' in '{}' needs an array index", name, path)));
                }
                current = info
                    .struct_layout()
                    .map(Arc::as_ref)
                    .ok_or_else(|| CodecError::NotFound(format!("'{}' in '{}' is not a struct", name, path)))?;
            }
        }
        Ok(CodecIndex { steps })
    }

    /// Node index of this path inside one placement.
    pub fn resolve(&self, flat: &FlatLayout) -> Result<usize, CodecError> {
        let mut node = 0usize;
        for step in &self.steps {
            let current = &flat.nodes()[node];
            if current.kind != NodeKind::Struct {
                return Err(CodecError::NotFound(format!("'{}' has no child elements", current.full_name)));
            }
            node = *current.children.get(step.element).ok_or_else(|| {
                CodecError::NotFound(format!("element #{} below '{}'", step.element, current.full_name))
            })?;
            if let Some(k) = step.array_index {
                let array = &flat.nodes()[node];
                if array.kind != NodeKind::Array {
                    return Err(CodecError::NotFound(format!("'{}' is not an array", array.full_name)));
                }
                node = *array.children.get(k).ok_or_else(|| {
                    CodecError::InvalidLayout(format!(
                        "index {} outside '{}' of size {}",
                        k,
                        array.full_name,
                        array.children.len()
                    ))
                })?;
            }
        }
        Ok(node)
    }
}

/// Split `name[3]` into `("name", Some(3))`.
fn split_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.split_once('[') {
        None if !segment.is_empty() => Some((segment, None)),
        None => None,
        Some((name, rest)) => {
            let index = rest.strip_suffix(']')?.trim().parse().ok()?;
            (!name.is_empty()).then_some((name, Some(index)))
        }
    }
}

/// Immutable, shareable resolved layout of one top-level struct type.
#[derive(Debug)]
pub struct StructAccess {
    layout: Arc<StructLayout>,
    static_layout: Arc<FlatLayout>,
    content_hash: u64,
}

impl StructAccess {
    /// Resolve `layout` without a factory; fails when the layout has invalid problems.
    pub fn new(layout: Arc<StructLayout>) -> Result<Arc<Self>, CodecError> {
        Self::with_hash(layout, 0)
    }

    fn with_hash(layout: Arc<StructLayout>, content_hash: u64) -> Result<Arc<Self>, CodecError> {
        if !layout.is_valid {
            return Err(CodecError::Structural {
                type_name: layout.name.clone(),
                problems: layout.problems.clone(),
            });
        }
        let static_layout = Arc::new(FlatLayout::build_static(&layout)?);
        Ok(Arc::new(StructAccess {
            layout,
            static_layout,
            content_hash,
        }))
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn version(&self) -> DdlVersion {
        self.layout.version
    }

    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    pub fn is_dynamic(&self) -> bool {
        self.layout.is_dynamic
    }

    /// Non-fatal problems found while resolving.
    pub fn problems(&self) -> &[Problem] {
        &self.layout.problems
    }

    pub fn static_layout(&self) -> &Arc<FlatLayout> {
        &self.static_layout
    }

    /// Minimum buffer size; for dynamic structs every dynamic array counts as empty.
    pub fn static_buffer_size(&self, repr: DataRepresentation) -> usize {
        self.static_layout.buffer_size(repr)
    }

    /// Number of statically known leaf elements.
    pub fn element_count(&self) -> usize {
        self.static_layout.leaves().len()
    }

    /// Leaf element by numeric index.
    pub fn element(&self, index: usize) -> Result<&LayoutNode, CodecError> {
        self.static_layout
            .leaves()
            .get(index)
            .and_then(|&n| self.static_layout.node(n))
            .ok_or_else(|| CodecError::NotFound(format!("{}: leaf index {}", self.name(), index)))
    }

    /// Element by name path; the empty path is the root struct.
    pub fn element_by_name(&self, path: &str) -> Result<&LayoutNode, CodecError> {
        self.static_layout
            .find(path)
            .and_then(|n| self.static_layout.node(n))
            .ok_or_else(|| CodecError::NotFound(format!("{}: element '{}'", self.name(), path)))
    }

    /// Leaf index of a name path; `None` when it does not name a static leaf.
    pub fn find_index(&self, path: &str) -> Option<usize> {
        let node = self.static_layout.find(path)?;
        self.static_layout.node(node)?.leaf_index
    }

    /// Placement for one buffer: shared when static, resolved from `data` when dynamic.
    pub fn layout_for(&self, data: &[u8], repr: DataRepresentation) -> Result<LayoutSource, CodecError> {
        let source = if self.layout.is_dynamic {
            LayoutSource::Instance(FlatLayout::build_bound(&self.layout, data, repr)?)
        } else {
            LayoutSource::Static(self.static_layout.clone())
        };
        let required = source.flat().buffer_size(repr);
        if data.len() < required {
            return Err(CodecError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }
        Ok(source)
    }

    pub fn make_decoder<'a>(self: &Arc<Self>, data: &'a [u8], repr: DataRepresentation) -> Result<Decoder<'a>, CodecError> {
        Decoder::new(self.clone(), data, repr)
    }

    pub fn make_codec<'a>(self: &Arc<Self>, data: &'a mut [u8], repr: DataRepresentation) -> Result<Codec<'a>, CodecError> {
        Codec::new(self.clone(), data, repr)
    }
}

/// Builds [`StructAccess`] objects and caches them by (type name, version).
///
/// A cache entry is reused as long as the content hash of the type and everything it
/// references is unchanged; otherwise the type is resolved again.
#[derive(Default)]
pub struct StructAccessFactory {
    resolvers: HashMap<DdlVersion, LayoutResolver>,
    cache: HashMap<(String, DdlVersion), Arc<StructAccess>>,
}

impl StructAccessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolver(&mut self, version: DdlVersion) -> &mut LayoutResolver {
        self.resolvers
            .entry(version)
            .or_insert_with(|| LayoutResolver::new(version))
    }

    /// Shared layout of a registered struct type resolved with `version`.
    pub fn build(&mut self, dd: &DataDefinition, name: &str, version: DdlVersion) -> Result<Arc<StructAccess>, CodecError> {
        let hash = dd.content_hash(name);
        let key = (name.to_string(), version);
        if let Some(hit) = self.cached(&key, hash) {
            return Ok(hit);
        }
        let layout = self
            .resolver(version)
            .resolve_struct(dd, name)
            .ok_or_else(|| CodecError::NotFound(format!("struct type '{}'", name)))?;
        let access = StructAccess::with_hash(layout, hash)?;
        self.cache.insert(key, access.clone());
        Ok(access)
    }

    /// Same as [`build`](Self::build) with the definition's document version.
    pub fn build_default(&mut self, dd: &DataDefinition, name: &str) -> Result<Arc<StructAccess>, CodecError> {
        self.build(dd, name, dd.version)
    }

    /// Shared layout of an element list that need not be registered in `dd`.
    pub fn build_description(
        &mut self,
        dd: &DataDefinition,
        description: &StructDescription,
        version: DdlVersion,
    ) -> Result<Arc<StructAccess>, CodecError> {
        let mut hasher = DefaultHasher::new();
        description.hash(&mut hasher);
        for e in &description.elements {
            dd.content_hash(&e.type_name).hash(&mut hasher);
        }
        let hash = hasher.finish();
        let key = (description.name.clone(), version);
        if let Some(hit) = self.cached(&key, hash) {
            return Ok(hit);
        }
        let layout = self.resolver(version).resolve_description(dd, description);
        let access = StructAccess::with_hash(layout, hash)?;
        self.cache.insert(key, access.clone());
        Ok(access)
    }

    fn cached(&self, key: &(String, DdlVersion), hash: u64) -> Option<Arc<StructAccess>> {
        match self.cache.get(key) {
            Some(hit) if hit.content_hash == hash => {
                log::trace!("[factory] cache hit for {} v{}", key.0, key.1);
                Some(hit.clone())
            }
            Some(_) => {
                log::debug!("[factory] {} v{} changed, rebuilding", key.0, key.1);
                None
            }
            None => {
                log::debug!("[factory] building {} v{}", key.0, key.1);
                None
            }
        }
    }

    /// Every problem of a type, without failing on invalid ones.
    pub fn problems(&mut self, dd: &DataDefinition, name: &str, version: DdlVersion) -> Vec<Problem> {
        self.resolver(version).problems(dd, name)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        for resolver in self.resolvers.values_mut() {
            resolver.invalidate();
        }
    }
}
