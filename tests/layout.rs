//! Layout resolution: alignment, version padding, pinned positions, dynamic markers, problems.

use ddlcodec::access::StructAccessFactory;
use ddlcodec::definition::{DataDefinition, DdlVersion, ElementDescriptor, StructDescription};
use ddlcodec::layout::LayoutResolver;
use ddlcodec::problem::Severity;
use ddlcodec::{deserialize, CodecError, DataRepresentation};
use std::sync::Arc;

fn aligned_struct() -> StructDescription {
    StructDescription::new("tAlignedStruct")
        .element(
            ElementDescriptor::new("firstvalue", "tUInt16")
                .byte_pos(0)
                .alignment(1)
                .big_endian(),
        )
        .element(ElementDescriptor::new("secondvalue", "tUInt8").byte_pos(2).alignment(8))
}

fn definition(structs: Vec<StructDescription>) -> DataDefinition {
    let mut dd = DataDefinition::new(DdlVersion::V4_1);
    for s in structs {
        dd.add_struct(s).expect("add struct");
    }
    dd
}

#[test]
fn aligned_struct_size_depends_on_version() {
    let dd = definition(vec![aligned_struct()]);
    let mut factory = StructAccessFactory::new();

    let v20 = factory.build(&dd, "tAlignedStruct", DdlVersion::V2_0).expect("v2.0");
    assert_eq!(v20.static_buffer_size(DataRepresentation::Deserialized), 9);
    assert_eq!(v20.static_buffer_size(DataRepresentation::Serialized), 3);
    let second = v20.element_by_name("secondvalue").expect("secondvalue");
    assert_eq!(second.deserialized_offset, 8);
    assert_eq!(second.serialized_bit_offset, 16);

    let v30 = factory.build(&dd, "tAlignedStruct", DdlVersion::V3_0).expect("v3.0");
    assert_eq!(v30.static_buffer_size(DataRepresentation::Deserialized), 16);
    assert_eq!(v30.static_buffer_size(DataRepresentation::Serialized), 3);
    assert!(!Arc::ptr_eq(&v20, &v30));
}

#[test]
fn array_cells_padded_before_version_3() {
    let s = StructDescription::new("tArr")
        .element(ElementDescriptor::new("a", "tUInt8"))
        .element(ElementDescriptor::new("arr", "tUInt16").array(3).alignment(4));
    let dd = definition(vec![s]);
    let mut factory = StructAccessFactory::new();

    let v20 = factory.build(&dd, "tArr", DdlVersion::V2_0).expect("v2.0");
    let cells: Vec<usize> = (0..3)
        .map(|k| v20.element_by_name(&format!("arr[{}]", k)).expect("cell").deserialized_offset)
        .collect();
    assert_eq!(cells, vec![4, 8, 12]);
    assert_eq!(v20.layout().elements[1].deserialized_byte_size, Some(10));
    assert_eq!(v20.static_buffer_size(DataRepresentation::Deserialized), 14);

    let v30 = factory.build(&dd, "tArr", DdlVersion::V3_0).expect("v3.0");
    let cells: Vec<usize> = (0..3)
        .map(|k| v30.element_by_name(&format!("arr[{}]", k)).expect("cell").deserialized_offset)
        .collect();
    assert_eq!(cells, vec![4, 6, 8]);
    assert_eq!(v30.layout().elements[1].deserialized_byte_size, Some(6));
    assert_eq!(v30.static_buffer_size(DataRepresentation::Deserialized), 12);

    // Serialized cells are packed in every version.
    for access in [&v20, &v30] {
        assert_eq!(access.element_by_name("arr[2]").expect("cell").serialized_bit_offset, 40);
        assert_eq!(access.static_buffer_size(DataRepresentation::Serialized), 7);
    }
}

#[test]
fn struct_array_cells_follow_version() {
    let dd = definition(vec![
        aligned_struct(),
        StructDescription::new("tAlignedStructArray")
            .element(ElementDescriptor::new("first", "tUInt8"))
            .element(ElementDescriptor::new("items", "tAlignedStruct").array(5).alignment(4))
            .element(ElementDescriptor::new("tail", "tUInt8").alignment(8)),
    ]);
    let mut factory = StructAccessFactory::new();
    let offsets = |access: &Arc<ddlcodec::StructAccess>, repr: DataRepresentation| -> Vec<usize> {
        (0..5)
            .map(|k| {
                let cell = access.element_by_name(&format!("items[{}]", k)).expect("cell");
                match repr {
                    DataRepresentation::Deserialized => cell.deserialized_offset,
                    DataRepresentation::Serialized => cell.serialized_bit_offset,
                }
            })
            .collect()
    };

    // 2.00: cells of 9 bytes padded to the element alignment of 4, no tail padding.
    let v20 = factory.build(&dd, "tAlignedStructArray", DdlVersion::V2_0).expect("v2.0");
    assert_eq!(offsets(&v20, DataRepresentation::Deserialized), vec![4, 16, 28, 40, 52]);
    assert_eq!(v20.layout().elements[1].deserialized_byte_size, Some(57));
    assert_eq!(v20.element_by_name("items[2].secondvalue").expect("second").deserialized_offset, 36);
    assert_eq!(v20.element_by_name("tail").expect("tail").deserialized_offset, 64);
    assert_eq!(v20.static_buffer_size(DataRepresentation::Deserialized), 65);

    // 3.00: cells take the struct's aligned size of 16, struct rounded to 8.
    let v30 = factory.build(&dd, "tAlignedStructArray", DdlVersion::V3_0).expect("v3.0");
    assert_eq!(offsets(&v30, DataRepresentation::Deserialized), vec![4, 20, 36, 52, 68]);
    assert_eq!(v30.layout().elements[1].deserialized_byte_size, Some(80));
    assert_eq!(v30.element_by_name("items[2].secondvalue").expect("second").deserialized_offset, 44);
    assert_eq!(v30.element_by_name("tail").expect("tail").deserialized_offset, 88);
    assert_eq!(v30.static_buffer_size(DataRepresentation::Deserialized), 96);

    // Serialized cells are 3 packed bytes in both versions.
    for access in [&v20, &v30] {
        assert_eq!(offsets(access, DataRepresentation::Serialized), vec![8, 32, 56, 80, 104]);
        assert_eq!(access.element_by_name("items[2].secondvalue").expect("second").serialized_bit_offset, 72);
        assert_eq!(access.static_buffer_size(DataRepresentation::Serialized), 17);
    }

    let mut serialized = [0u8; 17];
    serialized[13..16].copy_from_slice(&[0x12, 0x34, 0x56]);
    serialized[16] = 0x77;
    let old = deserialize(&v20, &serialized).expect("v2.0");
    assert_eq!(old.len(), 65);
    assert_eq!(&old[52..54], &0x1234u16.to_ne_bytes());
    assert_eq!(old[60], 0x56);
    assert_eq!(old[64], 0x77);
    let new = deserialize(&v30, &serialized).expect("v3.0");
    assert_eq!(new.len(), 96);
    assert_eq!(&new[68..70], &0x1234u16.to_ne_bytes());
    assert_eq!(new[76], 0x56);
    assert_eq!(new[88], 0x77);
}

#[test]
fn struct_version_override() {
    let dd = definition(vec![aligned_struct().version(DdlVersion::V2_0)]);
    let access = StructAccessFactory::new()
        .build(&dd, "tAlignedStruct", DdlVersion::V4_1)
        .expect("build");
    assert_eq!(access.version(), DdlVersion::V2_0);
    assert_eq!(access.static_buffer_size(DataRepresentation::Deserialized), 9);
}

#[test]
fn offsets_are_aligned_and_monotonic() {
    let s = StructDescription::new("tMixed")
        .element(ElementDescriptor::new("a", "tUInt8"))
        .element(ElementDescriptor::new("b", "tFloat64"))
        .element(ElementDescriptor::new("c", "tInt16").array(3))
        .element(ElementDescriptor::new("d", "tUInt32").alignment(16))
        .element(ElementDescriptor::new("e", "tBool").num_bits(1))
        .element(ElementDescriptor::new("f", "tUInt64").num_bits(33));
    let dd = definition(vec![s]);
    let access = StructAccessFactory::new().build_default(&dd, "tMixed").expect("build");
    let elements = &access.layout().elements;
    for e in elements {
        let pos = e.deserialized_byte_pos.expect("static");
        assert_eq!(pos % e.alignment, 0, "{} misaligned", e.name);
    }
    for pair in elements.windows(2) {
        let (p, q) = (&pair[0], &pair[1]);
        assert!(p.deserialized_byte_pos.unwrap() + p.deserialized_byte_size.unwrap() <= q.deserialized_byte_pos.unwrap());
        assert_eq!(p.serialized_bit_pos.unwrap() + p.serialized_bit_size.unwrap(), q.serialized_bit_pos.unwrap());
    }
    let positions: Vec<usize> = elements.iter().map(|e| e.deserialized_byte_pos.unwrap()).collect();
    assert_eq!(positions, vec![0, 8, 16, 32, 36, 40]);
    assert_eq!(access.static_buffer_size(DataRepresentation::Deserialized), 48);
    // 8 + 64 + 48 + 32 + 1 + 33 bits
    assert_eq!(access.static_buffer_size(DataRepresentation::Serialized), 24);
}

#[test]
fn nested_struct_placement() {
    let inner = StructDescription::new("tInner")
        .element(ElementDescriptor::new("a", "tUInt8"))
        .element(ElementDescriptor::new("b", "tUInt32"));
    let outer = StructDescription::new("tOuter")
        .element(ElementDescriptor::new("x", "tUInt8"))
        .element(ElementDescriptor::new("inner", "tInner"))
        .element(ElementDescriptor::new("y", "tUInt16"));
    let dd = definition(vec![inner, outer]);
    let access = StructAccessFactory::new().build_default(&dd, "tOuter").expect("build");

    let b = access.element_by_name("inner.b").expect("inner.b");
    assert_eq!(b.deserialized_offset, 8);
    assert_eq!(b.serialized_bit_offset, 16);
    let y = access.element_by_name("y").expect("y");
    assert_eq!(y.deserialized_offset, 12);
    assert_eq!(y.serialized_bit_offset, 48);
    assert_eq!(access.static_buffer_size(DataRepresentation::Deserialized), 16);
    assert_eq!(access.static_buffer_size(DataRepresentation::Serialized), 8);
    assert_eq!(access.element_count(), 4);
    assert_eq!(access.find_index("inner.b"), Some(2));
    assert_eq!(access.find_index("inner"), None);
}

#[test]
fn dynamic_markers_and_static_size() {
    let s = StructDescription::new("tDyn")
        .element(ElementDescriptor::new("n", "tUInt8"))
        .element(ElementDescriptor::new("arr", "tUInt16").dynamic_array("n"))
        .element(ElementDescriptor::new("t", "tUInt32"))
        .element(ElementDescriptor::new("pinned", "tUInt8").byte_pos(10));
    let dd = definition(vec![s]);
    let access = StructAccessFactory::new().build_default(&dd, "tDyn").expect("build");
    assert!(access.is_dynamic());

    let e = &access.layout().elements;
    assert!(!e[0].is_dynamic && !e[0].is_after_dynamic);
    assert!(e[1].is_dynamic && !e[1].is_after_dynamic);
    assert_eq!(e[1].deserialized_byte_pos, Some(2));
    assert_eq!(e[1].deserialized_byte_size, None);
    assert!(e[2].is_after_dynamic);
    assert_eq!(e[2].deserialized_byte_pos, None);
    assert_eq!(e[2].serialized_bit_pos, None);
    assert_eq!(e[3].serialized_bit_pos, Some(80));
    assert_eq!(e[3].deserialized_byte_pos, None);

    // Dynamic arrays count as empty.
    assert_eq!(access.static_buffer_size(DataRepresentation::Deserialized), 12);
    assert_eq!(access.static_buffer_size(DataRepresentation::Serialized), 11);
}

#[test]
fn invalid_descriptions_are_reported_as_problems() {
    let cases = vec![
        (ElementDescriptor::new("v", "tUInt32").alignment(3), "alignment 3"),
        (ElementDescriptor::new("v", "tNoSuchType"), "unknown type"),
        (ElementDescriptor::new("v", "tUInt8").num_bits(0), "bit count 0"),
        (ElementDescriptor::new("v", "tUInt8").num_bits(9), "exceeds"),
        (ElementDescriptor::new("v", "tUInt8").array(0), "array size 0"),
        (ElementDescriptor::new("v", "tUInt8").dynamic_array("missing"), "not found"),
    ];
    for (element, needle) in cases {
        let dd = definition(vec![StructDescription::new("tBad").element(element)]);
        let mut factory = StructAccessFactory::new();
        match factory.build_default(&dd, "tBad") {
            Err(CodecError::Structural { type_name, problems }) => {
                assert_eq!(type_name, "tBad");
                assert!(
                    problems
                        .iter()
                        .any(|p| p.severity == Severity::Invalid && p.message.contains(needle)),
                    "expected '{}' in {:?}",
                    needle,
                    problems
                );
            }
            other => panic!("expected structural error for '{}', got {:?}", needle, other),
        }
        let problems = factory.problems(&dd, "tBad", DdlVersion::V4_1);
        assert_eq!(problems[0].element_name.as_deref(), Some("v"));
    }
}

#[test]
fn dynamic_size_must_come_from_earlier_integer() {
    let later = StructDescription::new("tLater")
        .element(ElementDescriptor::new("arr", "tUInt8").dynamic_array("n"))
        .element(ElementDescriptor::new("n", "tUInt8"));
    let float = StructDescription::new("tFloat")
        .element(ElementDescriptor::new("n", "tFloat32"))
        .element(ElementDescriptor::new("arr", "tUInt8").dynamic_array("n"));
    let dd = definition(vec![later, float]);
    let mut factory = StructAccessFactory::new();
    assert!(matches!(factory.build_default(&dd, "tLater"), Err(CodecError::Structural { .. })));
    assert!(matches!(factory.build_default(&dd, "tFloat"), Err(CodecError::Structural { .. })));
}

#[test]
fn good_enough_problems_do_not_block() {
    let s = StructDescription::new("tLoose")
        .element(ElementDescriptor::new("v", "tUInt8").bit_pos(3))
        .element(ElementDescriptor::new("w", "tUInt8").default_value("not a number"));
    let dd = definition(vec![s]);
    let access = StructAccessFactory::new().build_default(&dd, "tLoose").expect("usable");
    assert_eq!(access.problems().len(), 2);
    assert!(access.problems().iter().all(|p| p.severity == Severity::GoodEnough));
    // bit_pos without byte_pos is ignored: v appends at bit 0.
    assert_eq!(access.element_by_name("v").expect("v").serialized_bit_offset, 0);
    assert_eq!(access.layout().elements[1].default, None);
}

#[test]
fn cycles_are_reported_not_fatal() {
    let a = StructDescription::new("tA").element(ElementDescriptor::new("b", "tB"));
    let b = StructDescription::new("tB").element(ElementDescriptor::new("a", "tA"));
    let ok = StructDescription::new("tOk").element(ElementDescriptor::new("v", "tUInt8"));
    let dd = definition(vec![a, b, ok]);
    let mut factory = StructAccessFactory::new();
    match factory.build_default(&dd, "tA") {
        Err(CodecError::Structural { problems, .. }) => {
            assert!(problems.iter().any(|p| p.message.contains("contains itself")));
        }
        other => panic!("expected structural error, got {:?}", other),
    }
    assert!(factory.build_default(&dd, "tOk").is_ok());
}

#[test]
fn unknown_struct_is_not_found() {
    let dd = definition(vec![]);
    assert!(matches!(
        StructAccessFactory::new().build_default(&dd, "tNothing"),
        Err(CodecError::NotFound(_))
    ));
}

#[test]
fn factory_cache_follows_content() {
    let mut dd = definition(vec![aligned_struct()]);
    let mut factory = StructAccessFactory::new();
    let first = factory.build_default(&dd, "tAlignedStruct").expect("build");
    let hit = factory.build_default(&dd, "tAlignedStruct").expect("hit");
    assert!(Arc::ptr_eq(&first, &hit));

    // Same content again: still the cached layout.
    dd.set_struct(aligned_struct());
    let same = factory.build_default(&dd, "tAlignedStruct").expect("same");
    assert!(Arc::ptr_eq(&first, &same));

    dd.set_struct(aligned_struct().element(ElementDescriptor::new("third", "tUInt32")));
    let changed = factory.build_default(&dd, "tAlignedStruct").expect("changed");
    assert!(!Arc::ptr_eq(&first, &changed));
    assert_eq!(changed.element_count(), 3);
    // Old holders keep their layout alive.
    assert_eq!(first.element_count(), 2);
}

#[test]
fn ad_hoc_descriptions() {
    let dd = definition(vec![]);
    let mut factory = StructAccessFactory::new();
    let access = factory
        .build_description(&dd, &aligned_struct(), DdlVersion::V2_0)
        .expect("description");
    assert_eq!(access.static_buffer_size(DataRepresentation::Deserialized), 9);
    let again = factory
        .build_description(&dd, &aligned_struct(), DdlVersion::V2_0)
        .expect("again");
    assert!(Arc::ptr_eq(&access, &again));

    let mut resolver = LayoutResolver::new(DdlVersion::V3_0);
    let layout = resolver.resolve_description(&dd, &aligned_struct());
    assert_eq!(layout.deserialized_byte_size, 16);
    assert!(layout.problems.is_empty());
}
