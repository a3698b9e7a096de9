//! Decoder fuzz target: bind arbitrary bytes to a struct with bit fields, nested structs and
//! a dynamic array, in both representations. Binding may fail; reading every leaf and
//! transforming a bound buffer must not panic.
//! Build with: cargo fuzz run decoder_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use ddlcodec::{
    transform_to_buffer, DataDefinition, DataRepresentation, DdlVersion, ElementDescriptor, StructAccessFactory,
    StructDescription,
};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let mut dd = DataDefinition::new(DdlVersion::V4_1);
    let _ = dd.add_struct(
        StructDescription::new("tSample")
            .element(ElementDescriptor::new("kind", "tUInt8").num_bits(3))
            .element(ElementDescriptor::new("level", "tInt8").num_bits(5))
            .element(ElementDescriptor::new("value", "tFloat32").big_endian()),
    );
    let _ = dd.add_struct(
        StructDescription::new("tFrame")
            .element(ElementDescriptor::new("id", "tUInt16").big_endian())
            .element(ElementDescriptor::new("count", "tUInt8"))
            .element(ElementDescriptor::new("samples", "tSample").dynamic_array("count"))
            .element(ElementDescriptor::new("crc", "tUInt32").byte_pos(2)),
    );
    let Ok(access) = StructAccessFactory::new().build_default(&dd, "tFrame") else {
        return;
    };
    for repr in [DataRepresentation::Serialized, DataRepresentation::Deserialized] {
        let Ok(decoder) = access.make_decoder(data, repr) else {
            continue;
        };
        for leaf in decoder.leaf_elements() {
            let _ = leaf.get_variant_value();
            let _ = leaf.get_string_value();
        }
        let mut out = Vec::new();
        let _ = transform_to_buffer(&decoder, &mut out, true);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decoder_fuzz");
}
