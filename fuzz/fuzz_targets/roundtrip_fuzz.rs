#![no_main]
use libfuzzer_sys::fuzz_target;
use snapwire::snapshot::decode_snapshot;
use snapwire::wire::tag::ALL_TAGS;
use snapwire::wire::{BitVector, Slot, TypeTag, Value, WireEncoder, WireLong};

/// Build one scalar of a simple type from the next bytes of `data`.
fn value_for(tag: TypeTag, data: &[u8]) -> Value {
    let mut word = [0u8; 8];
    let n = data.len().min(8);
    word[..n].copy_from_slice(&data[..n]);
    let raw = u64::from_be_bytes(word);
    match tag {
        TypeTag::Byte => Value::Byte(raw as i8),
        TypeTag::Short => Value::Short(raw as i16),
        TypeTag::Int => Value::Int(raw as i32),
        TypeTag::Long => Value::Long(WireLong::from_i64(raw as i64)),
        TypeTag::Float => Value::Float(f32::from_bits(raw as u32)),
        TypeTag::Boolean => Value::Boolean(raw & 1 == 1),
        TypeTag::String => Value::String(String::from_utf8_lossy(&data[..n]).into_owned()),
        _ => Value::BitVector(BitVector(data.iter().map(|b| b & 1 == 1).collect())),
    }
}

fuzz_target!(|data: &[u8]| {
    // Each chunk picks a field type from its first byte and a value from the
    // rest; the object built from them must decode to the same slots.
    let simple: Vec<TypeTag> = ALL_TAGS.into_iter().filter(|t| t.is_simple_type()).collect();
    let fields: Vec<Value> = data
        .chunks(9)
        .take(64)
        .map(|chunk| value_for(simple[chunk[0] as usize % simple.len()], &chunk[1..]))
        .collect();

    let mut enc = WireEncoder::new();
    enc.multiple_descriptions(1)
        .object_description(1, None, fields.len() as u32);
    for (i, value) in fields.iter().enumerate() {
        enc.scalar_description(2 + i as u32, None, value.tag());
    }
    enc.object(1);
    for value in &fields {
        enc.value(value);
    }

    let (snapshot, _) = decode_snapshot(enc.into_bytes()).unwrap();
    let slots = &snapshot.trees[0].slots;
    assert_eq!(slots.len(), fields.len());
    for (slot, value) in slots.iter().zip(&fields) {
        match (slot, value) {
            (Slot::Value(Value::Float(a)), Value::Float(b)) => assert_eq!(a.to_bits(), b.to_bits()),
            (Slot::Value(decoded), expected) => assert_eq!(decoded, expected),
            (other, _) => panic!("unexpected slot {other:?}"),
        }
    }
});
