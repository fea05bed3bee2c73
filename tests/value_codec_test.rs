//! Text <-> guest bytes round trips for every element type

use dolphin_memory::core::types::{
    format_memory, parse_memory, ErrorKind, MemBase, MemType, Signedness, StringEncoding,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn round_trip(bytes: &[u8], ty: MemType, base: MemBase, signedness: Signedness) -> Vec<u8> {
    let text = format_memory(bytes, ty, base, signedness);
    parse_memory(&text, ty, base, signedness, bytes.len()).unwrap()
}

proptest! {
    #[test]
    fn integers_round_trip(
        raw in any::<u64>(),
        ty in prop_oneof![
            Just(MemType::Byte),
            Just(MemType::Halfword),
            Just(MemType::Word),
            Just(MemType::Doubleword),
        ],
        base in prop_oneof![
            Just(MemBase::Decimal),
            Just(MemBase::Hexadecimal),
            Just(MemBase::Octal),
            Just(MemBase::Binary),
        ],
        unsigned in any::<bool>(),
    ) {
        let size = ty.size(1);
        let bytes = raw.to_be_bytes()[8 - size..].to_vec();
        let signedness = if unsigned { Signedness::Unsigned } else { Signedness::Signed };
        prop_assert_eq!(round_trip(&bytes, ty, base, signedness), bytes);
    }

    #[test]
    fn floats_round_trip(bits in any::<u32>().prop_filter("finite", |b| f32::from_bits(*b).is_finite())) {
        let bytes = bits.to_be_bytes();
        prop_assert_eq!(round_trip(&bytes, MemType::Float, MemBase::Decimal, Signedness::Signed), bytes.to_vec());
        prop_assert_eq!(round_trip(&bytes, MemType::Float, MemBase::Hexadecimal, Signedness::Signed), bytes.to_vec());
    }

    #[test]
    fn doubles_round_trip(bits in any::<u64>().prop_filter("finite", |b| f64::from_bits(*b).is_finite())) {
        let bytes = bits.to_be_bytes();
        prop_assert_eq!(round_trip(&bytes, MemType::Double, MemBase::Decimal, Signedness::Signed), bytes.to_vec());
    }

    #[test]
    fn byte_arrays_round_trip(bytes in proptest::collection::vec(any::<u8>(), 1..32)) {
        prop_assert_eq!(round_trip(&bytes, MemType::ByteArray, MemBase::Hexadecimal, Signedness::Signed), bytes);
    }

    #[test]
    fn strings_round_trip(text in "[A-Za-z0-9 ]{1,16}") {
        for encoding in [StringEncoding::Utf8, StringEncoding::Utf16, StringEncoding::Utf32] {
            let ty = MemType::String(encoding);
            let bytes = parse_memory(&text, ty, MemBase::Decimal, Signedness::Signed, 16).unwrap();
            prop_assert_eq!(format_memory(&bytes, ty, MemBase::Decimal, Signedness::Signed), text.clone());
        }
    }
}

#[test]
fn out_of_range_terms_are_invalid_input() {
    let err = parse_memory("256", MemType::Byte, MemBase::Decimal, Signedness::Unsigned, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = parse_memory("-129", MemType::Byte, MemBase::Decimal, Signedness::Signed, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(parse_memory("1.5", MemType::Word, MemBase::Decimal, Signedness::Signed, 1).is_err());
}

#[test]
fn oversized_terms_are_input_too_long() {
    let err = parse_memory(
        "MARIO KART",
        MemType::String(StringEncoding::Utf16),
        MemBase::Decimal,
        Signedness::Signed,
        4,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputTooLong);

    let err = parse_memory("AA BB CC", MemType::ByteArray, MemBase::Hexadecimal, Signedness::Signed, 2)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputTooLong);
}

#[test]
fn display_examples() {
    let word = [0xFF, 0xFF, 0xFF, 0xFE];
    assert_eq!(format_memory(&word, MemType::Word, MemBase::Decimal, Signedness::Signed), "-2");
    assert_eq!(format_memory(&word, MemType::Word, MemBase::Decimal, Signedness::Unsigned), "4294967294");
    assert_eq!(format_memory(&word, MemType::Word, MemBase::Hexadecimal, Signedness::Signed), "FFFFFFFE");
    assert_eq!(format_memory(&[0xDE, 0xAD], MemType::ByteArray, MemBase::Hexadecimal, Signedness::Signed), "DE AD");
}
