use decimate_core::attribute_data::AttributeData;
use decimate_core::attribute_remap::{remap, ConflictPolicy};
use decimate_core::base64;
use decimate_core::data_types::ComponentType;
use proptest::prelude::*;

proptest! {
    #[test]
    fn base64_decode_inverts_encode(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let text = base64::encode(&data);
        prop_assert_eq!(text.len() % 4, 0);
        prop_assert_eq!(base64::decode(&text, 0).unwrap(), data);
    }

    #[test]
    fn base64_decode_after_prefix(data in prop::collection::vec(any::<u8>(), 1..64)) {
        let uri = format!("data:application/octet-stream;base64,{}", base64::encode(&data));
        let offset = uri.find(',').unwrap() + 1;
        prop_assert_eq!(base64::decode(&uri, offset).unwrap(), data);
    }

    #[test]
    fn remap_under_identity_is_unchanged(
        width in 1usize..=16,
        vertex_count in 1usize..32,
        seed in prop::collection::vec(any::<i16>(), 16 * 32),
        slots in prop::collection::vec(any::<prop::sample::Index>(), 0..96),
    ) {
        let values: Vec<i16> = seed[..vertex_count * width].to_vec();
        let data = AttributeData::I16(values);

        // Every vertex is referenced at least once so nothing stays zero.
        let mut indices: Vec<u32> = (0..vertex_count as u32).collect();
        indices.extend(slots.iter().map(|s| s.index(vertex_count) as u32));

        let out = remap(&data, width, vertex_count, &indices, &indices, ConflictPolicy::default()).unwrap();
        prop_assert_eq!(out, data);
    }

    #[test]
    fn component_bounds_match_scan(
        width in 1usize..=16,
        values in prop::collection::vec(-1.0e6f32..1.0e6, 16..256),
    ) {
        let len = values.len() - values.len() % width;
        let data = AttributeData::F32(values[..len].to_vec());
        let (min, max) = data.component_bounds(width);
        for k in 0..width {
            let column = values[..len].iter().skip(k).step_by(width).map(|&v| f64::from(v));
            let expected_min = column.clone().fold(f64::INFINITY, f64::min);
            let expected_max = column.fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(min[k], expected_min);
            prop_assert_eq!(max[k], expected_max);
        }
    }
}

#[test]
fn test_le_bytes_for_every_component_type() {
    for component_type in ComponentType::ALL {
        let bytes: Vec<u8> = (0..component_type.byte_length() as u8 * 3).collect();
        let data = AttributeData::from_le_bytes(component_type, &bytes).unwrap();
        assert_eq!(data.component_type(), component_type);
        assert_eq!(data.len(), 3);
        assert_eq!(data.to_le_bytes(), bytes);
    }
}
