//! Property tests for report encoding.

use procon_gadget::controller::{Button, InputState};
use procon_gadget::protocol::codec::{
    encode_input_snapshot, frame, pack_12bit_pair, quantize_axis, unpack_12bit_pair,
    MAX_PAYLOAD_LEN, REPORT_LEN, STICK_MAX,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn twelve_bit_pairs_survive_packing(a in 0u16..=STICK_MAX, b in 0u16..=STICK_MAX) {
        prop_assert_eq!(unpack_12bit_pair(pack_12bit_pair(a, b)), (a, b));
    }

    #[test]
    fn quantized_axis_stays_in_range(axis in any::<f64>()) {
        prop_assert!(quantize_axis(axis) <= STICK_MAX);
    }

    #[test]
    fn quantization_is_monotonic(a in -1.0f64..=1.0, b in -1.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(quantize_axis(lo) <= quantize_axis(hi));
    }

    #[test]
    fn framed_payload_is_zero_padded(
        id in any::<u8>(),
        seq in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN),
    ) {
        let report = frame(id, seq, &payload).unwrap();
        prop_assert_eq!(report.len(), REPORT_LEN);
        prop_assert_eq!(report[0], id);
        prop_assert_eq!(report[1], seq);
        prop_assert_eq!(&report[2..2 + payload.len()], payload.as_slice());
        prop_assert!(report[2 + payload.len()..].iter().all(|b| *b == 0));
    }

    #[test]
    fn oversized_payload_is_rejected(len in MAX_PAYLOAD_LEN + 1..200usize) {
        prop_assert!(frame(0x21, 0, &vec![0xaa; len]).is_err());
    }

    #[test]
    fn snapshot_sticks_decode_to_quantized_axes(
        lx in -1.0f64..=1.0,
        ly in -1.0f64..=1.0,
        rx in -1.0f64..=1.0,
        ry in -1.0f64..=1.0,
    ) {
        let mut state = InputState::default();
        state.left_stick.x = lx;
        state.left_stick.y = ly;
        state.right_stick.x = rx;
        state.right_stick.y = ry;

        let snapshot = encode_input_snapshot(&state);
        prop_assert_eq!(
            unpack_12bit_pair([snapshot[4], snapshot[5], snapshot[6]]),
            (quantize_axis(lx), quantize_axis(ly))
        );
        prop_assert_eq!(
            unpack_12bit_pair([snapshot[7], snapshot[8], snapshot[9]]),
            (quantize_axis(rx), quantize_axis(ry))
        );
        prop_assert_eq!(snapshot[10], 0);
    }

    #[test]
    fn any_button_set_leaves_the_sticks_alone(mask in any::<u32>()) {
        let mut state = InputState::default();
        for (i, button) in Button::ALL.iter().enumerate() {
            state.set(*button, mask & (1 << i) != 0);
        }

        let snapshot = encode_input_snapshot(&state);
        let pressed = Button::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .count();
        let bits = snapshot[1..4].iter().map(|b| b.count_ones() as usize).sum::<usize>();
        prop_assert_eq!(bits, pressed);
        prop_assert_eq!(snapshot[0], 0x81);
        prop_assert_eq!(&snapshot[4..10], &[0x00, 0x08, 0x80, 0x00, 0x08, 0x80]);
    }
}
