//! Fuzz target: `sensors::frame::decode`
//!
//! Drives arbitrary process-data bytes through the flow-meter decoder at
//! every expected length and asserts that it never panics and never
//! yields a negative totalizer.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use tankfill::sensors::FaultKind;
use tankfill::sensors::frame::{MAX_FRAME_LEN, MIN_DECODABLE_LEN, decode};

fuzz_target!(|data: &[u8]| {
    let frame = &data[..data.len().min(MAX_FRAME_LEN)];

    for expected in 0..=MAX_FRAME_LEN {
        match decode(frame, expected) {
            Ok((totalizer, _)) => {
                assert!(frame.len() >= expected.max(MIN_DECODABLE_LEN));
                assert!(!(totalizer < 0.0), "negative totalizer");
            }
            Err(FaultKind::ShortFrame) => assert!(frame.len() < expected.max(MIN_DECODABLE_LEN)),
            Err(FaultKind::AllZero) => assert!(frame.iter().all(|b| *b == 0)),
            Err(other) => panic!("decoder produced {other}"),
        }
    }
});
