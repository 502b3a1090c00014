//! Picomag process-data frame codec.
//!
//! Wire format (IO-Link process data, big-endian):
//! ```text
//! ┌────────────┬──────────────────┬──────────────────┬──────────────┐
//! │ status (4B)│ totalizer f32 BE │ flow rate f32 BE │ trailer (3B) │
//! │  bytes 0-3 │    bytes 4-7 (L) │  bytes 8-11 (L/s)│  bytes 12-14 │
//! └────────────┴──────────────────┴──────────────────┴──────────────┘
//! ```
//!
//! Pure: no I/O, no state.  Values are returned as decoded; range
//! sanity is the caller's concern.

use super::FaultKind;

/// Longest process-data frame IO-Link can carry.
pub const MAX_FRAME_LEN: usize = 32;
/// Frame length of the reference flow meter.
pub const DEFAULT_FRAME_LEN: usize = 15;

const TOTALIZER_OFFSET: usize = 4;
const FLOW_RATE_OFFSET: usize = 8;
/// Bytes a frame must hold for both fields to be present.
pub const MIN_DECODABLE_LEN: usize = FLOW_RATE_OFFSET + 4;

/// Fixed-capacity raw frame.
pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// Decode a raw frame into `(totalizer_liters, flow_rate_l_per_s)`.
///
/// The meter reports the totalizer negated, so its sign is
/// normalised here.
pub fn decode(frame: &[u8], expected_len: usize) -> Result<(f64, f64), FaultKind> {
    if frame.len() < expected_len || frame.len() < MIN_DECODABLE_LEN {
        return Err(FaultKind::ShortFrame);
    }
    if frame.iter().all(|&b| b == 0) {
        return Err(FaultKind::AllZero);
    }

    let totalizer = read_f32_be(frame, TOTALIZER_OFFSET).ok_or(FaultKind::ShortFrame)?;
    let flow_rate = read_f32_be(frame, FLOW_RATE_OFFSET).ok_or(FaultKind::ShortFrame)?;

    Ok((f64::from(totalizer).abs(), f64::from(flow_rate)))
}

/// Build a frame in the meter's layout.  Used by simulators and tests.
pub fn encode(totalizer_liters: f32, flow_rate_l_per_s: f32, len: usize) -> Frame {
    let len = len.clamp(MIN_DECODABLE_LEN, MAX_FRAME_LEN);
    let mut frame = Frame::new();
    // Capacity is MAX_FRAME_LEN and len is clamped to it.
    let _ = frame.resize(len, 0);
    frame[TOTALIZER_OFFSET..TOTALIZER_OFFSET + 4].copy_from_slice(&totalizer_liters.to_be_bytes());
    frame[FLOW_RATE_OFFSET..FLOW_RATE_OFFSET + 4].copy_from_slice(&flow_rate_l_per_s.to_be_bytes());
    frame
}

fn read_f32_be(frame: &[u8], offset: usize) -> Option<f32> {
    let bytes: [u8; 4] = frame.get(offset..offset + 4)?.try_into().ok()?;
    Some(f32::from_be_bytes(bytes))
}
