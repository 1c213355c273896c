// tests/integration/fixtures.rs

//! Common test fixtures and payload generators

use bytes::Bytes;

/// Size of the small payload used by the offset scenarios.
pub const SMALL_PAYLOAD_LEN: usize = 100;

/// The 100 known bytes `b[i] = i`.
pub fn small_payload() -> Bytes {
    Bytes::from((0..SMALL_PAYLOAD_LEN as u8).collect::<Vec<u8>>())
}

/// Generates a payload of `size` bytes whose content depends on the position,
/// so duplicated or dropped chunks show up as mismatches.
pub fn patterned_payload(size: usize) -> Bytes {
    Bytes::from(
        (0..size)
            .map(|i| (i % 251) as u8 ^ (i / 251) as u8)
            .collect::<Vec<u8>>(),
    )
}

/// Large enough that streaming it spans many loop iterations and fills the
/// socket buffers.
pub fn large_payload() -> Bytes {
    patterned_payload(4 * 1024 * 1024)
}
