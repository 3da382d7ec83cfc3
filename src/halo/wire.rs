//! Fixed little-endian wire format and the transport tag space.
//!
//! Tag ranges are disjoint by construction. In particular the neighbour
//! assignment tags start at [`NEIGHBOUR_BASE`] rather than reusing the raw
//! direction indices 0..7, so a direction's array index can never collide
//! with another message category's tag.

use crate::comm::CommTag;
use crate::error::DenoiseError;
use crate::grid::direction::Direction;

/// Coordinator -> worker: sub-image row count (`i32`).
pub const ROWS: CommTag = CommTag::new(40);
/// Coordinator -> worker: sub-image column count (`i32`).
pub const COLUMNS: CommTag = CommTag::new(41);
/// Worker <-> worker: boundary question (`i32` position).
pub const QUESTION: CommTag = CommTag::new(500);
/// Worker <-> worker: boundary answer (`i32` partial sum).
pub const ANSWER: CommTag = CommTag::new(600);
/// Worker <-> worker: termination announcement (empty payload).
pub const FINISHED: CommTag = CommTag::new(700);
/// Coordinator -> worker: neighbour assignment, offset by direction index.
pub const NEIGHBOUR_BASE: CommTag = CommTag::new(16);
/// Coordinator -> worker: initial image row `i` at `IMAGE_BASE + i`.
pub const IMAGE_BASE: CommTag = CommTag::new(0x1000);
/// Worker -> coordinator: final image row `i` at `RESULT_BASE + i`.
pub const RESULT_BASE: CommTag = CommTag::new(0x8000);

/// Tag of the neighbour assignment message for `d`.
#[inline]
pub const fn neighbour_tag(d: Direction) -> CommTag {
    NEIGHBOUR_BASE.offset(d.index() as u16)
}

/// Bytes of a scalar on the wire.
pub const SCALAR_LEN: usize = 4;

#[inline]
pub fn encode_i32(v: i32) -> [u8; SCALAR_LEN] {
    v.to_le_bytes()
}

/// Decode an `i32` scalar, attributing a bad length to `peer`.
pub fn decode_i32(peer: usize, bytes: &[u8]) -> Result<i32, DenoiseError> {
    let arr: [u8; SCALAR_LEN] =
        bytes
            .try_into()
            .map_err(|_| DenoiseError::BufferSize {
                peer,
                expected: SCALAR_LEN,
                got: bytes.len(),
            })?;
    Ok(i32::from_le_bytes(arr))
}

/// Pixel rows travel as one byte per pixel.
#[inline]
pub fn pixels_as_bytes(pixels: &[i8]) -> &[u8] {
    bytemuck::cast_slice(pixels)
}

#[inline]
pub fn bytes_as_pixels(bytes: &[u8]) -> &[i8] {
    bytemuck::cast_slice(bytes)
}

// Tag-space disjointness is a protocol invariant, not a convention.
const _: () = {
    assert!(NEIGHBOUR_BASE.get() > Direction::NorthWest as u16);
    assert!(ROWS.get() > NEIGHBOUR_BASE.get() + 7);
    assert!(COLUMNS.get() > ROWS.get());
    assert!(QUESTION.get() > COLUMNS.get());
    assert!(ANSWER.get() > QUESTION.get());
    assert!(FINISHED.get() > ANSWER.get());
    assert!(IMAGE_BASE.get() > FINISHED.get());
    assert!(RESULT_BASE.get() > IMAGE_BASE.get());
};
