// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed views over a caller-supplied scratch arena.
//!
//! This crate never allocates: every per-call working buffer (the nibble-domain codeword
//! buffer, the per-codeword trust array, the mode-detector's candidate table) is carved out of
//! a single `&mut [u8]` the caller owns. [`EncodeScratch`] and [`DecodeScratch`] just give that
//! carving named, bounds-checked accessors instead of making every call site compute offsets by
//! hand.
//!
//! The Reed-Solomon shift register used internally by [`crate::rs::rs_encode`] is not part of
//! this arena: at 6 nibbles it is cheaper to keep on the stack than to thread through an extra
//! borrow.

use crate::tables::{MAX_CODEWORDS, MAX_MODES};

/// Bytes of scratch an encode call needs for a slot of `slot_bytes`.
pub const fn encode_scratch_len(slot_bytes: u16) -> usize {
    2 * slot_bytes as usize
}

/// Bytes of scratch a decode call needs for a slot of `slot_bytes`.
///
/// The bulk of this is the mode detector's candidate table: for each of the (up to) 4
/// signaling modes and each of the first 6 codewords, whether correction succeeded and the
/// error-locator degree (used for risk scoring). The corrected content itself is not cached -
/// once a winning mode is chosen, its codewords are corrected once more directly into the
/// output buffer.
pub const fn decode_scratch_len(slot_bytes: u16) -> usize {
    let nibble_buf = 2 * slot_bytes as usize;
    let trust = MAX_CODEWORDS;
    let candidates = MAX_MODES * MAX_CODEWORDS;
    let ok = candidates;
    let deg = candidates;
    nibble_buf + trust + ok + deg
}

/// The encoder's scratch: just the flat nibble-domain codeword buffer.
pub struct EncodeScratch<'a> {
    pub nibbles: &'a mut [u8],
}

impl<'a> EncodeScratch<'a> {
    pub fn new(buf: &'a mut [u8], slot_bytes: u16) -> Self {
        let len = encode_scratch_len(slot_bytes);
        EncodeScratch { nibbles: &mut buf[..len] }
    }
}

/// The mode-detector's per-`(mode, codeword)` candidate table, plus the flat nibble buffer and
/// the per-codeword trust array used by partial-concealment bookkeeping.
pub struct DecodeScratch<'a> {
    pub nibbles: &'a mut [u8],
    trust: &'a mut [u8],
    ok: &'a mut [u8],
    deg: &'a mut [u8],
}

impl<'a> DecodeScratch<'a> {
    pub fn new(buf: &'a mut [u8], slot_bytes: u16) -> Self {
        let nibble_len = 2 * slot_bytes as usize;
        let candidates = MAX_MODES * MAX_CODEWORDS;
        let (nibbles, rest) = buf.split_at_mut(nibble_len);
        let (trust, rest) = rest.split_at_mut(MAX_CODEWORDS);
        let (ok, rest) = rest.split_at_mut(candidates);
        let (deg, _rest) = rest.split_at_mut(candidates);
        DecodeScratch { nibbles, trust, ok, deg }
    }

    fn candidate_idx(mode: u8, cw: usize) -> usize {
        debug_assert!((mode as usize) < MAX_MODES);
        debug_assert!(cw < MAX_CODEWORDS);
        mode as usize * MAX_CODEWORDS + cw
    }

    pub fn trust(&mut self, n_cw: usize) -> &mut [u8] {
        &mut self.trust[..n_cw]
    }

    pub fn set_ok(&mut self, mode: u8, cw: usize, ok: bool) {
        self.ok[Self::candidate_idx(mode, cw)] = ok as u8;
    }

    pub fn ok(&self, mode: u8, cw: usize) -> bool {
        self.ok[Self::candidate_idx(mode, cw)] != 0
    }

    pub fn set_deg(&mut self, mode: u8, cw: usize, deg: usize) {
        self.deg[Self::candidate_idx(mode, cw)] = deg as u8;
    }

    pub fn deg(&self, mode: u8, cw: usize) -> usize {
        self.deg[Self::candidate_idx(mode, cw)] as usize
    }
}
