// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The encode-side pipeline: CRC computation, payload placement, per-codeword Reed-Solomon
//! encoding (with the signaling polynomial folded into codewords 0..5), EPMR embedding, and the
//! final interleave into wire order.
//!
//! Mirrors [`crate::detect`]'s decode pipeline in reverse, sharing every primitive with it
//! (the same [`CodewordLayout`], the same [`Cw0Layout`], the same CRC functions) so that the two
//! sides can never silently drift out of sync with each other.

use crate::crc;
use crate::framing::{self, Cw0Layout};
use crate::rs;
use crate::scratch::EncodeScratch;
use crate::tables::{self, CodewordLayout};

/// How many leading codewords carry the signaling polynomial, matching
/// [`crate::detect::SCREEN_CODEWORDS`].
const SIGNAL_CODEWORDS: usize = 6;

/// Encodes `data` (`data_bytes` long) into a slot, writing the wire-order bytes into
/// `out_slot` (`slot_bytes` long).
///
/// `epmr` must be in `0..=3` and `mode` in `0..=4`; callers validate these (and the
/// `data_bytes` budget) before calling in - see [`crate::encode`].
pub fn encode(
    mode: u8,
    epmr: u8,
    data: &[u8],
    data_bytes: u16,
    slot_bytes: u16,
    n_pccw: u16,
    ccc_flag: u8,
    scratch: &mut EncodeScratch<'_>,
    out_slot: &mut [u8],
) {
    if mode == 0 {
        out_slot[..data_bytes as usize].copy_from_slice(&data[..data_bytes as usize]);
        out_slot[data_bytes as usize..slot_bytes as usize].fill(0);
        return;
    }

    let layout = CodewordLayout::new(slot_bytes, mode);
    let data_bytes = data_bytes as usize;

    let crc1_n = tables::crc1_nibbles(mode, slot_bytes);
    let has_crc2 = mode >= 2 && n_pccw > 0;
    let crc2_n = if has_crc2 { crc::CRC2_NIBBLES } else { 0 };

    let pc_start = layout.n_cw - n_pccw as usize;
    let pc_payload_nibbles: usize =
        if has_crc2 { (pc_start..layout.n_cw).map(|i| layout.payload_len(i)).sum() } else { 0 };

    let hash_size = tables::hash_size_for(slot_bytes);
    let crc1_scope =
        if has_crc2 { 2 * data_bytes - pc_payload_nibbles } else { 2 * data_bytes };

    // Expand the data bytes into nibbles once, low nibble first, purely to feed the CRC
    // functions (which walk a flat nibble array) - this is the "reverse-and-expand" step's
    // nibble-domain view of the data region, per spec Sec. 4.4 step 1.
    let mut data_nib = [0u8; 2 * tables::FEC_SLOT_BYTES_MAX as usize];
    framing::unpack_nibbles(&data[..data_bytes], &mut data_nib[..2 * data_bytes]);

    let crc1 = crc::crc1_compute(&data_nib[..crc1_scope], hash_size, epmr);
    let crc2 =
        if has_crc2 { Some(crc::crc2_compute(&data_nib[crc1_scope..2 * data_bytes])) } else { None };

    framing::place_payload(&layout, scratch.nibbles, data, data_bytes, crc1, crc1_n, crc2);

    for cw in 0..layout.n_cw {
        let off = layout.offset(cw);
        let len = layout.len(cw);
        let d = layout.dist(cw);
        let sig = if cw < SIGNAL_CODEWORDS { Some(&tables::sig_poly(mode)[..len]) } else { None };
        rs::rs_encode(&mut scratch.nibbles[off..off + len], len, d, sig);
    }

    let cw0 = Cw0Layout::new(&layout, mode, crc1_n, crc2_n);
    framing::embed_epmr(scratch.nibbles, &cw0, epmr);

    framing::interleave(&layout, scratch.nibbles, slot_bytes, out_slot);

    let _ = ccc_flag;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::decode;
    use crate::scratch::{decode_scratch_len, encode_scratch_len, DecodeScratch};

    fn roundtrip(slot_bytes: u16, mode: u8, epmr: u8) {
        let data_bytes = tables::fec_data_size(mode, 0, slot_bytes);
        let data: Vec<u8> = (0..data_bytes as usize).map(|i| (i * 11 + 7) as u8).collect();
        let n_pccw = tables::fec_n_pccw(slot_bytes, mode, 0);

        let mut enc_buf = vec![0u8; encode_scratch_len(slot_bytes)];
        let mut scratch = EncodeScratch::new(&mut enc_buf, slot_bytes);
        let mut slot = vec![0u8; slot_bytes as usize];
        encode(mode, epmr, &data, data_bytes, slot_bytes, n_pccw, 0, &mut scratch, &mut slot);

        let mut dec_buf = vec![0u8; decode_scratch_len(slot_bytes)];
        let mut dscratch = DecodeScratch::new(&mut dec_buf, slot_bytes);
        let mut out = vec![0u8; data_bytes as usize];
        let report = decode(&slot, slot_bytes, 0, &mut dscratch, &mut out);

        assert_eq!(report.bfi, 0, "mode {mode} slot_bytes {slot_bytes} should decode clean");
        assert_eq!(report.mode, mode as i8);
        assert_eq!(report.epmr, epmr);
        assert_eq!(&out[..], &data[..]);
        assert_eq!(report.bit_errors, 0);
    }

    #[test]
    fn roundtrip_every_mode_small_slot() {
        for &mode in &[1u8, 2, 3, 4] {
            for epmr in 0..4u8 {
                roundtrip(40, mode, epmr);
            }
        }
    }

    #[test]
    fn roundtrip_large_slot_with_pc_region() {
        for &mode in &[3u8, 4] {
            roundtrip(160, mode, 1);
        }
    }

    #[test]
    fn mode_zero_is_transparent_passthrough() {
        let slot_bytes = 40u16;
        let data: Vec<u8> = (0..slot_bytes as usize).map(|i| (i * 5 + 1) as u8).collect();
        let mut enc_buf = vec![0u8; encode_scratch_len(slot_bytes)];
        let mut scratch = EncodeScratch::new(&mut enc_buf, slot_bytes);
        let mut slot = vec![0u8; slot_bytes as usize];
        encode(0, 0, &data, slot_bytes, slot_bytes, 0, 0, &mut scratch, &mut slot);
        assert_eq!(slot, data);
    }
}
