// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blind EP-mode detection and frame correction.
//!
//! The decoder is never told which protection mode the encoder used. It instead screens every
//! signaling mode (1 through 4) against the first few codewords, scores each surviving
//! candidate by how unlikely its agreement is to be coincidental, and picks the lowest-risk
//! candidate that clears a size-dependent threshold - falling back to unprotected passthrough
//! (mode 0) if nothing does.
//!
//! This mirrors [`crate::rs`]'s syndrome/ELP/root-finding pipeline almost exactly; the only
//! difference during screening is that each candidate mode's signaling polynomial is XOR'd out
//! first, since that polynomial (not the raw wire bits) is what the corresponding encoder
//! folded into the codeword.

use log::{debug, trace};

use crate::crc;
use crate::framing::{self, Cw0Layout};
use crate::rs;
use crate::scratch::DecodeScratch;
use crate::simple_float::SimpleFloat;
use crate::tables::{self, CodewordLayout, MAX_CODEWORDS};

/// Longest a single codeword can be, per the `L_i <= 15` guarantee of the codeword-length
/// schedule.
const MAX_CW_LEN: usize = 15;
/// Largest data region (in nibbles) a single slot can carry, used to size a stack scratch
/// buffer for CRC recomputation.
const MAX_DATA_NIBBLES: usize = 2 * tables::FEC_SLOT_BYTES_MAX as usize;

/// Candidate modes tried during screening, in tie-break priority order: equal-risk ties prefer
/// the earlier entry.
const CANDIDATE_MODES: [u8; 4] = [3, 2, 4, 1];

/// How many leading codewords screening and risk-scoring are based on. Codewords past this are
/// only ever corrected, never used to pick the mode.
const SCREEN_CODEWORDS: usize = 6;

/// Outcome of decoding one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeReport {
    /// The EP mode the detector settled on, or `-1` if the low-bitrate clamp (see
    /// [`apply_winner`]) rejected an otherwise-successful candidate outright. `0` is the
    /// unprotected fallback; this is the `m_fec` value of spec Sec. 6's decoder tuple.
    pub mode: i8,
    /// The recovered 2-bit EPMR value (`0` when `mode <= 0`).
    pub epmr: u8,
    /// Confidence in `epmr`/`mode`: `0` (high, within the strict threshold), `4` (marginal,
    /// within the lenient threshold only), or `8` (low, no candidate was promoted).
    pub epmr_confidence: u8,
    /// `0`: clean. `1`: fatal - uncorrectable error outside any partial-concealment region,
    /// a CRC1 mismatch, or the low-bitrate error-count clamp rejecting the frame. `2`:
    /// partial - the failure is confined to the trailing partial-concealment codewords, or a
    /// CRC2 mismatch.
    pub bfi: u8,
    /// Number of data bytes recovered into the caller's output buffer.
    pub data_bytes: u16,
    /// Total bit errors the Reed-Solomon stage corrected.
    pub bit_errors: u32,
    /// Number of trailing codewords treated as partial-concealment territory (`0` outside
    /// `mode >= 3` on large slots).
    pub n_pccw: u16,
    /// Nibble width of the partial-concealment region (`fec_n_pc` for `n_pccw`).
    pub n_pc: u16,
    /// Left bit offset (inclusive) of the suspect byte range, valid when `bfi == 2`.
    pub be_bp_left: u32,
    /// Right bit offset (inclusive) of the suspect byte range, valid when `bfi == 2`.
    pub be_bp_right: u32,
}

/// Decodes one slot: deinterleaves, screens mode candidates, corrects the winner, verifies its
/// CRC(s), and extracts the recovered data bytes into `out_data`.
///
/// `out_data` must be at least `fec_data_size(mode, ccc_flag, slot_bytes)` bytes for whatever
/// mode is ultimately chosen; since that is not known in advance, callers should size it for
/// the worst case, `slot_bytes`.
pub fn decode(
    slot: &[u8],
    slot_bytes: u16,
    ccc_flag: u8,
    scratch: &mut DecodeScratch,
    out_data: &mut [u8],
) -> DecodeReport {
    let neutral = CodewordLayout::new(slot_bytes, 0);
    let n_cw = neutral.n_cw;
    framing::deinterleave(&neutral, slot, slot_bytes, scratch.nibbles);

    let screen_range = n_cw.min(SCREEN_CODEWORDS);
    screen_candidates(scratch, slot_bytes, screen_range);

    let winner = pick_winner(scratch, slot_bytes, screen_range);

    match winner {
        Some((mode, risk)) => {
            debug!("ep detect: candidate mode {mode} promoted (risk {risk:?})");
            apply_winner(scratch, slot_bytes, ccc_flag, mode, risk, n_cw, out_data)
        }
        None => apply_fallback(scratch, slot_bytes, ccc_flag, n_cw, out_data),
    }
}

/// Pass A: for every signaling mode and the first `screen_range` codewords, XOR out that
/// mode's signaling polynomial and run the RS correction pipeline, recording whether it
/// succeeded and at what error-locator degree. Nothing is written back to `scratch.nibbles`;
/// this pass only gathers evidence.
fn screen_candidates(scratch: &mut DecodeScratch, slot_bytes: u16, screen_range: usize) {
    for &mode in &CANDIDATE_MODES {
        let layout = CodewordLayout::new(slot_bytes, mode);
        let sig = tables::sig_poly(mode);
        for cw in 0..screen_range {
            let off = layout.offset(cw);
            let len = layout.len(cw);
            let t = layout.t(cw);
            let mut work = [0u8; MAX_CW_LEN];
            for k in 0..len {
                work[k] = scratch.nibbles[off + k] ^ sig[k];
            }
            let (ok, _bits, deg) = rs::rs_correct_with_degree(&mut work[..len], len, t);
            scratch.set_ok(mode, cw, ok);
            scratch.set_deg(mode, cw, deg);
        }
    }
}

/// Pass B: among modes whose first `screen_range` codewords all corrected cleanly, picks the
/// one with the lowest compounded risk, provided it clears `risk_threshold(slot_bytes)`. Ties
/// prefer the earlier entry in [`CANDIDATE_MODES`] (mode 3, then 2, then 4, then 1).
fn pick_winner(
    scratch: &DecodeScratch,
    slot_bytes: u16,
    screen_range: usize,
) -> Option<(u8, SimpleFloat)> {
    let threshold = tables::risk_threshold(slot_bytes);
    let mut best: Option<(u8, SimpleFloat)> = None;
    for &mode in &CANDIDATE_MODES {
        if (0..screen_range).any(|cw| !scratch.ok(mode, cw)) {
            continue;
        }
        let mut risk = SimpleFloat::ONE;
        for cw in 0..screen_range {
            let t = tables::t_for(mode, cw);
            risk = risk.mul(tables::risk_factor(t, scratch.deg(mode, cw)));
        }
        if !risk.le(threshold) {
            continue;
        }
        if best.map_or(true, |(_, b)| risk.cmp(b) < 0) {
            best = Some((mode, risk));
        }
    }
    best
}

/// Pass C for the no-candidate case: mode 0 carries no redundancy, so "correction" is just a
/// straight copy of the deinterleaved nibbles back out to bytes.
fn apply_fallback(
    scratch: &mut DecodeScratch,
    slot_bytes: u16,
    ccc_flag: u8,
    n_cw: usize,
    out_data: &mut [u8],
) -> DecodeReport {
    let layout = CodewordLayout::new(slot_bytes, 0);
    let data_bytes = tables::fec_data_size(0, ccc_flag, slot_bytes);
    framing::extract_data(&layout, scratch.nibbles, data_bytes as usize, 0, 0, out_data);
    for cw in scratch.trust(n_cw).iter_mut() {
        *cw = 1;
    }
    debug!("ep detect: no candidate mode cleared risk threshold, falling back to mode 0");
    let epmr = estimate_epmr_from_cw0(scratch, slot_bytes, n_cw);
    DecodeReport {
        mode: 0,
        epmr,
        epmr_confidence: 8,
        bfi: 0,
        data_bytes,
        bit_errors: 0,
        n_pccw: 0,
        n_pc: 0,
        be_bp_left: 0,
        be_bp_right: 0,
    }
}

/// Open Question (c): a best-effort EPMR guess for the "no candidate survived screening" case,
/// so the encoder's peer still gets *something* back on the EPMR channel (spec Sec. 7, "EPMR
/// always flows"). Replays correction on codeword 0 alone under the single least-risky mode -
/// the source's `i` shadowing means only one candidate is ever actually tried here, not all
/// four, and that behavior is preserved rather than "fixed".
fn estimate_epmr_from_cw0(scratch: &DecodeScratch, slot_bytes: u16, n_cw: usize) -> u8 {
    let screen_range = n_cw.min(SCREEN_CODEWORDS);
    let mut least_risky: Option<(u8, SimpleFloat)> = None;
    for &mode in &CANDIDATE_MODES {
        let mut risk = SimpleFloat::ONE;
        for cw in 0..screen_range {
            let t = tables::t_for(mode, cw);
            risk = risk.mul(tables::risk_factor(t, scratch.deg(mode, cw)));
        }
        if least_risky.map_or(true, |(_, b)| risk.cmp(b) < 0) {
            least_risky = Some((mode, risk));
        }
    }
    let Some((mode, _)) = least_risky
    else {
        return 0;
    };
    if !scratch.ok(mode, 0) {
        return 0;
    }
    let layout = CodewordLayout::new(slot_bytes, mode);
    let crc1_n = tables::crc1_nibbles(mode, slot_bytes);
    let cw0 = Cw0Layout::new(&layout, mode, crc1_n, 0);
    let mut work = [0u8; MAX_CW_LEN];
    let len = layout.len(0);
    let sig = tables::sig_poly(mode);
    for k in 0..len {
        work[k] = scratch.nibbles[k] ^ sig[k];
    }
    let t = layout.t(0);
    if !rs::rs_correct(&mut work[..len], len, t).0 {
        return 0;
    }
    framing::extract_epmr(&mut work, &cw0)
}

/// Pass C for the chosen winner: re-applies correction to codewords 0..`screen_range` (cheap,
/// and avoids caching corrected content across the whole candidate table), corrects the
/// remaining codewords fresh, derives BFI from which codewords - if any - failed and whether
/// those failures fall inside the partial-concealment tail, extracts and verifies EPMR and
/// both CRCs, and writes the recovered data out.
fn apply_winner(
    scratch: &mut DecodeScratch,
    slot_bytes: u16,
    ccc_flag: u8,
    mode: u8,
    risk: SimpleFloat,
    n_cw: usize,
    out_data: &mut [u8],
) -> DecodeReport {
    let layout = CodewordLayout::new(slot_bytes, mode);
    let sig = tables::sig_poly(mode);
    let screen_range = n_cw.min(SCREEN_CODEWORDS);

    let mut ok_all = [true; MAX_CODEWORDS];
    let mut bit_errors = 0u32;
    for cw in 0..n_cw {
        let off = layout.offset(cw);
        let len = layout.len(cw);
        let t = layout.t(cw);
        let ok = if cw < screen_range {
            for k in 0..len {
                scratch.nibbles[off + k] ^= sig[k];
            }
            let (ok, bits, _deg) =
                rs::rs_correct_with_degree(&mut scratch.nibbles[off..off + len], len, t);
            if ok {
                bit_errors += bits;
            }
            ok
        }
        else {
            // Per spec Sec. 4.5 "Remaining codewords": even a codeword that decodes is
            // declared untrusted if its own risk exponent exceeds -16, folding it into the
            // PC-region failure semantics below alongside an outright RS failure.
            let (ok, bits, deg) =
                rs::rs_correct_with_degree(&mut scratch.nibbles[off..off + len], len, t);
            let untrusted = ok && tables::risk_factor(t, deg).exponent > -16;
            if ok {
                bit_errors += bits;
            }
            ok && !untrusted
        };
        ok_all[cw] = ok;
    }
    let trust = scratch.trust(n_cw);
    for (cw, slot) in trust.iter_mut().enumerate() {
        *slot = ok_all[cw] as u8;
    }

    let n_pccw = tables::fec_n_pccw(slot_bytes, mode, ccc_flag) as usize;
    let pc_start = n_cw - n_pccw;
    let mut bfi = 0u8;
    for &ok in &ok_all[..pc_start] {
        if !ok {
            bfi = bfi.max(1);
        }
    }
    for &ok in &ok_all[pc_start..n_cw] {
        if !ok {
            bfi = bfi.max(2);
        }
    }

    let crc1_n = tables::crc1_nibbles(mode, slot_bytes);
    let has_crc2 = mode >= 2 && n_pccw > 0;
    let crc2_n = if has_crc2 { crc::CRC2_NIBBLES } else { 0 };
    let cw0 = Cw0Layout::new(&layout, mode, crc1_n, crc2_n);
    let epmr = framing::extract_epmr(scratch.nibbles, &cw0);

    let mut crc1_recv = 0u32;
    for i in 0..crc1_n {
        crc1_recv |= (scratch.nibbles[layout.physical_index(i)] as u32) << (4 * i);
    }
    let mut crc2_recv = 0u32;
    if has_crc2 {
        for i in 0..crc2_n {
            crc2_recv |= (scratch.nibbles[layout.physical_index(crc1_n + i)] as u32) << (4 * i);
        }
    }

    let data_bytes = tables::fec_data_size(mode, ccc_flag, slot_bytes) as usize;
    let pc_payload_nibbles: usize =
        (pc_start..n_cw).map(|i| layout.payload_len(i)).sum();
    let (crc1_scope, crc2_scope) = if has_crc2 {
        (2 * data_bytes - pc_payload_nibbles, pc_payload_nibbles)
    }
    else {
        (2 * data_bytes, 0)
    };

    let mut data_nib = [0u8; MAX_DATA_NIBBLES];
    framing::data_region_nibbles(&layout, scratch.nibbles, crc1_n, crc2_n, 2 * data_bytes, &mut data_nib);
    let hash_size = tables::hash_size_for(slot_bytes);
    let crc1_ok = crc::crc1_verify(&data_nib[..crc1_scope], hash_size, epmr, crc1_recv);
    let crc2_ok =
        !has_crc2 || crc::crc2_verify(&data_nib[crc1_scope..crc1_scope + crc2_scope], crc2_recv);
    if !crc1_ok {
        bfi = bfi.max(1);
    }
    if !crc2_ok {
        bfi = bfi.max(2);
    }

    framing::extract_data(&layout, scratch.nibbles, data_bytes, crc1_n, crc2_n, out_data);

    let epmr_confidence = if risk.le(tables::EP_RISK_THRESH_NS) {
        0
    }
    else if risk.le(tables::EP_RISK_THRESH_OS) {
        4
    }
    else {
        8
    };

    // PC split locator: scan the trust flags of the PC-region codewords (in the spec's
    // reversed indexing, where relative index 0 is the very last codeword) to find the span
    // of distrusted codewords and translate it into a bit range the caller can treat as
    // concealment territory.
    let n_pc = tables::fec_n_pc(mode, n_pccw as u16, slot_bytes);
    let (be_bp_left, be_bp_right) = if bfi == 2 && n_pccw > 0 {
        let mut first: Option<usize> = None;
        let mut last: Option<usize> = None;
        for i in 0..n_pccw {
            if !ok_all[n_cw - 1 - i] {
                first.get_or_insert(i);
                last = Some(i);
            }
        }
        match (first, last) {
            (Some(f), Some(l)) => (
                4 * tables::fec_n_pc(mode, f as u16, slot_bytes) as u32,
                4 * tables::fec_n_pc(mode, (l + 1) as u16, slot_bytes) as u32 - 1,
            ),
            _ => (0, 0),
        }
    }
    else {
        (0, 0)
    };

    let mut bfi = bfi;
    let mut mode_out = mode as i8;
    if slot_bytes == 40 && bit_errors > tables::LOW_BR_MAX[mode as usize] {
        debug!(
            "ep detect: low-bitrate clamp rejected mode {mode} ({bit_errors} bit errors > {})",
            tables::LOW_BR_MAX[mode as usize]
        );
        bfi = 1;
        mode_out = -1;
    }
    if bfi == 1 {
        for b in out_data[..data_bytes].iter_mut() {
            *b = 0;
        }
    }

    trace!("ep detect: mode {mode} selected, bfi={bfi}, bit_errors={bit_errors}");

    DecodeReport {
        mode: mode_out,
        epmr,
        epmr_confidence,
        bfi,
        data_bytes: data_bytes as u16,
        bit_errors,
        n_pccw: n_pccw as u16,
        n_pc,
        be_bp_left,
        be_bp_right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::{decode_scratch_len, encode_scratch_len, DecodeScratch};

    /// Builds a valid encoded slot for `(slot_bytes, mode)` directly from the primitives this
    /// module depends on, the same way the public encoder will. Kept local to these tests since
    /// the public `encode` entry point lives elsewhere.
    fn encode_for_test(slot_bytes: u16, mode: u8, ccc_flag: u8, epmr: u8, data: &[u8]) -> Vec<u8> {
        let layout = CodewordLayout::new(slot_bytes, mode);
        let mut cw_buf = vec![0u8; encode_scratch_len(slot_bytes)];

        let crc1_n = tables::crc1_nibbles(mode, slot_bytes);
        let n_pccw = tables::fec_n_pccw(slot_bytes, mode, ccc_flag) as usize;
        let has_crc2 = mode >= 2 && n_pccw > 0;
        let data_bytes = tables::fec_data_size(mode, ccc_flag, slot_bytes) as usize;
        let pc_start = layout.n_cw - n_pccw;
        let pc_payload_nibbles: usize = (pc_start..layout.n_cw).map(|i| layout.payload_len(i)).sum();

        let hash_size = tables::hash_size_for(slot_bytes);
        let crc1_scope = if has_crc2 { 2 * data_bytes - pc_payload_nibbles } else { 2 * data_bytes };
        let mut data_nib_tmp = vec![0u8; 2 * data_bytes];
        framing::unpack_nibbles(&data[..data_bytes], &mut data_nib_tmp);
        let crc1 = crc::crc1_compute(&data_nib_tmp[..crc1_scope], hash_size, epmr);
        let crc2 = if has_crc2 {
            Some(crc::crc2_compute(&data_nib_tmp[crc1_scope..]))
        }
        else {
            None
        };

        framing::place_payload(&layout, &mut cw_buf, data, data_bytes, crc1, crc1_n, crc2);

        for cw in 0..layout.n_cw {
            let off = layout.offset(cw);
            let len = layout.len(cw);
            let d = layout.dist(cw);
            let sig = if cw < SCREEN_CODEWORDS && tables::uses_signaling(mode) {
                Some(&tables::sig_poly(mode)[..len])
            }
            else {
                None
            };
            rs::rs_encode(&mut cw_buf[off..off + len], len, d, sig);
        }

        let crc2_n = if has_crc2 { crc::CRC2_NIBBLES } else { 0 };
        let cw0 = Cw0Layout::new(&layout, mode, crc1_n, crc2_n);
        framing::embed_epmr(&mut cw_buf, &cw0, epmr);

        let mut slot = vec![0u8; slot_bytes as usize];
        framing::interleave(&layout, &cw_buf, slot_bytes, &mut slot);
        slot
    }

    #[test]
    fn detects_mode_and_recovers_clean_frame() {
        let slot_bytes = 80u16;
        let mode = 3u8;
        let data_bytes = tables::fec_data_size(mode, 0, slot_bytes) as usize;
        let data: Vec<u8> = (0..data_bytes).map(|i| (i * 13 + 5) as u8).collect();
        let slot = encode_for_test(slot_bytes, mode, 0, 2, &data);

        let mut scratch_buf = vec![0u8; decode_scratch_len(slot_bytes)];
        let mut scratch = DecodeScratch::new(&mut scratch_buf, slot_bytes);
        let mut out = vec![0u8; data_bytes];
        let report = decode(&slot, slot_bytes, 0, &mut scratch, &mut out);

        assert_eq!(report.mode, mode as i8);
        assert_eq!(report.epmr, 2);
        assert_eq!(report.bfi, 0);
        assert_eq!(&out[..data_bytes], &data[..]);
    }

    #[test]
    fn recovers_from_errors_within_capacity() {
        let slot_bytes = 40u16;
        let mode = 2u8;
        let data_bytes = tables::fec_data_size(mode, 0, slot_bytes) as usize;
        let data: Vec<u8> = (0..data_bytes).map(|i| (i * 7 + 1) as u8).collect();
        let mut slot = encode_for_test(slot_bytes, mode, 0, 1, &data);
        // Flip two bits inside the first byte, within mode 2's d=3 (t=1) capacity per codeword
        // once deinterleaved - a small, localized disturbance rather than a full-symbol flip.
        slot[0] ^= 0x02;

        let mut scratch_buf = vec![0u8; decode_scratch_len(slot_bytes)];
        let mut scratch = DecodeScratch::new(&mut scratch_buf, slot_bytes);
        let mut out = vec![0u8; data_bytes];
        let report = decode(&slot, slot_bytes, 0, &mut scratch, &mut out);

        assert_eq!(report.mode, mode as i8);
        assert_eq!(report.bfi, 0);
        assert_eq!(&out[..data_bytes], &data[..]);
    }

    #[test]
    fn falls_back_to_mode_zero_for_unprotected_data() {
        let slot_bytes = 40u16;
        let data: Vec<u8> = (0..slot_bytes as usize).map(|i| (i * 3 + 11) as u8).collect();
        // No encoding at all: raw bytes straight into the slot, as mode 0 would produce.
        let slot = data.clone();

        let mut scratch_buf = vec![0u8; decode_scratch_len(slot_bytes)];
        let mut scratch = DecodeScratch::new(&mut scratch_buf, slot_bytes);
        let mut out = vec![0u8; slot_bytes as usize];
        let report = decode(&slot, slot_bytes, 0, &mut scratch, &mut out);

        assert_eq!(report.mode, 0);
        assert_eq!(report.epmr_confidence, 8);
        assert_eq!(out, data);
    }
}
