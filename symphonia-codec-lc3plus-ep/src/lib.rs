// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

//! A frame-level error-protection (EP) codec for a low-complexity audio transport layer.
//!
//! Given an opaque, already-compressed audio payload of some byte length, [`encode`] produces a
//! fixed-size "slot" of the same length that tolerates bit errors on a best-effort channel, and
//! [`decode`] recovers the payload from a (possibly corrupted) slot without being told which
//! protection mode the encoder used.
//!
//! This crate does not know anything about the audio compression it is protecting - no MDCT,
//! TNS, residual coding, or PCM I/O lives here. It operates purely on byte slots, which is why it
//! has no dependency on `symphonia-core`'s `Packet`/`AudioBuffer`/codec-registry machinery: a
//! caller that itself decodes audio frames calls into this crate once per channel, on a slice it
//! already owns.
//!
//! ```
//! use symphonia_codec_lc3plus_ep as ep;
//!
//! let slot_bytes = 40u16;
//! let mode = 2u8;
//! let epmr = 1u8;
//! let data_bytes = ep::fec_data_size(mode, 0, slot_bytes);
//!
//! // The encoder reads its input from the front of `iobuf` and overwrites it in place with
//! // the encoded slot.
//! let mut iobuf = vec![0u8; slot_bytes as usize];
//! iobuf[..data_bytes as usize].fill(0x42);
//! let original_data = iobuf[..data_bytes as usize].to_vec();
//!
//! let mut enc_scratch = vec![0u8; ep::encode_scratch_len(slot_bytes)];
//! ep::encode(mode, epmr, &mut iobuf, data_bytes, slot_bytes, 0, &mut enc_scratch).unwrap();
//!
//! // The decoder reads the slot from the front of `iobuf` and overwrites it in place with the
//! // recovered data bytes.
//! let mut dec_scratch = vec![0u8; ep::decode_scratch_len(slot_bytes)];
//! let report = ep::decode(&mut iobuf, slot_bytes, 0, &mut dec_scratch).unwrap();
//!
//! assert_eq!(report.bfi, 0);
//! assert_eq!(report.epmr, epmr);
//! assert_eq!(&iobuf[..data_bytes as usize], &original_data[..]);
//! ```

mod encode;

pub mod crc;
pub mod detect;
pub mod error;
pub mod framing;
pub mod gf16;
pub mod rs;
pub mod scratch;
pub mod simple_float;
pub mod tables;

pub use detect::DecodeReport;
pub use error::{EpError, Result};
pub use scratch::{decode_scratch_len, encode_scratch_len};
pub use tables::{fec_data_size, fec_n_pc, fec_n_pccw, FEC_SLOT_BYTES_MAX, FEC_SLOT_BYTES_MIN};

use scratch::{DecodeScratch, EncodeScratch};

fn validate_slot_bytes(slot_bytes: u16) -> Result<()> {
    if (tables::FEC_SLOT_BYTES_MIN..=tables::FEC_SLOT_BYTES_MAX).contains(&slot_bytes) {
        Ok(())
    }
    else {
        error::invalid_slot_size(slot_bytes)
    }
}

fn validate_mode(mode: u8) -> Result<()> {
    if mode <= 4 {
        Ok(())
    }
    else {
        error::invalid_mode(mode)
    }
}

fn validate_epmr(epmr: u8) -> Result<()> {
    if epmr <= 3 {
        Ok(())
    }
    else {
        error::invalid_epmr(epmr)
    }
}

/// Encodes `data_bytes` bytes of `iobuf` (occupying its front) into a `slot_bytes`-long
/// error-protected slot, overwriting `iobuf` in place.
///
/// `n_pccw` is the number of trailing codewords the caller wants designated
/// partial-concealment territory - typically [`fec_n_pccw`] for the same parameters, computed
/// by the caller since it may want to keep it fixed across a session rather than recompute it
/// every call.
///
/// # Errors
///
/// Returns [`EpError`] if `mode`/`epmr` are out of range, `data_bytes` exceeds
/// [`fec_data_size`] for this configuration, `slot_bytes` is out of range, or `scratch` is
/// smaller than [`encode_scratch_len`] requires.
pub fn encode(
    mode: u8,
    epmr: u8,
    iobuf: &mut [u8],
    data_bytes: u16,
    slot_bytes: u16,
    n_pccw: u8,
    scratch: &mut [u8],
) -> Result<()> {
    validate_slot_bytes(slot_bytes)?;
    validate_mode(mode)?;
    validate_epmr(epmr)?;

    let max_data = tables::fec_data_size(mode, 0, slot_bytes);
    if data_bytes > max_data {
        return error::data_too_large(data_bytes, max_data);
    }

    let needed = scratch::encode_scratch_len(slot_bytes);
    if scratch.len() < needed {
        return error::scratch_too_small(needed, scratch.len());
    }
    debug_assert!(iobuf.len() >= slot_bytes as usize, "iobuf shorter than slot_bytes");

    let mut data = [0u8; tables::FEC_SLOT_BYTES_MAX as usize];
    data[..data_bytes as usize].copy_from_slice(&iobuf[..data_bytes as usize]);

    let mut enc_scratch = EncodeScratch::new(scratch, slot_bytes);
    let mut out_slot = [0u8; tables::FEC_SLOT_BYTES_MAX as usize];
    encode::encode(
        mode,
        epmr,
        &data[..data_bytes as usize],
        data_bytes,
        slot_bytes,
        n_pccw as u16,
        0,
        &mut enc_scratch,
        &mut out_slot[..slot_bytes as usize],
    );
    iobuf[..slot_bytes as usize].copy_from_slice(&out_slot[..slot_bytes as usize]);
    Ok(())
}

/// Decodes a `slot_bytes`-long slot in `iobuf`, attempting to blindly identify the protection
/// mode the encoder used, correcting as many errors as the mode's redundancy allows, and writing
/// the recovered data bytes back into the front of `iobuf`.
///
/// When `ccc_flag` is set, the returned [`DecodeReport::be_bp_left`]/`be_bp_right` are left at
/// `0` (the caller handles combined-channel-coding partial concealment itself).
///
/// # Errors
///
/// Returns [`EpError`] if `slot_bytes` is out of range or `scratch` is smaller than
/// [`decode_scratch_len`] requires. A corrupted or undecodable slot is never an `Err` - it is
/// reported through [`DecodeReport::bfi`].
pub fn decode(
    iobuf: &mut [u8],
    slot_bytes: u16,
    ccc_flag: u8,
    scratch: &mut [u8],
) -> Result<DecodeReport> {
    validate_slot_bytes(slot_bytes)?;

    let needed = scratch::decode_scratch_len(slot_bytes);
    if scratch.len() < needed {
        return error::scratch_too_small(needed, scratch.len());
    }
    debug_assert!(iobuf.len() >= slot_bytes as usize, "iobuf shorter than slot_bytes");

    let mut dscratch = DecodeScratch::new(scratch, slot_bytes);
    let mut slot = [0u8; tables::FEC_SLOT_BYTES_MAX as usize];
    slot[..slot_bytes as usize].copy_from_slice(&iobuf[..slot_bytes as usize]);
    let mut out = [0u8; tables::FEC_SLOT_BYTES_MAX as usize];
    let report = detect::decode(&slot[..slot_bytes as usize], slot_bytes, ccc_flag, &mut dscratch, &mut out);

    let data_bytes = report.data_bytes as usize;
    iobuf[..data_bytes].copy_from_slice(&out[..data_bytes]);

    Ok(report)
}
