// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the error type returned when a caller violates one of this
//! crate's preconditions.
//!
//! This is distinct from a bad frame on the wire: a corrupted or undecodable slot is an
//! expected, routine outcome and is reported through [`crate::DecodeReport`]'s `bfi` field, not
//! through a `Result`. `EpError` exists only for contract violations at the call boundary -
//! a caller passing an out-of-range `slot_bytes`, a `data_bytes` over budget, or an undersized
//! scratch arena.

use core::fmt;
use core::result;

#[cfg(feature = "std")]
use std::error::Error as StdError;

/// `EpError` enumerates the ways a caller can misuse this crate's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpError {
    /// `slot_bytes` is outside `[FEC_SLOT_BYTES_MIN, FEC_SLOT_BYTES_MAX]`.
    InvalidSlotSize(u16),
    /// `mode` is outside `0..=4`.
    InvalidMode(u8),
    /// `epmr` is outside `0..=3`.
    InvalidEpmr(u8),
    /// `data_bytes` exceeds `fec_data_size(mode, ccc_flag, slot_bytes)`.
    DataTooLarge { data_bytes: u16, max: u16 },
    /// The scratch arena passed in is smaller than the operation requires.
    ScratchTooSmall { needed: usize, got: usize },
}

impl fmt::Display for EpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EpError::InvalidSlotSize(n) => write!(f, "invalid slot size: {n} bytes"),
            EpError::InvalidMode(m) => write!(f, "invalid EP mode: {m}"),
            EpError::InvalidEpmr(e) => write!(f, "invalid EPMR value: {e}"),
            EpError::DataTooLarge { data_bytes, max } => {
                write!(f, "data_bytes {data_bytes} exceeds maximum {max} for this configuration")
            }
            EpError::ScratchTooSmall { needed, got } => {
                write!(f, "scratch arena too small: need {needed} bytes, got {got}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl StdError for EpError {}

pub type Result<T> = result::Result<T, EpError>;

/// Convenience function to create an invalid-slot-size error.
pub fn invalid_slot_size<T>(slot_bytes: u16) -> Result<T> {
    Err(EpError::InvalidSlotSize(slot_bytes))
}

/// Convenience function to create an invalid-mode error.
pub fn invalid_mode<T>(mode: u8) -> Result<T> {
    Err(EpError::InvalidMode(mode))
}

/// Convenience function to create an invalid-EPMR error.
pub fn invalid_epmr<T>(epmr: u8) -> Result<T> {
    Err(EpError::InvalidEpmr(epmr))
}

/// Convenience function to create a data-too-large error.
pub fn data_too_large<T>(data_bytes: u16, max: u16) -> Result<T> {
    Err(EpError::DataTooLarge { data_bytes, max })
}

/// Convenience function to create a scratch-too-small error.
pub fn scratch_too_small<T>(needed: usize, got: usize) -> Result<T> {
    Err(EpError::ScratchTooSmall { needed, got })
}
