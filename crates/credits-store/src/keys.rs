//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use chrono::{DateTime, Utc};
use credits_core::{BalanceId, UserId};

/// Separator between the user ID and the period bounds in index keys.
///
/// Keeps `"ab"` from being a prefix match for `"abc"`. User IDs may themselves
/// contain NUL, so a prefix match alone does not prove ownership; see
/// [`is_user_period_key`].
const USER_SEPARATOR: u8 = 0x00;

/// Length of the encoded `(period_start, period_end)` suffix.
pub const PERIOD_BOUNDS_LEN: usize = 16;

/// Create a balance key from a balance ID.
#[must_use]
pub fn balance_key(balance_id: BalanceId) -> Vec<u8> {
    balance_id.to_be_bytes().to_vec()
}

/// Create a period index key.
///
/// Format: `user_id || 0x00 || period_start_ms (8 bytes) || period_end_ms (8 bytes)`
///
/// Timestamps are big-endian milliseconds with the sign bit flipped, so keys for
/// one user sort by period start.
#[must_use]
pub fn period_key(user_id: &UserId, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.reserve(PERIOD_BOUNDS_LEN);
    key.extend_from_slice(&encode_timestamp(start));
    key.extend_from_slice(&encode_timestamp(end));
    key
}

/// Create a prefix for iterating all periods for a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let bytes = user_id.as_str().as_bytes();
    let mut key = Vec::with_capacity(bytes.len() + 1);
    key.extend_from_slice(bytes);
    key.push(USER_SEPARATOR);
    key
}

/// Whether `key` is a period index key of the user whose prefix is `prefix`,
/// as opposed to a key of a longer user ID that merely starts with it.
#[must_use]
pub fn is_user_period_key(prefix: &[u8], key: &[u8]) -> bool {
    key.len() == prefix.len() + PERIOD_BOUNDS_LEN && key.starts_with(prefix)
}

/// Decode a balance ID stored as an index value.
#[must_use]
pub fn decode_balance_id(value: &[u8]) -> Option<BalanceId> {
    let bytes: [u8; 8] = value.try_into().ok()?;
    Some(BalanceId::from_be_bytes(bytes))
}

fn encode_timestamp(instant: DateTime<Utc>) -> [u8; 8] {
    let mut bytes = instant.timestamp_millis().to_be_bytes();
    bytes[0] ^= 0x80;
    bytes
}
