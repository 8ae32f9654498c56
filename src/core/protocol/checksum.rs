//! NMEA checksum calculation and verification
//!
//! A sentence looks like `$TYPE,f1,f2*HH`. The checksum is the XOR of every
//! byte strictly between the start marker (`$` or `!`) and the `*`
//! delimiter, written as two hex digits.

use serde::{Deserialize, Serialize};

/// Checksum delimiter
pub const CHECKSUM_DELIMITER: u8 = b'*';

/// Result of checking a sentence's trailing checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Checksum present and correct
    Valid,
    /// Checksum present but wrong, malformed, or the sentence has no start marker
    Invalid,
    /// No `*HH` suffix
    Missing,
}

/// How a sentence type treats its checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumPolicy {
    /// Missing or bad checksum rejects the line
    #[default]
    Required,
    /// Bad checksum rejects the line, a missing one is accepted
    IfPresent,
    /// Checksum is never looked at
    Unchecked,
}

impl ChecksumPolicy {
    /// Whether a line with the given status passes this policy
    pub fn accepts(self, status: ChecksumStatus) -> bool {
        match self {
            ChecksumPolicy::Required => status == ChecksumStatus::Valid,
            ChecksumPolicy::IfPresent => status != ChecksumStatus::Invalid,
            ChecksumPolicy::Unchecked => true,
        }
    }

    /// Get name of policy
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumPolicy::Required => "required",
            ChecksumPolicy::IfPresent => "if-present",
            ChecksumPolicy::Unchecked => "unchecked",
        }
    }
}

/// XOR of all bytes
pub fn compute(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn is_start_marker(b: u8) -> bool {
    b == b'$' || b == b'!'
}

/// Verify the trailing checksum of a sentence.
///
/// Never mutates or copies the input. Trailing whitespace after the hex
/// digits is tolerated; anything else after them is not.
pub fn verify(sentence: &str) -> ChecksumStatus {
    let bytes = sentence.as_bytes();

    let Some(star) = bytes.iter().rposition(|&b| b == CHECKSUM_DELIMITER) else {
        return ChecksumStatus::Missing;
    };

    if !is_start_marker(bytes[0]) {
        return ChecksumStatus::Invalid;
    }

    let digits = sentence[star + 1..].trim_end();
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return ChecksumStatus::Invalid;
    }

    match u8::from_str_radix(digits, 16) {
        Ok(expected) if expected == compute(&bytes[1..star]) => ChecksumStatus::Valid,
        _ => ChecksumStatus::Invalid,
    }
}

/// Convenience wrapper: true only for [`ChecksumStatus::Valid`]
pub fn is_valid(sentence: &str) -> bool {
    verify(sentence) == ChecksumStatus::Valid
}

/// Append `*HH` to a sentence that has a start marker and no checksum yet.
///
/// Any existing checksum suffix is replaced.
pub fn append(sentence: &str) -> String {
    let body = match sentence.rfind('*') {
        Some(star) => &sentence[..star],
        None => sentence,
    };

    let payload = body
        .as_bytes()
        .split_first()
        .filter(|(first, _)| is_start_marker(**first))
        .map_or(body.as_bytes(), |(_, rest)| rest);

    format!("{}*{:02X}", body, compute(payload))
}
