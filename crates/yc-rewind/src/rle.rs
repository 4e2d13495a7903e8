//! Run-length coding for save states
//!
//! Save states are mostly long runs of identical bytes (cleared RAM, padding),
//! so a trivial byte RLE shrinks them a lot for almost no CPU. The stream is
//! literal bytes interleaved with 3-byte run tokens `MARKER, value, count`.
//! The marker byte itself is always written as a token so literals never
//! contain it.

use yc_core::RewindError;

/// Introduces a run token
pub const MARKER: u8 = 0xFF;

/// Shortest run worth a token
pub const MIN_RUN: usize = 4;

const MAX_RUN: usize = u8::MAX as usize;

/// Compress `input`
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() / 2);
    let mut i = 0;
    while i < input.len() {
        let value = input[i];
        let run = input[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == value)
            .count();

        if run >= MIN_RUN || value == MARKER {
            out.extend_from_slice(&[MARKER, value, run as u8]);
        } else {
            out.extend(std::iter::repeat(value).take(run));
        }
        i += run;
    }
    out
}

/// Expand a stream produced by [`compress`]
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, RewindError> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut i = 0;
    while i < input.len() {
        let byte = input[i];
        if byte != MARKER {
            out.push(byte);
            i += 1;
            continue;
        }
        if i + 2 >= input.len() {
            return Err(RewindError::TruncatedToken(i));
        }
        let value = input[i + 1];
        let count = input[i + 2] as usize;
        if count == 0 {
            return Err(RewindError::EmptyRun(i));
        }
        out.resize(out.len() + count, value);
        i += 3;
    }
    Ok(out)
}
