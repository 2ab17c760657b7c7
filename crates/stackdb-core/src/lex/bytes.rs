//! Module: lex::bytes
//! Responsibility: byte-string arithmetic over lexicographic order.

/// Complement `bytes` in place, producing the reverse-order image.
pub fn invert(bytes: &mut [u8]) {
    for b in bytes {
        *b = !*b;
    }
}

/// Return the complemented copy of `bytes`.
#[must_use]
pub fn inverted(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| !b).collect()
}

/// Next key in lex order that sorts after every key prefixed by `bytes`.
///
/// The last byte below 0xFF is incremented and the trailing 0xFF run rolls
/// over to 0x00, keeping the length. When every byte is 0xFF there is no
/// same-length successor: the result is the input followed by 0x01.
#[must_use]
pub fn increment(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();

    for b in out.iter_mut().rev() {
        if *b == 0xFF {
            *b = 0x00;
        } else {
            *b += 1;
            return out;
        }
    }

    let mut out = vec![0xFF; bytes.len()];
    out.push(0x01);
    out
}

/// Previous key in lex order, mirroring [`increment`].
///
/// The last byte above 0x00 is decremented and the trailing 0x00 run rolls
/// over to 0xFF. When every byte is 0x00 the result drops the last byte
/// (the empty key stays empty).
///
/// The inverse of [`increment`] except on all-0xFF input: `[FF]` and
/// `[FF, 00]` share the successor `[FF, 01]`, and `decrement` returns
/// `[FF, 00]`. The all-0xFF preimage cannot be recovered.
#[must_use]
pub fn decrement(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();

    for b in out.iter_mut().rev() {
        if *b == 0x00 {
            *b = 0xFF;
        } else {
            *b -= 1;
            return out;
        }
    }

    let mut out = bytes.to_vec();
    out.pop();
    out
}

/// Right-pad with 0x00 or truncate to exactly `width` bytes.
#[must_use]
pub fn pad_right(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut out = bytes[..bytes.len().min(width)].to_vec();
    out.resize(width, 0x00);
    out
}

/// Left-pad with 0x00 or keep the trailing `width` bytes.
#[must_use]
pub fn pad_left(bytes: &[u8], width: usize) -> Vec<u8> {
    if bytes.len() >= width {
        return bytes[bytes.len() - width..].to_vec();
    }

    let mut out = vec![0x00; width - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

/// Fixed-width image used by index components (right padding).
#[must_use]
pub fn resize(bytes: &[u8], width: usize) -> Vec<u8> {
    pad_right(bytes, width)
}
