//! Standard base64 (`A-Z a-z 0-9 + /`, `=` padding) for inline buffer data.

use crate::status::{CoreError, CoreResult};

const ENCODE_TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ENCODE_TABLE.len() {
        table[ENCODE_TABLE[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Decodes `text[offset..]` into raw bytes.
///
/// Up to two trailing `=` symbols are stripped before decoding. A final
/// group of two or three symbols yields one or two bytes.
pub fn decode(text: &str, offset: usize) -> CoreResult<Vec<u8>> {
    let input = text.as_bytes().get(offset..).ok_or_else(|| {
        CoreError::InvalidParameter(format!(
            "base64 offset {} past end of {} byte input",
            offset,
            text.len()
        ))
    })?;

    let mut len = input.len();
    for _ in 0..2 {
        if len > 0 && input[len - 1] == b'=' {
            len -= 1;
        }
    }
    let input = &input[..len];
    if len % 4 == 1 {
        return Err(CoreError::InvalidBase64(format!(
            "dangling symbol after {} complete groups",
            len / 4
        )));
    }

    let mut output = Vec::with_capacity(len * 3 / 4);
    for group in input.chunks(4) {
        let mut sextets = [0u8; 4];
        for (slot, &symbol) in sextets.iter_mut().zip(group) {
            let value = DECODE_TABLE[symbol as usize];
            if value == INVALID {
                return Err(CoreError::InvalidBase64(format!(
                    "invalid symbol {:?}",
                    symbol as char
                )));
            }
            *slot = value;
        }
        let [c1, c2, c3, c4] = sextets;
        output.push((c1 << 2) | (c2 >> 4));
        if group.len() > 2 {
            output.push(((c2 & 0x0F) << 4) | (c3 >> 2));
        }
        if group.len() > 3 {
            output.push(((c3 & 0x03) << 6) | c4);
        }
    }

    Ok(output)
}

/// Encodes `data` with padding.
pub fn encode(data: &[u8]) -> String {
    let mut output = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b1 = chunk[0];
        let b2 = chunk.get(1).copied().unwrap_or(0);
        let b3 = chunk.get(2).copied().unwrap_or(0);

        let n = ((b1 as u32) << 16) | ((b2 as u32) << 8) | (b3 as u32);

        output.push(ENCODE_TABLE[((n >> 18) & 0x3F) as usize] as char);
        output.push(ENCODE_TABLE[((n >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            output.push(ENCODE_TABLE[((n >> 6) & 0x3F) as usize] as char);
        } else {
            output.push('=');
        }
        if chunk.len() > 2 {
            output.push(ENCODE_TABLE[(n & 0x3F) as usize] as char);
        } else {
            output.push('=');
        }
    }
    output
}
