// IEEE 754 80-bit extended precision, as used for the AIFF sample rate
// https://en.wikipedia.org/wiki/Extended_precision#x86_extended_precision_format
// 1 sign bit, 15 exponent bits, 64-bit significand with explicit integer bit

const EXP_BIAS: i32 = 16383;
const SIGN_BIT: u8 = 0b1000_0000;

/// Decode big-endian extended precision bytes. Infinities, NaNs and
/// values too large for `f64` are rejected; denormals decode normally.
pub fn parse_extended_precision_bytes(b: [u8; 10]) -> Option<f64> {
    let is_neg = b[0] & SIGN_BIT == SIGN_BIT;
    let exp = i32::from(u16::from_be_bytes([b[0] & !SIGN_BIT, b[1]]));
    let mut sig = [0u8; 8];
    sig.copy_from_slice(&b[2..]);
    let significand = u64::from_be_bytes(sig);

    if exp == 0x7fff {
        return None;
    }
    if significand == 0 {
        return Some(if is_neg { -0.0 } else { 0.0 });
    }

    // value = (significand / 2^63) * 2^(exp - bias)
    let res = significand as f64 / 2f64.powi(63) * 2f64.powi(exp - EXP_BIAS);
    if !res.is_finite() {
        // beyond the f64 range
        return None;
    }
    Some(if is_neg { -res } else { res })
}

/// Encode a finite `f64` as big-endian extended precision bytes.
pub fn to_extended_precision_bytes(val: f64) -> [u8; 10] {
    let mut out = [0u8; 10];
    if val == 0.0 || !val.is_finite() {
        if val.is_sign_negative() {
            out[0] = SIGN_BIT;
        }
        return out;
    }

    let bits = val.abs().to_bits();
    let raw_exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);
    let (exp, significand) = if raw_exp == 0 {
        // f64 denormal: normalise into the explicit integer bit
        let shift = frac.leading_zeros() - 11;
        (1 - 1023 - shift as i32, frac << (shift + 11))
    } else {
        (raw_exp - 1023, ((1u64 << 52) | frac) << 11)
    };

    let biased = (exp + EXP_BIAS) as u16;
    out[..2].copy_from_slice(&biased.to_be_bytes());
    if val < 0.0 {
        out[0] |= SIGN_BIT;
    }
    out[2..].copy_from_slice(&significand.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_rates() {
        // 44100 Hz as written by common AIFF encoders
        let b = [0x40, 0x0e, 0xac, 0x44, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_extended_precision_bytes(b), Some(44100.0));
        assert_eq!(to_extended_precision_bytes(44100.0), b);

        let b = [0x40, 0x0b, 0xfa, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_extended_precision_bytes(b), Some(8000.0));
    }

    #[test]
    fn round_trips() {
        for v in [1.0, 0.5, 22050.0, 11025.5, 96000.0, -3.75, 1e-30, 6.02e23] {
            let b = to_extended_precision_bytes(v);
            assert_eq!(parse_extended_precision_bytes(b), Some(v), "{}", v);
        }
        assert_eq!(parse_extended_precision_bytes([0; 10]), Some(0.0));
    }

    #[test]
    fn rejects_nan_and_infinity() {
        let b = [0x7f, 0xff, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_extended_precision_bytes(b), None);
        let b = [0x7f, 0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_extended_precision_bytes(b), None);
    }
}
