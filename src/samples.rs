//! Conversion between canonical `f64` samples and on-disk sample data.
//!
//! Decoding applies `canonical = scale * raw`; encoding applies
//! `raw = round(canonical / scale)` and clips integer and companded formats
//! to their representable range, counting each clip as an overload.
//! Streams are processed in blocks of at most [`BLOCK_BYTES`] bytes.

use super::error::{Error, Result};
use super::format::DataFormat;
use bytes::{Buf, BufMut};
use std::io::{self, Read, Write};

pub const BLOCK_BYTES: usize = 8192;

/// Fixed-width raw sample types. `parse` and `pack` work on values that
/// are already bias-corrected (offset-binary 8-bit data is centred on 0).
trait SampleType {
    const MIN: f64;
    const MAX: f64;
    const CLIPS: bool = true;

    fn parse(buf: &mut &[u8], big: bool) -> f64;
    fn pack(raw: f64, out: &mut Vec<u8>, big: bool);
}

impl SampleType for u8 {
    const MIN: f64 = -128.0;
    const MAX: f64 = 127.0;

    fn parse(buf: &mut &[u8], _big: bool) -> f64 {
        f64::from(buf.get_u8()) - 128.0
    }

    fn pack(raw: f64, out: &mut Vec<u8>, _big: bool) {
        out.put_u8((raw + 128.0) as u8);
    }
}

impl SampleType for i8 {
    const MIN: f64 = i8::MIN as f64;
    const MAX: f64 = i8::MAX as f64;

    fn parse(buf: &mut &[u8], _big: bool) -> f64 {
        f64::from(buf.get_i8())
    }

    fn pack(raw: f64, out: &mut Vec<u8>, _big: bool) {
        out.put_i8(raw as i8);
    }
}

impl SampleType for i16 {
    const MIN: f64 = i16::MIN as f64;
    const MAX: f64 = i16::MAX as f64;

    fn parse(buf: &mut &[u8], big: bool) -> f64 {
        f64::from(if big { buf.get_i16() } else { buf.get_i16_le() })
    }

    fn pack(raw: f64, out: &mut Vec<u8>, big: bool) {
        if big {
            out.put_i16(raw as i16)
        } else {
            out.put_i16_le(raw as i16)
        }
    }
}

/// 24-bit integers travel through a 4-byte slot so the sign extends.
struct I24;

impl SampleType for I24 {
    const MIN: f64 = -8_388_608.0;
    const MAX: f64 = 8_388_607.0;

    fn parse(buf: &mut &[u8], big: bool) -> f64 {
        let mut b = [0; 3];
        buf.copy_to_slice(&mut b);
        let slot = if big {
            i32::from_be_bytes([b[0], b[1], b[2], 0])
        } else {
            i32::from_le_bytes([0, b[0], b[1], b[2]])
        };
        f64::from(slot >> 8)
    }

    fn pack(raw: f64, out: &mut Vec<u8>, big: bool) {
        let slot = (raw as i32) << 8;
        if big {
            out.put_slice(&slot.to_be_bytes()[..3]);
        } else {
            out.put_slice(&slot.to_le_bytes()[1..]);
        }
    }
}

impl SampleType for i32 {
    const MIN: f64 = i32::MIN as f64;
    const MAX: f64 = i32::MAX as f64;

    fn parse(buf: &mut &[u8], big: bool) -> f64 {
        f64::from(if big { buf.get_i32() } else { buf.get_i32_le() })
    }

    fn pack(raw: f64, out: &mut Vec<u8>, big: bool) {
        if big {
            out.put_i32(raw as i32)
        } else {
            out.put_i32_le(raw as i32)
        }
    }
}

impl SampleType for f32 {
    const MIN: f64 = f64::NEG_INFINITY;
    const MAX: f64 = f64::INFINITY;
    const CLIPS: bool = false;

    fn parse(buf: &mut &[u8], big: bool) -> f64 {
        f64::from(if big { buf.get_f32() } else { buf.get_f32_le() })
    }

    fn pack(raw: f64, out: &mut Vec<u8>, big: bool) {
        if big {
            out.put_f32(raw as f32)
        } else {
            out.put_f32_le(raw as f32)
        }
    }
}

impl SampleType for f64 {
    const MIN: f64 = f64::NEG_INFINITY;
    const MAX: f64 = f64::INFINITY;
    const CLIPS: bool = false;

    fn parse(buf: &mut &[u8], big: bool) -> f64 {
        if big {
            buf.get_f64()
        } else {
            buf.get_f64_le()
        }
    }

    fn pack(raw: f64, out: &mut Vec<u8>, big: bool) {
        if big {
            out.put_f64(raw)
        } else {
            out.put_f64_le(raw)
        }
    }
}

/// G.711 companding through 16-bit linear values.
#[derive(Clone, Copy)]
enum Law {
    Mu,
    MuReversed,
    A,
}

impl Law {
    fn expand(self, byte: u8) -> f64 {
        let lin = match self {
            Law::Mu => audio_codec_algorithms::decode_ulaw(byte),
            Law::MuReversed => audio_codec_algorithms::decode_ulaw(byte.reverse_bits()),
            Law::A => audio_codec_algorithms::decode_alaw(byte),
        };
        f64::from(lin)
    }

    fn compress(self, raw: f64) -> u8 {
        let lin = raw as i16;
        match self {
            Law::Mu => audio_codec_algorithms::encode_ulaw(lin),
            Law::MuReversed => audio_codec_algorithms::encode_ulaw(lin).reverse_bits(),
            Law::A => audio_codec_algorithms::encode_alaw(lin),
        }
    }
}

// round and clip; returns the raw value and whether it clipped
fn quantize<T: SampleType>(canonical: f64, scale: f64) -> (f64, bool) {
    let raw = canonical / scale;
    if !T::CLIPS {
        return (raw, false);
    }
    let raw = raw.round();
    if raw > T::MAX {
        (T::MAX, true)
    } else if raw < T::MIN {
        (T::MIN, true)
    } else {
        (raw, false)
    }
}

fn decode_as<T: SampleType>(mut bytes: &[u8], out: &mut [f64], scale: f64, big: bool) {
    for v in out.iter_mut() {
        *v = scale * T::parse(&mut bytes, big);
    }
}

fn encode_as<T: SampleType>(input: &[f64], out: &mut Vec<u8>, scale: f64, big: bool) -> u64 {
    let mut overloads = 0;
    for x in input {
        let (raw, clipped) = quantize::<T>(*x, scale);
        overloads += u64::from(clipped);
        T::pack(raw, out, big);
    }
    overloads
}

/// Read-side and write-side sample conversion for one data format.
#[derive(Debug, Clone)]
pub struct Codec {
    format: DataFormat,
    swap: bool,
    scale: f64,
    per_line: usize,
    col: usize,
}

impl Codec {
    pub fn new(format: DataFormat, swap: bool, scale: f64) -> Codec {
        Codec {
            format,
            swap,
            scale,
            per_line: 1,
            col: 0,
        }
    }

    /// Values per output line for text data.
    pub fn with_per_line(mut self, per_line: usize) -> Codec {
        self.per_line = per_line.max(1);
        self
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn big_endian(&self) -> bool {
        cfg!(target_endian = "big") ^ self.swap
    }

    /// Decode as many whole samples as fit in both `bytes` and `out`.
    /// Returns the number decoded. Text data is not handled here.
    pub fn decode(&self, bytes: &[u8], out: &mut [f64]) -> usize {
        let width = self.format.width();
        if width == 0 {
            return 0;
        }
        let n = (bytes.len() / width).min(out.len());
        let (bytes, out) = (&bytes[..n * width], &mut out[..n]);
        let (s, big) = (self.scale, self.big_endian());
        match self.format {
            DataFormat::Uint8 => decode_as::<u8>(bytes, out, s, big),
            DataFormat::Int8 => decode_as::<i8>(bytes, out, s, big),
            DataFormat::Int16 => decode_as::<i16>(bytes, out, s, big),
            DataFormat::Int24 => decode_as::<I24>(bytes, out, s, big),
            DataFormat::Int32 => decode_as::<i32>(bytes, out, s, big),
            DataFormat::Float32 => decode_as::<f32>(bytes, out, s, big),
            DataFormat::Float64 => decode_as::<f64>(bytes, out, s, big),
            DataFormat::Mulaw8 => expand(Law::Mu, bytes, out, s),
            DataFormat::Mulawr8 => expand(Law::MuReversed, bytes, out, s),
            DataFormat::Alaw8 => expand(Law::A, bytes, out, s),
            DataFormat::Undefined | DataFormat::Text => return 0,
        }
        n
    }

    /// Append the encoding of `input` to `out`. Returns the overload count.
    pub fn encode(&self, input: &[f64], out: &mut Vec<u8>) -> u64 {
        let (s, big) = (self.scale, self.big_endian());
        match self.format {
            DataFormat::Uint8 => encode_as::<u8>(input, out, s, big),
            DataFormat::Int8 => encode_as::<i8>(input, out, s, big),
            DataFormat::Int16 => encode_as::<i16>(input, out, s, big),
            DataFormat::Int24 => encode_as::<I24>(input, out, s, big),
            DataFormat::Int32 => encode_as::<i32>(input, out, s, big),
            DataFormat::Float32 => encode_as::<f32>(input, out, s, big),
            DataFormat::Float64 => encode_as::<f64>(input, out, s, big),
            DataFormat::Mulaw8 => compress(Law::Mu, input, out, s),
            DataFormat::Mulawr8 => compress(Law::MuReversed, input, out, s),
            DataFormat::Alaw8 => compress(Law::A, input, out, s),
            DataFormat::Undefined | DataFormat::Text => 0,
        }
    }

    /// Read up to `out.len()` samples, stopping early only at end of
    /// stream. A trailing partial sample is discarded.
    pub fn read<R: Read>(&self, r: &mut R, out: &mut [f64]) -> Result<usize> {
        if self.format == DataFormat::Text {
            return read_text(r, self.scale, out);
        }
        let width = self.format.width();
        if width == 0 {
            return Err(Error::unsupported(format!("cannot decode {} data", self.format)));
        }
        let per_block = BLOCK_BYTES / width;
        let mut buf = vec![0u8; per_block.min(out.len()) * width];
        let mut done = 0;
        while done < out.len() {
            let want = (out.len() - done).min(per_block) * width;
            let got = read_full(r, &mut buf[..want])?;
            done += self.decode(&buf[..got], &mut out[done..]);
            if got < want {
                break;
            }
        }
        Ok(done)
    }

    /// Write all of `input`. Returns the overload count; a short write is
    /// an I/O error.
    pub fn write<W: Write>(&mut self, w: &mut W, input: &[f64]) -> Result<u64> {
        if self.format == DataFormat::Text {
            self.write_text(w, input)?;
            return Ok(0);
        }
        let width = self.format.width();
        if width == 0 {
            return Err(Error::unsupported(format!("cannot encode {} data", self.format)));
        }
        let mut buf = Vec::with_capacity(BLOCK_BYTES);
        let mut overloads = 0;
        for block in input.chunks(BLOCK_BYTES / width) {
            buf.clear();
            overloads += self.encode(block, &mut buf);
            w.write_all(&buf)?;
        }
        Ok(overloads)
    }

    fn write_text<W: Write>(&mut self, w: &mut W, input: &[f64]) -> io::Result<()> {
        let mut line = String::with_capacity(BLOCK_BYTES);
        for x in input {
            if self.col > 0 {
                line.push(' ');
            }
            line.push_str(&(x / self.scale).to_string());
            self.col += 1;
            if self.col == self.per_line {
                line.push('\n');
                self.col = 0;
            }
            if line.len() >= BLOCK_BYTES - 32 {
                w.write_all(line.as_bytes())?;
                line.clear();
            }
        }
        w.write_all(line.as_bytes())
    }

    /// Terminate a partially filled text line.
    pub fn finish<W: Write>(&mut self, w: &mut W) -> io::Result<()> {
        if self.format == DataFormat::Text && self.col > 0 {
            self.col = 0;
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

fn expand(law: Law, bytes: &[u8], out: &mut [f64], scale: f64) {
    for (v, b) in out.iter_mut().zip(bytes) {
        *v = scale * law.expand(*b);
    }
}

fn compress(law: Law, input: &[f64], out: &mut Vec<u8>, scale: f64) -> u64 {
    let mut overloads = 0;
    for x in input {
        let (raw, clipped) = quantize::<i16>(*x, scale);
        overloads += u64::from(clipped);
        out.put_u8(law.compress(raw));
    }
    overloads
}

/// Fill `buf` unless the stream ends first; returns the bytes read.
pub fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match r.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

fn read_byte<R: Read>(r: &mut R) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    Ok(match read_full(r, &mut b)? {
        0 => None,
        _ => Some(b[0]),
    })
}

fn is_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b','
}

/// Next whitespace or comma separated token. `%` starts a comment running
/// to the end of the line.
fn next_token<R: Read>(r: &mut R) -> io::Result<Option<String>> {
    let mut token = Vec::new();
    loop {
        let b = match read_byte(r)? {
            Some(b) => b,
            None => break,
        };
        if token.is_empty() && b == b'%' {
            while let Some(c) = read_byte(r)? {
                if c == b'\n' {
                    break;
                }
            }
        } else if is_separator(b) {
            if !token.is_empty() {
                break;
            }
        } else {
            token.push(b);
        }
    }
    if token.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&token).into_owned()))
}

/// Decode text samples, one per token.
pub fn read_text<R: Read>(r: &mut R, scale: f64, out: &mut [f64]) -> Result<usize> {
    for (i, v) in out.iter_mut().enumerate() {
        match next_token(r)? {
            Some(token) => {
                let raw: f64 = token.parse().map_err(|_| Error::Decode(token.clone()))?;
                *v = scale * raw;
            }
            None => return Ok(i),
        }
    }
    Ok(out.len())
}
