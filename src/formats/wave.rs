//! RIFF WAVE. Little-endian chunk sizes, chunks padded to even lengths.

use super::{pad_even, text_of, u32_field, Container, Field, HeaderLayout, Patch, ReadParams, WriteSetup};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{ByteOrder, DataFormat, FileType};
use crate::ids::{self, ChunkID};
use crate::info::InfoStore;
use crate::speaker;
use crate::stream::{read_chunk_id, read_vec, Sink, Source};
use bytes::{Buf, BufMut};
use log::{debug, warn};
use std::convert::TryFrom;
use std::io::{self, Read, Write};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_ALAW: u16 = 0x0006;
const WAVE_FORMAT_MULAW: u16 = 0x0007;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// Tail shared by every KSDATAFORMAT_SUBTYPE GUID.
const GUID_TAIL: [u8; 14] = [
    0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

/// RIFF INFO list entries and the info records they map to.
const INFO_TAGS: [(&ChunkID, &str); 7] = [
    (b"INAM", "title:"),
    (b"IART", "artist:"),
    (b"ICMT", "comment:"),
    (b"ICRD", "date:"),
    (b"ICOP", "copyright:"),
    (b"ISFT", "software:"),
    (b"IGNR", "genre:"),
];

pub struct Wave {
    /// Allowed to emit WAVE_FORMAT_EXTENSIBLE headers.
    pub extensible: bool,
}

#[derive(Debug)]
struct FormatChunk {
    tag: u16,
    channels: u16,
    rate: u32,
    block_align: u16,
    bits: u16,
    valid_bits: Option<u16>,
    channel_mask: u32,
}

impl FormatChunk {
    fn parse(payload: &[u8]) -> Result<FormatChunk> {
        if payload.len() < 16 {
            return Err(Error::header("fmt chunk too short"));
        }
        let mut buf = payload;
        let tag = buf.get_u16_le();
        let channels = buf.get_u16_le();
        let rate = buf.get_u32_le();
        let _bytes_per_sec = buf.get_u32_le();
        let block_align = buf.get_u16_le();
        let bits = buf.get_u16_le();
        let mut fmt = FormatChunk {
            tag,
            channels,
            rate,
            block_align,
            bits,
            valid_bits: None,
            channel_mask: 0,
        };
        if fmt.tag == WAVE_FORMAT_EXTENSIBLE {
            if buf.remaining() < 24 {
                return Err(Error::header("extensible fmt chunk too short"));
            }
            let _cb_size = buf.get_u16_le();
            let valid = buf.get_u16_le();
            fmt.valid_bits = if valid > 0 { Some(valid) } else { None };
            fmt.channel_mask = buf.get_u32_le();
            fmt.tag = buf.get_u16_le();
            if buf[..14] != GUID_TAIL {
                return Err(Error::unsupported("WAVE extensible subformat GUID"));
            }
        }
        Ok(fmt)
    }

    fn data_format(&self) -> Result<DataFormat> {
        if self.channels == 0 {
            return Err(Error::header("WAVE file with no channels"));
        }
        let width = self.block_align / self.channels;
        Ok(match (self.tag, width) {
            (WAVE_FORMAT_PCM, 1) => DataFormat::Uint8,
            (WAVE_FORMAT_PCM, 2) => DataFormat::Int16,
            (WAVE_FORMAT_PCM, 3) => DataFormat::Int24,
            (WAVE_FORMAT_PCM, 4) => DataFormat::Int32,
            (WAVE_FORMAT_IEEE_FLOAT, 4) => DataFormat::Float32,
            (WAVE_FORMAT_IEEE_FLOAT, 8) => DataFormat::Float64,
            (WAVE_FORMAT_ALAW, 1) => DataFormat::Alaw8,
            (WAVE_FORMAT_MULAW, 1) => DataFormat::Mulaw8,
            (tag, width) => {
                return Err(Error::unsupported(format!(
                    "WAVE format tag 0x{:04x} with {}-byte samples",
                    tag, width
                )))
            }
        })
    }
}

fn read_u32_le(src: &mut Source) -> io::Result<u32> {
    let mut b = [0; 4];
    src.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn parse_info_list(payload: &[u8], info: &mut InfoStore) {
    let mut buf = payload;
    while buf.remaining() >= 8 {
        let mut id = [0; 4];
        buf.copy_to_slice(&mut id);
        let size = buf.get_u32_le() as usize;
        if size > buf.remaining() {
            warn!("LIST/INFO entry {} runs past its list", ids::display(&id));
            break;
        }
        match INFO_TAGS.iter().find(|(tag, _)| **tag == id) {
            Some((_, record)) => info.append(record, &text_of(&buf[..size])),
            None => debug!("skipping LIST/INFO entry {}", ids::display(&id)),
        }
        buf.advance((size + size % 2).min(buf.remaining()));
    }
}

/// Consume one chunk whose header has been read, filing anything useful.
fn read_chunk_body(
    src: &mut Source,
    id: &ChunkID,
    size: u32,
    fmt: &mut Option<FormatChunk>,
    params: &mut ReadParams,
) -> Result<()> {
    let padded = u64::from(size) + u64::from(size % 2);
    match id {
        ids::FMT => {
            let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
            *fmt = Some(FormatChunk::parse(&payload[..size as usize])?);
        }
        ids::LIST => {
            let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
            if size >= 4 && payload.starts_with(ids::INFO) {
                parse_info_list(&payload[4..size as usize], &mut params.info);
            }
        }
        ids::AFSP_LOWER => {
            let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
            if size >= 4 && payload.starts_with(ids::AFSP) {
                params.info.extend(&InfoStore::from_block(&payload[4..size as usize]));
            }
        }
        _ => {
            debug!("skipping {} chunk", ids::display(id));
            if src.skip(padded)? < padded {
                return Err(Error::header(format!("{} chunk truncated", ids::display(id))));
            }
        }
    }
    Ok(())
}

impl Container for Wave {
    fn read_header(&self, src: &mut Source, _opts: &Options) -> Result<ReadParams> {
        let riff = read_chunk_id(src).map_err(Error::from_header_io)?;
        let riff_size = read_u32_le(src).map_err(Error::from_header_io)?;
        let form = read_chunk_id(src).map_err(Error::from_header_io)?;
        if &riff != ids::RIFF || &form != ids::WAVE {
            return Err(Error::header("not a RIFF WAVE file"));
        }

        let mut params = ReadParams::new(FileType::Wave, DataFormat::Undefined);
        params.byte_order = ByteOrder::Little;
        if riff_size == 0 || riff_size == u32::MAX {
            params.chunks.record_to_eof(ids::RIFF, 0);
        } else {
            params.chunks.record(ids::RIFF, 0, 8 + u64::from(riff_size));
        }

        let mut fmt = None;
        loop {
            let at = src.position();
            let id = read_chunk_id(src)
                .map_err(|_| Error::header("no data chunk in WAVE file"))?;
            let size = read_u32_le(src).map_err(Error::from_header_io)?;
            let end = at + 8 + u64::from(size) + u64::from(size % 2);

            if &id != ids::DATA {
                params.chunks.record(&id, at, end);
                read_chunk_body(src, &id, size, &mut fmt, &mut params)?;
                continue;
            }

            params.start = at + 8;
            if size == u32::MAX {
                params.chunks.record_to_eof(ids::DATA, at);
            } else {
                params.chunks.record(ids::DATA, at, end);
                params.data_bytes = Some(u64::from(size));
            }
            if src.is_seekable() && params.data_bytes.is_some() {
                // metadata after the samples
                src.seek_to(end)?;
                while let Ok(id) = read_chunk_id(src) {
                    let at = src.position() - 4;
                    let size = match read_u32_le(src) {
                        Ok(size) => size,
                        Err(_) => break,
                    };
                    params
                        .chunks
                        .record(&id, at, at + 8 + u64::from(size) + u64::from(size % 2));
                    if let Err(e) = read_chunk_body(src, &id, size, &mut fmt, &mut params) {
                        warn!("trailing {} chunk ignored: {}", ids::display(&id), e);
                        break;
                    }
                }
                src.seek_to(params.start)?;
            }
            break;
        }

        let fmt = fmt.ok_or_else(|| Error::header("WAVE data chunk before fmt chunk"))?;
        params.format = fmt.data_format()?;
        params.channels = usize::from(fmt.channels);
        params.sample_rate = f64::from(fmt.rate);
        let bits = u32::from(fmt.valid_bits.unwrap_or(fmt.bits));
        if !params.format.is_companded() && bits > 0 && bits < params.format.bits() {
            params.bits = Some(bits);
        }
        if fmt.channel_mask != 0 {
            let mut speakers = speaker::from_mask(fmt.channel_mask);
            speakers.truncate(params.channels);
            params.speakers = speakers;
        }
        Ok(params)
    }

    fn write_header(&self, sink: &mut Sink, setup: &WriteSetup) -> Result<HeaderLayout> {
        let (tag, wide_int) = match setup.format {
            DataFormat::Uint8 | DataFormat::Int16 => (WAVE_FORMAT_PCM, false),
            DataFormat::Int24 | DataFormat::Int32 => (WAVE_FORMAT_PCM, true),
            DataFormat::Float32 | DataFormat::Float64 => (WAVE_FORMAT_IEEE_FLOAT, false),
            DataFormat::Alaw8 => (WAVE_FORMAT_ALAW, false),
            DataFormat::Mulaw8 => (WAVE_FORMAT_MULAW, false),
            f => return Err(Error::unsupported(format!("{} data in WAVE files", f))),
        };
        let mask_ok = speaker::is_mask_order(setup.speakers);
        let extensible = self.extensible
            && !setup.format.is_companded()
            && (setup.channels > 2
                || (!setup.speakers.is_empty() && mask_ok)
                || setup.bits < setup.format.bits()
                || wide_int);
        let info = setup.header_info(false, extensible, extensible && mask_ok);

        let width = setup.format.width() as u16;
        let too_wide =
            || Error::unsupported(format!("{} channels in a WAVE file", setup.channels));
        let channels = u16::try_from(setup.channels).map_err(|_| too_wide())?;
        let block_align = width.checked_mul(channels).ok_or_else(too_wide)?;
        let rate = setup.sample_rate.round() as u32;
        let byte_rate = rate
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| Error::unsupported(format!("{} Hz byte rate overflows", rate)))?;
        let data_bytes = setup.data_bytes();
        let base = sink.position();

        let mut h = Vec::with_capacity(128);
        h.put_slice(ids::RIFF);
        h.put_u32_le(0); // patched below
        h.put_slice(ids::WAVE);

        h.put_slice(ids::FMT);
        h.put_u32_le(if extensible { 40 } else if tag == WAVE_FORMAT_PCM { 16 } else { 18 });
        h.put_u16_le(if extensible { WAVE_FORMAT_EXTENSIBLE } else { tag });
        h.put_u16_le(channels);
        h.put_u32_le(rate);
        h.put_u32_le(byte_rate);
        h.put_u16_le(block_align);
        h.put_u16_le(8 * width);
        if extensible {
            h.put_u16_le(22);
            h.put_u16_le(setup.bits as u16);
            h.put_u32_le(if mask_ok { speaker::to_mask(setup.speakers) } else { 0 });
            h.put_u16_le(tag);
            h.put_slice(&GUID_TAIL);
        } else if tag != WAVE_FORMAT_PCM {
            h.put_u16_le(0);
        }

        let mut patches = Vec::new();
        let mut chunks_at = vec![(*ids::FMT, 12u64, h.len() as u64)];
        if tag != WAVE_FORMAT_PCM || extensible {
            let at = h.len() as u64;
            h.put_slice(ids::FACT);
            h.put_u32_le(4);
            patches.push(Patch {
                offset: base + h.len() as u64,
                field: Field::Frames,
                big_endian: false,
            });
            h.put_u32_le(setup.frames.map_or(0, u32_field));
            chunks_at.push((*ids::FACT, at, h.len() as u64));
        }

        if !info.is_empty() {
            let at = h.len() as u64;
            let mut body = ids::AFSP.to_vec();
            body.put_slice(&info.to_block());
            h.put_slice(ids::AFSP_LOWER);
            h.put_u32_le(body.len() as u32);
            h.put_slice(&body);
            pad_even(&mut h);
            chunks_at.push((*ids::AFSP_LOWER, at, h.len() as u64));
        }

        let data_at = h.len() as u64;
        h.put_slice(ids::DATA);
        patches.push(Patch {
            offset: base + h.len() as u64,
            field: Field::DataPlus(0),
            big_endian: false,
        });
        // all-ones sizes tell streaming readers the length is open
        h.put_u32_le(data_bytes.map_or(u32::MAX, u32_field));

        let header_len = h.len() as u64;
        let riff_size = data_bytes.map_or(u32::MAX, |n| u32_field(header_len - 8 + n + n % 2));
        h[4..8].copy_from_slice(&riff_size.to_le_bytes());
        patches.push(Patch {
            offset: base + 4,
            field: Field::FileLess(base + 8),
            big_endian: false,
        });
        sink.write_all(&h)?;

        let mut layout = HeaderLayout::new(base + header_len, ByteOrder::Little);
        layout.patches = patches;
        layout.pad_even = true;
        layout.chunks.record_to_eof(ids::RIFF, base);
        for (id, start, end) in chunks_at {
            layout.chunks.record(&id, base + start, base + end);
        }
        layout.chunks.record_to_eof(ids::DATA, base + data_at);
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info;
    use crate::speaker::Speaker;
    use crate::stream::SharedBuf;
    use std::io::Cursor;

    fn pcm16_fmt(channels: u16, rate: u32) -> Vec<u8> {
        let mut f = Vec::new();
        f.put_u16_le(WAVE_FORMAT_PCM);
        f.put_u16_le(channels);
        f.put_u32_le(rate);
        f.put_u32_le(rate * 2 * u32::from(channels));
        f.put_u16_le(2 * channels);
        f.put_u16_le(16);
        f
    }

    fn chunk(id: &[u8], body: &[u8]) -> Vec<u8> {
        let mut c = id.to_vec();
        c.put_u32_le(body.len() as u32);
        c.put_slice(body);
        pad_even(&mut c);
        c
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut f = b"RIFF".to_vec();
        f.put_u32_le(4 + body.len() as u32);
        f.put_slice(b"WAVE");
        f.put_slice(&body);
        f
    }

    #[test]
    fn reads_pcm_with_trailing_info() {
        let mut list = b"INFO".to_vec();
        list.put_slice(&chunk(b"INAM", b"tone\0"));
        let file = riff(&[
            chunk(b"fmt ", &pcm16_fmt(2, 22050)),
            chunk(b"data", &[0; 8]),
            chunk(b"LIST", &list),
        ]);
        let len = file.len() as u64;

        let mut src = Source::seekable(Cursor::new(file));
        let p = Wave { extensible: true }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert_eq!(p.format, DataFormat::Int16);
        assert_eq!(p.channels, 2);
        assert_eq!(p.sample_rate, 22050.0);
        assert_eq!(p.start, 44);
        assert_eq!(p.data_bytes, Some(8));
        assert_eq!(p.info.find(info::TITLE), Some("tone"));
        assert_eq!(src.position(), 44);
        assert!(p.chunks.validate(Some(len)).is_empty());
    }

    #[test]
    fn sequential_stream_stops_at_data() {
        let file = riff(&[chunk(b"fmt ", &pcm16_fmt(1, 8000)), chunk(b"data", &[0; 4])]);
        let mut src = Source::sequential(Cursor::new(file));
        let p = Wave { extensible: true }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert_eq!(p.start, 44);
        assert_eq!(src.position(), 44);
    }

    #[test]
    fn missing_fmt_is_a_header_error() {
        let file = riff(&[chunk(b"data", &[0; 4])]);
        let mut src = Source::seekable(Cursor::new(file));
        assert!(matches!(
            Wave { extensible: true }.read_header(&mut src, &Options::default()),
            Err(Error::Header(_))
        ));
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let mut fmt = pcm16_fmt(1, 8000);
        fmt[0] = 0x02; // MS ADPCM
        let file = riff(&[chunk(b"fmt ", &fmt), chunk(b"data", &[0; 4])]);
        let mut src = Source::seekable(Cursor::new(file));
        assert!(matches!(
            Wave { extensible: true }.read_header(&mut src, &Options::default()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn extensible_header_layout() {
        let info = InfoStore::new();
        let speakers = [Speaker::FrontLeft, Speaker::FrontRight, Speaker::FrontCenter];
        let setup = WriteSetup {
            file_type: FileType::Wave,
            format: DataFormat::Int24,
            channels: 3,
            sample_rate: 48000.0,
            bits: 20,
            frames: Some(2),
            speakers: &speakers,
            info: &info,
            full_scale: 8_388_608.0,
            byte_order: ByteOrder::Native,
        };
        let buf = SharedBuf::default();
        let mut sink = Sink::seekable(buf.clone());
        let layout = Wave { extensible: true }.write_header(&mut sink, &setup).unwrap();
        assert_eq!(layout.start, 12 + 48 + 12 + 8);
        sink.write_all(&[0; 18]).unwrap();
        sink.flush().unwrap();

        let h = buf.bytes();
        let le16 = |at: usize| u16::from_le_bytes([h[at], h[at + 1]]);
        let le32 = |at: usize| u32::from_le_bytes([h[at], h[at + 1], h[at + 2], h[at + 3]]);
        assert_eq!(le32(4), 90);
        assert_eq!(h[12..16], *b"fmt ");
        assert_eq!(le32(16), 40);
        assert_eq!(le16(20), WAVE_FORMAT_EXTENSIBLE);
        assert_eq!(le16(22), 3);
        assert_eq!(le32(24), 48000);
        assert_eq!(le32(28), 48000 * 9);
        assert_eq!(le16(32), 9);
        assert_eq!(le16(34), 24);
        assert_eq!(le16(38), 20); // valid bits
        assert_eq!(le32(40), 0b111); // FL | FR | FC
        assert_eq!(le16(44), WAVE_FORMAT_PCM);
        assert_eq!(h[46..60], GUID_TAIL);
        assert_eq!(h[60..64], *b"fact");
        assert_eq!(le32(68), 2);
        assert_eq!(h[72..76], *b"data");
        assert_eq!(le32(76), 18);

        let mut src = Source::seekable(Cursor::new(h));
        let p = Wave { extensible: true }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert_eq!(p.bits, Some(20));
        assert_eq!(p.speakers, speakers);
        assert!(p.info.is_empty());
    }

    #[test]
    fn short_list_and_afsp_chunks_are_skipped() {
        for id in [b"LIST", b"afsp"] {
            let mut odd = id.to_vec();
            odd.put_u32_le(3);
            odd.put_slice(if id == b"LIST" { b"INFO" } else { b"AFsp" });
            let file = riff(&[chunk(b"fmt ", &pcm16_fmt(1, 8000)), odd, chunk(b"data", &[0; 4])]);
            let mut src = Source::seekable(Cursor::new(file));
            let p = Wave { extensible: true }
                .read_header(&mut src, &Options::default())
                .unwrap();
            assert!(p.info.is_empty());
            assert_eq!(p.data_bytes, Some(4));
        }
    }

    fn setup_with_channels(channels: usize, info: &InfoStore) -> WriteSetup<'_> {
        WriteSetup {
            file_type: FileType::WaveNoEx,
            format: DataFormat::Int16,
            channels,
            sample_rate: 8000.0,
            bits: 16,
            frames: None,
            speakers: &[],
            info,
            full_scale: 32768.0,
            byte_order: ByteOrder::Native,
        }
    }

    #[test]
    fn channel_count_must_fit_the_header() {
        let info = InfoStore::new();
        for channels in [70_000, 40_000] {
            let setup = setup_with_channels(channels, &info);
            let mut sink = Sink::sequential(Vec::new());
            assert!(matches!(
                Wave { extensible: false }.write_header(&mut sink, &setup),
                Err(Error::UnsupportedFormat(_))
            ));
        }
        let mut sink = Sink::sequential(Vec::new());
        assert!(Wave { extensible: false }
            .write_header(&mut sink, &setup_with_channels(2, &info))
            .is_ok());
    }
}
