//! AIFF and AIFF-C. Big-endian IFF chunks padded to even lengths; the
//! sample rate is an 80-bit extended float in the COMM chunk.

use super::{pad_even, text_of, u32_field, Container, Field, HeaderLayout, Patch, ReadParams, WriteSetup};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::extended::{parse_extended_precision_bytes, to_extended_precision_bytes};
use crate::format::{ByteOrder, DataFormat, FileType};
use crate::ids::{self, ChunkID};
use crate::info::InfoStore;
use crate::stream::{read_chunk_id, read_vec, Sink, Source};
use bytes::{Buf, BufMut};
use id3::TagLike;
use log::{debug, warn};
use std::convert::TryFrom;
use std::io::{self, Cursor, Read, Write};

/// AIFF-C version 1 timestamp, the only FVER value in use.
const AIFC_VERSION_1: u32 = 0xA280_5140;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Aiff,
    Aifc,
    /// AIFF-C with little-endian integer samples.
    Sowt,
}

pub struct Aiff {
    pub kind: Kind,
}

struct Common {
    channels: i16,
    frames: u32,
    bits: i16,
    rate: f64,
    compression: ChunkID,
}

impl Common {
    fn parse(payload: &[u8], aifc: bool) -> Result<Common> {
        if payload.len() < if aifc { 22 } else { 18 } {
            return Err(Error::header("COMM chunk too short"));
        }
        let mut buf = payload;
        let (channels, frames, bits) = (buf.get_i16(), buf.get_u32(), buf.get_i16());
        let mut rate = [0; 10];
        buf.copy_to_slice(&mut rate);
        let rate = parse_extended_precision_bytes(rate)
            .ok_or_else(|| Error::header("COMM sample rate is not a number"))?;
        let mut compression = *ids::NONE;
        if aifc {
            buf.copy_to_slice(&mut compression);
        }
        Ok(Common { channels, frames, bits, rate, compression })
    }

    fn data_format(&self) -> Result<(DataFormat, ByteOrder)> {
        let int = || match self.bits {
            1..=8 => Ok(DataFormat::Int8),
            9..=16 => Ok(DataFormat::Int16),
            17..=24 => Ok(DataFormat::Int24),
            25..=32 => Ok(DataFormat::Int32),
            b => Err(Error::header(format!("AIFF sample size {} bits", b))),
        };
        Ok(match &self.compression {
            ids::NONE | ids::TWOS => (int()?, ByteOrder::Big),
            ids::SOWT => (int()?, ByteOrder::Little),
            ids::RAW => (DataFormat::Uint8, ByteOrder::Big),
            ids::FL32 | ids::FL32_UPPER => (DataFormat::Float32, ByteOrder::Big),
            ids::FL64 | ids::FL64_UPPER => (DataFormat::Float64, ByteOrder::Big),
            ids::ULAW | ids::ULAW_UPPER => (DataFormat::Mulaw8, ByteOrder::Big),
            ids::ALAW | ids::ALAW_UPPER => (DataFormat::Alaw8, ByteOrder::Big),
            c => {
                return Err(Error::unsupported(format!(
                    "AIFF-C compression type {}",
                    ids::display(c)
                )))
            }
        })
    }
}

fn read_u32_be(src: &mut Source) -> io::Result<u32> {
    let mut b = [0; 4];
    src.read_exact(&mut b)?;
    Ok(u32::from_be_bytes(b))
}

/// Pascal string padded so count byte plus text is even.
fn put_pstring(buf: &mut Vec<u8>, text: &str) {
    let text = &text.as_bytes()[..text.len().min(255)];
    buf.put_u8(text.len() as u8);
    buf.put_slice(text);
    if text.len() % 2 == 0 {
        buf.put_u8(0);
    }
}

fn read_id3(payload: &[u8], info: &mut InfoStore) {
    #[allow(deprecated)]
    let tag = match id3::Tag::read_from(Cursor::new(payload)) {
        Ok(tag) => tag,
        Err(e) => {
            warn!("ID3 chunk ignored: {}", e);
            return;
        }
    };
    if let Some(title) = tag.title() {
        info.append("title:", title);
    }
    if let Some(artist) = tag.artist() {
        info.append("artist:", artist);
    }
    if let Some(album) = tag.album() {
        info.append("album:", album);
    }
    if let Some(year) = tag.year() {
        info.append("year:", &year.to_string());
    }
}

fn text_record(id: &ChunkID) -> Option<&'static str> {
    match id {
        ids::NAME => Some("name:"),
        ids::AUTHOR => Some("author:"),
        ids::COPYRIGHT => Some("copyright:"),
        ids::ANNOTATION => Some("annotation:"),
        _ => None,
    }
}

impl Container for Aiff {
    fn read_header(&self, src: &mut Source, _opts: &Options) -> Result<ReadParams> {
        let form = read_chunk_id(src).map_err(Error::from_header_io)?;
        let form_size = read_u32_be(src).map_err(Error::from_header_io)?;
        let form_type = read_chunk_id(src).map_err(Error::from_header_io)?;
        if &form != ids::FORM {
            return Err(Error::header("not an IFF FORM file"));
        }
        let aifc = match &form_type {
            ids::AIFF => false,
            ids::AIFF_C => true,
            t => return Err(Error::header(format!("unknown FORM type {}", ids::display(t)))),
        };

        let mut params = ReadParams::new(FileType::Aiff, DataFormat::Undefined);
        if form_size == 0 {
            params.chunks.record_to_eof(ids::FORM, 0);
        } else {
            params.chunks.record(ids::FORM, 0, 8 + u64::from(form_size));
        }

        let mut common: Option<Common> = None;
        let mut sound: Option<(u64, u64)> = None;
        loop {
            let at = src.position();
            let id = match read_chunk_id(src) {
                Ok(id) => id,
                Err(_) => break,
            };
            let size = read_u32_be(src).map_err(Error::from_header_io)?;
            let padded = u64::from(size) + u64::from(size % 2);
            params.chunks.record(&id, at, at + 8 + padded);

            match &id {
                ids::COMMON => {
                    let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
                    common = Some(Common::parse(&payload, aifc)?);
                }
                ids::SOUND => {
                    let head = read_vec(src, 8).map_err(Error::from_header_io)?;
                    let mut head = &head[..];
                    let offset = u64::from(head.get_u32());
                    let bytes = u64::from(size)
                        .checked_sub(8 + offset)
                        .ok_or_else(|| Error::header("SSND offset past end of chunk"))?;
                    sound = Some((at + 16 + offset, bytes));
                    if !src.is_seekable() {
                        if common.is_none() {
                            return Err(Error::header(
                                "COMM chunk after sample data in a sequential stream",
                            ));
                        }
                        src.seek_to(at + 16 + offset)?;
                        break;
                    }
                    src.seek_to(at + 8 + padded)?;
                }
                ids::APPLICATION => {
                    let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
                    if size >= 4 && payload.starts_with(ids::AFSP) {
                        params.info.extend(&InfoStore::from_block(&payload[4..size as usize]));
                    }
                }
                id if text_record(id).is_some() => {
                    let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
                    if let Some(record) = text_record(id) {
                        params.info.append(record, &text_of(&payload[..size as usize]));
                    }
                }
                ids::ID3 | b"id3 " => {
                    let payload = read_vec(src, padded).map_err(Error::from_header_io)?;
                    read_id3(&payload[..size as usize], &mut params.info);
                }
                id => {
                    debug!("skipping {} chunk", ids::display(id));
                    if src.skip(padded)? < padded {
                        warn!("{} chunk truncated", ids::display(id));
                        break;
                    }
                }
            }
        }

        let common = common.ok_or_else(|| Error::header("no COMM chunk"))?;
        let (start, ssnd_bytes) = sound.ok_or_else(|| Error::header("no SSND chunk"))?;
        src.seek_to(start)?;

        let (format, byte_order) = common.data_format()?;
        if common.channels <= 0 {
            return Err(Error::header(format!("{} channels in COMM chunk", common.channels)));
        }
        params.file_type = match (aifc, byte_order) {
            (false, _) => FileType::Aiff,
            (true, ByteOrder::Little) => FileType::AifcSowt,
            (true, _) => FileType::Aifc,
        };
        params.format = format;
        params.byte_order = byte_order;
        params.channels = common.channels as usize;
        params.sample_rate = common.rate;
        params.start = start;

        let frame_bytes = u64::from(common.frames) * params.channels as u64 * format.width() as u64;
        if frame_bytes != ssnd_bytes {
            debug!(
                "COMM frames cover {} bytes, SSND holds {}",
                frame_bytes, ssnd_bytes
            );
        }
        params.data_bytes = Some(frame_bytes.min(ssnd_bytes));

        let bits = common.bits as u32;
        if !format.is_float() && !format.is_companded() && bits < format.bits() {
            params.bits = Some(bits);
        }
        Ok(params)
    }

    fn write_header(&self, sink: &mut Sink, setup: &WriteSetup) -> Result<HeaderLayout> {
        let format = setup.format;
        let int = matches!(
            format,
            DataFormat::Int8 | DataFormat::Int16 | DataFormat::Int24 | DataFormat::Int32
        );
        let (compression, name): (&ChunkID, &str) = match (self.kind, format) {
            (Kind::Aiff, _) if int => (ids::NONE, ""),
            (Kind::Aifc, _) if int => (ids::NONE, "not compressed"),
            (Kind::Aifc, DataFormat::Float32) => (ids::FL32, "32-bit floating point"),
            (Kind::Aifc, DataFormat::Float64) => (ids::FL64, "64-bit floating point"),
            (Kind::Aifc, DataFormat::Mulaw8) => (ids::ULAW, "uLaw 2:1"),
            (Kind::Aifc, DataFormat::Alaw8) => (ids::ALAW, "ALaw 2:1"),
            (Kind::Sowt, DataFormat::Int16 | DataFormat::Int24 | DataFormat::Int32) => {
                (ids::SOWT, "")
            }
            (_, f) => return Err(Error::unsupported(format!("{} data in {} files", f, setup.file_type))),
        };
        let channels = i16::try_from(setup.channels).map_err(|_| {
            Error::unsupported(format!("{} channels in {} files", setup.channels, setup.file_type))
        })?;
        let aifc = self.kind != Kind::Aiff;
        let byte_order = if self.kind == Kind::Sowt { ByteOrder::Little } else { ByteOrder::Big };
        let sample_size = if int { setup.bits } else { format.bits() };
        let info = setup.header_info(true, int, false);
        let data_bytes = setup.data_bytes();
        let base = sink.position();

        let mut h = Vec::with_capacity(128);
        h.put_slice(ids::FORM);
        h.put_u32(0); // patched below
        h.put_slice(if aifc { ids::AIFF_C } else { ids::AIFF });
        let mut regions = Vec::new();

        if aifc {
            h.put_slice(ids::FVER);
            h.put_u32(4);
            h.put_u32(AIFC_VERSION_1);
            regions.push((*ids::FVER, 12, 24));
        }

        let comm_at = h.len() as u64;
        let mut comm = Vec::with_capacity(64);
        comm.put_i16(channels);
        let frames_at = comm_at + 8 + comm.len() as u64;
        comm.put_u32(setup.frames.map_or(0, u32_field));
        comm.put_i16(sample_size as i16);
        comm.put_slice(&to_extended_precision_bytes(setup.sample_rate));
        if aifc {
            comm.put_slice(compression);
            put_pstring(&mut comm, name);
        }
        h.put_slice(ids::COMMON);
        h.put_u32(comm.len() as u32);
        h.put_slice(&comm);
        regions.push((*ids::COMMON, comm_at, h.len() as u64));

        if !info.is_empty() {
            let at = h.len() as u64;
            let mut body = ids::AFSP.to_vec();
            body.put_slice(&info.to_block());
            h.put_slice(ids::APPLICATION);
            h.put_u32(body.len() as u32);
            h.put_slice(&body);
            pad_even(&mut h);
            regions.push((*ids::APPLICATION, at, h.len() as u64));
        }

        let ssnd_at = h.len() as u64;
        h.put_slice(ids::SOUND);
        h.put_u32(data_bytes.map_or(8, |n| u32_field(n + 8)));
        h.put_u32(0); // offset
        h.put_u32(0); // block size

        let header_len = h.len() as u64;
        let form_size = data_bytes.map_or(0, |n| u32_field(header_len - 8 + n + n % 2));
        h[4..8].copy_from_slice(&form_size.to_be_bytes());
        sink.write_all(&h)?;

        let mut layout = HeaderLayout::new(base + header_len, byte_order);
        layout.pad_even = true;
        layout.open_ended = false;
        layout.patches = vec![
            Patch { offset: base + 4, field: Field::FileLess(base + 8), big_endian: true },
            Patch { offset: base + frames_at, field: Field::Frames, big_endian: true },
            Patch { offset: base + ssnd_at + 4, field: Field::DataPlus(8), big_endian: true },
        ];
        layout.chunks.record_to_eof(ids::FORM, base);
        for (id, start, end) in regions {
            layout.chunks.record(&id, base + start, base + end);
        }
        layout.chunks.record_to_eof(ids::SOUND, base + ssnd_at);
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info;
    use id3::{Tag, Version};

    fn chunk(id: &[u8], body: &[u8]) -> Vec<u8> {
        let mut c = id.to_vec();
        c.put_u32(body.len() as u32);
        c.put_slice(body);
        pad_even(&mut c);
        c
    }

    fn form(kind: &[u8], chunks: &[Vec<u8>]) -> Vec<u8> {
        let body = chunks.concat();
        let mut f = b"FORM".to_vec();
        f.put_u32(4 + body.len() as u32);
        f.put_slice(kind);
        f.put_slice(&body);
        f
    }

    fn comm(channels: i16, frames: u32, bits: i16, rate: f64, compression: Option<&[u8]>) -> Vec<u8> {
        let mut c = Vec::new();
        c.put_i16(channels);
        c.put_u32(frames);
        c.put_i16(bits);
        c.put_slice(&to_extended_precision_bytes(rate));
        if let Some(t) = compression {
            c.put_slice(t);
            put_pstring(&mut c, "");
        }
        c
    }

    fn ssnd(data: &[u8]) -> Vec<u8> {
        let mut s = vec![0; 8];
        s.put_slice(data);
        s
    }

    #[test]
    fn comm_after_ssnd_when_seekable() {
        let file = form(
            b"AIFF",
            &[
                chunk(b"SSND", &ssnd(&[0, 1, 0, 2, 0, 3])),
                chunk(b"NAME", b"take 1"),
                chunk(b"COMM", &comm(1, 3, 12, 44100.0, None)),
            ],
        );
        let mut src = Source::seekable(Cursor::new(file));
        let p = Aiff { kind: Kind::Aiff }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert_eq!(p.file_type, FileType::Aiff);
        assert_eq!(p.format, DataFormat::Int16);
        assert_eq!(p.bits, Some(12));
        assert_eq!(p.sample_rate, 44100.0);
        assert_eq!(p.start, 12 + 16);
        assert_eq!(p.data_bytes, Some(6));
        assert_eq!(p.info.find(&["name:"]), Some("take 1"));
        assert_eq!(src.position(), 28);
    }

    #[test]
    fn comm_after_ssnd_fails_on_a_stream() {
        let file = form(
            b"AIFF",
            &[
                chunk(b"SSND", &ssnd(&[0, 1])),
                chunk(b"COMM", &comm(1, 1, 16, 8000.0, None)),
            ],
        );
        let mut src = Source::sequential(Cursor::new(file));
        assert!(matches!(
            Aiff { kind: Kind::Aiff }.read_header(&mut src, &Options::default()),
            Err(Error::Header(_))
        ));
    }

    #[test]
    fn aifc_compression_types() {
        let file = form(
            b"AIFC",
            &[
                chunk(b"COMM", &comm(2, 1, 16, 8000.0, Some(b"sowt"))),
                chunk(b"SSND", &ssnd(&[1, 0, 2, 0])),
            ],
        );
        let mut src = Source::sequential(Cursor::new(file));
        let p = Aiff { kind: Kind::Aifc }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert_eq!(p.file_type, FileType::AifcSowt);
        assert_eq!(p.byte_order, ByteOrder::Little);

        let file = form(
            b"AIFC",
            &[
                chunk(b"COMM", &comm(1, 1, 4, 8000.0, Some(b"ima4"))),
                chunk(b"SSND", &ssnd(&[0; 34])),
            ],
        );
        let mut src = Source::seekable(Cursor::new(file));
        assert!(matches!(
            Aiff { kind: Kind::Aifc }.read_header(&mut src, &Options::default()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn id3_chunk_becomes_info() {
        let mut tag = Tag::new();
        tag.set_title("Devil");
        tag.set_artist("Someone");
        let mut id3 = Vec::new();
        tag.write_to(&mut id3, Version::Id3v24).unwrap();

        let file = form(
            b"AIFF",
            &[
                chunk(b"COMM", &comm(1, 1, 16, 8000.0, None)),
                chunk(b"SSND", &ssnd(&[0, 0])),
                chunk(b"ID3 ", &id3),
            ],
        );
        let mut src = Source::seekable(Cursor::new(file));
        let p = Aiff { kind: Kind::Aiff }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert_eq!(p.info.find(info::TITLE), Some("Devil"));
        assert_eq!(p.info.find(&["artist:"]), Some("Someone"));
    }

    #[test]
    fn short_appl_chunk_is_skipped() {
        let mut appl = b"APPL".to_vec();
        appl.put_u32(3);
        appl.put_slice(b"AFsp");
        let file = form(
            b"AIFF",
            &[
                chunk(b"COMM", &comm(1, 1, 16, 8000.0, None)),
                appl,
                chunk(b"SSND", &ssnd(&[0, 0])),
            ],
        );
        let mut src = Source::seekable(Cursor::new(file));
        let p = Aiff { kind: Kind::Aiff }
            .read_header(&mut src, &Options::default())
            .unwrap();
        assert!(p.info.is_empty());
        assert_eq!(p.data_bytes, Some(2));
    }

    #[test]
    fn overflowing_sample_rate_is_a_header_error() {
        let mut c = comm(1, 1, 16, 8000.0, None);
        c[8..18].copy_from_slice(&[0x7f, 0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0]);
        let file = form(b"AIFF", &[chunk(b"COMM", &c), chunk(b"SSND", &ssnd(&[0, 0]))]);
        let mut src = Source::seekable(Cursor::new(file));
        assert!(matches!(
            Aiff { kind: Kind::Aiff }.read_header(&mut src, &Options::default()),
            Err(Error::Header(_))
        ));
    }

    #[test]
    fn channel_count_must_fit_comm() {
        let info = InfoStore::new();
        let setup = WriteSetup {
            file_type: FileType::Aiff,
            format: DataFormat::Int16,
            channels: 40_000,
            sample_rate: 8000.0,
            bits: 16,
            frames: None,
            speakers: &[],
            info: &info,
            full_scale: 32768.0,
            byte_order: ByteOrder::Native,
        };
        let mut sink = Sink::sequential(Vec::new());
        assert!(matches!(
            Aiff { kind: Kind::Aiff }.write_header(&mut sink, &setup),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn pstrings_are_even() {
        let mut b = Vec::new();
        put_pstring(&mut b, "");
        assert_eq!(b, vec![0, 0]);
        let mut b = Vec::new();
        put_pstring(&mut b, "a");
        assert_eq!(b, vec![1, b'a']);
    }
}
