//! Sun/NeXT audio: a 24-byte big-endian header, a free-form annotation
//! block, then the samples.

use super::{u32_field, Container, HeaderLayout, Patch, Field, ReadParams, WriteSetup};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{ByteOrder, DataFormat, FileType};
use crate::ids;
use crate::info::InfoStore;
use crate::stream::{read_vec, Sink, Source};
use bytes::{Buf, BufMut};
use log::debug;
use std::convert::TryFrom;
use std::io::Write;

const HEADER_BYTES: u64 = 24;
/// Data size value meaning "runs to end of file".
const UNKNOWN_SIZE: u32 = 0xffff_ffff;

pub struct Au;

fn format_of(encoding: u32) -> Result<DataFormat> {
    Ok(match encoding {
        1 => DataFormat::Mulaw8,
        2 => DataFormat::Int8,
        3 => DataFormat::Int16,
        4 => DataFormat::Int24,
        5 => DataFormat::Int32,
        6 => DataFormat::Float32,
        7 => DataFormat::Float64,
        27 => DataFormat::Alaw8,
        23..=26 => {
            return Err(Error::unsupported(format!(
                "AU encoding {} (G.72x ADPCM)",
                encoding
            )))
        }
        e => return Err(Error::unsupported(format!("AU encoding {}", e))),
    })
}

fn encoding_of(format: DataFormat) -> Result<u32> {
    Ok(match format {
        DataFormat::Mulaw8 => 1,
        DataFormat::Int8 => 2,
        DataFormat::Int16 => 3,
        DataFormat::Int24 => 4,
        DataFormat::Int32 => 5,
        DataFormat::Float32 => 6,
        DataFormat::Float64 => 7,
        DataFormat::Alaw8 => 27,
        f => return Err(Error::unsupported(format!("{} data in AU files", f))),
    })
}

impl Container for Au {
    fn read_header(&self, src: &mut Source, _opts: &Options) -> Result<ReadParams> {
        let header = read_vec(src, HEADER_BYTES).map_err(Error::from_header_io)?;
        let mut buf = &header[..];

        let mut magic = [0; 4];
        buf.copy_to_slice(&mut magic);
        if &magic != ids::AU_MAGIC {
            return Err(Error::header("missing AU magic"));
        }
        let offset = u64::from(buf.get_u32());
        let size = buf.get_u32();
        let encoding = buf.get_u32();
        let rate = buf.get_u32();
        let channels = buf.get_u32();

        if offset < HEADER_BYTES {
            return Err(Error::header(format!("AU data offset {} inside header", offset)));
        }
        let format = format_of(encoding)?;

        let annotation = read_vec(src, offset - HEADER_BYTES).map_err(Error::from_header_io)?;
        let mut params = ReadParams::new(FileType::Au, format);
        if annotation.starts_with(ids::AFSP) {
            params.info = InfoStore::from_block(&annotation[4..]);
        } else {
            let text = super::text_of(&annotation);
            if !text.is_empty() {
                debug!("AU annotation kept as a comment record");
                params.info.append("comment:", &text);
            }
        }

        params.byte_order = ByteOrder::Big;
        params.channels = channels as usize;
        params.sample_rate = f64::from(rate);
        params.start = offset;
        params.data_bytes = if size == UNKNOWN_SIZE { None } else { Some(u64::from(size)) };

        params.chunks.record(ids::HEADER, 0, HEADER_BYTES);
        params.chunks.record(ids::TEXT_INFO, HEADER_BYTES, offset);
        match params.data_bytes {
            Some(n) => params.chunks.record(ids::SAMPLES, offset, offset + n),
            None => params.chunks.record_to_eof(ids::SAMPLES, offset),
        }
        Ok(params)
    }

    fn write_header(&self, sink: &mut Sink, setup: &WriteSetup) -> Result<HeaderLayout> {
        let encoding = encoding_of(setup.format)?;
        let channels = u32::try_from(setup.channels)
            .map_err(|_| Error::unsupported(format!("{} channels in an AU file", setup.channels)))?;
        let info = setup.header_info(false, false, false);

        let mut annotation = Vec::new();
        if !info.is_empty() {
            annotation.put_slice(ids::AFSP);
            annotation.put_slice(&info.to_block());
        }
        // at least four bytes, whole words
        while annotation.len() < 4 || annotation.len() % 4 != 0 {
            annotation.put_u8(0);
        }

        let base = sink.position();
        let offset = HEADER_BYTES + annotation.len() as u64;
        let size = setup.data_bytes().map_or(UNKNOWN_SIZE, u32_field);

        let mut header = Vec::with_capacity(offset as usize);
        header.put_slice(ids::AU_MAGIC);
        header.put_u32(offset as u32);
        header.put_u32(size);
        header.put_u32(encoding);
        header.put_u32(setup.sample_rate.round() as u32);
        header.put_u32(channels);
        header.put_slice(&annotation);
        sink.write_all(&header)?;

        let mut layout = HeaderLayout::new(base + offset, ByteOrder::Big);
        layout.patches.push(Patch {
            offset: base + 8,
            field: Field::DataPlus(0),
            big_endian: true,
        });
        layout.chunks.record(ids::HEADER, base, base + HEADER_BYTES);
        layout.chunks.record(ids::TEXT_INFO, base + HEADER_BYTES, base + offset);
        layout.chunks.record_to_eof(ids::SAMPLES, base + offset);
        Ok(layout)
    }
}
