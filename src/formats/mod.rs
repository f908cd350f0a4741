//! Container header readers, writers and updaters.
//!
//! Each container implements [`Container`]. Readers leave the source at the
//! first sample byte; writers leave the sink there and describe the length
//! fields that must be patched once the final sample count is known.

mod aiff;
mod au;
mod raw;
mod text;
mod wave;

use super::chunks::ChunkLedger;
use super::config::Options;
use super::error::{Error, Result};
use super::format::{ByteOrder, DataFormat, FileType};
use super::info::{self, InfoStore};
use super::speaker::{self, Speaker};
use super::stream::{Sink, Source};
use bytes::BufMut;
use log::warn;
use std::convert::TryFrom;
use std::io::Write;

/// Everything a header reader learned about a file.
#[derive(Debug, Clone)]
pub struct ReadParams {
    pub file_type: FileType,
    pub format: DataFormat,
    pub byte_order: ByteOrder,
    pub channels: usize,
    pub sample_rate: f64,
    /// Byte offset of the first sample.
    pub start: u64,
    /// Declared length of the sample data in bytes; `None` when the header
    /// leaves it open.
    pub data_bytes: Option<u64>,
    pub full_scale: Option<f64>,
    /// Significant bits per sample, when the header records them.
    pub bits: Option<u32>,
    pub speakers: Vec<Speaker>,
    pub chunks: ChunkLedger,
    pub info: InfoStore,
}

impl ReadParams {
    pub fn new(file_type: FileType, format: DataFormat) -> ReadParams {
        ReadParams {
            file_type,
            format,
            byte_order: ByteOrder::Native,
            channels: 1,
            sample_rate: 0.0,
            start: 0,
            data_bytes: None,
            full_scale: None,
            bits: None,
            speakers: Vec::new(),
            chunks: ChunkLedger::new(),
            info: InfoStore::new(),
        }
    }
}

/// What a header writer is asked to describe.
#[derive(Debug, Clone)]
pub struct WriteSetup<'a> {
    pub file_type: FileType,
    pub format: DataFormat,
    pub channels: usize,
    pub sample_rate: f64,
    /// Significant bits per sample.
    pub bits: u32,
    pub frames: Option<u64>,
    pub speakers: &'a [Speaker],
    pub info: &'a InfoStore,
    pub full_scale: f64,
    pub byte_order: ByteOrder,
}

impl WriteSetup<'_> {
    /// Data length implied by a pre-declared frame count.
    pub fn data_bytes(&self) -> Option<u64> {
        self.frames
            .map(|f| f * self.channels as u64 * self.format.width() as u64)
    }

    /// Caller info plus records for values the binary header cannot hold.
    fn header_info(&self, native_rate: bool, native_bits: bool, native_speakers: bool) -> InfoStore {
        let mut records = self.info.clone();
        if !native_rate && self.sample_rate.fract() != 0.0 && !records.contains(info::SAMPLE_RATE) {
            records.append("sample_rate:", &self.sample_rate.to_string());
        }
        if !native_bits
            && !self.format.is_float()
            && self.bits < self.format.bits()
            && !records.contains(info::BITS_PER_SAMPLE)
        {
            records.append(
                "bits_per_sample:",
                &format!("{}/{}", self.bits, self.format.bits()),
            );
        }
        if !native_speakers && !self.speakers.is_empty() && !records.contains(info::LOUDSPEAKERS) {
            records.append("loudspeakers:", &speaker::format_list(self.speakers));
        }
        if self.full_scale != self.format.default_full_scale() {
            records.delete("full_scale:");
            records.append("full_scale:", &self.full_scale.to_string());
        }
        records
    }
}

/// Value written into a header length field at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Final file length minus the given bytes.
    FileLess(u64),
    /// Sample data bytes plus the given bytes.
    DataPlus(u64),
    /// Sample frames written.
    Frames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub offset: u64,
    pub field: Field,
    pub big_endian: bool,
}

/// Result of writing a header.
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    /// Byte offset of the first sample.
    pub start: u64,
    /// Byte order the sample data must use.
    pub byte_order: ByteOrder,
    pub chunks: ChunkLedger,
    /// 32-bit length fields to rewrite at close.
    pub patches: Vec<Patch>,
    /// RIFF/IFF data must end on an even byte.
    pub pad_even: bool,
    /// The header can legitimately say "length unknown".
    pub open_ended: bool,
}

impl HeaderLayout {
    pub fn new(start: u64, byte_order: ByteOrder) -> HeaderLayout {
        HeaderLayout {
            start,
            byte_order,
            chunks: ChunkLedger::new(),
            patches: Vec::new(),
            pad_even: false,
            open_ended: true,
        }
    }
}

/// State handed to a header updater at close.
#[derive(Debug, Clone, Copy)]
pub struct FinalState {
    pub data_bytes: u64,
    pub frames: u64,
}

pub trait Container: Sync {
    fn read_header(&self, src: &mut Source, opts: &Options) -> Result<ReadParams>;

    fn write_header(&self, sink: &mut Sink, setup: &WriteSetup) -> Result<HeaderLayout>;

    /// Rewrite length fields. Only called on seekable sinks, positioned at
    /// the end of the sample data (after any pad byte).
    fn update_header(&self, sink: &mut Sink, layout: &HeaderLayout, fin: &FinalState) -> Result<()> {
        patch_lengths(sink, layout, fin)
    }
}

static AU: au::Au = au::Au;
static WAVE: wave::Wave = wave::Wave { extensible: true };
static WAVE_NOEX: wave::Wave = wave::Wave { extensible: false };
static AIFF: aiff::Aiff = aiff::Aiff { kind: aiff::Kind::Aiff };
static AIFC: aiff::Aiff = aiff::Aiff { kind: aiff::Kind::Aifc };
static AIFC_SOWT: aiff::Aiff = aiff::Aiff { kind: aiff::Kind::Sowt };
static TEXT: text::Text = text::Text;
static RAW: raw::Raw = raw::Raw;

/// Header handler for a container type.
pub fn container(file_type: FileType) -> Result<&'static dyn Container> {
    Ok(match file_type {
        FileType::Au => &AU,
        FileType::Wave => &WAVE,
        FileType::WaveNoEx => &WAVE_NOEX,
        FileType::Aiff => &AIFF,
        FileType::Aifc => &AIFC,
        FileType::AifcSowt => &AIFC_SOWT,
        FileType::Text => &TEXT,
        FileType::Raw => &RAW,
        FileType::Sphere
        | FileType::Esps
        | FileType::Ircam
        | FileType::Sppack
        | FileType::Inrs
        | FileType::Spw
        | FileType::Nsp => {
            return Err(Error::unsupported(format!(
                "no header support for {} files",
                file_type
            )))
        }
    })
}

/// Rewrite every length field in `layout` and return to the current end.
pub fn patch_lengths(sink: &mut Sink, layout: &HeaderLayout, fin: &FinalState) -> Result<()> {
    let end = sink.position();
    for patch in &layout.patches {
        let value = match patch.field {
            Field::FileLess(n) => end.saturating_sub(n),
            Field::DataPlus(n) => fin.data_bytes + n,
            Field::Frames => fin.frames,
        };
        let value = u32::try_from(value).unwrap_or_else(|_| {
            warn!("length field at byte {} overflows 32 bits", patch.offset);
            u32::MAX
        });
        let mut field = Vec::with_capacity(4);
        if patch.big_endian {
            field.put_u32(value);
        } else {
            field.put_u32_le(value);
        }
        sink.seek_to(patch.offset)?;
        sink.write_all(&field)?;
    }
    sink.seek_to(end)?;
    Ok(())
}

/// Clamp a pre-computed length into a 32-bit header field.
fn u32_field(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Pad `buf` with NULs to an even length.
fn pad_even(buf: &mut Vec<u8>) {
    if buf.len() % 2 == 1 {
        buf.put_u8(0);
    }
}

fn text_of(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}
