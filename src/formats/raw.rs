//! Headerless data, described entirely by the caller's input defaults.

use super::{Container, HeaderLayout, ReadParams, WriteSetup};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{DataFormat, FileType};
use crate::ids;
use crate::stream::{Sink, Source};
use std::io;

pub struct Raw;

impl Container for Raw {
    fn read_header(&self, src: &mut Source, opts: &Options) -> Result<ReadParams> {
        let input = &opts.input;
        if input.format == DataFormat::Undefined {
            return Err(Error::config("headerless input needs a data format"));
        }
        src.seek_to(input.start).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::header(format!(
                "headerless data shorter than its {}-byte offset",
                input.start
            )),
            _ => Error::Io(e),
        })?;

        let mut params = ReadParams::new(FileType::Raw, input.format);
        params.byte_order = input.byte_order;
        params.channels = input.channels;
        params.sample_rate = input.sample_rate;
        params.full_scale = input.full_scale;
        params.start = input.start;
        params.chunks.record(ids::HEADER, 0, input.start);
        params.chunks.record_to_eof(ids::SAMPLES, input.start);
        Ok(params)
    }

    fn write_header(&self, sink: &mut Sink, setup: &WriteSetup) -> Result<HeaderLayout> {
        let start = sink.position();
        let mut layout = HeaderLayout::new(start, setup.byte_order);
        layout.chunks.record_to_eof(ids::SAMPLES, start);
        Ok(layout)
    }
}
