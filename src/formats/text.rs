//! Text audio: a `%//` line, `%`-prefixed info lines, then decimal sample
//! values.

use super::{Container, HeaderLayout, ReadParams, WriteSetup};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{ByteOrder, DataFormat, FileType};
use crate::ids;
use crate::stream::{Sink, Source};
use std::io::{self, Read, Write};

const MAGIC: &[u8] = b"%//";

pub struct Text;

fn read_line(src: &mut Source) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0; 1];
    while src.read(&mut byte)? == 1 && byte[0] != b'\n' {
        line.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&line).trim_end().to_string())
}

impl Container for Text {
    fn read_header(&self, src: &mut Source, opts: &Options) -> Result<ReadParams> {
        if src.peek(MAGIC.len())? != MAGIC {
            return Err(Error::header("text audio must start with %//"));
        }
        read_line(src)?;

        let mut params = ReadParams::new(FileType::Text, DataFormat::Text);
        while src.peek(1)? == b"%" {
            let line = read_line(src)?;
            let record = line[1..].trim_start();
            if !record.is_empty() && !record.starts_with("//") {
                params.info.append(record, "");
            }
        }

        params.channels = params.info.channel_count().unwrap_or(opts.input.channels);
        params.sample_rate = params
            .info
            .sample_rate()
            .unwrap_or(opts.input.sample_rate);
        params.start = src.position();
        params.chunks.record(ids::HEADER, 0, params.start);
        params.chunks.record_to_eof(ids::SAMPLES, params.start);
        Ok(params)
    }

    fn write_header(&self, sink: &mut Sink, setup: &WriteSetup) -> Result<HeaderLayout> {
        let info = setup.header_info(true, false, false);
        let base = sink.position();

        let mut h = String::from("%//\n");
        h.push_str(&format!("%sample_rate: {}\n", setup.sample_rate));
        h.push_str(&format!("%channels: {}\n", setup.channels));
        if setup.full_scale != 1.0 {
            h.push_str(&format!("%full_scale: {}\n", setup.full_scale));
        }
        for rec in info.records() {
            if ["sample_rate:", "channels:", "full_scale:"]
                .iter()
                .any(|id| rec.starts_with(id))
            {
                continue;
            }
            h.push('%');
            h.push_str(&rec.replace('\n', "\n%"));
            h.push('\n');
        }
        sink.write_all(h.as_bytes())?;

        let start = base + h.len() as u64;
        let mut layout = HeaderLayout::new(start, ByteOrder::Native);
        layout.chunks.record(ids::HEADER, base, start);
        layout.chunks.record_to_eof(ids::SAMPLES, start);
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{self, InfoStore};
    use crate::stream::SharedBuf;
    use std::io::Cursor;

    #[test]
    fn header_lines_become_info() {
        let file = b"%// text audio\n%sample_rate: 16000\n%channels: 2\n% title: a b\n1 2\n3 4\n";
        let mut src = Source::sequential(Cursor::new(file.to_vec()));
        let p = Text.read_header(&mut src, &Options::default()).unwrap();
        assert_eq!(p.channels, 2);
        assert_eq!(p.sample_rate, 16000.0);
        assert_eq!(p.info.find(info::TITLE), Some("a b"));
        assert_eq!(p.data_bytes, None);
        assert_eq!(src.position(), p.start);
        assert_eq!(p.start, file.len() as u64 - 8);
    }

    #[test]
    fn defaults_fill_missing_parameters() {
        let mut src = Source::seekable(Cursor::new(b"%//\n0.5\n".to_vec()));
        let p = Text.read_header(&mut src, &Options::default()).unwrap();
        assert_eq!(p.channels, 1);
        assert_eq!(p.sample_rate, 8000.0);
    }

    #[test]
    fn writes_multiline_records() {
        let mut info = InfoStore::new();
        info.append("comment:", "one\ntwo");
        let setup = WriteSetup {
            file_type: FileType::Text,
            format: DataFormat::Text,
            channels: 1,
            sample_rate: 8000.0,
            bits: 64,
            frames: None,
            speakers: &[],
            info: &info,
            full_scale: 1.0,
            byte_order: ByteOrder::Native,
        };
        let buf = SharedBuf::default();
        let mut sink = Sink::seekable(buf.clone());
        let layout = Text.write_header(&mut sink, &setup).unwrap();
        sink.flush().unwrap();
        let expected = "%//\n%sample_rate: 8000\n%channels: 1\n%comment: one\n%two\n";
        assert_eq!(String::from_utf8(buf.bytes()).unwrap(), expected);
        assert_eq!(layout.start, expected.len() as u64);
    }

    #[test]
    fn full_scale_written_once() {
        let mut info = InfoStore::new();
        info.append("full_scale:", "7");
        let setup = WriteSetup {
            file_type: FileType::Text,
            format: DataFormat::Text,
            channels: 2,
            sample_rate: 16000.0,
            bits: 64,
            frames: None,
            speakers: &[],
            info: &info,
            full_scale: 100.0,
            byte_order: ByteOrder::Native,
        };
        let buf = SharedBuf::default();
        let mut sink = Sink::seekable(buf.clone());
        Text.write_header(&mut sink, &setup).unwrap();
        sink.flush().unwrap();
        assert_eq!(
            String::from_utf8(buf.bytes()).unwrap(),
            "%//\n%sample_rate: 16000\n%channels: 2\n%full_scale: 100\n"
        );
    }
}
