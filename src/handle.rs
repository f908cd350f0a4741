//! The audio file handle: one open stream plus everything needed to move
//! canonical samples in or out of it.

use super::chunks::ChunkLedger;
use super::compat;
use super::config::{ErrorPolicy, Options, WriteParams};
use super::error::{Error, Result};
use super::format::{DataFormat, FileType};
use super::formats::{self, Container, FinalState, HeaderLayout, ReadParams, WriteSetup};
use super::info::InfoStore;
use super::samples::{Codec, BLOCK_BYTES};
use super::speaker::Speaker;
use super::stream::{Sink, Source};
use log::{debug, error, warn};
use std::io::{self, Write};
use std::path::Path;
use std::process;

/// Interleaved scratch space for frame I/O, in samples.
const SCRATCH_SAMPLES: usize = BLOCK_BYTES / 8;

enum Stream {
    Reading(Source),
    Writing(Sink),
    Closed,
}

pub struct AudioFile {
    stream: Stream,
    container: &'static dyn Container,
    opts: Options,
    codec: Codec,
    file_type: FileType,
    format: DataFormat,
    channels: usize,
    sample_rate: f64,
    full_scale: f64,
    bits: u32,
    /// Byte offset of the first sample.
    start: u64,
    /// Next sample to read or write.
    position: u64,
    /// Total samples; `None` until a sequential read finds the end.
    samples: Option<u64>,
    /// Frame count declared ahead of writing.
    declared_frames: Option<u64>,
    overloads: u64,
    speakers: Vec<Speaker>,
    info: InfoStore,
    chunks: ChunkLedger,
    layout: Option<HeaderLayout>,
    failed: bool,
}

fn apply_policy<T>(policy: ErrorPolicy, result: Result<T>) -> Result<T> {
    if let (ErrorPolicy::Halt, Err(e)) = (policy, &result) {
        error!("{}", e);
        process::exit(1);
    }
    result
}

fn no_backward_move() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "cannot move backward on a sequential stream",
    ))
}

impl AudioFile {
    /// Open a file on disk for reading, identifying its type from its
    /// contents.
    pub fn open<P: AsRef<Path>>(path: P, opts: &Options) -> Result<AudioFile> {
        let source = apply_policy(opts.error_policy, Source::open(path).map_err(Error::from))?;
        AudioFile::open_read(source, None, opts)
    }

    /// Read the header from `source`. A `hint` of `None` sniffs the type;
    /// unrecognised data is read as headerless.
    pub fn open_read(source: Source, hint: Option<FileType>, opts: &Options) -> Result<AudioFile> {
        apply_policy(opts.error_policy, AudioFile::setup_read(source, hint, opts))
    }

    fn setup_read(mut source: Source, hint: Option<FileType>, opts: &Options) -> Result<AudioFile> {
        if !(opts.scale_v > 0.0) {
            return Err(Error::config(format!("scale {} is not positive", opts.scale_v)));
        }
        let file_type = match hint {
            Some(t) => t,
            None => FileType::sniff(source.peek(20)?).unwrap_or_else(|| {
                debug!("no header recognised, reading headerless data");
                FileType::Raw
            }),
        };
        let container = formats::container(file_type)?;
        let params = container.read_header(&mut source, opts)?;
        let file_size = source.byte_len()?;
        AudioFile::from_params(source, container, params, file_size, opts)
    }

    fn from_params(
        source: Source,
        container: &'static dyn Container,
        mut params: ReadParams,
        file_size: Option<u64>,
        opts: &Options,
    ) -> Result<AudioFile> {
        let format = params.format;
        if format == DataFormat::Undefined {
            return Err(Error::unsupported("undefined data format"));
        }
        if params.channels == 0 {
            return Err(Error::header("no channels"));
        }
        if !(params.sample_rate > 0.0) {
            return Err(Error::header(format!(
                "invalid sample rate {}",
                params.sample_rate
            )));
        }

        let info = &params.info;
        if let Some(rate) = info.sample_rate() {
            if rate != params.sample_rate {
                if rate.fract() != 0.0 && rate.round() == params.sample_rate {
                    params.sample_rate = rate;
                } else {
                    warn!(
                        "sample rate record {} disagrees with header rate {}, using header",
                        rate, params.sample_rate
                    );
                }
            }
        }
        let full_scale = params
            .full_scale
            .or_else(|| info.full_scale())
            .unwrap_or_else(|| format.default_full_scale());
        if !(full_scale > 0.0) {
            return Err(Error::header(format!("invalid full scale {}", full_scale)));
        }
        let mut bits = params
            .bits
            .or_else(|| info.bit_depth().map(|d| d.nbs))
            .unwrap_or_else(|| format.bits());
        if bits == 0 || bits > format.bits() {
            warn!("{} significant bits invalid for {} data, ignored", bits, format);
            bits = format.bits();
        }
        if params.speakers.is_empty() {
            params.speakers = info.speakers().unwrap_or_default();
        }
        if params.speakers.len() > params.channels {
            warn!(
                "{} loudspeaker positions for {} channels, ignored",
                params.speakers.len(),
                params.channels
            );
            params.speakers.clear();
        }

        let width = format.width() as u64;
        let samples = if width == 0 {
            None
        } else {
            let available = file_size.map(|n| n.saturating_sub(params.start));
            let bytes = match (params.data_bytes, available) {
                (Some(declared), Some(avail)) if declared > avail => {
                    if !opts.fix_length {
                        return Err(Error::header(format!(
                            "data length {} exceeds the {} bytes in the file",
                            declared, avail
                        )));
                    }
                    warn!(
                        "data length {} exceeds the {} bytes in the file, truncated",
                        declared, avail
                    );
                    Some(avail)
                }
                (Some(declared), _) => Some(declared),
                (None, avail) => avail,
            };
            bytes.map(|b| {
                if b % width != 0 {
                    warn!("data length {} is not a whole number of samples", b);
                }
                let n = b / width;
                if n % params.channels as u64 != 0 {
                    warn!("{} samples is not a whole number of frames", n);
                }
                n
            })
        };

        params.chunks.warn_diagnostics(file_size);
        let scale = opts.scale_v / full_scale;
        let codec = Codec::new(format, params.byte_order.needs_swap(), scale);
        debug!(
            "{} file: {} data, {} channels, {} Hz",
            params.file_type, format, params.channels, params.sample_rate
        );

        Ok(AudioFile {
            stream: Stream::Reading(source),
            container,
            opts: opts.clone(),
            codec,
            file_type: params.file_type,
            format,
            channels: params.channels,
            sample_rate: params.sample_rate,
            full_scale,
            bits,
            start: params.start,
            position: 0,
            samples,
            declared_frames: None,
            overloads: 0,
            speakers: params.speakers,
            info: params.info,
            chunks: params.chunks,
            layout: None,
            failed: false,
        })
    }

    /// Create a file on disk and write its header.
    pub fn create<P: AsRef<Path>>(
        path: P,
        file_type: FileType,
        format: DataFormat,
        channels: usize,
        sample_rate: f64,
        params: &WriteParams,
        opts: &Options,
    ) -> Result<AudioFile> {
        let sink = apply_policy(opts.error_policy, Sink::create(path).map_err(Error::from))?;
        AudioFile::open_write(sink, file_type, format, channels, sample_rate, params, opts)
    }

    /// Write a header to `sink` and return a handle ready for samples.
    pub fn open_write(
        sink: Sink,
        file_type: FileType,
        format: DataFormat,
        channels: usize,
        sample_rate: f64,
        params: &WriteParams,
        opts: &Options,
    ) -> Result<AudioFile> {
        let result =
            AudioFile::setup_write(sink, file_type, format, channels, sample_rate, params, opts);
        apply_policy(opts.error_policy, result)
    }

    fn setup_write(
        mut sink: Sink,
        file_type: FileType,
        format: DataFormat,
        channels: usize,
        sample_rate: f64,
        params: &WriteParams,
        opts: &Options,
    ) -> Result<AudioFile> {
        if channels == 0 {
            return Err(Error::config("number of channels must be positive"));
        }
        if !(sample_rate > 0.0) {
            return Err(Error::config(format!("invalid sample rate {}", sample_rate)));
        }
        if !(opts.scale_v > 0.0) {
            return Err(Error::config(format!("scale {} is not positive", opts.scale_v)));
        }
        if format == DataFormat::Undefined || compat::nearest_allowed(file_type, format) != format {
            return Err(Error::unsupported(format!(
                "{} data is not supported in {} files",
                format, file_type
            )));
        }
        let bits = params.bits.unwrap_or_else(|| format.bits());
        if bits == 0 || bits > format.bits() {
            return Err(Error::config(format!(
                "{} significant bits out of range for {} data",
                bits, format
            )));
        }
        if params.speakers.len() > channels {
            return Err(Error::config(format!(
                "{} loudspeaker positions for {} channels",
                params.speakers.len(),
                channels
            )));
        }
        let full_scale = params
            .full_scale
            .unwrap_or_else(|| format.default_full_scale());
        if !(full_scale > 0.0) {
            return Err(Error::config(format!("invalid full scale {}", full_scale)));
        }
        let container = formats::container(file_type)?;

        let setup = WriteSetup {
            file_type,
            format,
            channels,
            sample_rate,
            bits,
            frames: params.frames,
            speakers: &params.speakers,
            info: &params.info,
            full_scale,
            byte_order: params.byte_order,
        };
        let layout = container.write_header(&mut sink, &setup)?;

        let per_line = opts
            .text_per_line
            .unwrap_or(if channels <= 5 { channels } else { 1 });
        let codec = Codec::new(format, layout.byte_order.needs_swap(), opts.scale_v / full_scale)
            .with_per_line(per_line);
        debug!(
            "writing {} file: {} data, {} channels, {} Hz",
            file_type, format, channels, sample_rate
        );

        Ok(AudioFile {
            stream: Stream::Writing(sink),
            container,
            opts: opts.clone(),
            codec,
            file_type,
            format,
            channels,
            sample_rate,
            full_scale,
            bits,
            start: layout.start,
            position: 0,
            samples: Some(0),
            declared_frames: params.frames,
            overloads: 0,
            speakers: params.speakers.clone(),
            info: params.info.clone(),
            chunks: layout.chunks.clone(),
            layout: Some(layout),
            failed: false,
        })
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.failed = true;
        }
        apply_policy(self.opts.error_policy, result)
    }

    /// Read `buf.len()` samples starting at sample `offset`, counted from
    /// the start of the data. Samples before the start or past the end are
    /// zero. Returns the samples delivered, including leading zeros.
    pub fn read_samples(&mut self, offset: i64, buf: &mut [f64]) -> Result<usize> {
        let result = self.read_at(offset, buf);
        self.settle(result)
    }

    fn read_at(&mut self, offset: i64, buf: &mut [f64]) -> Result<usize> {
        if !matches!(self.stream, Stream::Reading(_)) {
            return Err(Error::config("file is not open for reading"));
        }
        if self.failed {
            buf.iter_mut().for_each(|v| *v = 0.0);
            return Ok(0);
        }

        let lead = if offset < 0 {
            offset.unsigned_abs().min(buf.len() as u64) as usize
        } else {
            0
        };
        let (zeros, rest) = buf.split_at_mut(lead);
        zeros.iter_mut().for_each(|v| *v = 0.0);
        if rest.is_empty() {
            return Ok(lead);
        }

        let first = offset.max(0) as u64;
        if let Some(total) = self.samples {
            if first >= total {
                rest.iter_mut().for_each(|v| *v = 0.0);
                return Ok(lead);
            }
        }
        let want = match self.samples {
            Some(total) => (total - first).min(rest.len() as u64) as usize,
            None => rest.len(),
        };

        let got = if self.locate(first)? {
            let source = match &mut self.stream {
                Stream::Reading(s) => s,
                _ => return Err(Error::config("file is not open for reading")),
            };
            self.codec.read(source, &mut rest[..want])?
        } else {
            0
        };
        self.position += got as u64;
        rest[got..].iter_mut().for_each(|v| *v = 0.0);

        if got < want {
            match self.samples {
                Some(total) => {
                    return Err(Error::UnexpectedEof {
                        expected: total,
                        found: self.position,
                    })
                }
                None => {
                    debug!("end of data after {} samples", self.position);
                    self.samples = Some(self.position);
                }
            }
        }
        Ok(lead + got)
    }

    /// Move the read cursor to sample `target`. Returns `false` when the
    /// stream ends first, leaving the cursor at the last sample reached.
    fn locate(&mut self, target: u64) -> Result<bool> {
        if target == self.position {
            return Ok(true);
        }
        let source = match &mut self.stream {
            Stream::Reading(s) => s,
            _ => return Err(Error::config("file is not open for reading")),
        };

        let width = self.format.width() as u64;
        if width > 0 {
            if target < self.position && !source.is_seekable() {
                return Err(no_backward_move());
            }
            return match source.seek_to(self.start + target * width) {
                Ok(()) => {
                    self.position = target;
                    Ok(true)
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.position = source.position().saturating_sub(self.start) / width;
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            };
        }

        // text: values have no fixed width, so count them off
        if target < self.position {
            if !source.is_seekable() {
                return Err(no_backward_move());
            }
            source.seek_to(self.start)?;
            self.position = 0;
        }
        let mut scratch = vec![0.0; ((target - self.position) as usize).min(SCRATCH_SAMPLES)];
        while self.position < target {
            let n = ((target - self.position) as usize).min(scratch.len());
            let got = self.codec.read(source, &mut scratch[..n])?;
            self.position += got as u64;
            if got < n {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Read `nframes` frames starting at frame `offset` into one buffer per
    /// channel. Returns the frames delivered; the rest are zero.
    pub fn read_frames(
        &mut self,
        offset: i64,
        channels: &mut [&mut [f64]],
        nframes: usize,
    ) -> Result<usize> {
        let nchan = self.channels;
        if channels.len() != nchan || channels.iter().any(|c| c.len() < nframes) {
            let e = Error::config(format!(
                "need {} channel buffers of at least {} frames",
                nchan, nframes
            ));
            return self.settle(Err(e));
        }

        let per_block = (SCRATCH_SAMPLES / nchan).max(1);
        let mut scratch = vec![0.0; per_block.min(nframes.max(1)) * nchan];
        let mut offset = offset.saturating_mul(nchan as i64);
        let mut done = 0;
        let mut delivered = 0;
        while done < nframes {
            let n = (nframes - done).min(per_block);
            let got = self.read_samples(offset, &mut scratch[..n * nchan])?;
            for (i, frame) in scratch[..n * nchan].chunks(nchan).enumerate() {
                for (c, v) in frame.iter().enumerate() {
                    channels[c][done + i] = *v;
                }
            }
            done += n;
            delivered += got / nchan;
            if got < n * nchan {
                break;
            }
            offset += (n * nchan) as i64;
        }
        for chan in channels.iter_mut() {
            chan[done..nframes].iter_mut().for_each(|v| *v = 0.0);
        }
        Ok(delivered)
    }

    /// Append samples. Values beyond full scale are clipped and counted.
    pub fn write_samples(&mut self, buf: &[f64]) -> Result<usize> {
        let result = self.write_block(buf);
        self.settle(result)
    }

    fn write_block(&mut self, buf: &[f64]) -> Result<usize> {
        let sink = match &mut self.stream {
            Stream::Writing(s) => s,
            _ => return Err(Error::config("file is not open for writing")),
        };
        let clipped = self.codec.write(sink, buf)?;
        if clipped > 0 && self.overloads == 0 {
            warn!(
                "output overload at sample {}: values beyond full scale clipped",
                self.position
            );
        }
        self.overloads += clipped;
        self.position += buf.len() as u64;
        self.samples = self.samples.max(Some(self.position));
        Ok(buf.len())
    }

    /// Interleave one buffer per channel and append `nframes` frames.
    pub fn write_frames(&mut self, channels: &[&[f64]], nframes: usize) -> Result<usize> {
        let nchan = self.channels;
        if channels.len() != nchan || channels.iter().any(|c| c.len() < nframes) {
            let e = Error::config(format!(
                "need {} channel buffers of at least {} frames",
                nchan, nframes
            ));
            return self.settle(Err(e));
        }

        let per_block = (SCRATCH_SAMPLES / nchan).max(1);
        let mut scratch = Vec::with_capacity(per_block * nchan);
        let mut done = 0;
        while done < nframes {
            let n = (nframes - done).min(per_block);
            scratch.clear();
            for i in done..done + n {
                scratch.extend(channels.iter().map(|c| c[i]));
            }
            self.write_samples(&scratch)?;
            done += n;
        }
        Ok(nframes)
    }

    /// Finish the file: pad, patch the header, report overloads and flush.
    pub fn close(mut self) -> Result<()> {
        let result = self.finish();
        apply_policy(self.opts.error_policy, result)
    }

    fn finish(&mut self) -> Result<()> {
        let mut sink = match std::mem::replace(&mut self.stream, Stream::Closed) {
            Stream::Writing(sink) => sink,
            Stream::Reading(_) | Stream::Closed => return Ok(()),
        };
        let layout = match self.layout.take() {
            Some(layout) => layout,
            None => return Ok(()),
        };

        self.codec.finish(&mut sink)?;
        let nchan = self.channels as u64;
        if self.position % nchan != 0 {
            warn!(
                "closing after {} samples, not a whole number of {}-channel frames",
                self.position, nchan
            );
        }
        let data_bytes = sink.position() - layout.start;
        if layout.pad_even && data_bytes % 2 == 1 {
            sink.write_all(&[0])?;
        }

        let frames = self.position / nchan;
        if sink.is_seekable() {
            let fin = FinalState { data_bytes, frames };
            self.container.update_header(&mut sink, &layout, &fin)?;
        } else {
            match self.declared_frames {
                Some(declared) if declared != frames => warn!(
                    "header declares {} frames but {} were written",
                    declared, frames
                ),
                None if !layout.open_ended => warn!(
                    "{} header on a sequential stream has no valid length",
                    self.file_type
                ),
                _ => {}
            }
        }

        if self.overloads > 0 {
            warn!("{} output samples clipped", self.overloads);
        }
        sink.flush()?;
        Ok(())
    }

    /// Forget an earlier read error so reads resume.
    pub fn clear_error(&mut self) {
        self.failed = false;
    }

    pub fn has_error(&self) -> bool {
        self.failed
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.stream, Stream::Reading(_))
    }

    pub fn is_writing(&self) -> bool {
        matches!(self.stream, Stream::Writing(_))
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn full_scale(&self) -> f64 {
        self.full_scale
    }

    /// Multiplier from file values to canonical samples.
    pub fn scale(&self) -> f64 {
        self.codec.scale()
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Total samples, if known.
    pub fn samples(&self) -> Option<u64> {
        self.samples
    }

    pub fn frames(&self) -> Option<u64> {
        self.samples.map(|n| n / self.channels as u64)
    }

    /// Next sample index.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn data_offset(&self) -> u64 {
        self.start
    }

    pub fn overloads(&self) -> u64 {
        self.overloads
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn info(&self) -> &InfoStore {
        &self.info
    }

    pub fn chunks(&self) -> &ChunkLedger {
        &self.chunks
    }
}

impl Drop for AudioFile {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("error while closing audio file: {}", e);
        }
    }
}

/// Close a handle that may never have been opened.
pub fn close(file: Option<AudioFile>) -> Result<()> {
    match file {
        Some(f) => f.close(),
        None => Ok(()),
    }
}
