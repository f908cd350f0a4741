//! Byte streams owned by an audio file handle.
//!
//! A [`Source`] is either seekable (files, cursors) or sequential (pipes,
//! sockets). Sequential sources can only move forward, by reading and
//! discarding. A [`Sink`] is the write-side counterpart.

use super::ids::ChunkID;
use seek_bufread::BufReader;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

enum Input {
    Seekable(BufReader<Box<dyn ReadSeek>>),
    Sequential(io::BufReader<Box<dyn Read>>),
}

pub struct Source {
    input: Input,
    // logical position: bytes handed out by `read`
    pos: u64,
    // read ahead by `peek`, served before the underlying stream
    peeked: Vec<u8>,
}

impl Source {
    pub fn seekable<R: Read + Seek + 'static>(inner: R) -> Source {
        let inner: Box<dyn ReadSeek> = Box::new(inner);
        Source {
            input: Input::Seekable(BufReader::new(inner)),
            pos: 0,
            peeked: Vec::new(),
        }
    }

    pub fn sequential<R: Read + 'static>(inner: R) -> Source {
        let inner: Box<dyn Read> = Box::new(inner);
        Source {
            input: Input::Sequential(io::BufReader::new(inner)),
            pos: 0,
            peeked: Vec::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Source> {
        Ok(Source::seekable(File::open(path)?))
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.input, Input::Seekable(_))
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total stream length, if the stream supports random access.
    pub fn byte_len(&mut self) -> io::Result<Option<u64>> {
        let restore = self.pos + self.peeked.len() as u64;
        match &mut self.input {
            Input::Seekable(r) => {
                let len = r.seek(SeekFrom::End(0))?;
                r.seek(SeekFrom::Start(restore))?;
                Ok(Some(len))
            }
            Input::Sequential(_) => Ok(None),
        }
    }

    /// Look at the next `n` bytes without consuming them. Fewer are
    /// returned at end of stream.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.peeked.len() < n {
            let mut buf = vec![0u8; n - self.peeked.len()];
            let got = match &mut self.input {
                Input::Seekable(r) => r.read(&mut buf)?,
                Input::Sequential(r) => r.read(&mut buf)?,
            };
            if got == 0 {
                break;
            }
            self.peeked.extend_from_slice(&buf[..got]);
        }
        let n = n.min(self.peeked.len());
        Ok(&self.peeked[..n])
    }

    /// Move to absolute byte position `to`. Sequential sources can only
    /// move forward.
    pub fn seek_to(&mut self, to: u64) -> io::Result<()> {
        if to == self.pos {
            return Ok(());
        }
        match &mut self.input {
            Input::Seekable(r) => {
                r.seek(SeekFrom::Start(to))?;
                self.peeked.clear();
                self.pos = to;
                Ok(())
            }
            Input::Sequential(_) if to > self.pos => {
                let want = to - self.pos;
                if self.skip(want)? < want {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "end of stream while skipping forward",
                    ));
                }
                Ok(())
            }
            Input::Sequential(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "cannot move back from byte {} to {} on a sequential stream",
                    self.pos, to
                ),
            )),
        }
    }

    /// Read and discard up to `n` bytes. Returns the number skipped.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut self.take(n), &mut io::sink())
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = if !self.peeked.is_empty() {
            let n = buf.len().min(self.peeked.len());
            buf[..n].copy_from_slice(&self.peeked[..n]);
            self.peeked.drain(..n);
            n
        } else {
            match &mut self.input {
                Input::Seekable(r) => r.read(buf)?,
                Input::Sequential(r) => r.read(buf)?,
            }
        };
        self.pos += n as u64;
        Ok(n)
    }
}

enum Output {
    Seekable(io::BufWriter<Box<dyn WriteSeek>>),
    Sequential(io::BufWriter<Box<dyn Write>>),
}

pub struct Sink {
    output: Output,
    pos: u64,
}

impl Sink {
    pub fn seekable<W: Write + Seek + 'static>(inner: W) -> Sink {
        let inner: Box<dyn WriteSeek> = Box::new(inner);
        Sink {
            output: Output::Seekable(io::BufWriter::new(inner)),
            pos: 0,
        }
    }

    pub fn sequential<W: Write + 'static>(inner: W) -> Sink {
        let inner: Box<dyn Write> = Box::new(inner);
        Sink {
            output: Output::Sequential(io::BufWriter::new(inner)),
            pos: 0,
        }
    }

    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Sink> {
        Ok(Sink::seekable(File::create(path)?))
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.output, Output::Seekable(_))
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek_to(&mut self, to: u64) -> io::Result<()> {
        match &mut self.output {
            Output::Seekable(w) => {
                w.seek(SeekFrom::Start(to))?;
                self.pos = to;
                Ok(())
            }
            Output::Sequential(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot seek on a sequential output stream",
            )),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.output {
            Output::Seekable(w) => w.write(buf)?,
            Output::Sequential(w) => w.write(buf)?,
        };
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.output {
            Output::Seekable(w) => w.flush(),
            Output::Sequential(w) => w.flush(),
        }
    }
}

pub fn read_chunk_id(r: &mut impl Read) -> io::Result<ChunkID> {
    let mut id = [0; 4];
    r.read_exact(&mut id)?;
    Ok(id)
}

/// Read exactly `n` bytes into a new buffer. The allocation grows with the
/// data, so a bogus length in a header cannot exhaust memory up front.
pub fn read_vec(r: &mut impl Read, n: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(n).read_to_end(&mut buf)?;
    if (buf.len() as u64) < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended inside a header field",
        ));
    }
    Ok(buf)
}

/// In-memory sink target whose bytes stay readable once the sink is gone.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(std::rc::Rc<std::cell::RefCell<io::Cursor<Vec<u8>>>>);

#[cfg(test)]
impl SharedBuf {
    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.0.borrow().get_ref().clone()
    }
}

#[cfg(test)]
impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl Seek for SharedBuf {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.borrow_mut().seek(pos)
    }
}
