use crate::error::{ProcessingError, Result};
use crate::models::Chunk;
use crate::utils::constants::DEFAULT_BUFFER_SIZE;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

struct Line {
    number: u64,
    text: String,
    encoded_len: usize,
}

/// Splits a text stream into line-aligned chunks of at most `chunk_size`
/// encoded bytes.
///
/// A line is never split. A line larger than `chunk_size` is emitted on its
/// own as a single-line chunk.
pub struct ChunkReader<R = BufReader<File>> {
    reader: R,
    chunk_size: usize,
    buffer: Vec<u8>,
    pending: Option<Line>,
    lines_read: u64,
    bytes_read: u64,
    chunks_emitted: u64,
    finished: bool,
}

impl ChunkReader {
    /// Open `path` for chunked reading. Fails immediately if the file cannot
    /// be opened.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
        Ok(Self::from_reader(reader, chunk_size))
    }
}

impl<R: BufRead> ChunkReader<R> {
    pub fn from_reader(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            buffer: Vec::with_capacity(256),
            pending: None,
            lines_read: 0,
            bytes_read: 0,
            chunks_emitted: 0,
            finished: false,
        }
    }

    /// Total bytes consumed from the underlying reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    fn read_line(&mut self) -> Result<Option<Line>> {
        self.buffer.clear();
        let read = self.reader.read_until(b'\n', &mut self.buffer)?;
        if read == 0 {
            return Ok(None);
        }

        self.lines_read += 1;
        self.bytes_read += read as u64;

        let mut content = self.buffer.as_slice();
        if let Some(stripped) = content.strip_suffix(b"\n") {
            content = stripped;
        }
        if let Some(stripped) = content.strip_suffix(b"\r") {
            content = stripped;
        }

        let text = std::str::from_utf8(content).map_err(|e| {
            ProcessingError::InvalidFormat(format!(
                "line {} is not valid UTF-8: {}",
                self.lines_read, e
            ))
        })?;

        Ok(Some(Line {
            number: self.lines_read,
            text: text.to_owned(),
            encoded_len: read,
        }))
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        let mut lines = Vec::new();
        let mut size = 0usize;
        let mut first_line = None;

        if let Some(line) = self.pending.take() {
            first_line = Some(line.number);
            size += line.encoded_len;
            lines.push(line.text);
        }

        while size < self.chunk_size {
            let Some(line) = self.read_line()? else {
                self.finished = true;
                break;
            };

            if !lines.is_empty() && size + line.encoded_len > self.chunk_size {
                self.pending = Some(line);
                break;
            }

            first_line.get_or_insert(line.number);
            size += line.encoded_len;
            lines.push(line.text);
        }

        match first_line {
            Some(first_line) => {
                let chunk = Chunk::new(self.chunks_emitted, first_line, lines);
                self.chunks_emitted += 1;
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for ChunkReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished && self.pending.is_none() {
            return None;
        }

        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.finished = true;
                self.pending = None;
                Some(Err(e))
            }
        }
    }
}
