//! Bounded capture of the main program's output.
//!
//! Output is forwarded to the supervisor's own stdout/stderr unchanged while the
//! most recent bytes are kept in memory for failure reports.
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{Arc, Mutex, MutexGuard},
    thread::{self, JoinHandle},
};

use tracing::debug;

/// Shared buffer retaining the last `capacity` bytes written to it.
#[derive(Debug, Clone)]
pub struct OutputRing {
    buffer: Arc<Mutex<VecDeque<u8>>>,
    capacity: usize,
}

impl OutputRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `bytes`, discarding the oldest content beyond capacity.
    pub fn append(&self, bytes: &[u8]) {
        if self.capacity == 0 {
            return;
        }
        let tail = &bytes[bytes.len().saturating_sub(self.capacity)..];
        let mut buffer = self.lock();
        let overflow = (buffer.len() + tail.len()).saturating_sub(self.capacity);
        buffer.drain(..overflow);
        buffer.extend(tail);
    }

    /// Returns a copy of the retained bytes without clearing them.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().iter().copied().collect()
    }

    /// Returns the retained bytes as text, replacing invalid UTF-8.
    pub fn snapshot_lossy(&self) -> String {
        String::from_utf8_lossy(&self.snapshot()).into_owned()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        // A panicking writer cannot leave the deque in an invalid state.
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Writer that forwards everything to `sink` and remembers it in an [`OutputRing`].
pub struct TeeWriter<W: Write> {
    sink: W,
    ring: OutputRing,
}

impl<W: Write> TeeWriter<W> {
    pub fn new(sink: W, ring: OutputRing) -> Self {
        Self { sink, ring }
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ring.append(buf);
        // The ring already holds the bytes, so a broken sink must not stop capture.
        if let Err(err) = self.sink.write_all(buf) {
            debug!("Failed to forward main program output: {err}");
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Stdout and stderr rings of the main program.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    stdout: OutputRing,
    stderr: OutputRing,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Self {
            stdout: OutputRing::new(capacity),
            stderr: OutputRing::new(capacity),
        }
    }

    pub fn stdout(&self) -> &OutputRing {
        &self.stdout
    }

    pub fn stderr(&self) -> &OutputRing {
        &self.stderr
    }

    /// Pumps a child's stdout into the stdout ring and the supervisor's stdout.
    pub fn capture_stdout<R>(&self, reader: R) -> JoinHandle<()>
    where
        R: Read + Send + 'static,
    {
        spawn_output_pump(
            "stdout",
            reader,
            TeeWriter::new(io::stdout(), self.stdout.clone()),
        )
    }

    /// Pumps a child's stderr into the stderr ring and the supervisor's stderr.
    pub fn capture_stderr<R>(&self, reader: R) -> JoinHandle<()>
    where
        R: Read + Send + 'static,
    {
        spawn_output_pump(
            "stderr",
            reader,
            TeeWriter::new(io::stderr(), self.stderr.clone()),
        )
    }
}

/// Copies `reader` into `writer` on a background thread until end of stream.
pub fn spawn_output_pump<R, W>(kind: &'static str, mut reader: R, mut writer: W) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        if let Err(err) = io::copy(&mut reader, &mut writer) {
            debug!("Main program {kind} pump stopped: {err}");
        }
        let _ = writer.flush();
    })
}
