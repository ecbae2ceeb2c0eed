//! Non-blocking capture of a process's stdout and stderr
//!
//! Each stream is drained by its own thread into a shared [`CaptureBuffer`].
//! Lines land in arrival order across both streams. The stop flag is only
//! checked after a line has been read, so a reader parked in a blocking read
//! keeps waiting until its stream closes; `stop` bounds how long the caller
//! waits for it and abandons it past the grace period. Every attachment gets
//! its own buffer and flag, and a line read after the flag is set is dropped.

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

use glassbox_common::{Error, LogLine, Result, StreamTag};

use crate::process::ManagedProcess;

/// Default time `stop` waits for each reader
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Ordered, lock-guarded list of captured lines
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: LogLine) {
        self.lines.lock().push(line);
    }

    /// Snapshot of every captured line
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().clone()
    }

    /// All lines rendered with their stream prefix, joined by newlines
    pub fn output(&self) -> String {
        let lines = self.lines.lock();
        lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Write the rendered output to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut text = self.output();
        if !text.is_empty() {
            text.push('\n');
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}

struct Reader {
    stream: StreamTag,
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

/// Captures the output streams of one attached process at a time
pub struct OutputCapture {
    buffer: CaptureBuffer,
    stop: Arc<AtomicBool>,
    readers: Vec<Reader>,
    grace: Duration,
}

impl Default for OutputCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_GRACE)
    }

    /// Capture whose `stop` waits at most `grace` per reader
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            buffer: CaptureBuffer::new(),
            stop: Arc::new(AtomicBool::new(false)),
            readers: Vec::new(),
            grace,
        }
    }

    /// Buffer of the current attachment (replaced by the next `attach`)
    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }

    /// Start draining the piped streams of `process`.
    pub fn attach_process(&mut self, process: &mut ManagedProcess) -> Result<()> {
        let (stdout, stderr) = process.take_output_streams();
        self.attach(stdout, stderr).map_err(|e| match e {
            Error::InvalidProcess(reason) => {
                Error::InvalidProcess(format!("{} (pid {}): {}", process.label(), process.pid(), reason))
            }
            other => other,
        })
    }

    /// Start draining `stdout` and `stderr` on two background threads.
    ///
    /// Both streams must be present.
    pub fn attach<O, E>(&mut self, stdout: Option<O>, stderr: Option<E>) -> Result<()>
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        if !self.readers.is_empty() {
            return Err(Error::InvalidProcess(
                "output capture is already attached".to_string(),
            ));
        }
        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            return Err(Error::InvalidProcess(
                "stdout and stderr must both be piped".to_string(),
            ));
        };

        // Readers abandoned by an earlier attachment keep the old flag and
        // buffer, so nothing they read later reaches this attachment.
        self.stop = Arc::new(AtomicBool::new(false));
        self.buffer = CaptureBuffer::new();
        let out = self.spawn_reader(stdout, StreamTag::Out)?;
        self.readers.push(out);
        let err = self.spawn_reader(stderr, StreamTag::Err)?;
        self.readers.push(err);
        Ok(())
    }

    fn spawn_reader<R>(&self, stream: R, tag: StreamTag) -> Result<Reader>
    where
        R: Read + Send + 'static,
    {
        let buffer = self.buffer.clone();
        let stop = Arc::clone(&self.stop);
        let (done_tx, done) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name(format!("capture-{}", tag.as_str().to_lowercase()))
            .spawn(move || {
                read_stream(stream, tag, &buffer, &stop);
                let _ = done_tx.send(());
            })?;

        Ok(Reader {
            stream: tag,
            handle,
            done,
        })
    }

    /// Number of readers not yet joined or abandoned
    pub fn active_readers(&self) -> usize {
        self.readers.len()
    }

    pub fn is_attached(&self) -> bool {
        !self.readers.is_empty()
    }

    /// Ask both readers to finish and wait up to the grace period for each.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.join_readers(self.grace);
    }

    /// Wait for both readers to reach end of input, then stop stragglers.
    ///
    /// Used once the process is gone, so every line it wrote is kept.
    pub fn drain(&mut self) {
        self.join_readers(self.grace);
        self.stop.store(true, Ordering::Release);
    }

    fn join_readers(&mut self, grace: Duration) {
        for reader in self.readers.drain(..) {
            match reader.done.recv_timeout(grace) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if reader.handle.join().is_err() {
                        warn!(stream = %reader.stream, "Capture reader panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        stream = %reader.stream,
                        grace_ms = grace.as_millis() as u64,
                        "Capture reader still blocked, abandoning it"
                    );
                }
            }
        }
    }

    pub fn output(&self) -> String {
        self.buffer.output()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.buffer.lines()
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn read_stream<R: Read>(stream: R, tag: StreamTag, buffer: &CaptureBuffer, stop: &AtomicBool) {
    let mut reader = BufReader::new(stream);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(stream = %tag, "Capture reader stopped: {}", e);
                break;
            }
        }

        // A line that only arrives after stop belongs to no session.
        if stop.load(Ordering::Acquire) {
            break;
        }
        let text = String::from_utf8_lossy(&raw);
        buffer.push(LogLine::new(tag, text.trim_end_matches(['\n', '\r'])));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Instant;

    /// Reader that never returns, standing in for a pipe nobody writes to.
    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_secs(3600));
            Ok(0)
        }
    }

    #[test]
    fn captures_both_streams_with_prefixes() {
        let mut capture = OutputCapture::new();
        capture
            .attach(
                Some(Cursor::new(b"one\ntwo\r\n".to_vec())),
                Some(Cursor::new(b"oops\n".to_vec())),
            )
            .unwrap();
        capture.drain();

        let lines = capture.lines();
        assert_eq!(lines.len(), 3);

        let out: Vec<_> = lines.iter().filter(|l| l.stream == StreamTag::Out).collect();
        assert_eq!(out[0].text, "one");
        assert_eq!(out[1].text, "two");

        let output = capture.output();
        assert!(output.contains("[STDOUT] one"));
        assert!(output.contains("[STDERR] oops"));
        assert_eq!(output.lines().count(), 3);
    }

    #[test]
    fn missing_stream_is_rejected() {
        let mut capture = OutputCapture::new();
        let err = capture
            .attach(Some(Cursor::new(Vec::new())), None::<Cursor<Vec<u8>>>)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProcess(_)));
        assert!(!capture.is_attached());
    }

    #[test]
    fn second_attach_is_rejected() {
        let mut capture = OutputCapture::new();
        capture
            .attach(Some(Cursor::new(Vec::new())), Some(Cursor::new(Vec::new())))
            .unwrap();
        let err = capture
            .attach(Some(Cursor::new(Vec::new())), Some(Cursor::new(Vec::new())))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProcess(_)));
        capture.stop();
    }

    #[test]
    fn trailing_partial_line_is_kept() {
        let mut capture = OutputCapture::new();
        capture
            .attach(
                Some(Cursor::new(b"done".to_vec())),
                Some(Cursor::new(Vec::new())),
            )
            .unwrap();
        capture.drain();
        assert_eq!(capture.output(), "[STDOUT] done");
    }

    #[test]
    fn invalid_utf8_does_not_stop_reader() {
        let mut capture = OutputCapture::new();
        capture
            .attach(
                Some(Cursor::new(b"bad \xff byte\nnext\n".to_vec())),
                Some(Cursor::new(Vec::new())),
            )
            .unwrap();
        capture.drain();
        let lines = capture.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "next");
    }

    #[test]
    fn clear_empties_buffer() {
        let mut capture = OutputCapture::new();
        capture
            .attach(
                Some(Cursor::new(b"a\nb\n".to_vec())),
                Some(Cursor::new(b"c\n".to_vec())),
            )
            .unwrap();
        capture.drain();
        assert_eq!(capture.lines().len(), 3);

        capture.clear();
        assert!(capture.lines().is_empty());
        assert_eq!(capture.output(), "");
    }

    #[test]
    fn buffer_preserves_arrival_order() {
        let buffer = CaptureBuffer::new();
        buffer.push(LogLine::new(StreamTag::Err, "first"));
        buffer.push(LogLine::new(StreamTag::Out, "second"));
        buffer.push(LogLine::new(StreamTag::Err, "third"));
        assert_eq!(buffer.output(), "[STDERR] first\n[STDOUT] second\n[STDERR] third");
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn stop_abandons_blocked_reader_after_grace() {
        let mut capture = OutputCapture::with_grace(Duration::from_millis(100));
        capture
            .attach(Some(Stalled), Some(Cursor::new(b"late\n".to_vec())))
            .unwrap();

        let started = Instant::now();
        capture.stop();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(1), "stop took {elapsed:?}");
        assert_eq!(capture.active_readers(), 0);
    }

    /// Reader that yields one line after a delay, like a grandchild still
    /// holding the pipe after the process it inherited it from exited.
    struct Late {
        delay: Duration,
        line: Option<&'static [u8]>,
    }

    impl Read for Late {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.line.take() {
                Some(line) => {
                    std::thread::sleep(self.delay);
                    buf[..line.len()].copy_from_slice(line);
                    Ok(line.len())
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn abandoned_reader_cannot_write_into_next_attachment() {
        let mut capture = OutputCapture::with_grace(Duration::from_millis(50));
        capture
            .attach(
                Some(Late {
                    delay: Duration::from_millis(300),
                    line: Some(b"stale\n"),
                }),
                Some(Cursor::new(Vec::new())),
            )
            .unwrap();
        capture.drain();
        assert_eq!(capture.active_readers(), 0);

        capture
            .attach(
                Some(Cursor::new(b"fresh\n".to_vec())),
                Some(Cursor::new(Vec::new())),
            )
            .unwrap();
        capture.drain();

        std::thread::sleep(Duration::from_millis(600));
        assert_eq!(capture.output(), "[STDOUT] fresh");
    }

    #[test]
    fn write_to_persists_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("server.log");

        let buffer = CaptureBuffer::new();
        buffer.push(LogLine::new(StreamTag::Out, "ready"));
        buffer.write_to(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[STDOUT] ready\n");
    }
}
