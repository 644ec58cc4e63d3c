use std::io::{Cursor, Read, Result as IoResult, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

/// Number of chunks a pipe holds before the writer blocks.
pub const PIPE_CAPACITY: usize = 16;

/// Create a connected pipe between two pipeline stages.
///
/// The channel is bounded, so a fast producer blocks once [`PIPE_CAPACITY`]
/// chunks are waiting. Dropping the writer is end-of-stream for the reader.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(PIPE_CAPACITY);
    (
        PipeWriter { tx: Some(tx) },
        PipeReader {
            rx,
            current: Cursor::new(Vec::new()),
        },
    )
}

/// Reading half of a stage-to-stage pipe.
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    current: Cursor<Vec<u8>>,
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        loop {
            let n = self.current.read(out)?;
            if n > 0 || out.is_empty() {
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(chunk) => self.current = Cursor::new(chunk),
                // every writer is gone
                Err(_) => return Ok(0),
            }
        }
    }
}

/// Writing half of a stage-to-stage pipe.
///
/// Once the reader has been dropped, further writes are discarded: a stage
/// whose consumer stopped early finishes quietly instead of failing.
pub struct PipeWriter {
    tx: Option<SyncSender<Vec<u8>>>,
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        if let Some(tx) = &self.tx {
            if tx.send(data.to_vec()).is_err() {
                log::trace!("pipe reader closed, discarding output");
                self.tx = None;
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pipe_preserves_byte_order() {
        let (mut writer, mut reader) = pipe();
        let producer = thread::spawn(move || {
            for i in 0..1000u32 {
                writeln!(writer, "line {i}").unwrap();
            }
        });
        let mut received = String::new();
        reader.read_to_string(&mut received).unwrap();
        producer.join().unwrap();

        let expected: String = (0..1000u32).map(|i| format!("line {i}\n")).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_dropped_writer_is_end_of_stream() {
        let (writer, mut reader) = pipe();
        drop(writer);
        let mut buf = Vec::new();
        assert_eq!(reader.read_to_end(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_after_reader_dropped_is_discarded() {
        let (mut writer, reader) = pipe();
        drop(reader);
        assert_eq!(writer.write(b"ignored").unwrap(), 7);
        writer.write_all(b"still fine").unwrap();
    }
}
