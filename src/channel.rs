//! Line-delimited, bidirectional transport between the house and one seat.
//!
//! A [`Channel`] has two independent directions, each with one writer and one
//! reader. Reads block until a whole line is available; that blocking is the
//! only backpressure in the system. [`LineChannel`] works over any byte-stream
//! pair (pipes, a `TcpStream` and its clone, child process stdio) and
//! [`duplex`] builds an in-process pair for seat threads.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    #[error("channel closed by peer")]
    Closed,
    #[error("channel i/o error: {0}")]
    Io(String),
}

impl From<io::Error> for ChannelError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => ChannelError::Closed,
            _ => ChannelError::Io(e.to_string()),
        }
    }
}

pub trait Channel: Send {
    /// Write `message` plus a line terminator. Returns the bytes written.
    fn send(&mut self, message: &str) -> Result<usize, ChannelError>;

    /// Block until a full line arrives and return it without its terminator.
    fn receive(&mut self) -> Result<String, ChannelError>;

    /// One half-duplex exchange: send, then wait for the reply.
    fn request(&mut self, message: &str) -> Result<String, ChannelError> {
        self.send(message)?;
        self.receive()
    }

    /// Close the sending side. Further sends fail with [`ChannelError::Closed`].
    fn close(&mut self);
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, message: &str) -> Result<usize, ChannelError> {
        (**self).send(message)
    }
    fn receive(&mut self) -> Result<String, ChannelError> {
        (**self).receive()
    }
    fn request(&mut self, message: &str) -> Result<String, ChannelError> {
        (**self).request(message)
    }
    fn close(&mut self) {
        (**self).close()
    }
}

/// A [`Channel`] over a buffered reader and a writer.
#[derive(Debug)]
pub struct LineChannel<R, W> {
    reader: R,
    writer: Option<W>,
}

impl<R: BufRead, W: Write> LineChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer: Some(writer) }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl LineChannel<BufReader<TcpStream>, TcpStream> {
    /// Split a connected socket into both directions of a channel.
    pub fn tcp(stream: TcpStream) -> io::Result<Self> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self::new(reader, stream))
    }
}

impl<R, W> Channel for LineChannel<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn send(&mut self, message: &str) -> Result<usize, ChannelError> {
        let writer = self.writer.as_mut().ok_or(ChannelError::Closed)?;
        writer.write_all(message.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(target: "blackjack_rs::channel", line = message, "sent");
        Ok(message.len() + 1)
    }

    fn receive(&mut self) -> Result<String, ChannelError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                ChannelError::Io("line is not valid UTF-8".to_string())
            } else {
                ChannelError::from(e)
            }
        })?;
        // end of stream, or a peer that hung up mid-line
        if n == 0 || !line.ends_with('\n') {
            return Err(ChannelError::Closed);
        }
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        debug!(target: "blackjack_rs::channel", line = %line, "received");
        Ok(line)
    }

    fn close(&mut self) {
        if let Some(mut w) = self.writer.take() {
            let _ = w.flush();
        }
    }
}

/// Writing half of an in-process byte pipe. Dropping it ends the stream.
#[derive(Debug)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

/// Reading half of an in-process byte pipe.
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

/// A one-way byte pipe between threads.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel();
    (PipeWriter { tx }, PipeReader { rx, buf: Vec::new(), pos: 0 })
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for PipeReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                // every writer is gone: end of stream
                Err(_) => return Ok(&[]),
            }
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}

pub type PipeChannel = LineChannel<PipeReader, PipeWriter>;

/// Two connected channel ends: `(house_end, seat_end)`.
///
/// ```
/// use blackjack_rs::channel::{duplex, Channel};
///
/// let (mut house, mut seat) = duplex();
/// house.send("AMT").unwrap();
/// assert_eq!(seat.receive().unwrap(), "AMT");
/// seat.send("100").unwrap();
/// assert_eq!(house.receive().unwrap(), "100");
/// ```
pub fn duplex() -> (PipeChannel, PipeChannel) {
    let (to_seat, from_house) = pipe();
    let (to_house, from_seat) = pipe();
    (LineChannel::new(from_seat, to_seat), LineChannel::new(from_house, to_house))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn send_reports_bytes_with_terminator() {
        let (mut house, mut seat) = duplex();
        assert_eq!(house.send("BET").unwrap(), 4);
        assert_eq!(seat.receive().unwrap(), "BET");
    }

    #[test]
    fn request_round_trips_across_threads() {
        let (mut house, mut seat) = duplex();
        let handle = thread::spawn(move || {
            let line = seat.receive().unwrap();
            seat.send(&format!("echo {line}")).unwrap();
        });
        assert_eq!(house.request("HIT").unwrap(), "echo HIT");
        handle.join().unwrap();
    }

    #[test]
    fn closing_yields_closed_on_the_peer() {
        let (mut house, mut seat) = duplex();
        house.close();
        assert!(house.is_closed());
        assert_eq!(house.send("AMT"), Err(ChannelError::Closed));
        assert_eq!(seat.receive(), Err(ChannelError::Closed));
    }

    #[test]
    fn dropped_peer_breaks_the_pipe() {
        let (mut house, seat) = duplex();
        drop(seat);
        assert_eq!(house.send("AMT"), Err(ChannelError::Closed));
        assert_eq!(house.receive(), Err(ChannelError::Closed));
    }

    #[test]
    fn strips_crlf_and_rejects_partial_lines() {
        let mut ch = LineChannel::new(Cursor::new(b"Y\r\npartial".to_vec()), Vec::new());
        assert_eq!(ch.receive().unwrap(), "Y");
        assert_eq!(ch.receive(), Err(ChannelError::Closed));
    }

    #[test]
    fn several_lines_in_one_chunk() {
        let (mut house, mut seat) = duplex();
        house.send("CARDS:[7C,6D]").unwrap();
        house.send("HIT").unwrap();
        assert_eq!(seat.receive().unwrap(), "CARDS:[7C,6D]");
        assert_eq!(seat.receive().unwrap(), "HIT");
    }

    #[test]
    fn works_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut seat = LineChannel::tcp(stream).unwrap();
            let req = seat.receive().unwrap();
            seat.send(if req == "AMT" { "100" } else { "?" }).unwrap();
        });
        let mut house = LineChannel::tcp(TcpStream::connect(addr).unwrap()).unwrap();
        assert_eq!(house.request("AMT").unwrap(), "100");
        handle.join().unwrap();
    }
}
