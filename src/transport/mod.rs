//! Message transport around the framer and deframer.
//!
//! On the byte stream a message is its length (1..=255) followed by that
//! many bytes, and a 0x00 between messages means nothing is pending. The
//! queue types here give producer and consumer threads a bounded channel
//! on either side of the link without the stages depending on it.

use crate::error::TransportError;
use crate::utils::consts::MAX_MESSAGE_LEN;
use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, bounded,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

fn check_message(message: &[u8]) -> Result<(), TransportError> {
    if message.is_empty() {
        return Err(TransportError::Empty);
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(TransportError::TooLong(message.len()));
    }
    Ok(())
}

/// Length-prefix a single message
pub fn pack_message(message: &[u8]) -> Result<Vec<u8>, TransportError> {
    check_message(message)?;
    let mut packed = Vec::with_capacity(message.len() + 1);
    packed.push(message.len() as u8);
    packed.extend_from_slice(message);
    Ok(packed)
}

/// Length-prefix and concatenate messages
pub fn pack_messages<M: AsRef<[u8]>>(messages: &[M]) -> Result<Vec<u8>, TransportError> {
    let mut packed = Vec::new();
    for message in messages {
        packed.extend(pack_message(message.as_ref())?);
    }
    Ok(packed)
}

/// Stateful parser for the length-prefixed byte stream
#[derive(Debug, Default)]
pub struct MessageUnpacker {
    expected: usize,
    current: Vec<u8>,
}

impl MessageUnpacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_byte(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.expected == 0 {
            // 0x00 between messages is idle
            self.expected = byte as usize;
            self.current.clear();
            return None;
        }

        self.current.push(byte);
        if self.current.len() == self.expected {
            self.expected = 0;
            return Some(std::mem::take(&mut self.current));
        }
        None
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        bytes.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    /// Inside a message, waiting for more bytes
    pub fn in_message(&self) -> bool {
        self.expected != 0
    }
}

/// Bounded queue feeding the transmit side
pub fn message_queue(capacity: usize) -> (MessageWriter, MessageSource) {
    let (tx, rx) = bounded(capacity);
    (
        MessageWriter { tx },
        MessageSource {
            rx,
            current: Vec::new(),
            position: 0,
        },
    )
}

#[derive(Clone)]
pub struct MessageWriter {
    tx: Sender<Vec<u8>>,
}

impl MessageWriter {
    /// Queue a message, waiting up to `timeout` while the queue is full
    pub fn send_timeout(&self, message: &[u8], timeout: Duration) -> Result<(), TransportError> {
        check_message(message)?;
        self.tx
            .send_timeout(message.to_vec(), timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => TransportError::Timeout,
                SendTimeoutError::Disconnected(_) => TransportError::Disconnected,
            })
    }
}

/// Transmit-side byte source, never blocks
pub struct MessageSource {
    rx: Receiver<Vec<u8>>,
    current: Vec<u8>,
    position: usize,
}

impl MessageSource {
    /// Fill `buffer` with length-prefixed message bytes, padding with 0x00
    /// once the queue runs dry. Returns the number of message bytes written.
    pub fn fill(&mut self, buffer: &mut [u8]) -> usize {
        let mut written = 0;
        while written < buffer.len() {
            if self.position == self.current.len() {
                match self.rx.try_recv() {
                    Ok(message) => {
                        // checked at send time
                        self.current.clear();
                        self.current.push(message.len() as u8);
                        self.current.extend(message);
                        self.position = 0;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            let n = (self.current.len() - self.position).min(buffer.len() - written);
            buffer[written..written + n]
                .copy_from_slice(&self.current[self.position..self.position + n]);
            self.position += n;
            written += n;
        }

        buffer[written..].fill(0x00);
        written
    }

    /// No message in flight and nothing queued
    pub fn is_drained(&self) -> bool {
        self.position == self.current.len() && self.rx.is_empty()
    }
}

/// Bounded queue fed by the receive side
pub fn message_sink(capacity: usize, timeout: Duration) -> (MessageSink, MessageReader) {
    let (tx, rx) = bounded(capacity);
    (
        MessageSink {
            unpacker: MessageUnpacker::new(),
            backlog: VecDeque::new(),
            tx,
            timeout,
        },
        MessageReader { rx },
    )
}

/// Consumes deframer output and publishes complete messages.
///
/// Messages the reader has no room for stay in a backlog, oldest first,
/// and go out ahead of new ones on the next `consume`.
pub struct MessageSink {
    unpacker: MessageUnpacker,
    backlog: VecDeque<Vec<u8>>,
    tx: Sender<Vec<u8>>,
    timeout: Duration,
}

impl MessageSink {
    /// Returns the number of messages published
    pub fn consume(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.backlog.extend(self.unpacker.push(bytes));

        let mut delivered = 0;
        while let Some(message) = self.backlog.pop_front() {
            debug!("delivering message of {} bytes", message.len());
            match self.tx.send_timeout(message, self.timeout) {
                Ok(()) => delivered += 1,
                Err(SendTimeoutError::Timeout(message)) => {
                    self.backlog.push_front(message);
                    warn!(
                        "reader not keeping up, {} messages held back",
                        self.backlog.len()
                    );
                    return Err(TransportError::Timeout);
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    warn!(
                        "reader gone, dropped {} messages",
                        self.backlog.len() + 1
                    );
                    self.backlog.clear();
                    return Err(TransportError::Disconnected);
                }
            }
        }
        Ok(delivered)
    }

    /// Complete messages still waiting for room in the queue
    pub fn backlog(&self) -> usize {
        self.backlog.len()
    }
}

pub struct MessageReader {
    rx: Receiver<Vec<u8>>,
}

impl MessageReader {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TransportError::Timeout,
            RecvTimeoutError::Disconnected => TransportError::Disconnected,
        })
    }

    /// Everything already delivered, without waiting
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_pack_limits() {
        assert_eq!(pack_message(b"hi").unwrap(), vec![2, b'h', b'i']);
        assert_eq!(pack_message(&[]), Err(TransportError::Empty));
        assert_eq!(pack_message(&[1; 256]), Err(TransportError::TooLong(256)));
        assert_eq!(pack_message(&[1; 255]).unwrap().len(), 256);
        assert_eq!(
            pack_messages(&[b"a".as_slice(), b"bc".as_slice()]).unwrap(),
            vec![1, b'a', 2, b'b', b'c']
        );
    }

    #[test]
    fn test_unpacker_skips_idle() {
        let mut unpacker = MessageUnpacker::new();
        let out = unpacker.push(&[0, 0, 2, 7, 0, 0, 1, 9]);
        assert_eq!(out, vec![vec![7, 0], vec![9]]);

        assert!(unpacker.push(&[3, 1]).is_empty());
        assert!(unpacker.in_message());
        assert_eq!(unpacker.push(&[2, 3]), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_source_pads_with_idle() {
        let (writer, mut source) = message_queue(4);
        writer.send_timeout(b"abc", SHORT).unwrap();

        let mut buffer = [0xAAu8; 6];
        assert_eq!(source.fill(&mut buffer), 4);
        assert_eq!(buffer, [3, b'a', b'b', b'c', 0, 0]);
        assert!(source.is_drained());

        assert_eq!(source.fill(&mut buffer), 0);
        assert_eq!(buffer, [0; 6]);
    }

    #[test]
    fn test_source_splits_messages_across_fills() {
        let (writer, mut source) = message_queue(4);
        writer.send_timeout(b"hello", SHORT).unwrap();
        writer.send_timeout(b"yo", SHORT).unwrap();

        let mut stream = Vec::new();
        let mut buffer = [0u8; 4];
        for _ in 0..3 {
            source.fill(&mut buffer);
            stream.extend_from_slice(&buffer);
        }
        assert_eq!(&stream[..9], &[5, b'h', b'e', b'l', b'l', b'o', 2, b'y', b'o']);
        assert!(stream[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_writer_rejects_and_times_out() {
        let (writer, _source) = message_queue(1);
        assert_eq!(writer.send_timeout(&[], SHORT), Err(TransportError::Empty));
        assert_eq!(
            writer.send_timeout(&[0; 300], SHORT),
            Err(TransportError::TooLong(300))
        );
        writer.send_timeout(b"x", SHORT).unwrap();
        assert_eq!(writer.send_timeout(b"y", SHORT), Err(TransportError::Timeout));
    }

    #[test]
    fn test_writer_disconnected() {
        let (writer, source) = message_queue(1);
        drop(source);
        assert_eq!(
            writer.send_timeout(b"x", SHORT),
            Err(TransportError::Disconnected)
        );
    }

    #[test]
    fn test_sink_to_reader_across_threads() {
        let (mut sink, reader) = message_sink(8, SHORT);
        let handle = thread::spawn(move || {
            let delivered = sink.consume(&[0, 2, 1, 2, 0, 0, 3]).unwrap();
            assert_eq!(delivered, 1);
            sink.consume(&[4, 5, 6]).unwrap()
        });

        assert_eq!(reader.recv_timeout(Duration::from_secs(2)).unwrap(), vec![1, 2]);
        assert_eq!(reader.recv_timeout(Duration::from_secs(2)).unwrap(), vec![4, 5, 6]);
        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(reader.recv_timeout(SHORT), Err(TransportError::Disconnected));
    }

    #[test]
    fn test_sink_times_out_when_reader_stalls() {
        let (mut sink, reader) = message_sink(1, SHORT);
        assert_eq!(sink.consume(&[1, 1, 1, 2]), Err(TransportError::Timeout));
        assert_eq!(sink.backlog(), 1);
        assert_eq!(reader.drain(), vec![vec![1]]);
        assert_eq!(reader.recv_timeout(SHORT), Err(TransportError::Timeout));
    }

    #[test]
    fn test_sink_keeps_messages_behind_a_timeout() {
        let (mut sink, reader) = message_sink(1, SHORT);
        assert_eq!(
            sink.consume(&[1, 0xA, 1, 0xB, 1, 0xC]),
            Err(TransportError::Timeout)
        );
        assert_eq!(sink.backlog(), 2);
        assert_eq!(reader.drain(), vec![vec![0xA]]);

        // backlog goes out before the new message
        assert_eq!(sink.consume(&[1]), Err(TransportError::Timeout));
        assert_eq!(reader.drain(), vec![vec![0xB]]);
        assert_eq!(sink.consume(&[0xD]), Err(TransportError::Timeout));
        assert_eq!(reader.drain(), vec![vec![0xC]]);
        assert_eq!(sink.consume(&[]), Ok(1));
        assert_eq!(reader.drain(), vec![vec![0xD]]);
        assert_eq!(sink.backlog(), 0);
    }

    #[test]
    fn test_sink_drops_backlog_when_reader_is_gone() {
        let (mut sink, reader) = message_sink(1, SHORT);
        assert_eq!(sink.consume(&[1, 1, 1, 2]), Err(TransportError::Timeout));
        drop(reader);
        assert_eq!(sink.consume(&[1, 3]), Err(TransportError::Disconnected));
        assert_eq!(sink.backlog(), 0);
    }
}
