//! Point-to-point links between the coordinator and a worker.

use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};

use super::TransportError;
use super::frame::{read_frame, write_frame};

/// A bidirectional, ordered, reliable frame channel to one peer.
pub trait Link: Send {
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Block until the next frame arrives.
    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send_frame(payload)
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).recv_frame()
    }
}

/// Link over a TCP connection.
pub struct TcpLink {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: BufWriter::new(stream),
        })
    }

    /// Connect to a coordinator.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        Self::new(TcpStream::connect(addr)?)
    }

    /// Accept `count` worker connections, in connection order.
    pub fn accept(listener: &TcpListener, count: usize) -> Result<Vec<Self>, TransportError> {
        let mut links = Vec::with_capacity(count);
        while links.len() < count {
            let (stream, peer) = listener.accept()?;
            log::info!("Worker {} connected from {}", links.len() + 1, peer);
            links.push(Self::new(stream)?);
        }
        Ok(links)
    }
}

impl Link for TcpLink {
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        write_frame(&mut self.writer, payload)
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        read_frame(&mut self.reader)
    }
}

/// In-process link backed by a pair of channels. Lets a worker run on a
/// thread with the same message flow as a remote process.
pub struct ChannelLink {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelLink {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (Self { tx: tx_a, rx: rx_a }, Self { tx: tx_b, rx: rx_b })
    }
}

impl Link for ChannelLink {
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }
}
