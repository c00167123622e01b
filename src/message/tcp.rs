use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam_channel::select;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::backoff::{ExponentialBackoff, Retry};
use super::comm::{Communicator, Tag};
use super::util;
use crate::error::Error;

const RETRY_WAIT: Duration = Duration::from_millis(50);
const RETRY_MAX_WAIT: Duration = Duration::from_millis(2000);
const CONNECT_ATTEMPTS: usize = 40;

type Sender = crossbeam_channel::Sender<(usize, Vec<u8>)>;
type Receiver = crossbeam_channel::Receiver<Envelope>;
type Failures = crossbeam_channel::Sender<String>;

/// What goes over the wire: the payload with its source rank and tag, so the
/// receiving side can match it to a posted receive.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    source: usize,
    tag: Tag,
    data: Vec<u8>,
}




/// Background threads of a TCP communicator: one serial sender thread, which
/// owns a connection to every peer it has sent to, and one listener thread
/// which spawns a reader thread per incoming connection. Frames are length
/// prefixed, and each one is acknowledged by the receiver echoing its length.
///
pub struct TcpHost {
    send_thread: Option<thread::JoinHandle<()>>,
}

impl TcpHost {
    pub fn new(
        listener: TcpListener,
        peers: Vec<SocketAddr>,
    ) -> (Self, Sender, Receiver, crossbeam_channel::Receiver<String>) {
        let (send_sink, send_src) = crossbeam_channel::unbounded();
        let (recv_sink, recv_src) = crossbeam_channel::unbounded();
        let (fail_sink, fail_src) = crossbeam_channel::unbounded();

        let send_thread = Self::start_serial_sender(peers, send_src, fail_sink.clone());
        Self::start_listener(listener, recv_sink, fail_sink);

        (
            TcpHost {
                send_thread: Some(send_thread),
            },
            send_sink,
            recv_src,
            fail_src,
        )
    }

    /// Wait for the sender thread to flush its queue. It exits once every
    /// `Sender` handed out by `new` has been dropped.
    pub fn join(&mut self) {
        if let Some(handle) = self.send_thread.take() {
            if handle.join().is_err() {
                error!("sender thread panicked");
            }
        }
    }

    fn start_serial_sender(
        peers: Vec<SocketAddr>,
        send_src: crossbeam_channel::Receiver<(usize, Vec<u8>)>,
        failures: Failures,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (rank, frame) in send_src {
                let result = match table.get_mut(&rank) {
                    Some(client) => Self::write_acknowledged(client, &frame),
                    None => Self::connect_with_retry(peers[rank]).and_then(|mut client| {
                        Self::write_acknowledged(&mut client, &frame)?;
                        table.insert(rank, client);
                        Ok(())
                    }),
                };

                if let Err(e) = result {
                    error!("failed to send message to {}: {}", peers[rank], e);
                    let _ = failures.send(format!("send to rank {} at {} failed: {}", rank, peers[rank], e));
                    break;
                }
            }
        })
    }

    fn write_acknowledged(client: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
        util::write_frame(client, frame)?;
        let ack = util::read_usize(client)?;

        if ack != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("sent {} bytes but receiver acked {} bytes", frame.len(), ack),
            ));
        }
        Ok(())
    }

    fn start_listener(listener: TcpListener, recv_sink: crossbeam_channel::Sender<Envelope>, failures: Failures) {
        thread::spawn(move || {
            match listener.local_addr() {
                Ok(addr) => info!("listening on {}", addr),
                Err(e) => warn!("listening on an unknown address: {}", e),
            }
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => Self::handle_connection(stream, recv_sink.clone(), failures.clone()),
                    Err(e) => {
                        error!("failed to accept a connection: {}", e);
                        let _ = failures.send(format!("accept failed: {}", e));
                        break;
                    }
                }
            }
        });
    }

    fn handle_connection(mut stream: TcpStream, recv_sink: crossbeam_channel::Sender<Envelope>, failures: Failures) {
        let remote = stream.peer_addr().map_or_else(|_| "unknown peer".to_string(), |a| a.to_string());
        debug!("receiving connection from {}", remote);

        thread::spawn(move || loop {
            let frame = match util::read_frame(&mut stream) {
                Ok(frame) => frame,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("connection from {} closed", remote);
                    return;
                }
                Err(e) => {
                    let _ = failures.send(format!("connection from {} failed: {}", remote, e));
                    return;
                }
            };
            let size = frame.len();

            let envelope: Envelope = match rmp_serde::from_slice(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    let _ = failures.send(format!("malformed frame from {}: {}", remote, e));
                    return;
                }
            };
            if recv_sink.send(envelope).is_err() {
                return;
            }
            if let Err(e) = io::Write::write_all(&mut stream, &size.to_le_bytes()) {
                let _ = failures.send(format!("could not ack {}: {}", remote, e));
                return;
            }
        });
    }

    fn connect_with_retry(addr: SocketAddr) -> io::Result<TcpStream> {
        debug!("connecting to {}", addr);

        ExponentialBackoff::new(RETRY_WAIT, RETRY_MAX_WAIT, 2)
            .take(CONNECT_ATTEMPTS)
            .retry(
                || TcpStream::connect(addr),
                |e, delay| {
                    debug!("connect to {} failed ({}), retrying in {:?}", addr, e, delay);
                    thread::sleep(delay)
                },
            )
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::Other, "no connection attempts")))
    }
}




/// A communicator over TCP, one process per rank. `peers` lists the listen
/// address of every rank, in rank order. Received messages that do not match
/// the posted receive are parked until one does.
///
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    host: TcpHost,
    send_sink: Option<Sender>,
    recv_src: Receiver,
    failures: crossbeam_channel::Receiver<String>,
    parked: RefCell<HashMap<(usize, Tag), VecDeque<Vec<u8>>>>,
}

impl TcpCommunicator {
    /// Bind this rank's listen address and start the transport threads.
    pub fn bind(rank: usize, peers: Vec<SocketAddr>) -> Result<Self, Error> {
        let addr = *peers
            .get(rank)
            .ok_or_else(|| Error::Config(format!("rank {} is not in the list of {} peers", rank, peers.len())))?;
        let listener = TcpListener::bind(addr)?;
        Self::from_listener(rank, listener, peers)
    }

    /// Start the transport threads on an already bound listener.
    pub fn from_listener(rank: usize, listener: TcpListener, peers: Vec<SocketAddr>) -> Result<Self, Error> {
        if rank >= peers.len() {
            return Err(Error::Config(format!("rank {} is not in the list of {} peers", rank, peers.len())));
        }
        let num_peers = peers.len();
        let (host, send_sink, recv_src, failures) = TcpHost::new(listener, peers);

        Ok(Self {
            rank,
            num_peers,
            host,
            send_sink: Some(send_sink),
            recv_src,
            failures,
            parked: RefCell::new(HashMap::new()),
        })
    }

    fn check_failures(&self) -> Result<(), Error> {
        match self.failures.try_recv() {
            Ok(msg) => Err(Error::Transport(msg)),
            Err(_) => Ok(()),
        }
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        self.check_failures()?;

        if rank >= self.num_peers {
            return Err(Error::Transport(format!("no rank {} among {} peers", rank, self.num_peers)));
        }
        let envelope = Envelope {
            source: self.rank,
            tag,
            data: message,
        };
        let frame = rmp_serde::to_vec(&envelope).map_err(|e| Error::Encode(e.to_string()))?;

        self.send_sink
            .as_ref()
            .ok_or_else(|| Error::Transport("communicator is shutting down".into()))?
            .send((rank, frame))
            .map_err(|_| Error::Transport("sender thread has stopped".into()))
    }

    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        if let Some(data) = self.parked.borrow_mut().get_mut(&(rank, tag)).and_then(VecDeque::pop_front) {
            return Ok(data);
        }
        loop {
            select! {
                recv(self.recv_src) -> envelope => {
                    let envelope = envelope.map_err(|_| Error::Transport("listener has stopped".into()))?;

                    if envelope.source == rank && envelope.tag == tag {
                        return Ok(envelope.data);
                    }
                    self.parked
                        .borrow_mut()
                        .entry((envelope.source, envelope.tag))
                        .or_default()
                        .push_back(envelope.data);
                }
                recv(self.failures) -> msg => {
                    return Err(Error::Transport(msg.unwrap_or_else(|_| "transport threads have stopped".into())));
                }
            }
        }
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take();
        self.host.join();
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;

    fn bind_group(size: usize) -> Vec<(TcpListener, SocketAddr)> {
        (0..size)
            .map(|_| {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let addr = listener.local_addr().unwrap();
                (listener, addr)
            })
            .collect()
    }

    #[test]
    fn ring_exchange_over_tcp() {
        let size = 3;
        let bound = bind_group(size);
        let peers: Vec<_> = bound.iter().map(|(_, addr)| *addr).collect();

        let handles: Vec<_> = bound
            .into_iter()
            .enumerate()
            .map(|(rank, (listener, _))| {
                let peers = peers.clone();
                thread::spawn(move || {
                    let comm = TcpCommunicator::from_listener(rank, listener, peers).unwrap();
                    let next = (rank + 1) % size;
                    let prev = (rank + size - 1) % size;

                    comm.send(next, Tag::SyncValues, vec![rank as u8; 3]).unwrap();
                    comm.send(next, Tag::SyncIds, vec![rank as u8]).unwrap();

                    // Receive in the opposite order they were sent, so the
                    // first message has to be parked.
                    let ids = comm.recv(prev, Tag::SyncIds).unwrap();
                    let values = comm.recv(prev, Tag::SyncValues).unwrap();
                    (ids, values)
                })
            })
            .collect();

        for (rank, handle) in handles.into_iter().enumerate() {
            let prev = ((rank + size - 1) % size) as u8;
            let (ids, values) = handle.join().unwrap();
            assert_eq!(ids, vec![prev]);
            assert_eq!(values, vec![prev; 3]);
        }
    }

    #[test]
    fn rank_outside_peer_list_is_rejected() {
        let (listener, addr) = bind_group(1).pop().unwrap();
        assert!(matches!(
            TcpCommunicator::from_listener(1, listener, vec![addr]),
            Err(Error::Config(_))
        ));
    }
}
