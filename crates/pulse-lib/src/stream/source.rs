use crate::config::{StreamConfig, Transport};
use crate::error::{PulseError, Result};
use crate::io::wire::{decode_datagram, Decoded, LineDecoder};
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};

const READ_BUF_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes arrived; decoded values (if any) were appended.
    Data,
    /// The read timed out with nothing to report.
    Idle,
    /// The peer closed the connection. A trailing value may have been appended.
    Closed,
}

/// Blocking producer of decoded values, driven by the reader thread.
pub trait SampleSource: Send {
    fn read(&mut self, out: &mut Vec<Decoded>) -> Result<ReadOutcome>;
    /// Human readable endpoint for status lines.
    fn peer(&self) -> String;
}

/// Open the source described by `cfg`.
pub fn open_source(cfg: &StreamConfig) -> Result<Box<dyn SampleSource>> {
    match cfg.transport {
        Transport::Tcp => Ok(Box::new(TcpSource::connect(cfg)?)),
        Transport::Udp => Ok(Box::new(UdpSource::bind(cfg)?)),
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Client connection to a device that writes newline-delimited values.
pub struct TcpSource {
    stream: TcpStream,
    peer: SocketAddr,
    decoder: LineDecoder,
    buf: [u8; READ_BUF_BYTES],
}

impl TcpSource {
    pub fn connect(cfg: &StreamConfig) -> Result<Self> {
        let host = cfg.host.trim();
        if host.is_empty() {
            return Err(PulseError::EmptyAddress);
        }
        let addr = cfg.address();
        let resolved: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|source| PulseError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();
        let mut last_err = None;
        for candidate in resolved {
            match TcpStream::connect_timeout(&candidate, cfg.connect_timeout()) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(cfg.read_timeout()))?;
                    stream.set_nodelay(true)?;
                    return Ok(Self {
                        stream,
                        peer: candidate,
                        decoder: LineDecoder::new(),
                        buf: [0; READ_BUF_BYTES],
                    });
                }
                Err(err) => {
                    log::debug!("connect to {candidate} failed: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(PulseError::Connect {
            addr,
            source: last_err
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no addresses")),
        })
    }
}

impl SampleSource for TcpSource {
    fn read(&mut self, out: &mut Vec<Decoded>) -> Result<ReadOutcome> {
        match self.stream.read(&mut self.buf) {
            Ok(0) => {
                if let Some(last) = self.decoder.finish() {
                    out.push(last);
                }
                Ok(ReadOutcome::Closed)
            }
            Ok(n) => {
                self.decoder.feed(&self.buf[..n], out);
                Ok(ReadOutcome::Data)
            }
            Err(err) if is_timeout(&err) => Ok(ReadOutcome::Idle),
            Err(err) => Err(err.into()),
        }
    }

    fn peer(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}

/// Local socket receiving one value per datagram from any sender.
pub struct UdpSource {
    socket: UdpSocket,
    local: SocketAddr,
    last_sender: Option<SocketAddr>,
    buf: [u8; READ_BUF_BYTES],
}

impl UdpSource {
    pub fn bind(cfg: &StreamConfig) -> Result<Self> {
        let host = match cfg.host.trim() {
            "" => "0.0.0.0",
            host => host,
        };
        let addr = format!("{host}:{}", cfg.port);
        let socket = UdpSocket::bind(&addr).map_err(|source| PulseError::Bind {
            addr: addr.clone(),
            source,
        })?;
        socket.set_read_timeout(Some(cfg.read_timeout()))?;
        let local = socket.local_addr()?;
        Ok(Self {
            socket,
            local,
            last_sender: None,
            buf: [0; READ_BUF_BYTES],
        })
    }
}

impl SampleSource for UdpSource {
    fn read(&mut self, out: &mut Vec<Decoded>) -> Result<ReadOutcome> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, from)) => {
                if self.last_sender != Some(from) {
                    log::info!("receiving datagrams from {from}");
                    self.last_sender = Some(from);
                }
                if n == self.buf.len() {
                    // recv_from drops whatever did not fit, so the prefix is not a value.
                    let head = String::from_utf8_lossy(&self.buf[..n.min(32)]).into_owned();
                    out.push(Decoded::Rejected(format!("{head}... (datagram of {n}+ bytes)")));
                } else {
                    out.push(decode_datagram(&self.buf[..n]));
                }
                Ok(ReadOutcome::Data)
            }
            Err(err) if is_timeout(&err) => Ok(ReadOutcome::Idle),
            Err(err) => Err(err.into()),
        }
    }

    fn peer(&self) -> String {
        format!("udp://{}", self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;
    use std::time::{Duration, Instant};

    fn loopback_udp() -> UdpSource {
        let mut cfg = StreamConfig::for_kind(SignalKind::Ecg);
        cfg.host = "127.0.0.1".into();
        cfg.port = 0;
        UdpSource::bind(&cfg).expect("bind")
    }

    fn read_one(source: &mut UdpSource) -> Decoded {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.is_empty() && Instant::now() < deadline {
            source.read(&mut out).expect("read");
        }
        out.remove(0)
    }

    #[test]
    fn oversized_datagram_is_rejected_not_truncated() {
        let mut source = loopback_udp();
        let sender = UdpSocket::bind("127.0.0.1:0").expect("sender");
        let mut payload = b"1.5".to_vec();
        payload.extend(std::iter::repeat(b'0').take(READ_BUF_BYTES + 100));
        sender.send_to(&payload, source.local).expect("send");
        sender.send_to(b"0.25", source.local).expect("send");

        assert!(matches!(read_one(&mut source), Decoded::Rejected(_)));
        assert_eq!(read_one(&mut source), Decoded::Value(0.25));
    }

    #[test]
    fn empty_tcp_host_is_refused() {
        let cfg = StreamConfig::for_kind(SignalKind::Ppg);
        assert!(matches!(
            TcpSource::connect(&cfg),
            Err(PulseError::EmptyAddress)
        ));
    }
}
