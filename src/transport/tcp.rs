//! Raw SCPI socket link, for generators behind a LAN/GPIB gateway.
//!
//! Resource strings follow the VISA socket form
//! `TCPIP[board]::<host>::<port>::SOCKET`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::{ResourceManager, Session};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpManager;

/// Split a socket resource string into host and port.
pub fn parse_socket_resource(resource: &str) -> Result<(String, u16)> {
    let invalid = || Error::InvalidResource(resource.to_string());

    let parts: Vec<&str> = resource.split("::").collect();
    let [iface, host, port, class] = parts.as_slice() else {
        return Err(invalid());
    };

    let iface = iface.to_ascii_uppercase();
    let board = iface.strip_prefix("TCPIP").ok_or_else(invalid)?;
    if !board.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if !class.eq_ignore_ascii_case("SOCKET") || host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok((host.to_string(), port))
}

/// Try each resolved address in turn, bounding every attempt by `timeout`.
fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(Error::Io(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{host} did not resolve to any address"),
        )
    })))
}

impl ResourceManager for TcpManager {
    fn open_resource(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Session>> {
        let (host, port) = parse_socket_resource(resource)?;
        let stream = connect_with_timeout(&host, port, timeout)?;

        // Set timeouts to prevent hanging
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        debug!(%host, port, "socket session open");

        let reader = BufReader::new(stream.try_clone()?);
        Ok(Box::new(TcpSession { stream, reader }))
    }
}

struct TcpSession {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Session for TcpSession {
    fn write(&mut self, command: &str) -> Result<()> {
        let cmd_with_term = format!("{command}\n");
        self.stream.write_all(cmd_with_term.as_bytes())?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.write(command)?;

        let mut response = String::new();
        let n = self.reader.read_line(&mut response)?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "instrument closed the connection",
            )));
        }
        Ok(response.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn parses_socket_resources() {
        assert_eq!(
            parse_socket_resource("TCPIP0::192.168.1.20::5025::SOCKET").unwrap(),
            ("192.168.1.20".to_string(), 5025)
        );
        assert_eq!(
            parse_socket_resource("tcpip::gateway.lab::1234::socket").unwrap(),
            ("gateway.lab".to_string(), 1234)
        );
    }

    #[test]
    fn rejects_other_resources() {
        for bad in [
            "GPIB0::19::INSTR",
            "TCPIP0::host::INSTR",
            "TCPIP0::host::notaport::SOCKET",
            "TCPIPx::host::5025::SOCKET",
            "TCPIP0::::5025::SOCKET",
        ] {
            assert!(
                matches!(parse_socket_resource(bad), Err(Error::InvalidResource(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn query_and_write_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut received = Vec::new();
            for _ in 0..2 {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end().to_string();
                if line.contains('?') {
                    writer.write_all(b"100000000.0;-40.0\n").unwrap();
                }
                received.push(line);
            }
            received
        });

        let resource = format!("TCPIP0::127.0.0.1::{port}::SOCKET");
        let mut session = TcpManager
            .open_resource(&resource, Duration::from_secs(2))
            .unwrap();
        session.write("OUTP:STAT ON").unwrap();
        assert_eq!(
            session.query("FREQ:CW?;:POW:AMPL?").unwrap(),
            "100000000.0;-40.0"
        );

        assert_eq!(
            peer.join().unwrap(),
            vec!["OUTP:STAT ON".to_string(), "FREQ:CW?;:POW:AMPL?".to_string()]
        );
    }

    #[test]
    fn refused_connection_is_io_error() {
        // bind then drop to get a port with nobody listening
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let resource = format!("TCPIP0::127.0.0.1::{port}::SOCKET");
        let err = TcpManager
            .open_resource(&resource, Duration::from_millis(500))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn closed_peer_is_unexpected_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(&stream).read_line(&mut line).unwrap();
            // hang up without answering
        });

        let resource = format!("TCPIP0::127.0.0.1::{port}::SOCKET");
        let mut session = TcpManager
            .open_resource(&resource, Duration::from_secs(2))
            .unwrap();
        let err = session.query("*IDN?").unwrap_err();
        peer.join().unwrap();

        assert!(
            matches!(&err, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof),
            "got {err:?}"
        );
    }
}
