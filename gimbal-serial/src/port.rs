//! The physical transport contract (SPEC_FULL.md §4.7, §6): a blocking, bounded-timeout
//! read/write byte stream, plus a real `serialport`-backed implementation and an in-memory
//! loopback test double.

use std::io;
use std::time::Duration;

/// Blocking serial transport contract. `read` and `write_all` must never block indefinitely;
/// implementations are expected to honour a configured timeout.
pub trait SerialPort: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Real transport over a `serialport`-crate handle, opened at `device_path` and `baud_rate`
/// (115,200 8N1 per SPEC_FULL.md §6).
pub struct RealSerialPort {
    inner: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    pub fn open(device_path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        let inner = serialport::new(device_path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(RealSerialPort { inner })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.inner, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.inner, buf)
    }
}

/// An in-memory loopback pair for tests: everything written to one end can be read from the
/// other. `LoopbackPort::pair()` returns the two connected ends.
pub struct LoopbackPort {
    outbox: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<u8>>>,
    inbox: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<u8>>>,
}

impl LoopbackPort {
    pub fn pair() -> (LoopbackPort, LoopbackPort) {
        let a_to_b = std::sync::Arc::new(std::sync::Mutex::new(std::collections::VecDeque::new()));
        let b_to_a = std::sync::Arc::new(std::sync::Mutex::new(std::collections::VecDeque::new()));
        (
            LoopbackPort {
                outbox: a_to_b.clone(),
                inbox: b_to_a.clone(),
            },
            LoopbackPort {
                outbox: b_to_a,
                inbox: a_to_b,
            },
        )
    }
}

impl SerialPort for LoopbackPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.outbox.lock().unwrap().extend(buf.iter().copied());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbox = self.inbox.lock().unwrap();
        let n = buf.len().min(inbox.len());
        for slot in buf.iter_mut().take(n) {
            *slot = inbox.pop_front().unwrap();
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_pair_delivers_written_bytes_to_the_other_end() {
        let (mut a, mut b) = LoopbackPort::pair();
        a.write_all(&[1, 2, 3]).unwrap();
        let mut buf = [0u8; 8];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
    }

    #[test]
    fn loopback_read_returns_zero_when_empty() {
        let (_a, mut b) = LoopbackPort::pair();
        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 0);
    }
}
