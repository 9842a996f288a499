//! Header constants and the low level reading helpers shared by every message.

use std::io;

pub type Header = u32;
pub const HEADER_SIZE: usize = size_of::<Header>();

// Coordinator to client.
pub const GET_PARAMETERS_INS: Header = 0;
pub const FIT_INS: Header = 1;
pub const EVALUATE_INS: Header = 2;
pub const RECONNECT_INS: Header = 3;

// Client to coordinator.
pub const GET_PARAMETERS_RES: Header = 16;
pub const FIT_RES: Header = 17;
pub const EVALUATE_RES: Header = 18;

pub fn write_header(buf: &mut Vec<u8>, header: Header) {
    buf.extend_from_slice(&header.to_be_bytes());
}

pub fn invalid_data<T, E>(err: E) -> io::Result<T>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Err(io::Error::new(io::ErrorKind::InvalidData, err))
}

/// A forward only view over a frame body.
///
/// Every read borrows from the original buffer, nothing is copied.
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Takes the next `n` bytes.
    ///
    /// # Returns
    /// The bytes or an `UnexpectedEof` io error if there aren't enough left.
    pub fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("needed {n} more bytes, only {} left", self.buf.len()),
            ));
        }

        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn header(&mut self) -> io::Result<Header> {
        self.array().map(Header::from_be_bytes)
    }

    pub fn u32(&mut self) -> io::Result<u32> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn u64(&mut self) -> io::Result<u64> {
        self.array().map(u64::from_be_bytes)
    }

    pub fn i64(&mut self) -> io::Result<i64> {
        self.array().map(i64::from_be_bytes)
    }

    pub fn f32(&mut self) -> io::Result<f32> {
        self.array().map(f32::from_be_bytes)
    }

    /// Takes a `u64` length prefix followed by that many bytes.
    pub fn len_prefixed(&mut self) -> io::Result<&'a [u8]> {
        let len = self.u64()?;
        let len = usize::try_from(len).or_else(|e| invalid_data(e))?;
        self.take(len)
    }

    /// Takes everything that's left.
    pub fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_sequential() {
        let mut buf = Vec::new();
        write_header(&mut buf, FIT_RES);
        buf.extend_from_slice(&7u64.to_be_bytes());
        buf.extend_from_slice(&[1, 2, 3]);

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.header().unwrap(), FIT_RES);
        assert_eq!(reader.u64().unwrap(), 7);
        assert_eq!(reader.rest(), &[1, 2, 3]);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_buffer_is_unexpected_eof() {
        let buf = [0u8; 3];
        let mut reader = WireReader::new(&buf);
        let err = reader.u32().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn len_prefixed_respects_bounds() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u64.to_be_bytes());
        buf.extend_from_slice(&[0; 4]);

        let mut reader = WireReader::new(&buf);
        assert!(reader.len_prefixed().is_err());
    }
}
