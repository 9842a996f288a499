use std::io;

use crate::protocol::{WireReader, invalid_data};

/// The tensor type tag every client sends along its parameters.
pub const TENSOR_TYPE: &str = "ND";

/// An ordered list of opaque tensors, one per model layer.
///
/// The tensors borrow from whatever buffer they were read from (or from the
/// weights they were built for), so moving parameters through the protocol
/// never copies the layers themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters<'a> {
    pub tensors: Vec<&'a [u8]>,
    pub tensor_type: &'a str,
}

impl<'a> Parameters<'a> {
    /// Creates a new `Parameters` tagged with `TENSOR_TYPE`.
    ///
    /// # Arguments
    /// * `layers` - The layer buffers in positional order.
    pub fn new<L>(layers: &'a [L]) -> Self
    where
        L: AsRef<[u8]>,
    {
        Self {
            tensors: layers.iter().map(AsRef::as_ref).collect(),
            tensor_type: TENSOR_TYPE,
        }
    }

    /// The amount of layers carried.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Copies every tensor into an owned buffer, keeping the order.
    pub fn to_owned_layers(&self) -> Vec<Vec<u8>> {
        self.tensors.iter().map(|t| t.to_vec()).collect()
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        let count = u32::try_from(self.tensors.len()).or_else(|e| invalid_data(e))?;
        buf.extend_from_slice(&count.to_be_bytes());

        for tensor in &self.tensors {
            buf.extend_from_slice(&(tensor.len() as u64).to_be_bytes());
            buf.extend_from_slice(tensor);
        }

        let tag = self.tensor_type.as_bytes();
        let tag_len = u32::try_from(tag.len()).or_else(|e| invalid_data(e))?;
        buf.extend_from_slice(&tag_len.to_be_bytes());
        buf.extend_from_slice(tag);
        Ok(())
    }

    pub(crate) fn read(reader: &mut WireReader<'a>) -> io::Result<Self> {
        let count = reader.u32()? as usize;
        let mut tensors = Vec::with_capacity(count.min(1024));

        for _ in 0..count {
            tensors.push(reader.len_prefixed()?);
        }

        let tag_len = reader.u32()? as usize;
        let tag = reader.take(tag_len)?;
        let tensor_type = std::str::from_utf8(tag).or_else(|e| invalid_data(e))?;

        Ok(Self {
            tensors,
            tensor_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers_keep_their_position() {
        let layers = vec![vec![1u8, 2], vec![], vec![3, 4, 5]];
        let params = Parameters::new(&layers);

        let mut buf = Vec::new();
        params.write(&mut buf).unwrap();

        let mut reader = WireReader::new(&buf);
        let read = Parameters::read(&mut reader).unwrap();

        assert!(reader.is_empty());
        assert_eq!(read.tensor_type, TENSOR_TYPE);
        assert_eq!(read.to_owned_layers(), layers);
    }

    #[test]
    fn truncated_tensor_is_rejected() {
        let layers = [vec![9u8; 16]];
        let mut buf = Vec::new();
        Parameters::new(&layers).write(&mut buf).unwrap();
        buf.truncate(10);

        let mut reader = WireReader::new(&buf);
        assert!(Parameters::read(&mut reader).is_err());
    }
}
