//! The traits every message implements to travel inside a frame.

use std::io;

/// Types that know how to write themselves into the body of a frame.
pub trait Serialize {
    /// Appends the serialized form of `self` to `buf`.
    ///
    /// # Arguments
    /// * `buf` - The frame body being built, it may already contain data.
    ///
    /// # Returns
    /// An io error if `self` can't be represented on the wire.
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()>;
}

/// Types rebuilt from a frame body, borrowing byte payloads from it instead of copying.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
