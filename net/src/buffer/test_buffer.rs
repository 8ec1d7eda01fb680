// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Toy implementation of [`PacketBuffer`] which is useful for testing.

#[cfg(any(test, feature = "bolero"))]
pub use contract::*;

use crate::buffer::{Headroom, MemoryBufferNotLongEnough, NotEnoughHeadRoom, Prepend, TrimFromStart};

// only included for doc ref
#[cfg(doc)]
use crate::buffer::PacketBuffer;

/// Toy data structure which implements [`PacketBuffer`]
///
/// The core function of this structure is to facilitate testing by "faking"
/// many useful properties of a real NIC buffer (fixed capacity, reserved
/// headroom to prepend headers into) without the need for a driver.
#[derive(Debug, Clone)]
pub struct TestBuffer {
    buffer: Vec<u8>,
    headroom: u16,
    tailroom: u16,
}

impl TestBuffer {
    /// The maximum capacity of a `TestBuffer`, in octets.
    pub const CAPACITY: u16 = 2048;
    /// The reserved headroom of a `TestBuffer`.
    pub const HEADROOM: u16 = 96;
    /// The reserved tailroom of a `TestBuffer`.
    pub const TAILROOM: u16 = 96;

    /// Create a new `TestBuffer` from a given slice of octets.
    ///
    /// The data is placed after [`TestBuffer::HEADROOM`] reserved octets so
    /// that headers can be prepended.
    #[must_use]
    pub fn from_raw_data(data: &[u8]) -> TestBuffer {
        let mut buffer = Vec::with_capacity(TestBuffer::CAPACITY as usize);
        buffer.extend_from_slice(&[0; TestBuffer::HEADROOM as usize]);
        buffer.extend_from_slice(data);
        buffer.extend_from_slice(&[0; TestBuffer::TAILROOM as usize]);
        TestBuffer {
            buffer,
            headroom: TestBuffer::HEADROOM,
            tailroom: TestBuffer::TAILROOM,
        }
    }
}

impl AsRef<[u8]> for TestBuffer {
    fn as_ref(&self) -> &[u8] {
        let start = self.headroom as usize;
        let end = self.buffer.len() - self.tailroom as usize;
        &self.buffer.as_slice()[start..end]
    }
}

impl AsMut<[u8]> for TestBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        let start = self.headroom as usize;
        let end = self.buffer.len() - self.tailroom as usize;
        &mut self.buffer.as_mut_slice()[start..end]
    }
}

impl Headroom for TestBuffer {
    fn headroom(&self) -> u16 {
        self.headroom
    }
}

impl Prepend for TestBuffer {
    type Error = NotEnoughHeadRoom;
    fn prepend(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if self.headroom < len {
            return Err(NotEnoughHeadRoom);
        }
        self.headroom -= len;
        Ok(self.as_mut())
    }
}

impl TrimFromStart for TestBuffer {
    type Error = MemoryBufferNotLongEnough;
    fn trim_from_start(&mut self, len: u16) -> Result<&mut [u8], MemoryBufferNotLongEnough> {
        debug_assert!((self.headroom + self.tailroom) as usize <= self.buffer.len());
        if (self.headroom + self.tailroom + len) as usize > self.buffer.len() {
            return Err(MemoryBufferNotLongEnough);
        }
        self.headroom += len;
        Ok(self.as_mut())
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::buffer::TestBuffer;
    use crate::headers::Headers;
    use crate::parse::{DeParse, IntoNonZeroUSize};
    use bolero::{Driver, ValueGenerator};

    /// [`ValueGenerator`] which produces [`TestBuffer`]s containing the
    /// specified [`Headers`] followed by a short arbitrary payload.
    pub struct GenerateTestBufferForHeaders(Headers);

    impl GenerateTestBufferForHeaders {
        /// Create a generator of buffers which contain the specified [`Headers`].
        #[must_use]
        pub fn new(headers: Headers) -> Self {
            Self(headers)
        }
    }

    impl ValueGenerator for GenerateTestBufferForHeaders {
        type Output = TestBuffer;

        fn generate<D: Driver>(&self, driver: &mut D) -> Option<Self::Output> {
            const MAX_PAYLOAD: usize = 64;
            let payload_len = driver.produce::<u8>()? as usize % MAX_PAYLOAD;
            let header_len = self.0.size().into_non_zero_usize().get();
            let mut data = vec![0; header_len + payload_len];
            self.0.deparse(data.as_mut()).ok()?;
            for byte in &mut data[header_len..] {
                *byte = driver.produce()?;
            }
            Some(TestBuffer::from_raw_data(&data))
        }
    }
}
