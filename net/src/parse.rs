// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet parsing traits
#![allow(missing_docs)] // error variants are self describing

use std::num::NonZero;

pub trait Parse: Sized {
    type Error: core::error::Error;
    /// Parse from a buffer.
    ///
    /// # Errors
    ///
    /// Returns an error in the event that parsing fails.
    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>>;
}

pub trait DeParse {
    type Error;

    fn size(&self) -> NonZero<u16>;
    /// Write a data structure (e.g., a packet header) to a buffer.
    ///
    /// Returns the number of bytes written in the event of success.
    ///
    /// # Errors
    ///
    /// Will return an error if there is not enough space in the buffer
    /// or if serialization fails for some other (implementation-dependent) reason.
    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>>;
}

pub(crate) trait ParsePayload {
    type Next;
    fn parse_payload(&self, cursor: &mut Reader) -> Option<Self::Next>;
}

/// Widen a `NonZero<u16>` to a `NonZero<usize>`.
pub trait IntoNonZeroUSize {
    fn into_non_zero_usize(self) -> NonZero<usize>;
}

impl IntoNonZeroUSize for NonZero<u16> {
    fn into_non_zero_usize(self) -> NonZero<usize> {
        NonZero::new(self.get() as usize).unwrap_or_else(|| unreachable!())
    }
}

/// Buffers longer than `u16::MAX` cannot describe legal frames.
#[derive(Debug, thiserror::Error)]
#[error("buffer length {0} exceeds u16::MAX")]
pub struct IllegalBufferLength(pub usize);

#[derive(thiserror::Error, Debug)]
#[error("expected at least {expected} bytes, got {actual}")]
pub struct LengthError {
    pub(crate) expected: NonZero<usize>,
    pub(crate) actual: usize,
}

impl LengthError {
    #[must_use]
    pub fn expected(&self) -> NonZero<usize> {
        self.expected
    }

    #[must_use]
    pub fn actual(&self) -> usize {
        self.actual
    }
}

#[derive(Debug)]
pub(crate) struct Reader<'buf> {
    pub(crate) inner: &'buf [u8],
    pub(crate) remaining: u16,
}

#[derive(Debug)]
pub(crate) struct Writer<'buf> {
    pub(crate) inner: &'buf mut [u8],
    pub(crate) remaining: u16,
}

impl Reader<'_> {
    pub(crate) fn new(buf: &[u8]) -> Result<Reader, IllegalBufferLength> {
        let remaining = u16::try_from(buf.len()).map_err(|_| IllegalBufferLength(buf.len()))?;
        Ok(Reader {
            inner: buf,
            remaining,
        })
    }

    fn consume(&mut self, n: NonZero<u16>) -> Result<(), LengthError> {
        if n.get() > self.remaining {
            return Err(LengthError {
                expected: n.into_non_zero_usize(),
                actual: self.remaining as usize,
            });
        }
        self.remaining -= n.get();
        Ok(())
    }

    pub(crate) fn parse<T: Parse>(&mut self) -> Result<(T, NonZero<u16>), ParseError<T::Error>> {
        let current = self.inner.len() - self.remaining as usize;
        let (value, consumed) = T::parse(&self.inner[current..])?;
        match self.consume(consumed) {
            Ok(()) => Ok((value, consumed)),
            Err(e) => Err(ParseError::Length(e)),
        }
    }
}

impl Writer<'_> {
    pub(crate) fn new(buf: &mut [u8]) -> Result<Writer, IllegalBufferLength> {
        let remaining = u16::try_from(buf.len()).map_err(|_| IllegalBufferLength(buf.len()))?;
        Ok(Writer {
            inner: buf,
            remaining,
        })
    }

    fn consume(&mut self, n: NonZero<u16>) -> Result<(), LengthError> {
        if n.get() > self.remaining {
            return Err(LengthError {
                expected: n.into_non_zero_usize(),
                actual: self.remaining as usize,
            });
        }
        self.remaining -= n.get();
        Ok(())
    }

    pub(crate) fn write<T: DeParse>(
        &mut self,
        val: &T,
    ) -> Result<NonZero<u16>, DeParseError<T::Error>> {
        let current = self.inner.len() - self.remaining as usize;
        let consumed = val.deparse(&mut self.inner[current..])?;
        self.consume(consumed).map_err(DeParseError::Length)?;
        Ok(consumed)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError<E: core::error::Error> {
    #[error(transparent)]
    Length(LengthError),
    #[error("buffer length {0} exceeds u16::MAX")]
    BufferTooLong(usize),
    #[error(transparent)]
    Invalid(E),
}

#[derive(thiserror::Error, Debug)]
pub enum DeParseError<E> {
    #[error(transparent)]
    Length(LengthError),
    #[error("buffer length {0} exceeds u16::MAX")]
    BufferTooLong(usize),
    #[error("invalid header")]
    Invalid(E),
}
