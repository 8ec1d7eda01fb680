// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Traits for checksum calculation and manipulation

use std::fmt::Debug;

/// A trait for checksum calculation and manipulation.
///
/// Implementors compute their checksum over the header itself plus an
/// implementation-defined payload type (which may be `()` for headers whose
/// checksum covers only the header bytes, as with IPv4).
pub trait Checksum {
    /// The payload type over which the checksum is computed.
    type Payload<'a>: ?Sized
    where
        Self: 'a;
    /// The checksum type.
    type Checksum: Eq + Copy + Sized + Debug;

    /// Get the checksum value currently recorded in the header.
    fn checksum(&self) -> Self::Checksum;

    /// Compute the checksum value from the header and payload.
    fn compute_checksum(&self, payload: &Self::Payload<'_>) -> Self::Checksum;

    /// Set the checksum value in the header.
    ///
    /// The validity of the supplied checksum is not checked.
    fn set_checksum(&mut self, checksum: Self::Checksum) -> &mut Self;

    /// Validate the checksum value in the header.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if the recorded checksum does not match the
    /// computed one.
    fn validate_checksum(
        &self,
        payload: &Self::Payload<'_>,
    ) -> Result<Self::Checksum, ChecksumError<Self>> {
        let expected = self.compute_checksum(payload);
        let actual = self.checksum();
        if expected == actual {
            Ok(expected)
        } else {
            Err(ChecksumError { expected, actual })
        }
    }

    /// Update the checksum value in the header.
    ///
    /// The post-condition of this function is that the checksum is valid:
    /// `validate_checksum` will not return an `Err` variant when given the
    /// same `payload` as was passed to this function.
    fn update_checksum(&mut self, payload: &Self::Payload<'_>) -> &mut Self {
        let computed = self.compute_checksum(payload);
        self.set_checksum(computed)
    }
}

/// An error resulting from a checksum mismatch.
#[derive(Debug, thiserror::Error)]
#[error("checksum mismatch: expected {expected:?}, actual {actual:?}")]
pub struct ChecksumError<T: Checksum + ?Sized> {
    expected: T::Checksum,
    actual: T::Checksum,
}
