// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MPLS label-stack entry validation and manipulation.
//!
//! The label-stack entry is a 4-byte header packed big-endian:
//!
//! | bits  | field | meaning                          |
//! |-------|-------|----------------------------------|
//! | 0-19  | label | FEC / path identifier            |
//! | 20-22 | exp   | traffic class, unused here       |
//! | 23    | s     | bottom of stack                  |
//! | 24-31 | ttl   | hop-count budget                 |
//!
//! This dataplane models a single-level stack: the entry it forwards on is
//! always bottom-of-stack. Entries with `s = 0` still decode and re-encode
//! faithfully so that the codec loses no information; rejecting them is the
//! pipeline's job, not the parser's.

#[allow(unused_imports)] // conditional re-export
#[cfg(any(test, feature = "bolero"))]
pub use contract::*;

use crate::ipv4::Ipv4;
use crate::parse::{
    DeParse, DeParseError, IntoNonZeroUSize, LengthError, Parse, ParseError, ParsePayload, Reader,
};
use core::convert::Infallible;
use core::num::NonZero;
use tracing::debug;

/// An MPLS label value (20 bits).
///
/// This type is marked `#[repr(transparent)]` to ensure that it has the same
/// memory layout as a `u32`; the overhead of using it over a raw `u32` is
/// strictly the price of checking that the value fits in 20 bits (which we
/// should generally be doing anyway).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Label(u32);

/// Errors which can occur when converting a `u32` to a validated [`Label`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[must_use]
pub enum InvalidLabel {
    /// The value does not fit in the 20-bit label field.
    #[error("{0} is too large to be a legal label ({MAX} is max legal value)", MAX = Label::MAX)]
    TooLarge(u32),
}

impl Label {
    /// The minimum label value (0).
    ///
    /// Values 0 through 15 are reserved by convention (explicit null, router
    /// alert, ...); this dataplane treats them like any other label and
    /// leaves reservation policy to the control plane.
    pub const MIN: Label = Label(0);

    /// The maximum legal label value (2^20 - 1).
    pub const MAX: Label = Label((1 << 20) - 1);

    /// Create a new [`Label`] from a `u32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is greater than [`Label::MAX`].
    pub const fn new(label: u32) -> Result<Self, InvalidLabel> {
        if label > Label::MAX.0 {
            Err(InvalidLabel::TooLarge(label))
        } else {
            Ok(Label(label))
        }
    }

    /// Get the value of the [`Label`] as a `u32`.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<Label> for u32 {
    fn from(label: Label) -> u32 {
        label.as_u32()
    }
}

impl TryFrom<u32> for Label {
    type Error = InvalidLabel;

    fn try_from(label: u32) -> Result<Label, Self::Error> {
        Label::new(label)
    }
}

impl core::fmt::Display for Label {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// The 3-bit traffic-class field of a label-stack entry.
///
/// Forwarding logic never consults it, but it must round-trip.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exp(u8);

/// Error type for invalid [`Exp`] values.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
#[error("Invalid exp value: {0} (3-bit max)")]
pub struct InvalidExp(u8);

impl Exp {
    const MIN_BINARY: u8 = 0;
    const MAX_BINARY: u8 = 0b111;
    /// The minimum legal [`Exp`] value
    pub const MIN: Exp = Exp(Exp::MIN_BINARY);
    /// The maximum legal [`Exp`] value
    pub const MAX: Exp = Exp(Exp::MAX_BINARY);

    /// Map a u8 to an [`Exp`]
    ///
    /// # Errors
    ///
    /// Returns an error if the supplied value is larger than 3 bits.
    pub const fn new(raw: u8) -> Result<Exp, InvalidExp> {
        match raw {
            Exp::MIN_BINARY..=Exp::MAX_BINARY => Ok(Exp(raw)),
            _ => Err(InvalidExp(raw)),
        }
    }

    /// Map the [`Exp`] value back to a `u8`.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// An MPLS label-stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mpls {
    label: Label,
    exp: Exp,
    bottom_of_stack: bool,
    ttl: u8,
}

/// Error which is triggered when decrementing a label TTL which is already zero.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("label ttl is already zero")]
pub struct LabelTtlAlreadyZero;

impl Mpls {
    /// The length of a label-stack entry (always 4 bytes).
    #[allow(clippy::unwrap_used)] // trivially safe const eval
    pub const LEN: NonZero<u16> = NonZero::new(4).unwrap();

    /// Create a new label-stack entry.
    #[must_use]
    pub fn new(label: Label, exp: Exp, bottom_of_stack: bool, ttl: u8) -> Mpls {
        Mpls {
            label,
            exp,
            bottom_of_stack,
            ttl,
        }
    }

    /// Get the [`Label`] of this entry.
    #[must_use]
    pub fn label(&self) -> Label {
        self.label
    }

    /// Get the traffic-class bits of this entry.
    #[must_use]
    pub fn exp(&self) -> Exp {
        self.exp
    }

    /// True iff this entry is the bottom of the label stack.
    #[must_use]
    pub fn bottom_of_stack(&self) -> bool {
        self.bottom_of_stack
    }

    /// Get the TTL of this entry.
    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Set the [`Label`] of this entry.
    pub fn set_label(&mut self, label: Label) -> &mut Self {
        self.label = label;
        self
    }

    /// Set the traffic-class bits of this entry.
    pub fn set_exp(&mut self, exp: Exp) -> &mut Self {
        self.exp = exp;
        self
    }

    /// Set the bottom-of-stack flag of this entry.
    pub fn set_bottom_of_stack(&mut self, bottom_of_stack: bool) -> &mut Self {
        self.bottom_of_stack = bottom_of_stack;
        self
    }

    /// Set the TTL of this entry.
    pub fn set_ttl(&mut self, ttl: u8) -> &mut Self {
        self.ttl = ttl;
        self
    }

    /// Attempt to decrement the label TTL.
    ///
    /// # Errors
    ///
    /// Returns [`LabelTtlAlreadyZero`] if the ttl is already at zero.
    /// This outcome usually indicates the need to drop the packet.
    pub fn decrement_ttl(&mut self) -> Result<(), LabelTtlAlreadyZero> {
        if self.ttl == 0 {
            return Err(LabelTtlAlreadyZero);
        }
        self.ttl -= 1;
        Ok(())
    }

    /// Pack the entry into its 32-bit wire representation (native-endian).
    #[must_use]
    pub fn to_u32(&self) -> u32 {
        (self.label.as_u32() << 12)
            | (u32::from(self.exp.as_u8()) << 9)
            | (u32::from(self.bottom_of_stack) << 8)
            | u32::from(self.ttl)
    }

    /// Unpack an entry from its 32-bit wire representation (native-endian).
    #[must_use]
    pub fn from_u32(raw: u32) -> Mpls {
        Mpls {
            label: Label::new(raw >> 12).unwrap_or_else(|_| unreachable!()),
            exp: Exp::new(((raw >> 9) & 0b111) as u8).unwrap_or_else(|_| unreachable!()),
            bottom_of_stack: (raw >> 8) & 0b1 == 0b1,
            #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
            ttl: (raw & 0xff) as u8,
        }
    }
}

impl Parse for Mpls {
    type Error = Infallible;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>> {
        if buf.len() > u16::MAX as usize {
            return Err(ParseError::BufferTooLong(buf.len()));
        }
        let Some(bytes) = buf.get(..Mpls::LEN.into_non_zero_usize().get()) else {
            return Err(ParseError::Length(LengthError {
                expected: Mpls::LEN.into_non_zero_usize(),
                actual: buf.len(),
            }));
        };
        let raw = u32::from_be_bytes(bytes.try_into().unwrap_or_else(|_| unreachable!()));
        Ok((Mpls::from_u32(raw), Mpls::LEN))
    }
}

impl DeParse for Mpls {
    type Error = ();

    fn size(&self) -> NonZero<u16> {
        Mpls::LEN
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>> {
        let len = self.size().into_non_zero_usize().get();
        if buf.len() < len {
            return Err(DeParseError::Length(LengthError {
                expected: self.size().into_non_zero_usize(),
                actual: buf.len(),
            }));
        }
        buf[..len].copy_from_slice(&self.to_u32().to_be_bytes());
        Ok(self.size())
    }
}

impl ParsePayload for Mpls {
    type Next = Ipv4;

    fn parse_payload(&self, cursor: &mut Reader) -> Option<Ipv4> {
        if !self.bottom_of_stack {
            // deeper stacks are not modeled; leave the payload unparsed and
            // let the pipeline decide what to do with the frame
            debug!("label entry is not bottom-of-stack; payload left unparsed");
            return None;
        }
        cursor
            .parse::<Ipv4>()
            .map_err(|e| {
                debug!("failed to parse ipv4 under label entry: {e:?}");
            })
            .map(|(ipv4, _)| ipv4)
            .ok()
    }
}

/// Contracts for MPLS types
#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::mpls::{Exp, InvalidExp, InvalidLabel, Label, Mpls};
    use bolero::{Driver, TypeGenerator, ValueGenerator};

    impl TypeGenerator for Label {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            match Label::new(u.produce::<u32>()? & Label::MAX.as_u32()) {
                Ok(label) => Some(label),
                Err(InvalidLabel::TooLarge(_)) => unreachable!(),
            }
        }
    }

    impl TypeGenerator for Exp {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            match Exp::new(driver.produce::<u8>()? & Exp::MAX.as_u8()) {
                Ok(exp) => Some(exp),
                Err(InvalidExp(_)) => unreachable!(),
            }
        }
    }

    /// Generate an arbitrary [`Mpls`] entry with the specified bottom-of-stack flag
    pub struct GenWithBottomOfStack(pub bool);

    impl ValueGenerator for GenWithBottomOfStack {
        type Output = Mpls;

        fn generate<D: Driver>(&self, u: &mut D) -> Option<Self::Output> {
            let label = u.produce()?;
            let exp = u.produce()?;
            let ttl = u.produce()?;
            Some(Mpls::new(label, exp, self.0, ttl))
        }
    }

    impl TypeGenerator for Mpls {
        /// Generate a completely arbitrary [`Mpls`] entry
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            GenWithBottomOfStack(u.produce()?).generate(u)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::IntoNonZeroUSize;

    const LEN_USIZE: usize = 4;

    #[test]
    fn label_min_is_valid() {
        let label = Label::MIN;
        assert_eq!(label.as_u32(), 0);
        assert_eq!(label, Label::new(0).unwrap());
    }

    #[test]
    fn label_max_is_valid() {
        let label = Label::MAX;
        assert_eq!(label.as_u32(), 0x000f_ffff);
        assert_eq!(label, Label::new(Label::MAX.as_u32()).unwrap());
    }

    #[test]
    fn label_too_large_is_invalid() {
        match Label::new(Label::MAX.as_u32() + 1) {
            Err(InvalidLabel::TooLarge(x)) => {
                assert_eq!(x, Label::MAX.as_u32() + 1);
            }
            Ok(label) => unreachable!(
                "Label::new(MAX + 1) should have failed but returned {label}",
            ),
        }
    }

    #[test]
    fn exp_bounds_respected() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|byte: u8| match Exp::new(byte) {
                Ok(exp) => {
                    assert_eq!(exp.as_u8(), byte);
                    assert!(exp <= Exp::MAX);
                }
                Err(InvalidExp(raw)) => {
                    assert_eq!(raw, byte);
                    assert!(byte > Exp::MAX.as_u8());
                }
            });
    }

    #[test]
    fn wire_layout() {
        // label 2, exp 0, bottom of stack, ttl 64: the scenario-1 entry
        let mpls = Mpls::new(Label::new(2).unwrap(), Exp::default(), true, 64);
        let mut buf = [0u8; LEN_USIZE];
        mpls.deparse(&mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x21, 0x40]);
    }

    #[test]
    fn parse_back() {
        bolero::check!().with_type().for_each(|mpls: &Mpls| {
            let mut buf = [0u8; LEN_USIZE];
            let written = mpls.deparse(&mut buf).unwrap();
            assert_eq!(written, mpls.size());
            let (parsed, consumed) = Mpls::parse(&buf).unwrap();
            assert_eq!(parsed, *mpls);
            assert_eq!(consumed, written);
            assert_eq!(mpls.label(), parsed.label());
            assert_eq!(mpls.exp(), parsed.exp());
            assert_eq!(mpls.bottom_of_stack(), parsed.bottom_of_stack());
            assert_eq!(mpls.ttl(), parsed.ttl());
        });
    }

    #[test]
    fn parse_noise() {
        // every 4-byte pattern is a legal label entry and must re-encode
        // byte-identically (exp and s round-trip even though forwarding
        // ignores them)
        bolero::check!()
            .with_type()
            .for_each(|buf: &[u8; LEN_USIZE]| {
                let (mpls, consumed) = Mpls::parse(buf).unwrap();
                assert_eq!(consumed, Mpls::LEN);
                let mut buf2 = [0u8; LEN_USIZE];
                let written = mpls.deparse(&mut buf2).unwrap();
                assert_eq!(written, consumed);
                assert_eq!(buf, &buf2);
            });
    }

    #[test]
    fn parse_noise_too_short() {
        bolero::check!()
            .with_type()
            .for_each(|buf: &[u8; LEN_USIZE - 1]| match Mpls::parse(buf) {
                Err(ParseError::Length(e)) => {
                    assert_eq!(e.actual(), buf.len());
                    assert_eq!(e.expected(), Mpls::LEN.into_non_zero_usize());
                }
                _ => unreachable!(),
            });
    }

    #[test]
    fn arbitrary_mutation() {
        bolero::check!()
            .with_type()
            .for_each(|(from, into): &(Mpls, Mpls)| {
                let mut from = *from;
                from.set_label(into.label());
                from.set_exp(into.exp());
                from.set_bottom_of_stack(into.bottom_of_stack());
                from.set_ttl(into.ttl());
                assert_eq!(&from, into);
                let mut from_buffer = [0u8; LEN_USIZE];
                let mut into_buffer = [0u8; LEN_USIZE];
                from.deparse(from_buffer.as_mut()).unwrap();
                into.deparse(into_buffer.as_mut()).unwrap();
                assert_eq!(from_buffer, into_buffer);
            });
    }

    #[test]
    fn deparse_to_insufficient_buffer_is_graceful() {
        bolero::check!().with_type().for_each(|mpls: &Mpls| {
            let mut buf = [0u8; LEN_USIZE - 1];
            match mpls.deparse(&mut buf) {
                Err(DeParseError::Length(e)) => {
                    assert_eq!(e.actual(), buf.len());
                    assert_eq!(e.expected(), Mpls::LEN.into_non_zero_usize());
                }
                _ => unreachable!(),
            }
        });
    }

    #[test]
    fn ttl_decrement() {
        let mut mpls = Mpls::new(Label::new(7).unwrap(), Exp::default(), true, 1);
        mpls.decrement_ttl().unwrap();
        assert_eq!(mpls.ttl(), 0);
        assert_eq!(mpls.decrement_ttl(), Err(LabelTtlAlreadyZero));
    }
}
