// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ipv4 header type and manipulation

pub use crate::ipv4::addr::UnicastIpv4Addr;
use crate::parse::{
    DeParse, DeParseError, IntoNonZeroUSize, LengthError, Parse, ParseError,
};
use etherparse::{IpNumber, Ipv4Header};
use std::net::Ipv4Addr;
use std::num::NonZero;

pub mod addr;

mod checksum;

pub use checksum::*;

#[cfg(any(test, feature = "bolero"))]
pub use contract::*;

/// An IPv4 header
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ipv4(pub(crate) Ipv4Header);

impl Ipv4 {
    /// The minimum length of an IPv4 header (i.e., a header with no options)
    #[allow(clippy::unwrap_used)] // const-eval and trivially safe
    pub const MIN_LEN: NonZero<u16> = NonZero::new(20).unwrap();

    /// The maximum length of an IPv4 header (i.e., a header with full options)
    #[allow(clippy::unwrap_used)] // const-eval and trivially safe
    pub const MAX_LEN: NonZero<u16> = NonZero::new(60).unwrap();

    /// Create a new IPv4 header, validating the source address.
    pub(crate) fn new(header: Ipv4Header) -> Result<Self, Ipv4Error> {
        UnicastIpv4Addr::new(Ipv4Addr::from(header.source))
            .map_err(Ipv4Error::InvalidSourceAddr)?;
        Ok(Self(header))
    }

    /// Get the source ip address of the header
    #[must_use]
    pub fn source(&self) -> UnicastIpv4Addr {
        UnicastIpv4Addr::new(Ipv4Addr::from(self.0.source)).unwrap_or_else(|_| unreachable!())
    }

    /// Get the destination ip address of the header
    #[must_use]
    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.0.destination)
    }

    /// Get the next layer protocol which follows this header.
    #[must_use]
    pub fn protocol(&self) -> IpNumber {
        self.0.protocol
    }

    /// Length of the header (includes options) in bytes.
    ///
    /// <div class="warning">
    /// The returned value is in bytes (not in units of 32 bits as per the IHL field).
    /// </div>
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.0.header_len()
    }

    /// Value of the total length ip header field
    #[must_use]
    pub fn total_len(&self) -> u16 {
        self.0.total_len
    }

    /// The number of routing hops the packet is allowed to take.
    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.0.time_to_live
    }

    /// Return the header's "identification" field.
    #[must_use]
    pub fn identification(&self) -> u16 {
        self.0.identification
    }

    /// Returns true if the "don't fragment" bit is set in this header.
    #[must_use]
    pub fn dont_fragment(&self) -> bool {
        self.0.dont_fragment
    }

    /// Set the source ip of the header.
    pub fn set_source(&mut self, source: UnicastIpv4Addr) -> &mut Self {
        self.0.source = source.inner().octets();
        self
    }

    /// Set the destination ip address for this header.
    pub fn set_destination(&mut self, dest: Ipv4Addr) -> &mut Self {
        self.0.destination = dest.octets();
        self
    }

    /// Set the header's time to live
    /// (i.e., the maximum number of routing hops it can traverse without being dropped).
    pub fn set_ttl(&mut self, ttl: u8) -> &mut Self {
        self.0.time_to_live = ttl;
        self
    }

    /// Set the next layer protocol.
    pub fn set_protocol(&mut self, protocol: IpNumber) -> &mut Self {
        self.0.protocol = protocol;
        self
    }

    /// Set the "identification" field of this header.
    pub fn set_identification(&mut self, id: u16) -> &mut Self {
        self.0.identification = id;
        self
    }

    /// Attempt to decrement the TTL.
    ///
    /// The header checksum is updated on success.
    ///
    /// # Errors
    ///
    /// Returns a [`TtlAlreadyZero`] if the ttl is already at zero.
    /// This outcome usually indicates the need to drop the packet in a
    /// routing stack.
    pub fn decrement_ttl(&mut self) -> Result<(), TtlAlreadyZero> {
        if self.0.time_to_live == 0 {
            return Err(TtlAlreadyZero);
        }
        self.0.time_to_live -= 1;
        self.update_checksum();
        Ok(())
    }

    /// Set the length _of the payload_ of the ipv4 packet.
    ///
    /// This method adjusts the total length field to account for options and
    /// the length of this header. It _will not_ update the checksum.
    ///
    /// # Errors
    ///
    /// Returns [`Ipv4LengthError`] if the value is too big.
    pub fn set_payload_len(&mut self, payload_len: u16) -> Result<(), Ipv4LengthError> {
        match self.0.set_payload_len(payload_len as usize) {
            Ok(()) => Ok(()),
            Err(err) => Err(Ipv4LengthError {
                requested: payload_len as usize + self.header_len(),
                max: err.max_allowed,
            }),
        }
    }

    fn update_checksum(&mut self) {
        use crate::checksum::Checksum;
        <Self as Checksum>::update_checksum(self, &());
    }
}

/// Error which is triggered when decrementing a TTL which is already zero.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[repr(transparent)]
#[error("ttl is already zero")]
pub struct TtlAlreadyZero;

/// Error describing an illegal length in an IPv4 header
#[derive(Debug, thiserror::Error)]
#[error(
    "Invalid IPv4 length requested: {requested}, max is {max} when considering all options and headers"
)]
pub struct Ipv4LengthError {
    requested: usize,
    max: usize,
}

/// Error which is triggered during construction of an [`Ipv4`] object.
#[derive(thiserror::Error, Debug)]
pub enum Ipv4Error {
    /// Source address is invalid because it is multicast.
    #[error("multicast source forbidden (received {0})")]
    InvalidSourceAddr(Ipv4Addr),
    /// Error triggered when etherparse fails to parse the header.
    #[error(transparent)]
    Invalid(etherparse::err::ipv4::HeaderSliceError),
}

impl Parse for Ipv4 {
    type Error = Ipv4Error;
    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>> {
        if buf.len() > u16::MAX as usize {
            return Err(ParseError::BufferTooLong(buf.len()));
        }
        let (etherparse_header, rest) =
            Ipv4Header::from_slice(buf).map_err(|e| ParseError::Invalid(Ipv4Error::Invalid(e)))?;
        #[allow(clippy::cast_possible_truncation)] // buffer length bounded above
        let consumed =
            NonZero::new((buf.len() - rest.len()) as u16).ok_or_else(|| unreachable!())?;
        Ok((
            Self::new(etherparse_header).map_err(ParseError::Invalid)?,
            consumed,
        ))
    }
}

impl DeParse for Ipv4 {
    type Error = ();

    fn size(&self) -> NonZero<u16> {
        #[allow(clippy::cast_possible_truncation)] // ipv4 headers have a safe upper bound on length
        NonZero::new(self.0.header_len() as u16).unwrap_or_else(|| unreachable!())
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>> {
        if buf.len() > u16::MAX as usize {
            return Err(DeParseError::BufferTooLong(buf.len()));
        }
        let len = buf.len();
        if len < self.size().into_non_zero_usize().get() {
            return Err(DeParseError::Length(LengthError {
                expected: self.size().into_non_zero_usize(),
                actual: len,
            }));
        }
        buf[..(self.size().get() as usize)].copy_from_slice(&self.0.to_bytes());
        Ok(self.size())
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::ipv4::Ipv4;
    use bolero::{Driver, TypeGenerator, ValueGenerator};
    use etherparse::{IpNumber, Ipv4Header};
    use std::net::Ipv4Addr;

    /// [`ValueGenerator`] for an (otherwise) arbitrary [`Ipv4`] with a specified protocol.
    pub struct GenWithProtocol(pub IpNumber);

    impl ValueGenerator for GenWithProtocol {
        type Output = Ipv4;

        fn generate<D: Driver>(&self, u: &mut D) -> Option<Self::Output> {
            let mut header = Ipv4(Ipv4Header::default());
            header
                .set_source(u.produce()?)
                .set_destination(Ipv4Addr::from(u.produce::<u32>()?))
                .set_protocol(self.0)
                .set_ttl(u.produce()?)
                .set_identification(u.produce()?);
            Some(header)
        }
    }

    impl TypeGenerator for Ipv4 {
        /// Generates an arbitrary (option-free) [`Ipv4`] header.
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            GenWithProtocol(IpNumber(u.produce()?)).generate(u)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::ipv4::{Ipv4, Ipv4Error, TtlAlreadyZero};
    use crate::parse::{DeParse, IntoNonZeroUSize, Parse, ParseError};
    use etherparse::err::ipv4::{HeaderError, HeaderSliceError};

    const MIN_LEN_USIZE: usize = 20;
    const MAX_LEN_USIZE: usize = 60;

    #[test]
    fn parse_back() {
        bolero::check!().with_type().for_each(|header: &Ipv4| {
            let mut buffer = [0u8; MIN_LEN_USIZE];
            let bytes_written = header
                .deparse(&mut buffer)
                .unwrap_or_else(|e| unreachable!("{e:?}"));
            assert_eq!(bytes_written, Ipv4::MIN_LEN);
            let (parse_back, bytes_read) = Ipv4::parse(&buffer[..(bytes_written.get() as usize)])
                .unwrap_or_else(|e| unreachable!("{e:?}"));
            assert_eq!(header.source(), parse_back.source());
            assert_eq!(header.destination(), parse_back.destination());
            assert_eq!(header.protocol(), parse_back.protocol());
            assert_eq!(header.ttl(), parse_back.ttl());
            assert_eq!(header, &parse_back);
            assert_eq!(bytes_written, bytes_read);
        });
    }

    #[test]
    fn parse_arbitrary_bytes() {
        bolero::check!()
            .with_type()
            .for_each(|slice: &[u8; MAX_LEN_USIZE]| {
                match Ipv4::parse(slice) {
                    Ok((header, consumed)) => {
                        assert!(consumed.into_non_zero_usize().get() <= slice.len());
                        let mut buf = vec![0; consumed.into_non_zero_usize().get()];
                        header.deparse(&mut buf).unwrap();
                        assert_eq!(&slice[..=5], &buf.as_slice()[..=5]);
                        // reserved bit in ipv4 flags should serialize to zero
                        assert_eq!(slice[6] & 0b0111_1111, buf[6]);
                        assert_eq!(&slice[7..MIN_LEN_USIZE], &buf.as_slice()[7..MIN_LEN_USIZE]);
                        assert_eq!(
                            &slice[MIN_LEN_USIZE..consumed.into_non_zero_usize().get()],
                            &buf.as_slice()[MIN_LEN_USIZE..consumed.into_non_zero_usize().get()]
                        );
                    }
                    Err(e) => match e {
                        ParseError::Length(e) => {
                            assert!(e.expected().get() < slice.len());
                            assert_eq!(e.actual(), slice.len());
                        }
                        ParseError::Invalid(Ipv4Error::InvalidSourceAddr(source)) => {
                            assert!(source.is_multicast());
                        }
                        ParseError::Invalid(Ipv4Error::Invalid(HeaderSliceError::Content(
                            HeaderError::UnexpectedVersion { version_number },
                        ))) => assert_ne!(version_number, 4),
                        ParseError::Invalid(Ipv4Error::Invalid(HeaderSliceError::Content(
                            HeaderError::HeaderLengthSmallerThanHeader { ihl },
                        ))) => {
                            // ihl is given in units of 4-byte values; the
                            // minimum header is 5 * 4 = 20 bytes
                            assert!(((4 * ihl) as usize) < MIN_LEN_USIZE);
                        }
                        ParseError::Invalid(Ipv4Error::Invalid(HeaderSliceError::Len(e))) => {
                            assert!(e.required_len > slice.len());
                        }
                        ParseError::Invalid(_) | ParseError::BufferTooLong(_) => unreachable!(),
                    },
                }
            });
    }

    #[test]
    fn ttl_decrement_keeps_checksum_valid() {
        use crate::checksum::Checksum;
        bolero::check!().with_type().for_each(|header: &Ipv4| {
            let mut header = header.clone();
            let ttl = header.ttl();
            match header.decrement_ttl() {
                Ok(()) => {
                    assert_eq!(header.ttl(), ttl - 1);
                    assert!(header.validate_checksum(&()).is_ok());
                }
                Err(TtlAlreadyZero) => assert_eq!(ttl, 0),
            }
        });
    }
}
