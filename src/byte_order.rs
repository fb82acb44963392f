//! Network byte-order conversions for the integer widths the protocol uses.
//!
//! Every multi-byte integer on the wire is big-endian. Conversions go through
//! [`NetworkOrder`] so the Clippy expectation lives in one place.

/// Integers with a fixed big-endian wire form.
///
/// # Examples
///
/// ```
/// use mgmtframe::byte_order::NetworkOrder;
///
/// assert_eq!(0x1234u16.to_network(), [0x12, 0x34]);
/// assert_eq!(u32::from_network([0, 0, 0x01, 0x00]), 256);
/// ```
pub trait NetworkOrder: Sized {
    /// Encoded form of the integer.
    type Bytes;

    /// Encode in network byte order.
    #[must_use]
    fn to_network(self) -> Self::Bytes;

    /// Decode from network byte order.
    #[must_use]
    fn from_network(bytes: Self::Bytes) -> Self;
}

macro_rules! network_order {
    ($($ty:ty => $len:literal),* $(,)?) => {$(
        impl NetworkOrder for $ty {
            type Bytes = [u8; $len];

            #[expect(
                clippy::big_endian_bytes,
                reason = "Network byte order requires big-endian bytes."
            )]
            fn to_network(self) -> Self::Bytes { self.to_be_bytes() }

            #[expect(
                clippy::big_endian_bytes,
                reason = "Network byte order requires big-endian bytes."
            )]
            fn from_network(bytes: Self::Bytes) -> Self { <$ty>::from_be_bytes(bytes) }
        }
    )*};
}

// u16 carries string lengths; u32 carries counts, object and chunk lengths.
network_order!(u16 => 2, u32 => 4);
