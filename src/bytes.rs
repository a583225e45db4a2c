//
// bytes.rs -- key/value conversion traits
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! Lets callers pass `&str`, `String`, `&[u8]` or `Vec<u8>` directly as
//! keys and values, and get back whichever owned type they asked for.

/// A byte sequence borrowed where possible, owned where a conversion is
/// unavoidable.
pub enum BytesRef<'a> {
    /// No conversion was needed; the bytes are borrowed from the caller.
    Reference(&'a [u8]),
    /// A conversion produced an owned buffer.
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for BytesRef<'_> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Reference(r) => r,
            Self::Owned(b) => b.as_ref(),
        }
    }
}

/// Types that can be viewed as a key or value byte string without always
/// requiring an allocation.
pub trait ToBytesRef {
    fn to_bytes_ref(&self) -> BytesRef<'_>;
}

impl ToBytesRef for [u8] {
    fn to_bytes_ref(&self) -> BytesRef<'_> {
        BytesRef::Reference(self)
    }
}

impl ToBytesRef for Vec<u8> {
    fn to_bytes_ref(&self) -> BytesRef<'_> {
        BytesRef::Reference(self.as_slice())
    }
}

impl ToBytesRef for str {
    fn to_bytes_ref(&self) -> BytesRef<'_> {
        BytesRef::Reference(self.as_bytes())
    }
}

impl ToBytesRef for String {
    fn to_bytes_ref(&self) -> BytesRef<'_> {
        BytesRef::Reference(self.as_bytes())
    }
}

impl ToBytesRef for BytesRef<'_> {
    fn to_bytes_ref(&self) -> BytesRef<'_> {
        BytesRef::Reference(self.as_ref())
    }
}

/// Types that stored values can be converted into on the way out of `get`.
pub trait FromBytes: Sized {
    fn from_bytes(bytes: Vec<u8>) -> Self;
}

impl FromBytes for Vec<u8> {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        bytes
    }
}

impl FromBytes for String {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        String::from_utf8(bytes.clone()).unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned())
    }
}
