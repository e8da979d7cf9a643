use itertools::Itertools;
use serde::de::{Error, Unexpected};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const DIGEST_BYTES: usize = 16;
pub const DIGEST_HEX_DIGITS: usize = 2 * DIGEST_BYTES;

pub type DigestBuffer = [u8; DIGEST_BYTES];

#[derive(Error, Debug, PartialEq)]
pub enum DigestError {
    #[error("Invalid hex digit {0:?}; expected one of [0-9a-fA-F]")]
    InvalidChar(char),

    #[error("Invalid length")]
    InvalidLength,

    #[error("Invalid alignment")]
    InvalidAlignment,

    #[error("Value {0} does not fit into a nibble")]
    InvalidNibble(u8),
}

fn parse_hex(value: &str) -> Result<DigestBuffer, DigestError> {
    if value.len() != DIGEST_HEX_DIGITS {
        return Err(DigestError::InvalidLength);
    }
    if let Some(c) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DigestError::InvalidChar(c));
    }

    let mut buffer = [0u8; DIGEST_BYTES];
    for ((hi, lo), target) in value.chars().tuples().zip(buffer.iter_mut()) {
        let hi = hi.to_digit(16).ok_or(DigestError::InvalidChar(hi))?;
        let lo = lo.to_digit(16).ok_or(DigestError::InvalidChar(lo))?;
        *target = ((hi as u8) << 4) | lo as u8;
    }

    Ok(buffer)
}

/// Fills a digest buffer front to back. Nibbles must come in pairs before
/// whole bytes are pushed again.
#[derive(Default, Debug)]
pub struct DigestBuilder {
    buffer: DigestBuffer,
    bits: usize,
}

impl DigestBuilder {
    pub fn push_u4(&mut self, value: u8) -> Result<&mut Self, DigestError> {
        if value > 0xf {
            return Err(DigestError::InvalidNibble(value));
        }
        if self.bits + 4 > 8 * DIGEST_BYTES {
            return Err(DigestError::InvalidLength);
        }

        let byte = &mut self.buffer[self.bits / 8];
        *byte = (*byte << 4) | value;
        self.bits += 4;
        Ok(self)
    }

    pub fn push_u8(&mut self, value: u8) -> Result<&mut Self, DigestError> {
        if self.bits % 8 != 0 {
            return Err(DigestError::InvalidAlignment);
        }
        if self.bits + 8 > 8 * DIGEST_BYTES {
            return Err(DigestError::InvalidLength);
        }

        self.buffer[self.bits / 8] = value;
        self.bits += 8;
        Ok(self)
    }

    /// Big endian, so the value reads naturally in the hex representation.
    pub fn push_u16(&mut self, value: u16) -> Result<&mut Self, DigestError> {
        self.push_slice(&value.to_be_bytes())
    }

    pub fn push_slice(&mut self, value: &[u8]) -> Result<&mut Self, DigestError> {
        if self.bits + 8 * value.len() > 8 * DIGEST_BYTES {
            return Err(DigestError::InvalidLength);
        }

        for &x in value {
            self.push_u8(x)?;
        }
        Ok(self)
    }

    pub fn build<T: From<DigestBuffer>>(&self) -> Result<T, DigestError> {
        if self.bits != 8 * DIGEST_BYTES {
            return Err(DigestError::InvalidLength);
        }
        Ok(self.buffer.into())
    }
}

macro_rules! impl_digest_output {
    ($output : ident) => {
        paste::paste! {
            #[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
            pub struct $output(DigestBuffer);

            impl $output {
                pub fn to_binary(&self) -> &DigestBuffer {
                    &self.0
                }
            }

            impl Display for $output {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    for &x in &self.0 {
                        write!(f, "{x:02x}")?;
                    }
                    Ok(())
                }
            }

            impl From<DigestBuffer> for $output {
                fn from(value: DigestBuffer) -> Self {
                    $output(value)
                }
            }

            impl TryFrom<&[u8]> for $output {
                type Error = DigestError;

                fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                    let buffer: DigestBuffer =
                        value.try_into().map_err(|_| DigestError::InvalidLength)?;
                    Ok(buffer.into())
                }
            }

            impl TryFrom<&str> for $output {
                type Error = DigestError;

                fn try_from(value: &str) -> Result<Self, Self::Error> {
                    Ok(parse_hex(value)?.into())
                }
            }

            impl TryFrom<String> for $output {
                type Error = DigestError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.as_str().try_into()
                }
            }

            impl Serialize for $output {
                fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    ser.serialize_str(&self.to_string())
                }
            }

            impl<'de> Deserialize<'de> for $output {
                fn deserialize<D>(de: D) -> Result<Self, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    let s = String::deserialize(de)?;

                    match parse_hex(&s) {
                        Ok(buffer) => Ok(buffer.into()),
                        Err(DigestError::InvalidLength) => Err(D::Error::invalid_length(
                            s.len(),
                            &"hex digest with exactly 32 characters",
                        )),
                        Err(_) => Err(D::Error::invalid_value(
                            Unexpected::Str(&s),
                            &"a hex string",
                        )),
                    }
                }
            }

            #[cfg(test)]
            mod [<test_ $output:snake>] {
                use super::*;

                fn counting_hex() -> String {
                    (0..DIGEST_HEX_DIGITS).map(|i| format!("{:x}", i % 16)).collect()
                }

                #[test]
                fn hex_string() {
                    let hex = counting_hex();
                    let digest = $output::try_from(hex.as_str()).unwrap();
                    assert_eq!(digest.to_string(), hex);
                    assert_eq!(digest.to_binary()[..2], [0x01, 0x23]);

                    let upper = hex.to_ascii_uppercase();
                    assert_eq!($output::try_from(upper).unwrap(), digest);

                    assert_eq!(
                        $output::try_from(&hex[1..]),
                        Err(DigestError::InvalidLength)
                    );

                    let mut broken = hex.clone();
                    broken.replace_range(5..6, "g");
                    assert_eq!(
                        $output::try_from(broken.as_str()),
                        Err(DigestError::InvalidChar('g'))
                    );
                }

                #[test]
                fn binary() {
                    let buffer: DigestBuffer = std::array::from_fn(|i| (7 * i) as u8);
                    let digest = $output::try_from(&buffer[..]).unwrap();
                    assert_eq!(digest.to_binary(), &buffer);

                    assert!($output::try_from(&buffer[1..]).is_err());
                    assert!($output::try_from(&[0u8; DIGEST_BYTES + 1][..]).is_err());
                }

                #[test]
                fn serde() {
                    let digest = $output::try_from(counting_hex()).unwrap();
                    let json = serde_json::to_string(&digest).unwrap();
                    assert_eq!(json, format!("\"{}\"", counting_hex()));
                    assert_eq!(serde_json::from_str::<$output>(&json).unwrap(), digest);

                    assert!(serde_json::from_str::<$output>("\"0123\"").is_err());
                    assert!(serde_json::from_str::<$output>(
                        "\"0123456789abcdef0123456789abcdez\""
                    )
                    .is_err());
                }
            }
        }
    };
}

impl_digest_output!(InstanceDigest);
impl_digest_output!(SolutionDigest);
