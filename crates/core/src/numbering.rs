//! Human-facing sequential numbers for orders and support tickets.
//!
//! Numbers have the shape `<PREFIX>-<YYYY>-<NNNNNN>`, where the sequence is
//! the number of existing rows plus one, zero-padded to six digits. Larger
//! sequences are printed in full rather than truncated.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors returned when parsing a sequential number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberingError {
    #[error("expected prefix {expected}")]
    WrongPrefix { expected: &'static str },
    #[error("malformed number: {0}")]
    Malformed(String),
}

macro_rules! define_sequential_number {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Build the next number for `year` given how many rows exist.
            #[must_use]
            pub fn sequential(year: i32, existing_count: i64) -> Self {
                Self(format!("{}-{year}-{:06}", Self::PREFIX, existing_count + 1))
            }

            /// Parse a previously issued number.
            ///
            /// # Errors
            ///
            /// Returns [`NumberingError`] if the prefix, year or sequence is
            /// malformed.
            pub fn parse(s: &str) -> Result<Self, NumberingError> {
                let mut parts = s.splitn(3, '-');
                let prefix = parts.next().unwrap_or_default();
                if prefix != Self::PREFIX {
                    return Err(NumberingError::WrongPrefix {
                        expected: Self::PREFIX,
                    });
                }

                let year = parts.next().unwrap_or_default();
                let sequence = parts.next().unwrap_or_default();
                let well_formed = year.len() == 4
                    && year.bytes().all(|b| b.is_ascii_digit())
                    && sequence.len() >= 6
                    && sequence.bytes().all(|b| b.is_ascii_digit());
                if !well_formed {
                    return Err(NumberingError::Malformed(s.to_owned()));
                }

                Ok(Self(s.to_owned()))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_sequential_number!(OrderNumber, "ORD");
define_sequential_number!(TicketNumber, "TKT");
