//! Versioned account record schemas
//!
//! Account data is opaque bytes to the ledger. A program gives it shape by
//! binding an account position to an [`AccountSchema`]: an 8-byte
//! discriminator derived from the record name and version, followed by the
//! borsh encoding of the record. The binding is resolved when the account
//! table is built, so a wrong or uninitialized record fails before business
//! logic runs.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the record header
pub const DISCRIMINATOR_LEN: usize = 8;

/// A structured record stored in account data
pub trait AccountSchema: BorshSerialize + BorshDeserialize {
    /// Record type name, part of the discriminator
    const NAME: &'static str;

    /// Layout version, part of the discriminator
    const VERSION: u8 = 1;

    /// Bytes to allocate for the record, header included
    const SPACE: usize;

    fn schema() -> SchemaTag {
        SchemaTag::new(Self::NAME, Self::VERSION)
    }
}

// ================================
// Schema Tag
// ================================

/// Resolved schema descriptor carried by a binding
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaTag {
    name: &'static str,
    version: u8,
    discriminator: [u8; DISCRIMINATOR_LEN],
}

impl SchemaTag {
    pub fn new(name: &'static str, version: u8) -> Self {
        let digest = Sha256::digest(format!("account:{name}:v{version}").as_bytes());
        let mut discriminator = [0u8; DISCRIMINATOR_LEN];
        discriminator.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
        Self {
            name,
            version,
            discriminator,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn discriminator(&self) -> [u8; DISCRIMINATOR_LEN] {
        self.discriminator
    }

    /// True when `data` starts with this schema's header
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= DISCRIMINATOR_LEN && data[..DISCRIMINATOR_LEN] == self.discriminator
    }

    /// Check the header of `data`, reporting why it does not match
    pub fn check(&self, data: &[u8]) -> Result<(), String> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(format!(
                "{} bytes cannot hold a {} header",
                data.len(),
                self
            ));
        }
        if !self.matches(data) {
            return Err(format!(
                "header {} does not match {} ({})",
                hex::encode(&data[..DISCRIMINATOR_LEN]),
                self,
                hex::encode(self.discriminator)
            ));
        }
        Ok(())
    }

    /// Decode a record from a full account buffer
    pub fn decode<T: AccountSchema>(&self, data: &[u8]) -> Result<T, String> {
        self.check(data)?;
        let mut payload = &data[DISCRIMINATOR_LEN..];
        T::deserialize(&mut payload).map_err(|err| format!("{self}: {err}"))
    }

    /// Encode a record into a buffer of exactly `capacity` bytes
    ///
    /// The tail beyond the record is zero-filled.
    pub fn encode<T: AccountSchema>(&self, value: &T, capacity: usize) -> Result<Vec<u8>, String> {
        let payload = value
            .try_to_vec()
            .map_err(|err| format!("{self}: {err}"))?;
        let needed = DISCRIMINATOR_LEN + payload.len();
        if needed > capacity {
            return Err(format!(
                "{self} needs {needed} bytes, account holds {capacity}"
            ));
        }
        let mut buffer = vec![0u8; capacity];
        buffer[..DISCRIMINATOR_LEN].copy_from_slice(&self.discriminator);
        buffer[DISCRIMINATOR_LEN..needed].copy_from_slice(&payload);
        Ok(buffer)
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

impl fmt::Debug for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaTag({self}, {})", hex::encode(self.discriminator))
    }
}
