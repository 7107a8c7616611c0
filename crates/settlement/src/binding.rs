// Instruction binding descriptors
//
// A descriptor maps the positions of an instruction's flat account list to the
// capabilities each position must hold and, optionally, to the record schema
// its data is read through. It is built once per instruction type and applied
// to every invocation of that type when the account table is bound.

use crate::schema::{AccountSchema, SchemaTag, DISCRIMINATOR_LEN};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

// ================================
// Access Requirements
// ================================

/// Capabilities a position requires from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Access {
    pub signer: bool,
    pub writable: bool,
}

impl Access {
    pub const READONLY: Self = Self {
        signer: false,
        writable: false,
    };
    pub const SIGNER: Self = Self {
        signer: true,
        writable: false,
    };
    pub const WRITABLE: Self = Self {
        signer: false,
        writable: true,
    };
    pub const WRITABLE_SIGNER: Self = Self {
        signer: true,
        writable: true,
    };

    /// Parse a tag list such as `"mut, signer"`
    pub fn parse(tags: &str) -> Result<Self, String> {
        tags.parse()
    }

    /// True when `self` asks for nothing beyond `granted`
    pub fn is_subset_of(&self, granted: &Self) -> bool {
        (!self.signer || granted.signer) && (!self.writable || granted.writable)
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(tags: &str) -> Result<Self, Self::Err> {
        let mut access = Self::READONLY;
        for tag in tags.split(',').map(str::trim).filter(|tag| !tag.is_empty()) {
            match tag {
                "mut" => access.writable = true,
                "signer" => access.signer = true,
                other => return Err(format!("unknown account tag {other:?}")),
            }
        }
        Ok(access)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.writable, self.signer) {
            (true, true) => f.write_str("mut, signer"),
            (true, false) => f.write_str("mut"),
            (false, true) => f.write_str("signer"),
            (false, false) => f.write_str("readonly"),
        }
    }
}

// ================================
// Account Specs
// ================================

/// How a position's data is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBinding {
    /// Written by this instruction; not validated at bind time
    Init(SchemaTag),
    /// Pre-existing record, validated at bind time
    Existing(SchemaTag),
}

impl DataBinding {
    pub fn tag(&self) -> SchemaTag {
        match self {
            Self::Init(tag) | Self::Existing(tag) => *tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub name: &'static str,
    pub access: Access,
    pub data: Option<DataBinding>,
    /// Position must hold program code
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescriptor {
    instruction: &'static str,
    accounts: Vec<AccountSpec>,
}

impl BindingDescriptor {
    pub fn new(instruction: &'static str) -> Self {
        Self {
            instruction,
            accounts: Vec::new(),
        }
    }

    /// Plain account with no data schema
    #[must_use]
    pub fn account(self, name: &'static str, access: Access) -> Self {
        self.push(AccountSpec {
            name,
            access,
            data: None,
            executable: false,
        })
    }

    /// Account holding an existing `T` record
    #[must_use]
    pub fn data_account<T: AccountSchema>(self, name: &'static str, access: Access) -> Self {
        self.push(AccountSpec {
            name,
            access,
            data: Some(DataBinding::Existing(T::schema())),
            executable: false,
        })
    }

    /// Account whose `T` record this instruction initializes
    #[must_use]
    pub fn init_account<T: AccountSchema>(self, name: &'static str, access: Access) -> Self {
        self.push(AccountSpec {
            name,
            access,
            data: Some(DataBinding::Init(T::schema())),
            executable: false,
        })
    }

    /// Read-only executable account, the target of cross-program calls
    #[must_use]
    pub fn program(self, name: &'static str) -> Self {
        self.push(AccountSpec {
            name,
            access: Access::READONLY,
            data: None,
            executable: true,
        })
    }

    fn push(mut self, spec: AccountSpec) -> Self {
        debug_assert!(
            self.position(spec.name).is_none(),
            "duplicate account name {}",
            spec.name
        );
        self.accounts.push(spec);
        self
    }

    pub fn instruction(&self) -> &'static str {
        self.instruction
    }

    pub fn accounts(&self) -> &[AccountSpec] {
        &self.accounts
    }

    pub fn get(&self, index: usize) -> Option<&AccountSpec> {
        self.accounts.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.accounts.iter().position(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn discriminator(&self) -> [u8; DISCRIMINATOR_LEN] {
        instruction_discriminator(self.instruction)
    }
}

/// `sha256("global:{name}")[..8]`, the prefix of an instruction's data
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("global:{name}").as_bytes());
    let mut discriminator = [0u8; DISCRIMINATOR_LEN];
    discriminator.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    discriminator
}
