// Account table: binds the raw, ordered account list of one invocation
//
// BINDING CONTRACT: positions keep their original index and are never
// reordered or deduplicated. Binding fails before any business logic runs if
// the caller supplied too few accounts, named one key twice with different
// writability, granted less than a position requires, or handed over a record
// that does not match the declared schema.

use super::account::{AccountHandle, AccountState};
use crate::binding::{Access, BindingDescriptor, DataBinding};
use crate::errors::{Capability, Result, SettlementError};
use crate::host::RawAccount;
use crate::pda::SignerSeeds;
use crate::validation;
use solana_program::pubkey::Pubkey;
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct AccountTable {
    program_id: Pubkey,
    handles: Vec<AccountHandle>,
}

impl AccountTable {
    /// Bind raw accounts against a descriptor
    pub fn bind(
        program_id: Pubkey,
        raw: Vec<RawAccount>,
        descriptor: &BindingDescriptor,
    ) -> Result<Self> {
        if raw.len() < descriptor.len() {
            return Err(SettlementError::AccountCount {
                expected: descriptor.len(),
                actual: raw.len(),
            });
        }
        check_aliasing(&raw)?;

        let mut handles = Vec::with_capacity(raw.len());
        for (index, entry) in raw.into_iter().enumerate() {
            let Some(spec) = descriptor.get(index) else {
                trace!(index, key = %entry.state.key, "trailing account");
                handles.push(AccountHandle::new(
                    index,
                    None,
                    program_id,
                    entry.state,
                    entry.is_signer,
                    entry.is_writable,
                    None,
                ));
                continue;
            };

            let privilege = |missing| SettlementError::Privilege {
                index,
                name: spec.name.to_string(),
                missing,
            };
            let granted = Access {
                signer: entry.is_signer,
                writable: entry.is_writable,
            };
            if !spec.access.is_subset_of(&granted) {
                let missing = if spec.access.signer && !granted.signer {
                    Capability::Signer
                } else {
                    Capability::Writable
                };
                return Err(privilege(missing));
            }
            if spec.access.writable && entry.state.executable {
                return Err(privilege(Capability::Mutable));
            }
            if spec.executable && !entry.state.executable {
                return Err(privilege(Capability::Executable));
            }
            if let Some(DataBinding::Existing(tag)) = spec.data {
                if entry.state.owner != program_id {
                    return Err(privilege(Capability::Ownership));
                }
                tag.check(&entry.state.data)
                    .map_err(|reason| SettlementError::schema(index, reason))?;
            }

            handles.push(AccountHandle::new(
                index,
                Some(spec.name),
                program_id,
                entry.state,
                entry.is_signer,
                entry.is_writable,
                spec.data.map(|binding| binding.tag()),
            ));
        }

        debug!(
            program = %program_id,
            instruction = descriptor.instruction(),
            accounts = handles.len(),
            "bound account table"
        );
        Ok(Self { program_id, handles })
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountHandle> {
        self.handles.iter()
    }

    pub fn get(&self, index: usize) -> Result<&AccountHandle> {
        validation::validate_account_index(index, self.handles.len())?;
        Ok(&self.handles[index])
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut AccountHandle> {
        validation::validate_account_index(index, self.handles.len())?;
        Ok(&mut self.handles[index])
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.handles
            .iter()
            .position(|handle| handle.name() == Some(name))
            .ok_or_else(|| SettlementError::UnknownAccount(name.to_string()))
    }

    pub fn by_name(&self, name: &str) -> Result<&AccountHandle> {
        let index = self.index_of(name)?;
        Ok(&self.handles[index])
    }

    pub fn by_name_mut(&mut self, name: &str) -> Result<&mut AccountHandle> {
        let index = self.index_of(name)?;
        Ok(&mut self.handles[index])
    }

    /// First position holding `key`
    pub fn position_of_key(&self, key: &Pubkey) -> Option<usize> {
        self.handles.iter().position(|handle| handle.key() == key)
    }

    /// Number of handles with pending writes
    pub fn pending_writes(&self) -> usize {
        self.handles.iter().filter(|handle| handle.is_dirty()).count()
    }

    pub(crate) fn handles_mut(&mut self) -> impl Iterator<Item = &mut AccountHandle> {
        self.handles.iter_mut()
    }

    /// Fund, allocate and assign a vacant slot
    ///
    /// `rent_exempt` is the host's minimum balance for `space` bytes. The new
    /// account must have signed, or `signer_seeds` must derive its address.
    pub fn create_account(
        &mut self,
        payer: usize,
        new_account: usize,
        space: usize,
        owner: &Pubkey,
        signer_seeds: Option<&SignerSeeds>,
        rent_exempt: u64,
    ) -> Result<()> {
        validation::validate_account_indices([payer, new_account], self.handles.len())?;

        let funder = &self.handles[payer];
        require_capability(funder, funder.is_writable(), Capability::Writable)?;
        require_capability(funder, funder.is_signer(), Capability::Signer)?;

        let target = &self.handles[new_account];
        require_capability(target, target.is_writable(), Capability::Writable)?;
        let authorized_by_seeds = match signer_seeds {
            Some(seeds) => {
                let derived = seeds.derive(&self.program_id)?;
                if derived != *target.key() {
                    return Err(SettlementError::UnauthorizedSeeds { derived });
                }
                true
            }
            None => false,
        };
        require_capability(
            target,
            target.is_signer() || authorized_by_seeds,
            Capability::Signer,
        )?;
        if payer == new_account || !target.state().is_vacant() {
            return Err(SettlementError::AlreadyInUse { key: *target.key() });
        }

        let available = funder.lamports();
        if available < rent_exempt {
            return Err(SettlementError::InsufficientFunds {
                payer: *funder.key(),
                required: rent_exempt,
                available,
            });
        }

        self.handles[payer].move_lamports(available - rent_exempt);
        let created = &mut self.handles[new_account];
        if authorized_by_seeds {
            created.grant_signer();
        }
        created.move_lamports(rent_exempt);
        created.allocate_and_assign(space, *owner);
        debug!(
            key = %created.key(),
            space,
            owner = %owner,
            lamports = rent_exempt,
            "created account"
        );
        Ok(())
    }
}

fn require_capability(handle: &AccountHandle, held: bool, missing: Capability) -> Result<()> {
    if held {
        return Ok(());
    }
    Err(SettlementError::Capability {
        index: handle.index(),
        key: *handle.key(),
        missing,
    })
}

/// Same key at two positions must carry the same writability
fn check_aliasing(raw: &[RawAccount]) -> Result<()> {
    let mut first_seen: BTreeMap<Pubkey, usize> = BTreeMap::new();
    for (index, entry) in raw.iter().enumerate() {
        match first_seen.get(&entry.state.key) {
            Some(&first) if raw[first].is_writable != entry.is_writable => {
                return Err(SettlementError::Aliasing {
                    key: entry.state.key,
                    first,
                    second: index,
                });
            }
            Some(_) => {}
            None => {
                first_seen.insert(entry.state.key, index);
            }
        }
    }
    Ok(())
}

/// Build a raw entry, for hosts and tests
pub fn raw_account(state: AccountState, is_signer: bool, is_writable: bool) -> RawAccount {
    RawAccount {
        is_signer,
        is_writable,
        state,
    }
}
