// Cross-program invocation with privilege attenuation
//
// SECURITY MODEL: an inner instruction may hold at most the privileges the
// current invocation holds for each account. The only way to add a signer is
// a signer-seed list that derives, under the executing program's id, the key
// of an account the inner instruction requests as signer. Every check runs
// before the host sees the instruction, so a rejected call has no effect.
//
// Results flow back through the account table: writable accounts adopt the
// host's post-call value and become dirty; a read-only account the host
// reports as changed voids the whole call. Positions that share a key must
// agree on their pending value before the call, since every one of them
// adopts the host's result.

use crate::config::RuntimeConfig;
use crate::errors::{Capability, Result, SettlementError};
use crate::host::Ledger;
use crate::pda::SignerSeeds;
use crate::state::{AccountState, AccountTable};
use crate::validation;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// One account of an inner instruction, by table position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRef {
    pub index: usize,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountRef {
    pub const fn new(index: usize, is_writable: bool, is_signer: bool) -> Self {
        Self {
            index,
            is_signer,
            is_writable,
        }
    }

    pub const fn readonly(index: usize) -> Self {
        Self::new(index, false, false)
    }

    pub const fn writable(index: usize) -> Self {
        Self::new(index, true, false)
    }

    pub const fn signer(index: usize) -> Self {
        Self::new(index, false, true)
    }

    pub const fn writable_signer(index: usize) -> Self {
        Self::new(index, true, true)
    }
}

// ================================
// Invoker
// ================================

pub struct CrossProgramInvoker<'a> {
    config: &'a RuntimeConfig,
    program_id: Pubkey,
    stack_height: usize,
    call_stack: &'a [Pubkey],
}

impl<'a> CrossProgramInvoker<'a> {
    /// `stack_height` is the height of the current frame; `call_stack` lists
    /// the programs of the enclosing frames
    pub fn new(
        config: &'a RuntimeConfig,
        program_id: Pubkey,
        stack_height: usize,
        call_stack: &'a [Pubkey],
    ) -> Self {
        Self {
            config,
            program_id,
            stack_height,
            call_stack,
        }
    }

    /// Invoke `target` with a subset of the table
    pub fn invoke(
        &self,
        ledger: &mut dyn Ledger,
        table: &mut AccountTable,
        target: &Pubkey,
        accounts: &[AccountRef],
        signer_seeds: &[SignerSeeds],
        data: &[u8],
    ) -> Result<()> {
        self.check_target(target)?;
        let inner_height = self.stack_height + 1;
        if inner_height > self.config.max_stack_height {
            return Err(SettlementError::CallDepthExceeded {
                height: inner_height,
                max: self.config.max_stack_height,
            });
        }
        self.check_limits(table, accounts, signer_seeds, data)?;

        let program_present = table
            .iter()
            .any(|handle| handle.key() == target && handle.executable());
        if !program_present {
            return Err(SettlementError::ProgramNotFound { program: *target });
        }

        let derived_signers = self.derive_signers(table, accounts, signer_seeds)?;
        attenuate(table, accounts, &derived_signers)?;
        check_aliases(table, accounts)?;

        // Each distinct account goes to the host once, with its pending value
        let mut keys: Vec<Pubkey> = Vec::new();
        let mut states: Vec<AccountState> = Vec::new();
        let mut metas = Vec::with_capacity(accounts.len());
        let mut signers: Vec<Pubkey> = Vec::new();
        let mut writable: BTreeSet<Pubkey> = BTreeSet::new();
        for account in accounts {
            let handle = table.get(account.index)?;
            let key = *handle.key();
            metas.push(AccountMeta {
                pubkey: key,
                is_signer: account.is_signer,
                is_writable: account.is_writable,
            });
            if account.is_signer && !signers.contains(&key) {
                signers.push(key);
            }
            if account.is_writable {
                writable.insert(key);
            }
            if !keys.contains(&key) {
                keys.push(key);
                states.push(handle.state().clone());
            }
        }
        let instruction = Instruction {
            program_id: *target,
            accounts: metas,
            data: data.to_vec(),
        };

        debug!(
            caller = %self.program_id,
            target = %target,
            accounts = accounts.len(),
            signers = signers.len(),
            height = inner_height,
            "cross-program invoke"
        );
        let before = states.clone();
        ledger
            .invoke(&instruction, &mut states, &signers, inner_height)
            .map_err(|err| {
                warn!(target = %target, error = %err, "inner invocation failed");
                SettlementError::Host(err)
            })?;

        for (original, updated) in before.iter().zip(&states) {
            if !writable.contains(&original.key) && original != updated {
                return Err(SettlementError::PrivilegeEscalation {
                    key: original.key,
                    requested: Capability::Writable,
                });
            }
        }
        for updated in states.iter().filter(|state| writable.contains(&state.key)) {
            for handle in table.handles_mut().filter(|handle| handle.key() == &updated.key) {
                handle.write_back(updated);
            }
        }
        Ok(())
    }

    /// Invoke a prebuilt instruction, resolving its metas by key
    pub fn invoke_instruction(
        &self,
        ledger: &mut dyn Ledger,
        table: &mut AccountTable,
        instruction: &Instruction,
        signer_seeds: &[SignerSeeds],
    ) -> Result<()> {
        let accounts = instruction
            .accounts
            .iter()
            .map(|meta| {
                table
                    .position_of_key(&meta.pubkey)
                    .map(|index| AccountRef::new(index, meta.is_writable, meta.is_signer))
                    .ok_or_else(|| SettlementError::UnknownAccount(meta.pubkey.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.invoke(
            ledger,
            table,
            &instruction.program_id,
            &accounts,
            signer_seeds,
            &instruction.data,
        )
    }

    fn check_target(&self, target: &Pubkey) -> Result<()> {
        if *target == self.program_id || self.call_stack.contains(target) {
            return Err(SettlementError::Reentrancy { program: *target });
        }
        Ok(())
    }

    fn check_limits(
        &self,
        table: &AccountTable,
        accounts: &[AccountRef],
        signer_seeds: &[SignerSeeds],
        data: &[u8],
    ) -> Result<()> {
        validation::validate_cpi_data(data, self.config.max_cpi_data)?;
        if accounts.len() > self.config.max_cpi_accounts {
            return Err(SettlementError::MalformedInstruction(format!(
                "{} inner accounts, limit is {}",
                accounts.len(),
                self.config.max_cpi_accounts
            )));
        }
        if signer_seeds.len() > self.config.max_signer_seeds {
            return Err(SettlementError::InvalidSeeds(format!(
                "{} signer seed lists, limit is {}",
                signer_seeds.len(),
                self.config.max_signer_seeds
            )));
        }
        validation::validate_account_indices(accounts.iter().map(|account| account.index), table.len())
    }

    /// Addresses proven by signer seeds
    fn derive_signers(
        &self,
        table: &AccountTable,
        accounts: &[AccountRef],
        signer_seeds: &[SignerSeeds],
    ) -> Result<BTreeSet<Pubkey>> {
        let mut derived_signers = BTreeSet::new();
        for seeds in signer_seeds {
            let derived = seeds.derive(&self.program_id)?;
            let requested = accounts.iter().any(|account| {
                account.is_signer
                    && table
                        .get(account.index)
                        .is_ok_and(|handle| *handle.key() == derived)
            });
            if !requested {
                return Err(SettlementError::UnauthorizedSeeds { derived });
            }
            derived_signers.insert(derived);
        }
        Ok(derived_signers)
    }
}

/// Inner privileges must not exceed what this invocation holds
fn attenuate(
    table: &AccountTable,
    accounts: &[AccountRef],
    derived_signers: &BTreeSet<Pubkey>,
) -> Result<()> {
    for account in accounts {
        let handle = table.get(account.index)?;
        if account.is_writable && !handle.is_writable() {
            return Err(SettlementError::PrivilegeEscalation {
                key: *handle.key(),
                requested: Capability::Writable,
            });
        }
        if account.is_signer && !handle.is_signer() && !derived_signers.contains(handle.key()) {
            return Err(SettlementError::PrivilegeEscalation {
                key: *handle.key(),
                requested: Capability::Signer,
            });
        }
    }
    Ok(())
}

/// A passed account must not diverge from another position naming its key
fn check_aliases(table: &AccountTable, accounts: &[AccountRef]) -> Result<()> {
    for account in accounts {
        let passed = table.get(account.index)?;
        let diverged = table
            .iter()
            .find(|handle| handle.key() == passed.key() && handle.state() != passed.state());
        if let Some(other) = diverged {
            return Err(SettlementError::Aliasing {
                key: *passed.key(),
                first: other.index().min(passed.index()),
                second: other.index().max(passed.index()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingDescriptor;
    use crate::host::{HostError, MockLedger};
    use crate::state::raw_account;

    fn program() -> Pubkey {
        Pubkey::new_from_array([5u8; 32])
    }

    fn target() -> Pubkey {
        Pubkey::new_from_array([6u8; 32])
    }

    /// [target program, writable signer wallet, read-only account]
    fn table() -> AccountTable {
        let raw = vec![
            raw_account(AccountState::program(target(), Pubkey::default()), false, false),
            raw_account(AccountState::system(Pubkey::new_unique(), 50), true, true),
            raw_account(AccountState::system(Pubkey::new_unique(), 7), false, false),
        ];
        AccountTable::bind(program(), raw, &BindingDescriptor::new("cpi")).unwrap()
    }

    #[test]
    fn test_reentrancy_rejected_before_host() {
        let config = RuntimeConfig::default();
        let outer = [target()];
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().times(0);
        let mut accounts = table();

        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        assert_eq!(
            invoker.invoke(&mut ledger, &mut accounts, &program(), &[], &[], &[]),
            Err(SettlementError::Reentrancy { program: program() })
        );

        let nested = CrossProgramInvoker::new(&config, program(), 2, &outer);
        assert_eq!(
            nested.invoke(&mut ledger, &mut accounts, &target(), &[], &[], &[]),
            Err(SettlementError::Reentrancy { program: target() })
        );
    }

    #[test]
    fn test_depth_checked_locally() {
        let config = RuntimeConfig {
            max_stack_height: 2,
            ..RuntimeConfig::default()
        };
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().times(0);
        let invoker = CrossProgramInvoker::new(&config, program(), 2, &[]);
        assert_eq!(
            invoker.invoke(&mut ledger, &mut table(), &target(), &[], &[], &[]),
            Err(SettlementError::CallDepthExceeded { height: 3, max: 2 })
        );
    }

    #[test]
    fn test_missing_program_account() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let stranger = Pubkey::new_unique();
        assert_eq!(
            invoker.invoke(&mut ledger, &mut table(), &stranger, &[], &[], &[]),
            Err(SettlementError::ProgramNotFound { program: stranger })
        );
    }

    #[test]
    fn test_escalation_rejected_without_host_call() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().times(0);
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let mut accounts = table();
        let readonly_key = *accounts.get(2).unwrap().key();

        assert_eq!(
            invoker.invoke(&mut ledger, &mut accounts, &target(), &[AccountRef::writable(2)], &[], &[]),
            Err(SettlementError::PrivilegeEscalation {
                key: readonly_key,
                requested: Capability::Writable
            })
        );
        assert_eq!(
            invoker.invoke(&mut ledger, &mut accounts, &target(), &[AccountRef::signer(2)], &[], &[]),
            Err(SettlementError::PrivilegeEscalation {
                key: readonly_key,
                requested: Capability::Signer
            })
        );
        assert_eq!(accounts.pending_writes(), 0);
    }

    #[test]
    fn test_writable_results_written_back_and_dirty() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger
            .expect_invoke()
            .times(1)
            .returning(|instruction, states, signers, height| {
                assert_eq!(height, 2);
                assert_eq!(signers.len(), 1);
                assert_eq!(instruction.accounts.len(), 2);
                states[0].lamports -= 20;
                Ok(())
            });
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let mut accounts = table();

        invoker
            .invoke(
                &mut ledger,
                &mut accounts,
                &target(),
                &[AccountRef::writable_signer(1), AccountRef::readonly(2)],
                &[],
                &[1, 2, 3],
            )
            .unwrap();
        let wallet = accounts.get(1).unwrap();
        assert_eq!(wallet.lamports(), 30);
        assert!(wallet.dirty().lamports && wallet.dirty().data);
        assert!(!accounts.get(2).unwrap().is_dirty());
    }

    #[test]
    fn test_host_mutating_readonly_account_is_rejected() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().returning(|_, states, _, _| {
            states[1].lamports += 1;
            Ok(())
        });
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let mut accounts = table();
        let result = invoker.invoke(
            &mut ledger,
            &mut accounts,
            &target(),
            &[AccountRef::writable(1), AccountRef::readonly(2)],
            &[],
            &[],
        );
        assert!(matches!(result, Err(SettlementError::PrivilegeEscalation { .. })));
        assert_eq!(accounts.pending_writes(), 0);
    }

    #[test]
    fn test_host_failure_bubbles_up() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger
            .expect_invoke()
            .returning(|_, _, _, _| Err(HostError::with_code(1, "insufficient funds")));
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let mut accounts = table();
        let result = invoker.invoke(&mut ledger, &mut accounts, &target(), &[AccountRef::writable(1)], &[], &[]);
        assert_eq!(
            result,
            Err(SettlementError::Host(HostError::with_code(1, "insufficient funds")))
        );
        assert_eq!(accounts.pending_writes(), 0);
    }

    #[test]
    fn test_seeds_must_match_requested_signer() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().times(0);
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let (_, bump) = crate::pda::find_program_address(&program(), &["vault"]).unwrap();
        let seeds = SignerSeeds::new(["vault"], bump);
        let result = invoker.invoke(
            &mut ledger,
            &mut table(),
            &target(),
            &[AccountRef::writable(1)],
            &[seeds],
            &[],
        );
        assert!(matches!(result, Err(SettlementError::UnauthorizedSeeds { .. })));
    }

    #[test]
    fn test_diverged_alias_is_not_overwritten() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().times(0);
        let record = AccountState::new(Pubkey::new_unique(), 100, 8, program());
        let raw = vec![
            raw_account(record.clone(), false, true),
            raw_account(record.clone(), false, true),
            raw_account(AccountState::program(target(), Pubkey::default()), false, false),
        ];
        let mut accounts = AccountTable::bind(program(), raw, &BindingDescriptor::new("cpi")).unwrap();
        accounts.get_mut(0).unwrap().set_lamports(40).unwrap();

        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        for passed in [0, 1] {
            assert_eq!(
                invoker.invoke(&mut ledger, &mut accounts, &target(), &[AccountRef::writable(passed)], &[], &[]),
                Err(SettlementError::Aliasing {
                    key: record.key,
                    first: 0,
                    second: 1
                })
            );
        }
        assert_eq!(accounts.get(0).unwrap().lamports(), 40);
        assert_eq!(accounts.get(1).unwrap().lamports(), 100);
    }

    #[test]
    fn test_agreeing_aliases_all_adopt_result() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        ledger.expect_invoke().times(1).returning(|_, states, _, _| {
            assert_eq!(states.len(), 1);
            states[0].lamports = 60;
            Ok(())
        });
        let record = AccountState::new(Pubkey::new_unique(), 100, 8, program());
        let raw = vec![
            raw_account(record.clone(), false, true),
            raw_account(record, false, true),
            raw_account(AccountState::program(target(), Pubkey::default()), false, false),
        ];
        let mut accounts = AccountTable::bind(program(), raw, &BindingDescriptor::new("cpi")).unwrap();

        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        invoker
            .invoke(&mut ledger, &mut accounts, &target(), &[AccountRef::writable(1)], &[], &[])
            .unwrap();
        assert_eq!(accounts.get(0).unwrap().lamports(), 60);
        assert_eq!(accounts.get(1).unwrap().lamports(), 60);
    }

    #[test]
    fn test_unknown_meta_key() {
        let config = RuntimeConfig::default();
        let mut ledger = MockLedger::new();
        let invoker = CrossProgramInvoker::new(&config, program(), 1, &[]);
        let instruction = Instruction {
            program_id: target(),
            accounts: vec![AccountMeta::new(Pubkey::new_unique(), false)],
            data: vec![],
        };
        assert!(matches!(
            invoker.invoke_instruction(&mut ledger, &mut table(), &instruction, &[]),
            Err(SettlementError::UnknownAccount(_))
        ));
    }
}
