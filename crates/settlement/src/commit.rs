// Commit manager: the only writer to the host ledger
//
// SETTLEMENT ORDER: dirty handles are swept in ascending table index and
// handed to the ledger in a single all-or-none call. The manager consumes the
// account table, so an invocation can settle at most once and no handle is
// reachable afterwards.

use crate::errors::{Result, SettlementError};
use crate::host::{AccountWrite, Ledger};
use crate::state::AccountTable;
use solana_program::pubkey::Pubkey;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What a successful sweep persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Table positions written, ascending
    pub written: Vec<usize>,
    pub lamports_written: usize,
    pub data_written: usize,
}

pub struct CommitManager {
    table: AccountTable,
}

impl CommitManager {
    pub fn new(table: AccountTable) -> Self {
        Self { table }
    }

    /// Writes the sweep would hand to the ledger, ascending by index
    ///
    /// Two dirty positions naming the same key must agree on the pending
    /// contents; the duplicate is folded into the first write.
    pub fn pending(&self) -> Result<Vec<AccountWrite>> {
        let mut writes: Vec<AccountWrite> = Vec::new();
        let mut by_key: BTreeMap<Pubkey, usize> = BTreeMap::new();

        for handle in self.table.iter().filter(|handle| handle.is_dirty()) {
            if let Some(&first) = by_key.get(handle.key()) {
                let earlier = self.table.get(first)?;
                if earlier.state() != handle.state() {
                    return Err(SettlementError::Aliasing {
                        key: *handle.key(),
                        first,
                        second: handle.index(),
                    });
                }
                continue;
            }
            by_key.insert(*handle.key(), handle.index());

            let dirty = handle.dirty();
            let state = handle.state();
            writes.push(AccountWrite {
                index: handle.index(),
                key: state.key,
                lamports: dirty.lamports.then_some(state.lamports),
                data: dirty.data.then(|| state.data.clone()),
                owner: dirty.owner.then_some(state.owner),
            });
        }
        Ok(writes)
    }

    /// Sweep every dirty handle into the ledger
    pub fn commit(self, ledger: &mut dyn Ledger) -> Result<CommitReceipt> {
        let writes = self.pending()?;
        let receipt = CommitReceipt {
            written: writes.iter().map(|write| write.index).collect(),
            lamports_written: writes.iter().filter(|write| write.lamports.is_some()).count(),
            data_written: writes.iter().filter(|write| write.data.is_some()).count(),
        };

        if writes.is_empty() {
            debug!(program = %self.table.program_id(), "nothing to settle");
            return Ok(receipt);
        }
        for write in &writes {
            debug!(
                index = write.index,
                key = %write.key,
                lamports = ?write.lamports,
                data_len = write.data.as_ref().map(Vec::len),
                "settling account"
            );
        }
        ledger.settle(&writes)?;
        info!(
            program = %self.table.program_id(),
            writes = writes.len(),
            "settled invocation"
        );
        Ok(receipt)
    }

    /// Drop every pending mutation; returns how many handles were dirty
    pub fn discard(self) -> usize {
        let abandoned = self.table.pending_writes();
        if abandoned > 0 {
            warn!(
                program = %self.table.program_id(),
                abandoned,
                "discarded pending writes"
            );
        }
        abandoned
    }
}
