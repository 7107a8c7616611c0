mod common;

use common::*;
use solana_program::{instruction::AccountMeta, pubkey::Pubkey};
use valence_settlement::{
    instruction_data, AccountSchema, InvocationState, Ledger, Outcome, SettlementError,
};

fn record_metas(keys: &[Pubkey]) -> Vec<AccountMeta> {
    keys.iter().map(|key| AccountMeta::new(*key, false)).collect()
}

#[test]
fn test_failed_invocation_leaves_ledger_untouched() {
    let mut ledger = ledger();
    let keys: Vec<Pubkey> = (0..3).map(|value| add_record(&mut ledger, value)).collect();
    let before = ledger.snapshot();

    let outcome = run(
        &mut ledger,
        &Stamp {
            order: vec![0, 1, 2],
            value: 99,
            fail: true,
        },
        &record_metas(&keys),
    );

    assert_eq!(
        outcome,
        Outcome::Aborted {
            state: InvocationState::Executing,
            error: SettlementError::Custom(7),
        }
    );
    assert_eq!(ledger.snapshot(), before);
    assert_eq!(ledger.settlements(), 0);
}

#[test]
fn test_sweep_order_is_ascending_index() {
    let mut ledger = ledger();
    let keys: Vec<Pubkey> = (0..3).map(|value| add_record(&mut ledger, value)).collect();

    let receipt = run(
        &mut ledger,
        &Stamp {
            order: vec![2, 0, 1],
            value: 5,
            fail: false,
        },
        &record_metas(&keys),
    )
    .into_result()
    .unwrap();

    assert_eq!(receipt.written, vec![0, 1, 2]);
    let logged: Vec<Pubkey> = ledger.write_log().iter().map(|write| write.key).collect();
    assert_eq!(logged, keys);
    for key in &keys {
        assert_eq!(read_record(&ledger, key).value, 5);
    }
}

#[test]
fn test_untouched_records_are_not_written() {
    let mut ledger = ledger();
    let keys: Vec<Pubkey> = (0..3).map(|value| add_record(&mut ledger, value)).collect();

    let receipt = run(
        &mut ledger,
        &Stamp {
            order: vec![1],
            value: 8,
            fail: false,
        },
        &record_metas(&keys),
    )
    .into_result()
    .unwrap();

    assert_eq!(receipt.written, vec![1]);
    assert_eq!(receipt.data_written, 1);
    assert_eq!(receipt.lamports_written, 0);
    assert_eq!(read_record(&ledger, &keys[0]).value, 0);
    assert_eq!(read_record(&ledger, &keys[1]).value, 8);
}

#[test]
fn test_open_creates_and_round_trips_record() {
    let mut ledger = ledger();
    let payer = Pubkey::new_unique();
    let record = Pubkey::new_unique();
    ledger.fund(payer, 1);
    let funded = ledger.lamports(&payer);
    let rent = ledger.minimum_balance(Record::SPACE);

    let outcome = run(
        &mut ledger,
        &Open { value: 21 },
        &[AccountMeta::new(payer, true), AccountMeta::new(record, true)],
    );
    assert!(outcome.is_committed(), "{outcome:?}");

    let created = ledger.account(&record).unwrap();
    assert_eq!(created.owner, PROGRAM_ID);
    assert_eq!(created.lamports, rent);
    assert_eq!(created.data.len(), Record::SPACE);
    assert_eq!(ledger.lamports(&payer), funded - rent);
    assert_eq!(
        read_record(&ledger, &record),
        Record {
            value: 21,
            note: "opened".to_string()
        }
    );
}

#[test]
fn test_open_with_poor_payer_aborts() {
    let mut ledger = ledger();
    let payer = Pubkey::new_unique();
    let record = Pubkey::new_unique();
    ledger.add_account(valence_settlement::AccountState::system(payer, 10));
    let before = ledger.snapshot();

    let outcome = run(
        &mut ledger,
        &Open { value: 1 },
        &[AccountMeta::new(payer, true), AccountMeta::new(record, true)],
    );
    assert!(matches!(
        outcome.error(),
        Some(SettlementError::InsufficientFunds { available: 10, .. })
    ));
    assert_eq!(ledger.snapshot(), before);
}

#[test]
fn test_open_existing_record_is_already_in_use() {
    let mut ledger = ledger();
    let payer = Pubkey::new_unique();
    ledger.fund(payer, 1);
    let record = add_record(&mut ledger, 3);

    let outcome = run(
        &mut ledger,
        &Open { value: 1 },
        &[AccountMeta::new(payer, true), AccountMeta::new(record, true)],
    );
    assert_eq!(
        outcome.error(),
        Some(&SettlementError::AlreadyInUse { key: record })
    );
    assert_eq!(read_record(&ledger, &record).value, 3);
}

#[test]
fn test_binding_failures_abort_while_dispatching() {
    let mut ledger = ledger();
    let payer = Pubkey::new_unique();
    ledger.fund(payer, 1);

    // payer did not sign
    let outcome = run(
        &mut ledger,
        &Open { value: 1 },
        &[
            AccountMeta::new(payer, false),
            AccountMeta::new(Pubkey::new_unique(), true),
        ],
    );
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            state: InvocationState::Dispatching,
            error: SettlementError::Privilege { index: 0, .. },
        }
    ));

    // same key, conflicting writability
    let keys: Vec<Pubkey> = (0..2).map(|value| add_record(&mut ledger, value)).collect();
    let outcome = run(
        &mut ledger,
        &Stamp {
            order: vec![],
            value: 0,
            fail: false,
        },
        &[
            AccountMeta::new(keys[0], false),
            AccountMeta::new(keys[1], false),
            AccountMeta::new_readonly(keys[0], false),
        ],
    );
    assert!(matches!(
        outcome.error(),
        Some(SettlementError::Aliasing {
            first: 0,
            second: 2,
            ..
        })
    ));
}

#[test]
fn test_unregistered_and_misaddressed_instructions() {
    let mut ledger = ledger();
    ledger.submit(PROGRAM_ID, &[], vec![0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);
    assert!(matches!(
        dispatcher().process(&mut ledger).error(),
        Some(SettlementError::MalformedInstruction(_))
    ));

    let other = Pubkey::new_unique();
    ledger.deploy(other);
    ledger.submit(other, &[], instruction_data(&Recurse {}).unwrap());
    assert!(matches!(
        dispatcher().process(&mut ledger).error(),
        Some(SettlementError::MalformedInstruction(_))
    ));

    // nothing staged
    assert!(matches!(
        dispatcher().process(&mut ledger).error(),
        Some(SettlementError::Host(_))
    ));
}
