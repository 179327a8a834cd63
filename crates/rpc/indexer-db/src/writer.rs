//! Idempotent bulk inserts.
//!
//! Every row is inserted with `ON CONFLICT DO NOTHING` on its natural key, so
//! replaying a batch that was already (partly) written is a no-op for the rows
//! that exist. Writers report how many rows were actually inserted.

use rusqlite::{params, CachedStatement, Connection, OptionalExtension};

use crate::codec::{encode_optional_u256, encode_u256, encode_u64};
use crate::error::IndexerDbResult;
use crate::identity::TRANSACTIONS;
use crate::rows::sql_int;
use crate::types::{
    Block, Contract, Erc20Token, Erc20TokenBalance, Erc20TokenTransfer, EtherBalance, Log,
    Receipt, StateChange, StorageChange, StorageKey, TraceAction, Transaction, TransactionId,
    Uncle,
};

/// Run `sql` once per record, skipping conflicting rows. Returns rows inserted.
fn insert_ignoring_conflicts<T>(
    conn: &Connection,
    table: &'static str,
    sql: &str,
    records: &[T],
    mut execute: impl FnMut(&mut CachedStatement<'_>, &T) -> IndexerDbResult<usize>,
) -> IndexerDbResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut stmt = conn.prepare_cached(sql)?;
    let mut inserted = 0;
    for record in records {
        inserted += execute(&mut stmt, record)?;
    }

    tracing::debug!(table, inserted, total = records.len(), "stored records");
    Ok(inserted)
}

pub fn store_blocks(conn: &Connection, blocks: &[Block]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "blocks",
        "INSERT INTO blocks
         (number, hash, nonce, sha3_uncles, logs_bloom, state_root, receipts_root,
          miner_address_id, difficulty, total_difficulty, size, extra_data, gas_limit, gas_used,
          base_fee_per_gas, mix_hash, static_reward, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
         ON CONFLICT DO NOTHING",
        blocks,
        |stmt, block| {
            Ok(stmt.execute(params![
                sql_int("block number", block.number)?,
                block.hash.as_slice(),
                encode_u64(block.nonce),
                block.sha3_uncles.as_slice(),
                block.logs_bloom.as_slice(),
                block.state_root.as_slice(),
                block.receipts_root.as_slice(),
                block.miner_address_id,
                encode_u256(block.difficulty),
                encode_u256(block.total_difficulty),
                encode_u64(block.size),
                block.extra_data.as_ref(),
                encode_u64(block.gas_limit),
                encode_u64(block.gas_used),
                encode_u256(block.base_fee_per_gas),
                block.mix_hash.as_slice(),
                encode_u256(block.static_reward),
                sql_int("timestamp", block.timestamp)?,
            ])?)
        },
    )
}

pub fn store_uncles(conn: &Connection, uncles: &[Uncle]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "uncles",
        "INSERT INTO uncles
         (block_height, position, hash, uncle_height, parent_hash, miner_address_id, difficulty,
          gas_limit, gas_used, timestamp, reward)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT DO NOTHING",
        uncles,
        |stmt, uncle| {
            Ok(stmt.execute(params![
                sql_int("block height", uncle.block_height)?,
                uncle.position,
                uncle.hash.as_slice(),
                sql_int("uncle height", uncle.uncle_height)?,
                uncle.parent_hash.as_slice(),
                uncle.miner_address_id,
                encode_u256(uncle.difficulty),
                encode_u64(uncle.gas_limit),
                encode_u64(uncle.gas_used),
                sql_int("timestamp", uncle.timestamp)?,
                encode_u256(uncle.reward),
            ])?)
        },
    )
}

fn insert_transaction(conn: &Connection, tx: &Transaction) -> IndexerDbResult<Option<i64>> {
    let id = conn
        .prepare_cached(
            "INSERT INTO transactions
             (block_number, hash, nonce, tx_index, from_address_id, to_address_id, value, gas,
              gas_price, gas_tip_cap, gas_fee_cap, input, tx_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT DO NOTHING RETURNING id",
        )?
        .query_row(
            params![
                sql_int("block number", tx.block_number)?,
                tx.hash.as_slice(),
                encode_u64(tx.nonce),
                sql_int("transaction index", tx.index)?,
                tx.from_address_id,
                tx.to_address_id,
                encode_u256(tx.value),
                encode_u64(tx.gas),
                encode_u256(tx.gas_price),
                encode_optional_u256(tx.gas_tip_cap),
                encode_optional_u256(tx.gas_fee_cap),
                tx.input.as_ref(),
                tx.tx_type,
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Store transactions and return their ids in input order.
///
/// Transactions are keyed by hash; an already stored hash returns its original id.
pub fn store_transactions(
    conn: &Connection,
    transactions: &[Transaction],
) -> IndexerDbResult<Vec<TransactionId>> {
    let ids = TRANSACTIONS.resolve(conn, transactions, insert_transaction, |tx| {
        tx.hash.as_slice()
    })?;
    Ok(ids.into_iter().map(TransactionId::from).collect())
}

pub fn store_receipts(conn: &Connection, receipts: &[Receipt]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "receipts",
        "INSERT INTO receipts
         (transaction_id, cumulative_gas_used, gas_used, contract_address_id, post_state, success,
          effective_gas_price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT DO NOTHING",
        receipts,
        |stmt, receipt| {
            Ok(stmt.execute(params![
                receipt.transaction_id,
                encode_u64(receipt.cumulative_gas_used),
                encode_u64(receipt.gas_used),
                receipt.contract_address_id,
                receipt.post_state.as_slice(),
                receipt.status.is_success(),
                encode_u256(receipt.effective_gas_price),
            ])?)
        },
    )
}

pub fn store_logs(conn: &Connection, logs: &[Log]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "logs",
        "INSERT INTO logs
         (transaction_id, log_index, address_id, topic0_id, topic1, topic2, topic3, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT DO NOTHING",
        logs,
        |stmt, log| {
            Ok(stmt.execute(params![
                log.id.transaction_id,
                sql_int("log index", log.id.log_index)?,
                log.address_id,
                log.topic0_id,
                log.topic1.as_ref().map(|t| t.as_slice()),
                log.topic2.as_ref().map(|t| t.as_slice()),
                log.topic3.as_ref().map(|t| t.as_slice()),
                log.data.as_ref(),
            ])?)
        },
    )
}

pub fn store_erc20_tokens(conn: &Connection, tokens: &[Erc20Token]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "erc20_tokens",
        "INSERT INTO erc20_tokens (address_id, symbol, name, decimals, total_supply)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT DO NOTHING",
        tokens,
        |stmt, token| {
            Ok(stmt.execute(params![
                token.address_id,
                token.symbol,
                token.name,
                token.decimals,
                encode_u256(token.total_supply),
            ])?)
        },
    )
}

pub fn store_erc20_token_transfers(
    conn: &Connection,
    transfers: &[Erc20TokenTransfer],
) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "erc20_token_transfers",
        "INSERT INTO erc20_token_transfers
         (transaction_id, log_index, token_address_id, from_address_id, to_address_id, value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT DO NOTHING",
        transfers,
        |stmt, transfer| {
            Ok(stmt.execute(params![
                transfer.log_id.transaction_id,
                sql_int("log index", transfer.log_id.log_index)?,
                transfer.token_address_id,
                transfer.from_address_id,
                transfer.to_address_id,
                encode_u256(transfer.value),
            ])?)
        },
    )
}

pub fn store_contracts(conn: &Connection, contracts: &[Contract]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "contracts",
        "INSERT INTO contracts (address_id, transaction_id, bytecode_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT DO NOTHING",
        contracts,
        |stmt, contract| {
            Ok(stmt.execute(params![
                contract.address_id,
                contract.transaction_id,
                contract.bytecode_id,
            ])?)
        },
    )
}

pub fn store_storage_keys(conn: &Connection, keys: &[StorageKey]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "storage_keys",
        "INSERT INTO storage_keys (transaction_id, address_id, storage_key)
         VALUES (?1, ?2, ?3)
         ON CONFLICT DO NOTHING",
        keys,
        |stmt, key| {
            Ok(stmt.execute(params![
                key.transaction_id,
                key.address_id,
                encode_u256(key.storage_key),
            ])?)
        },
    )
}

pub fn store_traces(conn: &Connection, traces: &[TraceAction]) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "traces",
        "INSERT INTO traces
         (transaction_id, trace_index, trace_type, input, from_address_id, to_address_id, value,
          gas, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT DO NOTHING",
        traces,
        |stmt, trace| {
            Ok(stmt.execute(params![
                trace.transaction_id,
                trace.index,
                trace.trace_type,
                trace.input.as_ref(),
                trace.from_address_id,
                trace.to_address_id,
                encode_u256(trace.value),
                encode_u64(trace.gas),
                trace.error,
            ])?)
        },
    )
}

pub fn store_ether_balances(
    conn: &Connection,
    balances: &[EtherBalance],
) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "ether_balances",
        "INSERT INTO ether_balances (address_id, block_number, balance)
         VALUES (?1, ?2, ?3)
         ON CONFLICT DO NOTHING",
        balances,
        |stmt, balance| {
            Ok(stmt.execute(params![
                balance.address_id,
                sql_int("block number", balance.block_number)?,
                encode_u256(balance.balance),
            ])?)
        },
    )
}

pub fn store_erc20_token_balances(
    conn: &Connection,
    balances: &[Erc20TokenBalance],
) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "erc20_token_balances",
        "INSERT INTO erc20_token_balances (address_id, token_address_id, block_number, balance)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT DO NOTHING",
        balances,
        |stmt, balance| {
            Ok(stmt.execute(params![
                balance.address_id,
                balance.token_address_id,
                sql_int("block number", balance.block_number)?,
                encode_u256(balance.balance),
            ])?)
        },
    )
}

/// Store state changes together with their nested storage changes.
///
/// Returns the number of state change rows inserted.
pub fn store_state_changes(
    conn: &Connection,
    changes: &[StateChange],
) -> IndexerDbResult<usize> {
    let inserted = insert_ignoring_conflicts(
        conn,
        "state_changes",
        "INSERT INTO state_changes
         (transaction_id, address_id, balance_before, balance_after, nonce_before, nonce_after)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT DO NOTHING",
        changes,
        |stmt, change| {
            Ok(stmt.execute(params![
                change.transaction_id,
                change.address_id,
                encode_optional_u256(change.balance_before),
                encode_optional_u256(change.balance_after),
                change.nonce_before.map(encode_u64),
                change.nonce_after.map(encode_u64),
            ])?)
        },
    )?;

    let nested: Vec<StorageChange> = changes
        .iter()
        .flat_map(|change| change.storage_changes.iter().cloned())
        .collect();
    store_storage_changes(conn, &nested)?;

    Ok(inserted)
}

pub fn store_storage_changes(
    conn: &Connection,
    changes: &[StorageChange],
) -> IndexerDbResult<usize> {
    insert_ignoring_conflicts(
        conn,
        "storage_changes",
        "INSERT INTO storage_changes
         (transaction_id, address_id, storage_address, value_before, value_after)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT DO NOTHING",
        changes,
        |stmt, change| {
            Ok(stmt.execute(params![
                change.transaction_id,
                change.address_id,
                encode_u256(change.storage_address),
                encode_u256(change.value_before),
                encode_u256(change.value_after),
            ])?)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use crate::fixtures::{
        address_ids, make_block, make_log, make_receipt, make_trace, make_transaction,
        make_uncle, schema_conn,
    };
    use alloy_primitives::{Bytes, U256};

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_block_replay_is_noop() {
        let conn = schema_conn();
        let miner = address_ids(&conn, &[0xdd])[0];
        let blocks = vec![make_block(1, miner), make_block(2, miner)];

        assert_eq!(store_blocks(&conn, &blocks).unwrap(), 2);
        assert_eq!(store_blocks(&conn, &blocks).unwrap(), 0);
        assert_eq!(count(&conn, "blocks"), 2);
    }

    #[test]
    fn test_empty_batch() {
        let conn = schema_conn();
        assert_eq!(store_blocks(&conn, &[]).unwrap(), 0);
        assert!(store_transactions(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_transaction_ids_stable_across_replay() {
        let conn = schema_conn();
        let ids = address_ids(&conn, &[0x01, 0x02]);
        store_blocks(&conn, &[make_block(7, ids[0])]).unwrap();
        let txs = vec![
            make_transaction(7, 0, ids[0], Some(ids[1])),
            make_transaction(7, 1, ids[1], None),
        ];

        let first = store_transactions(&conn, &txs).unwrap();
        let second = store_transactions(&conn, &txs).unwrap();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
        assert_eq!(count(&conn, "transactions"), 2);
    }

    #[test]
    fn test_missing_block_is_constraint_error() {
        let conn = schema_conn();
        let ids = address_ids(&conn, &[0x01]);
        let err = store_transactions(&conn, &[make_transaction(99, 0, ids[0], None)])
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_children_replay_is_noop() {
        let conn = schema_conn();
        let ids = address_ids(&conn, &[0x01, 0x02]);
        store_blocks(&conn, &[make_block(1, ids[0])]).unwrap();
        let tx_id = store_transactions(&conn, &[make_transaction(1, 0, ids[0], Some(ids[1]))])
            .unwrap()[0];

        let receipts = [make_receipt(tx_id)];
        let logs = [make_log(tx_id, 0, ids[1]), make_log(tx_id, 1, ids[1])];
        let transfers = [Erc20TokenTransfer {
            log_id: logs[0].id,
            token_address_id: ids[1],
            from_address_id: ids[0],
            to_address_id: ids[1],
            value: U256::from(5u64),
        }];
        let keys = [StorageKey {
            transaction_id: tx_id,
            address_id: ids[1],
            storage_key: U256::ZERO,
        }];

        for expected in [1, 0] {
            assert_eq!(store_receipts(&conn, &receipts).unwrap(), expected);
            assert_eq!(store_logs(&conn, &logs).unwrap(), expected * 2);
            assert_eq!(
                store_erc20_token_transfers(&conn, &transfers).unwrap(),
                expected
            );
            assert_eq!(store_storage_keys(&conn, &keys).unwrap(), expected);
        }
    }

    #[test]
    fn test_block_scoped_replay_is_noop() {
        let conn = schema_conn();
        let ids = address_ids(&conn, &[0x01, 0x0a]);
        let (holder, token) = (ids[0], ids[1]);
        store_blocks(&conn, &[make_block(1, holder)]).unwrap();
        let tx_id =
            store_transactions(&conn, &[make_transaction(1, 0, holder, None)]).unwrap()[0];
        let bytecode_id = content::store(&conn, &Bytes::from_static(&[0x60, 0x80])).unwrap();

        let uncles = [make_uncle(1, 0, holder), make_uncle(1, 1, holder)];
        let traces = [make_trace(tx_id, 0, holder), make_trace(tx_id, 1, holder)];
        let contracts = [Contract {
            address_id: token,
            transaction_id: tx_id,
            bytecode_id,
        }];
        let tokens = [Erc20Token {
            address_id: token,
            symbol: "TKN".to_string(),
            name: "Token".to_string(),
            decimals: 18,
            total_supply: U256::from(1_000u64),
        }];
        let ether = [EtherBalance {
            block_number: 1,
            address_id: holder,
            balance: U256::from(7u64),
        }];
        let token_balances = [Erc20TokenBalance {
            block_number: 1,
            address_id: holder,
            token_address_id: token,
            balance: U256::from(3u64),
        }];

        for expected in [1, 0] {
            assert_eq!(store_uncles(&conn, &uncles).unwrap(), expected * 2);
            assert_eq!(store_traces(&conn, &traces).unwrap(), expected * 2);
            assert_eq!(store_contracts(&conn, &contracts).unwrap(), expected);
            assert_eq!(store_erc20_tokens(&conn, &tokens).unwrap(), expected);
            assert_eq!(store_ether_balances(&conn, &ether).unwrap(), expected);
            assert_eq!(
                store_erc20_token_balances(&conn, &token_balances).unwrap(),
                expected
            );
        }

        assert_eq!(count(&conn, "uncles"), 2);
        assert_eq!(count(&conn, "traces"), 2);
        assert_eq!(count(&conn, "contracts"), 1);
        assert_eq!(count(&conn, "erc20_tokens"), 1);
        assert_eq!(count(&conn, "ether_balances"), 1);
        assert_eq!(count(&conn, "erc20_token_balances"), 1);
    }

    #[test]
    fn test_state_change_stores_nested_storage_changes() {
        let conn = schema_conn();
        let ids = address_ids(&conn, &[0x01]);
        store_blocks(&conn, &[make_block(1, ids[0])]).unwrap();
        let tx_id = store_transactions(&conn, &[make_transaction(1, 0, ids[0], None)]).unwrap()[0];

        let change = StateChange {
            transaction_id: tx_id,
            address_id: ids[0],
            balance_after: Some(U256::from(10u64)),
            nonce_before: Some(0),
            nonce_after: Some(1),
            storage_changes: vec![
                StorageChange {
                    transaction_id: tx_id,
                    address_id: ids[0],
                    storage_address: U256::from(1u64),
                    value_before: U256::ZERO,
                    value_after: U256::from(3u64),
                },
                StorageChange {
                    transaction_id: tx_id,
                    address_id: ids[0],
                    storage_address: U256::from(2u64),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert_eq!(store_state_changes(&conn, &[change.clone()]).unwrap(), 1);
        assert_eq!(store_state_changes(&conn, &[change]).unwrap(), 0);
        assert_eq!(count(&conn, "storage_changes"), 2);

        let balance_before_is_null: bool = conn
            .query_row(
                "SELECT balance_before IS NULL FROM state_changes",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(balance_before_is_null);
    }

    #[test]
    fn test_optional_fee_fields_stored_as_null() {
        let conn = schema_conn();
        let ids = address_ids(&conn, &[0x01]);
        store_blocks(&conn, &[make_block(1, ids[0])]).unwrap();
        let mut dynamic = make_transaction(1, 1, ids[0], None);
        dynamic.gas_tip_cap = Some(U256::ZERO);
        store_transactions(
            &conn,
            &[make_transaction(1, 0, ids[0], None), dynamic],
        )
        .unwrap();

        let nulls: Vec<(bool, bool)> = conn
            .prepare("SELECT gas_tip_cap IS NULL, gas_fee_cap IS NULL FROM transactions ORDER BY tx_index")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(nulls, vec![(true, true), (false, true)]);
    }
}
