//! Temporal balance queries.
//!
//! Balances are stored as sparse snapshots: a row at block `n` holds the
//! balance from `n` until the next snapshot of the same account. The balance
//! at a block is therefore the latest snapshot at or below it.

use alloy_primitives::U256;
use rusqlite::{params, Connection, OptionalExtension};

use super::all;
use crate::codec;
use crate::error::IndexerDbResult;
use crate::rows::{self, bound_int};
use crate::types::{AddressId, BlockNumber, Erc20TokenBalance, EtherBalance};

fn decode_balance(bytes: Option<Vec<u8>>) -> IndexerDbResult<U256> {
    match bytes {
        Some(bytes) => Ok(codec::decode_u256(&bytes)?),
        None => Ok(U256::ZERO),
    }
}

/// Wei held by `address` at `block`; zero before its first snapshot.
pub fn get_wei_balance_at_block(
    conn: &Connection,
    address: AddressId,
    block: BlockNumber,
) -> IndexerDbResult<U256> {
    let bytes: Option<Vec<u8>> = conn
        .prepare_cached(
            "SELECT balance FROM ether_balances
             WHERE address_id = ?1 AND block_number <= ?2
             ORDER BY block_number DESC LIMIT 1",
        )?
        .query_row(params![address, bound_int(block)], |row| row.get(0))
        .optional()?;
    decode_balance(bytes)
}

/// Units of `token` held by `holder` at `block`; zero before its first snapshot.
pub fn get_erc20_token_balance_at_block(
    conn: &Connection,
    holder: AddressId,
    token: AddressId,
    block: BlockNumber,
) -> IndexerDbResult<U256> {
    let bytes: Option<Vec<u8>> = conn
        .prepare_cached(
            "SELECT balance FROM erc20_token_balances
             WHERE address_id = ?1 AND token_address_id = ?2 AND block_number <= ?3
             ORDER BY block_number DESC LIMIT 1",
        )?
        .query_row(params![holder, token, bound_int(block)], |row| {
            row.get(0)
        })
        .optional()?;
    decode_balance(bytes)
}

/// Most recent ether snapshot of `address`, at any height.
pub fn get_last_stored_ether_balance(
    conn: &Connection,
    address: AddressId,
) -> IndexerDbResult<Option<EtherBalance>> {
    let balance = conn
        .prepare_cached(
            "SELECT block_number, address_id, balance FROM ether_balances
             WHERE address_id = ?1
             ORDER BY block_number DESC LIMIT 1",
        )?
        .query_row(params![address], rows::row_to_ether_balance)
        .optional()?;
    Ok(balance)
}

pub fn get_last_stored_erc20_token_balance(
    conn: &Connection,
    holder: AddressId,
    token: AddressId,
) -> IndexerDbResult<Option<Erc20TokenBalance>> {
    let balance = conn
        .prepare_cached(
            "SELECT block_number, address_id, token_address_id, balance FROM erc20_token_balances
             WHERE address_id = ?1 AND token_address_id = ?2
             ORDER BY block_number DESC LIMIT 1",
        )?
        .query_row(params![holder, token], rows::row_to_token_balance)
        .optional()?;
    Ok(balance)
}

/// Balance of every token `holder` had a snapshot for at or below `block`,
/// ordered by token.
pub fn list_erc20_token_balances_at_block(
    conn: &Connection,
    holder: AddressId,
    block: BlockNumber,
) -> IndexerDbResult<Vec<Erc20TokenBalance>> {
    let block = bound_int(block);
    all(
        conn,
        "SELECT b.block_number, b.address_id, b.token_address_id, b.balance
         FROM erc20_token_balances b
         WHERE b.address_id = ?1
           AND b.block_number = (
               SELECT MAX(latest.block_number) FROM erc20_token_balances latest
               WHERE latest.address_id = b.address_id
                 AND latest.token_address_id = b.token_address_id
                 AND latest.block_number <= ?2)
         ORDER BY b.token_address_id ASC",
        &[&holder, &block],
        rows::row_to_token_balance,
    )
}

/// Number of addresses whose latest snapshot of `token` is non-zero.
pub fn get_erc20_token_holders(conn: &Connection, token: AddressId) -> IndexerDbResult<u64> {
    // zero encodes as the empty blob
    let holders: i64 = conn
        .prepare_cached(
            "SELECT COUNT(*) FROM erc20_token_balances b
             WHERE b.token_address_id = ?1
               AND length(b.balance) > 0
               AND b.block_number = (
                   SELECT MAX(latest.block_number) FROM erc20_token_balances latest
                   WHERE latest.address_id = b.address_id
                     AND latest.token_address_id = b.token_address_id)",
        )?
        .query_row(params![token], |row| row.get(0))?;
    Ok(u64::try_from(holders).unwrap_or_default())
}
