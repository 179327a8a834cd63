//! Read access: point lookups, paginated listings and temporal balance queries.
//!
//! Absence is never an error. Getters return `Ok(None)`, listings an empty
//! page and balance queries zero.

pub mod balances;
pub mod getters;
pub mod listers;

use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::error::IndexerDbResult;
use crate::rows::bound_int;
use crate::types::{OffsetPagination, Page};

/// Run a filtered listing and its count.
///
/// `rows_sql` must end in `LIMIT ? OFFSET ?`, placed after the `filter`
/// parameters. A `limit` of zero only counts; no pagination returns every row.
pub(crate) fn paged<T>(
    conn: &Connection,
    count_sql: &str,
    rows_sql: &str,
    filter: &[&dyn ToSql],
    pagination: Option<OffsetPagination>,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> IndexerDbResult<Page<T>> {
    let total: i64 = conn
        .prepare_cached(count_sql)?
        .query_row(filter, |row| row.get(0))?;
    let total = u64::try_from(total).unwrap_or_default();

    let (limit, offset) = match pagination {
        Some(p) if p.limit == 0 => {
            return Ok(Page {
                items: Vec::new(),
                total,
            })
        }
        Some(p) => (i64::from(p.limit), bound_int(p.offset)),
        // negative LIMIT is unbounded
        None => (-1, 0),
    };

    let mut args: Vec<&dyn ToSql> = filter.to_vec();
    args.push(&limit);
    args.push(&offset);

    let items = conn
        .prepare_cached(rows_sql)?
        .query_map(args.as_slice(), map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Page { items, total })
}

/// Run a query and collect every mapped row.
pub(crate) fn all<T>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> IndexerDbResult<Vec<T>> {
    let items = conn
        .prepare_cached(sql)?
        .query_map(params, map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}
