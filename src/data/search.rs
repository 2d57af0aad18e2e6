//! Stock lookup over the security master table

use polars::prelude::*;

/// How long a security master fetched for searching stays usable
pub const SEARCH_TTL_MINUTES: u64 = 1440;

/// Number of matches returned when no limit is given
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

const MATCH_COLUMNS: [&str; 3] = ["ts_code", "name", "cnspell"];
const LISTED: &str = "L";

/// Filters a `stock_basic` table down to listed stocks matching `query`
///
/// # Arguments
/// * `stocks` - Security master rows, in provider order
/// * `query` - Substring looked up case-insensitively in `ts_code`, `name`
///   and `cnspell`; surrounding whitespace is ignored and an empty query
///   matches every row
/// * `limit` - Maximum number of rows returned
///
/// # Returns
/// The first `limit` matching rows with all of their columns. Rows whose
/// `list_status` is anything but `L` are skipped when that column exists.
/// Missing match columns are ignored.
pub fn search_listed(stocks: &DataFrame, query: &str, limit: usize) -> PolarsResult<DataFrame> {
    let query = query.trim().to_lowercase();
    let status = string_column(stocks, "list_status")?;
    let searched = MATCH_COLUMNS
        .iter()
        .map(|name| string_column(stocks, name))
        .collect::<PolarsResult<Vec<_>>>()?;
    let searched: Vec<&StringChunked> = searched.iter().flatten().collect();

    let mut matched = 0;
    let mut mask = Vec::with_capacity(stocks.height());
    for row in 0..stocks.height() {
        let listed = status.as_ref().map_or(true, |s| s.get(row) == Some(LISTED));
        let hit = matched < limit
            && listed
            && (query.is_empty()
                || searched
                    .iter()
                    .any(|column| column.get(row).is_some_and(|v| v.to_lowercase().contains(&query))));
        if hit {
            matched += 1;
        }
        mask.push(hit);
    }

    stocks.filter(&BooleanChunked::from_slice("mask".into(), &mask))
}

/// A column as strings, or `None` if the table doesn't have it
fn string_column(table: &DataFrame, name: &str) -> PolarsResult<Option<StringChunked>> {
    if !table.get_column_names().iter().any(|column| column.as_str() == name) {
        return Ok(None);
    }
    let column = table.column(name)?.cast(&DataType::String)?;
    Ok(Some(column.as_materialized_series().str()?.clone()))
}
