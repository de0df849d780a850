//! Index-path strategy for the current "wholepage chart" response.

use serde_json::Value;

use super::{as_list, close_value, hop, minutes_value};
use crate::error::ScrapeError;
use crate::models::Quote;

/// Observed length of the inner literal for this variant.
const INNER_LEN: usize = 16;
/// Hops from the inner literal down to the flat row list.
const ROWS_PATH: [usize; 5] = [3, 0, 0, 0, 0];
/// Row tuple layout: the close sits at index 2 (doubly nested), the raw
/// minute timestamp at index 5.
const CLOSE_INDEX: usize = 2;
const TIMESTAMP_INDEX: usize = 5;
const MIN_ROW_WIDTH: usize = 6;

pub(super) fn quotes(inner: &Value) -> Result<Vec<Quote>, ScrapeError> {
    let top = as_list(inner, "inner")?;
    if top.len() != INNER_LEN {
        return Err(ScrapeError::shape(
            "inner literal length",
            INNER_LEN.to_string(),
            top.len().to_string(),
        ));
    }

    let mut path = String::from("inner");
    let mut node = inner;
    for index in ROWS_PATH {
        node = hop(node, index, &path)?;
        path.push_str(&format!("[{index}]"));
    }

    let rows = as_list(node, &path)?;
    let mut quotes = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let row_path = format!("{path}[{i}]");
        let fields = as_list(row, &row_path)?;
        if fields.len() < MIN_ROW_WIDTH {
            return Err(ScrapeError::shape(
                format!("{row_path} width"),
                format!("at least {MIN_ROW_WIDTH}"),
                fields.len().to_string(),
            ));
        }

        // The close field is itself wrapped twice: row[2][0][0].
        let close_cell = hop(
            hop(&fields[CLOSE_INDEX], 0, &format!("{row_path}[{CLOSE_INDEX}]"))?,
            0,
            &format!("{row_path}[{CLOSE_INDEX}][0]"),
        )?;
        let close = close_value(close_cell, &format!("{row_path}[{CLOSE_INDEX}][0][0]"))?;
        let minutes = minutes_value(
            &fields[TIMESTAMP_INDEX],
            &format!("{row_path}[{TIMESTAMP_INDEX}]"),
        )?;
        quotes.push(Quote::new(minutes, close));
    }
    Ok(quotes)
}
