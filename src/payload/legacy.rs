//! Index-path strategy for the older chart response.
//!
//! The legacy inner literal is only four elements long and its rows are
//! flat five-field tuples with a string close, unlike the wholepage
//! variant's doubly nested numeric close.

use serde_json::Value;

use super::{as_list, close_value, hop, minutes_value};
use crate::error::ScrapeError;
use crate::models::Quote;

const INNER_LEN: usize = 4;
const ROWS_PATH: [usize; 4] = [0, 2, 0, 0];
/// Row tuple: (A, B, Close, Pct, Timestamp).
const ROW_WIDTH: usize = 5;
const CLOSE_INDEX: usize = 2;
const TIMESTAMP_INDEX: usize = 4;

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
        if fields.len() != ROW_WIDTH {
            return Err(ScrapeError::shape(
                format!("{row_path} width"),
                ROW_WIDTH.to_string(),
                fields.len().to_string(),
            ));
        }

        let close = close_value(&fields[CLOSE_INDEX], &format!("{row_path}[{CLOSE_INDEX}]"))?;
        let minutes = minutes_value(
            &fields[TIMESTAMP_INDEX],
            &format!("{row_path}[{TIMESTAMP_INDEX}]"),
        )?;
        quotes.push(Quote::new(minutes, close));
    }
    Ok(quotes)
}
