//! Query execution (spec §4.7 step 2-7): table lookup, required-filter
//! validation, in-memory WHERE/ORDER BY/LIMIT/projection application.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::Session;

use super::parser::{CmpOp, Expr, Literal, Projection, Query, SortDir};
use super::tables::{TableData, TableRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub async fn execute(query: &Query, session: &Session, registry: &TableRegistry) -> Result<ResultSet> {
    let table = registry
        .get(&query.table)
        .ok_or_else(|| Error::UnknownTable(query.table.clone()))?;

    for required in table.required_filters() {
        if !filter_present(query.filter.as_ref(), required) {
            return Err(Error::MissingRequiredFilter((*required).to_string()));
        }
    }

    let TableData { columns, mut rows } = table.fetch(session, query.filter.as_ref()).await?;

    if let Some(expr) = &query.filter {
        let index = column_index(&columns);
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if eval_expr(expr, &row, &index)? {
                kept.push(row);
            }
        }
        rows = kept;
    }

    if let Some((column, dir)) = &query.order_by {
        let idx = *column_index(&columns)
            .get(column.as_str())
            .ok_or_else(|| Error::UnknownColumn(column.clone()))?;
        rows.sort_by(|a, b| compare_values(&a[idx], &b[idx]));
        if *dir == SortDir::Desc {
            rows.reverse();
        }
    }

    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    let (columns, rows) = project(&query.projection, columns, rows)?;

    Ok(ResultSet { columns, rows })
}

fn column_index(columns: &[String]) -> HashMap<&str, usize> {
    columns.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect()
}

fn project(projection: &Projection, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    match projection {
        Projection::Star => Ok((columns, rows)),
        Projection::Columns(wanted) => {
            let index = column_index(&columns);
            let mut idxs = Vec::with_capacity(wanted.len());
            for w in wanted {
                let i = *index.get(w.as_str()).ok_or_else(|| Error::UnknownColumn(w.clone()))?;
                idxs.push(i);
            }
            let reindexed = rows
                .into_iter()
                .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
                .collect();
            Ok((wanted.clone(), reindexed))
        }
    }
}

fn filter_present(expr: Option<&Expr>, column: &str) -> bool {
    match expr {
        None => false,
        Some(e) => filter_present_in(e, column),
    }
}

fn filter_present_in(expr: &Expr, column: &str) -> bool {
    match expr {
        Expr::Comparison { column: c, op, .. } => c == column && matches!(op, CmpOp::Eq | CmpOp::Like),
        Expr::And(l, r) | Expr::Or(l, r) => filter_present_in(l, column) || filter_present_in(r, column),
    }
}

fn eval_expr(expr: &Expr, row: &[Value], index: &HashMap<&str, usize>) -> Result<bool> {
    match expr {
        Expr::Comparison { column, op, value } => {
            let idx = *index.get(column.as_str()).ok_or_else(|| Error::UnknownColumn(column.clone()))?;
            Ok(eval_comparison(&row[idx], *op, value))
        }
        Expr::And(l, r) => Ok(eval_expr(l, row, index)? && eval_expr(r, row, index)?),
        Expr::Or(l, r) => Ok(eval_expr(l, row, index)? || eval_expr(r, row, index)?),
    }
}

fn eval_comparison(cell: &Value, op: CmpOp, literal: &Literal) -> bool {
    if op == CmpOp::Like {
        let Literal::String(pattern) = literal else {
            return false;
        };
        let text = value_to_string(cell);
        return like_to_regex(pattern).map(|re| re.is_match(&text)).unwrap_or(false);
    }

    if let (Some(a), Some(b)) = (value_as_number(cell), literal_as_number(literal)) {
        return match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Gt => a > b,
            CmpOp::Le => a <= b,
            CmpOp::Ge => a >= b,
            CmpOp::Like => unreachable!(),
        };
    }

    let a = value_to_string(cell);
    let b = literal_to_string(literal);
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Gt => a > b,
        CmpOp::Le => a <= b,
        CmpOp::Ge => a >= b,
        CmpOp::Like => unreachable!(),
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    if let (Some(x), Some(y)) = (value_as_number(a), value_as_number(b)) {
        return x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
    }
    value_to_string(a).cmp(&value_to_string(b))
}

fn value_as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn literal_as_number(l: &Literal) -> Option<f64> {
    match l {
        Literal::Number(n) => Some(*n),
        Literal::String(s) => s.parse::<f64>().ok(),
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn literal_to_string(l: &Literal) -> String {
    match l {
        Literal::String(s) => s.clone(),
        Literal::Number(n) => n.to_string(),
    }
}

/// Translate a `LIKE` pattern to a regex: `%` becomes `.*`, every other
/// metacharacter is escaped, the whole thing anchored start-to-end.
fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::from("^");
    for c in pattern.chars() {
        if c == '%' {
            out.push_str(".*");
        } else if "\\.+*?()[]^$|{}".contains(c) {
            out.push('\\');
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| Error::QueryParseError(format!("invalid LIKE pattern: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_translates_percent_to_wildcard() {
        let re = like_to_regex("foo%.js").unwrap();
        assert!(re.is_match("foobar.js"));
        assert!(!re.is_match("foobar.ts"));
    }

    #[test]
    fn numeric_comparison_coerces_when_both_sides_parse() {
        assert!(eval_comparison(&Value::String("10".into()), CmpOp::Gt, &Literal::Number(5.0)));
    }

    #[test]
    fn string_comparison_used_when_either_side_non_numeric() {
        assert!(eval_comparison(&Value::String("abc".into()), CmpOp::Eq, &Literal::String("abc".into())));
    }

    #[test]
    fn filter_value_finds_subordinate_eq() {
        let expr = Expr::And(
            Box::new(Expr::Comparison {
                column: "object_id".into(),
                op: CmpOp::Eq,
                value: Literal::String("123".into()),
            }),
            Box::new(Expr::Comparison {
                column: "depth".into(),
                op: CmpOp::Lt,
                value: Literal::Number(2.0),
            }),
        );
        assert_eq!(
            super::super::parser::filter_value(Some(&expr), "object_id"),
            Some(&Literal::String("123".into()))
        );
    }
}
