//! Search and ordering helpers shared by the list queries

use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{ColumnTrait, Condition, Order};

/// Sort direction parsed from an `ordering` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        }
    }
}

/// Split a search string on whitespace and commas, lower-cased.
pub fn search_terms(search: Option<&str>) -> Vec<String> {
    search
        .unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Every term must appear in at least one of the columns, ignoring case.
/// Returns `None` when there is nothing to search for.
pub fn search_condition<C>(search: Option<&str>, columns: &[C]) -> Option<Condition>
where
    C: ColumnTrait,
{
    let terms = search_terms(search);
    if terms.is_empty() {
        return None;
    }

    let mut all = Condition::all();
    for term in terms {
        let pattern = format!("%{}%", escape_like(&term));
        let mut any = Condition::any();
        for column in columns {
            any = any.add(
                Expr::expr(Func::lower(Expr::col((column.entity_name(), *column))))
                    .like(LikeExpr::new(pattern.clone()).escape('\\')),
            );
        }
        all = all.add(any);
    }
    Some(all)
}

fn parse_fields(value: &str, allowed: &[&'static str]) -> Vec<(&'static str, Direction)> {
    value
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .filter_map(|field| {
            let (name, direction) = match field.strip_prefix('-') {
                Some(name) => (name, Direction::Desc),
                None => (field, Direction::Asc),
            };
            allowed
                .iter()
                .find(|candidate| **candidate == name)
                .map(|candidate| (*candidate, direction))
        })
        .collect()
}

/// Parse a comma-separated `ordering` value such as `-price,title`.
/// Unknown fields are dropped; if nothing usable remains the default
/// ordering applies.
pub fn parse_ordering(
    ordering: Option<&str>,
    allowed: &[&'static str],
    default: &str,
) -> Vec<(&'static str, Direction)> {
    let requested = parse_fields(ordering.unwrap_or_default(), allowed);
    if requested.is_empty() {
        parse_fields(default, allowed)
    } else {
        requested
    }
}
