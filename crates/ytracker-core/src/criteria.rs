//! [`Criteria`] — composes `WHERE` / `ORDER BY` fragments for catalog queries.
//!
//! Fragments are `&'static str`: only SQL text that exists at compile time can
//! be composed. Values are always passed as bound parameters (`?1`, `?2`, …)
//! by the caller, never spliced into the rendered text.

use std::fmt;

/// Logical operator joining a filter fragment to the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connective {
  #[default]
  And,
  Or,
}

impl Connective {
  /// `Or` for "OR" in any case, `And` for everything else.
  pub fn from_keyword(keyword: &str) -> Self {
    if keyword.trim().eq_ignore_ascii_case("or") {
      Self::Or
    } else {
      Self::And
    }
  }

  pub fn as_sql(self) -> &'static str {
    match self {
      Self::And => "AND",
      Self::Or => "OR",
    }
  }
}

/// Sort direction of an ordering fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

impl Direction {
  /// `Desc` for "DESC" in any case, `Asc` for everything else.
  pub fn from_keyword(keyword: &str) -> Self {
    if keyword.trim().eq_ignore_ascii_case("desc") {
      Self::Desc
    } else {
      Self::Asc
    }
  }
}

/// Accumulated filter and ordering clauses.
///
/// Renders through [`fmt::Display`]; an empty value renders as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
  filters:  Vec<(&'static str, Connective)>,
  ordering: Vec<(&'static str, Direction)>,
}

impl Criteria {
  pub fn new() -> Self { Self::default() }

  /// Append a filter fragment, joined to the next fragment with `AND`.
  pub fn where_(self, expression: &'static str) -> Self {
    self.where_with(expression, Connective::And)
  }

  /// Append a filter fragment, joined to the next fragment with `connective`.
  pub fn where_with(
    mut self,
    expression: &'static str,
    connective: Connective,
  ) -> Self {
    self.filters.push((expression.trim(), connective));
    self
  }

  /// Append an ascending ordering column.
  pub fn order_by(self, column: &'static str) -> Self {
    self.order_by_with(column, Direction::Asc)
  }

  pub fn order_by_with(
    mut self,
    column: &'static str,
    direction: Direction,
  ) -> Self {
    self.ordering.push((column.trim(), direction));
    self
  }

  pub fn is_empty(&self) -> bool {
    self.filters.is_empty() && self.ordering.is_empty()
  }
}

impl fmt::Display for Criteria {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !self.filters.is_empty() {
      f.write_str("WHERE")?;
      let last = self.filters.len() - 1;
      for (i, (expression, connective)) in self.filters.iter().enumerate() {
        write!(f, " {expression}")?;
        // The connective of the last fragment has nothing to join.
        if i != last {
          write!(f, " {}", connective.as_sql())?;
        }
      }
    }

    if !self.ordering.is_empty() {
      if !self.filters.is_empty() {
        f.write_str(" ")?;
      }
      f.write_str("ORDER BY ")?;
      for (i, (column, direction)) in self.ordering.iter().enumerate() {
        if i > 0 {
          f.write_str(", ")?;
        }
        f.write_str(column)?;
        if *direction == Direction::Desc {
          f.write_str(" DESC")?;
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_criteria_renders_nothing() {
    let criteria = Criteria::new();
    assert!(criteria.is_empty());
    assert_eq!(criteria.to_string(), "");
  }

  #[test]
  fn filters_default_to_and() {
    let criteria = Criteria::new().where_("a=1").where_("b=2");
    assert_eq!(criteria.to_string(), "WHERE a=1 AND b=2");
  }

  #[test]
  fn connective_joins_to_next_fragment() {
    let criteria = Criteria::new()
      .where_with("a=1", Connective::Or)
      .where_("b=2");
    assert_eq!(criteria.to_string(), "WHERE a=1 OR b=2");
  }

  #[test]
  fn trailing_connective_is_dropped() {
    let criteria = Criteria::new().where_with("a=1", Connective::Or);
    assert_eq!(criteria.to_string(), "WHERE a=1");
  }

  #[test]
  fn ordering_is_comma_separated_in_call_order() {
    let criteria = Criteria::new()
      .order_by("c")
      .order_by_with("d", Direction::Desc);
    assert_eq!(criteria.to_string(), "ORDER BY c, d DESC");
  }

  #[test]
  fn filter_then_order_with_single_space() {
    let criteria = Criteria::new()
      .where_("status = ?1")
      .order_by("created_at")
      .order_by("id");
    assert_eq!(
      criteria.to_string(),
      "WHERE status = ?1 ORDER BY created_at, id"
    );
  }

  #[test]
  fn keywords_are_case_insensitive() {
    assert_eq!(Direction::from_keyword("desc"), Direction::Desc);
    assert_eq!(Direction::from_keyword("DeSc"), Direction::Desc);
    assert_eq!(Direction::from_keyword(""), Direction::Asc);
    assert_eq!(Direction::from_keyword("sideways"), Direction::Asc);
    assert_eq!(Connective::from_keyword("or"), Connective::Or);
    assert_eq!(Connective::from_keyword("AND"), Connective::And);
    assert_eq!(Connective::from_keyword("xor"), Connective::And);
  }
}
