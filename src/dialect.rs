//! SQL dialect selection and capabilities
//!
//! Dialect-dependent behavior is an explicit method on [`Dialect`], chosen
//! once per builder by composition. There is no global registration and no
//! runtime type inspection.

use sea_query::{MysqlQueryBuilder, PostgresQueryBuilder, SelectStatement, SqliteQueryBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
	Postgres,
	Mysql,
	Sqlite,
}

impl Dialect {
	/// SQL function name used for JSON array aggregation, if the dialect
	/// declares one.
	///
	/// PostgreSQL declares none here; callers that want `json_agg` can ask
	/// for it explicitly through an arbitrary-function aggregate.
	///
	/// # Examples
	///
	/// ```
	/// use basie::Dialect;
	///
	/// assert_eq!(Dialect::Mysql.array_aggregate_function(), Some("json_arrayagg"));
	/// assert_eq!(Dialect::Sqlite.array_aggregate_function(), Some("json_group_array"));
	/// assert_eq!(Dialect::Postgres.array_aggregate_function(), None);
	/// ```
	pub fn array_aggregate_function(&self) -> Option<&'static str> {
		match self {
			Dialect::Mysql => Some("json_arrayagg"),
			Dialect::Sqlite => Some("json_group_array"),
			Dialect::Postgres => None,
		}
	}

	/// Render a SELECT statement for this dialect.
	pub fn render(&self, stmt: &SelectStatement) -> String {
		match self {
			Dialect::Postgres => stmt.to_string(PostgresQueryBuilder),
			Dialect::Mysql => stmt.to_string(MysqlQueryBuilder),
			Dialect::Sqlite => stmt.to_string(SqliteQueryBuilder),
		}
	}
}

impl fmt::Display for Dialect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Dialect::Postgres => "PostgreSQL",
			Dialect::Mysql => "MySQL",
			Dialect::Sqlite => "SQLite",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use sea_query::{Alias, Asterisk, Query};

	#[rstest]
	#[case(Dialect::Mysql, Some("json_arrayagg"))]
	#[case(Dialect::Sqlite, Some("json_group_array"))]
	#[case(Dialect::Postgres, None)]
	fn test_array_aggregate_function(
		#[case] dialect: Dialect,
		#[case] expected: Option<&'static str>,
	) {
		assert_eq!(dialect.array_aggregate_function(), expected);
	}

	#[rstest]
	fn test_render_uses_dialect_quoting() {
		// Arrange
		let mut stmt = Query::select();
		stmt.from(Alias::new("orders")).column(Asterisk);

		// Assert
		assert_eq!(
			Dialect::Sqlite.render(&stmt),
			r#"SELECT * FROM "orders""#
		);
		assert_eq!(
			Dialect::Postgres.render(&stmt),
			r#"SELECT * FROM "orders""#
		);
		assert_eq!(Dialect::Mysql.render(&stmt), "SELECT * FROM `orders`");
	}

	#[rstest]
	fn test_display_names() {
		assert_eq!(Dialect::Postgres.to_string(), "PostgreSQL");
		assert_eq!(Dialect::Mysql.to_string(), "MySQL");
		assert_eq!(Dialect::Sqlite.to_string(), "SQLite");
	}
}
