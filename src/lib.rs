//! Aggregate columns over to-many relations for sea-query SELECTs
//!
//! `basie` decorates a parent SELECT with correlated scalar subqueries, one
//! per requested aggregate, so a single round trip fetches parent rows
//! together with values computed over their related rows: counts, sums,
//! averages, minima, maxima, JSON arrays or any other SQL aggregate
//! function the database knows.
//!
//! Requests use a compact textual form, `"relation.column as alias"`. The
//! column defaults to `*` (row counting) and the alias to a snake_case
//! `relation_column_function` name when omitted, so `"products.price"`
//! summed becomes the column `products_price_sum`.
//!
//! # Quick start
//!
//! ```
//! use basie::{AggregateSelect, Dialect, Relation};
//!
//! let sql = AggregateSelect::new("orders", Dialect::Sqlite)
//! 	.relation("products", Relation::has_many("product_orders", "order_id"))
//! 	.with_count("products")?
//! 	.with_sum("products.price")?
//! 	.to_sql();
//!
//! assert!(sql.contains(r#"AS "products_count""#));
//! assert!(sql.contains(r#"AS "products_price_sum""#));
//! # Ok::<(), basie::AggregateError>(())
//! ```
//!
//! Aggregates can be refined through callbacks, replaced with raw SQL
//! fragments, or attached as heterogeneous batches; see
//! [`AggregateSelect`] for the full surface.

pub mod alias;
pub mod compile;
pub mod dialect;
pub mod error;
pub mod relation;
pub mod request;
pub mod select;

pub use sea_query;

pub use alias::derive_alias;
pub use compile::AggregateQuery;
pub use dialect::Dialect;
pub use error::AggregateError;
pub use relation::Relation;
pub use request::AggregateRequest;
pub use select::{AggregateEntry, AggregateSelect, IntoAggregatePaths};

/// Common imports for building aggregate-decorated queries.
pub mod prelude {
	pub use crate::{
		AggregateEntry, AggregateError, AggregateQuery, AggregateSelect, Dialect, Relation,
	};
	pub use sea_query::{Condition, Expr, ExprTrait, Order};
}
