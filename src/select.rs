//! Parent query decoration with correlated aggregate columns
//!
//! [`AggregateSelect`] wraps a SELECT over a parent table and attaches one
//! scalar subquery column per aggregate request. Relations are registered
//! up front by composition; each attachment parses its request, resolves
//! the relation, compiles the subquery and splices it into the parent
//! projection under a derived or explicit alias.

use crate::compile::{AggregateQuery, AggregateSpec, compile};
use crate::dialect::Dialect;
use crate::error::AggregateError;
use crate::relation::Relation;
use crate::request::AggregateRequest;
use indexmap::IndexMap;
use sea_query::{Alias, Asterisk, Condition, Expr, Order, Query, SelectStatement, SimpleExpr};

/// One entry of a heterogeneous [`AggregateSelect::with_aggregate_entries`]
/// batch: a relation path plus what to compute over it.
pub struct AggregateEntry {
	path: String,
	spec: AggregateSpec,
}

impl AggregateEntry {
	/// Aggregate the path with a named SQL function.
	pub fn function(path: impl Into<String>, function: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			spec: AggregateSpec::function(function),
		}
	}

	/// Aggregate the path with a named SQL function, refined by a callback
	/// that may add predicates or replace the projection.
	pub fn function_refined(
		path: impl Into<String>,
		function: impl Into<String>,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Self {
		Self {
			path: path.into(),
			spec: AggregateSpec::function_refined(function, Box::new(callback)),
		}
	}

	/// Use a raw SQL fragment verbatim as the subquery projection.
	pub fn raw(path: impl Into<String>, sql: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			spec: AggregateSpec::Raw(sql.into()),
		}
	}

	/// Shape the whole subquery through a callback; the callback is
	/// expected to set the projection itself.
	pub fn refined(
		path: impl Into<String>,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Self {
		Self {
			path: path.into(),
			spec: AggregateSpec::Refine(Box::new(callback)),
		}
	}
}

/// Conversion into a list of relation-path strings, so the convenience
/// methods accept a single path, an array, a slice or a vector alike.
pub trait IntoAggregatePaths {
	fn into_paths(self) -> Vec<String>;
}

impl IntoAggregatePaths for &str {
	fn into_paths(self) -> Vec<String> {
		vec![self.to_string()]
	}
}

impl IntoAggregatePaths for String {
	fn into_paths(self) -> Vec<String> {
		vec![self]
	}
}

impl IntoAggregatePaths for &String {
	fn into_paths(self) -> Vec<String> {
		vec![self.clone()]
	}
}

impl<const N: usize> IntoAggregatePaths for [&str; N] {
	fn into_paths(self) -> Vec<String> {
		self.iter().map(|path| path.to_string()).collect()
	}
}

impl IntoAggregatePaths for &[&str] {
	fn into_paths(self) -> Vec<String> {
		self.iter().map(|path| path.to_string()).collect()
	}
}

impl IntoAggregatePaths for Vec<&str> {
	fn into_paths(self) -> Vec<String> {
		self.into_iter().map(|path| path.to_string()).collect()
	}
}

impl IntoAggregatePaths for Vec<String> {
	fn into_paths(self) -> Vec<String> {
		self
	}
}

/// SELECT over a parent table that can carry correlated aggregate columns.
///
/// Each `with_*` call appends one subquery column per requested path and
/// returns the same builder, so requests accumulate across calls. Aliases
/// are not deduplicated: asking twice for the same aggregate yields two
/// columns under the same name.
///
/// # Examples
///
/// ```
/// use basie::{AggregateSelect, Dialect, Relation};
///
/// let query = AggregateSelect::new("orders", Dialect::Sqlite)
/// 	.relation("products", Relation::has_many("product_orders", "order_id"))
/// 	.with_sum("products.price")?;
///
/// assert_eq!(
/// 	query.to_sql(),
/// 	r#"SELECT "orders".*, (SELECT sum("product_orders"."price") FROM "product_orders" WHERE "orders"."id" = "product_orders"."order_id") AS "products_price_sum" FROM "orders""#
/// );
/// # Ok::<(), basie::AggregateError>(())
/// ```
#[derive(Debug)]
pub struct AggregateSelect {
	table: String,
	dialect: Dialect,
	relations: IndexMap<String, Relation>,
	stmt: SelectStatement,
	has_columns: bool,
}

impl AggregateSelect {
	/// Start a SELECT over `table` rendered for `dialect`.
	pub fn new(table: impl Into<String>, dialect: Dialect) -> Self {
		let table = table.into();
		let mut stmt = Query::select();
		stmt.from(Alias::new(table.as_str()));
		Self {
			table,
			dialect,
			relations: IndexMap::new(),
			stmt,
			has_columns: false,
		}
	}

	/// Declare a to-many relation under the name used in request paths.
	pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
		self.relations.insert(name.into(), relation);
		self
	}

	/// The parent table this builder selects from.
	pub fn table(&self) -> &str {
		&self.table
	}

	/// The dialect all SQL is rendered for.
	pub fn dialect(&self) -> Dialect {
		self.dialect
	}

	// ==================== parent projection and filters ====================

	/// Select explicit parent columns instead of the default `table.*`.
	pub fn columns<I, S>(mut self, columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		for column in columns {
			self.stmt.column(Alias::new(column.into()));
		}
		self.has_columns = true;
		self
	}

	/// AND a predicate onto the parent query.
	pub fn and_where(mut self, predicate: SimpleExpr) -> Self {
		self.stmt.and_where(predicate);
		self
	}

	/// AND a whole condition tree onto the parent query.
	pub fn cond_where(mut self, condition: Condition) -> Self {
		self.stmt.cond_where(condition);
		self
	}

	/// Order parent rows.
	pub fn order_by(mut self, column: &str, order: Order) -> Self {
		self.stmt.order_by(Alias::new(column), order);
		self
	}

	/// Cap the number of parent rows.
	pub fn limit(mut self, limit: u64) -> Self {
		self.stmt.limit(limit);
		self
	}

	// ==================== aggregate columns ====================

	/// Attach a `count` aggregate per path; a path without a column counts
	/// rows, one with a column counts non-NULL values of that column.
	pub fn with_count(self, paths: impl IntoAggregatePaths) -> Result<Self, AggregateError> {
		self.with_aggregate(paths, "count")
	}

	/// Attach a `sum` aggregate per path.
	pub fn with_sum(self, paths: impl IntoAggregatePaths) -> Result<Self, AggregateError> {
		self.with_aggregate(paths, "sum")
	}

	/// Attach an `avg` aggregate per path.
	pub fn with_avg(self, paths: impl IntoAggregatePaths) -> Result<Self, AggregateError> {
		self.with_aggregate(paths, "avg")
	}

	/// Attach a `min` aggregate per path.
	pub fn with_min(self, paths: impl IntoAggregatePaths) -> Result<Self, AggregateError> {
		self.with_aggregate(paths, "min")
	}

	/// Attach a `max` aggregate per path.
	pub fn with_max(self, paths: impl IntoAggregatePaths) -> Result<Self, AggregateError> {
		self.with_aggregate(paths, "max")
	}

	/// Attach a JSON array aggregate per path, using the function the
	/// active dialect declares for it.
	///
	/// The derived alias ends in `array` on every dialect, so result
	/// columns stay portable even though the SQL function differs. Fails
	/// with [`AggregateError::UnsupportedAggregateFunction`] on dialects
	/// without a JSON array aggregate.
	pub fn with_array(self, paths: impl IntoAggregatePaths) -> Result<Self, AggregateError> {
		let function = self.array_function()?;
		let mut this = self;
		for path in paths.into_paths() {
			this = this.attach(&path, AggregateSpec::labeled(function, "array"))?;
		}
		Ok(this)
	}

	/// Attach an aggregate per path using an arbitrary SQL function name,
	/// e.g. `group_concat` or `json_agg`.
	///
	/// The function name is spliced into the SQL as given; it must not
	/// come from untrusted input.
	pub fn with_aggregate(
		self,
		paths: impl IntoAggregatePaths,
		function: &str,
	) -> Result<Self, AggregateError> {
		let mut this = self;
		for path in paths.into_paths() {
			this = this.attach(&path, AggregateSpec::function(function))?;
		}
		Ok(this)
	}

	/// [`with_count`](Self::with_count) with a refinement callback.
	pub fn with_count_refined(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.with_aggregate_refined(path, "count", callback)
	}

	/// [`with_sum`](Self::with_sum) with a refinement callback.
	pub fn with_sum_refined(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.with_aggregate_refined(path, "sum", callback)
	}

	/// [`with_avg`](Self::with_avg) with a refinement callback.
	pub fn with_avg_refined(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.with_aggregate_refined(path, "avg", callback)
	}

	/// [`with_min`](Self::with_min) with a refinement callback.
	pub fn with_min_refined(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.with_aggregate_refined(path, "min", callback)
	}

	/// [`with_max`](Self::with_max) with a refinement callback.
	///
	/// The callback narrows the aggregated row set before the function
	/// applies; if it never sets a projection of its own, the named
	/// function stays in place.
	///
	/// # Examples
	///
	/// ```
	/// use basie::sea_query::ExprTrait;
	/// use basie::{AggregateSelect, Dialect, Relation};
	///
	/// let query = AggregateSelect::new("orders", Dialect::Sqlite)
	/// 	.relation("products", Relation::has_many("product_orders", "order_id"))
	/// 	.with_max_refined("products.price as higher_price", |products| {
	/// 		let quantity = products.col("quantity");
	/// 		products.and_where(quantity.gt(1));
	/// 	})?;
	///
	/// let sql = query.to_sql();
	/// assert!(sql.contains(r#"max("product_orders"."price")"#));
	/// assert!(sql.contains(r#""product_orders"."quantity" > 1"#));
	/// assert!(sql.contains(r#"AS "higher_price""#));
	/// # Ok::<(), basie::AggregateError>(())
	/// ```
	pub fn with_max_refined(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.with_aggregate_refined(path, "max", callback)
	}

	/// [`with_array`](Self::with_array) with a refinement callback, e.g.
	/// to order or filter the collected rows.
	pub fn with_array_refined(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		let function = self.array_function()?;
		self.attach(
			path,
			AggregateSpec::labeled_refined(function, "array", Box::new(callback)),
		)
	}

	/// Attach one aggregate with an arbitrary function name and a
	/// refinement callback.
	pub fn with_aggregate_refined(
		self,
		path: &str,
		function: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.attach(
			path,
			AggregateSpec::function_refined(function, Box::new(callback)),
		)
	}

	/// Attach one aggregate whose projection is the given SQL fragment,
	/// verbatim. The column part of the path is ignored; pair this with an
	/// explicit `as` alias.
	pub fn with_aggregate_raw(
		self,
		path: &str,
		sql: impl Into<String>,
	) -> Result<Self, AggregateError> {
		self.attach(path, AggregateSpec::Raw(sql.into()))
	}

	/// Attach one aggregate shaped entirely by a callback.
	///
	/// The callback receives the correlated subquery and is expected to
	/// set its projection; if it only adds predicates, the subquery counts
	/// the remaining rows.
	pub fn with_aggregate_query(
		self,
		path: &str,
		callback: impl FnOnce(&mut AggregateQuery) + Send + 'static,
	) -> Result<Self, AggregateError> {
		self.attach(path, AggregateSpec::Refine(Box::new(callback)))
	}

	/// Attach a heterogeneous batch of aggregates in entry order.
	///
	/// A failing entry aborts the whole call; an empty batch is a no-op.
	///
	/// # Examples
	///
	/// ```
	/// use basie::{AggregateEntry, AggregateSelect, Dialect, Relation};
	///
	/// let query = AggregateSelect::new("orders", Dialect::Sqlite)
	/// 	.relation("products", Relation::has_many("product_orders", "order_id"))
	/// 	.with_aggregate_entries([
	/// 		AggregateEntry::function("products", "count"),
	/// 		AggregateEntry::raw("products.price as total_value", "SUM(price * quantity)"),
	/// 	])?;
	///
	/// let sql = query.to_sql();
	/// assert!(sql.contains(r#"AS "products_count""#));
	/// assert!(sql.contains(r#"AS "total_value""#));
	/// # Ok::<(), basie::AggregateError>(())
	/// ```
	pub fn with_aggregate_entries(
		self,
		entries: impl IntoIterator<Item = AggregateEntry>,
	) -> Result<Self, AggregateError> {
		let mut this = self;
		for entry in entries {
			this = this.attach(&entry.path, entry.spec)?;
		}
		Ok(this)
	}

	// ==================== finalization ====================

	/// Render the decorated query as SQL for the builder's dialect.
	pub fn to_sql(&self) -> String {
		if self.has_columns {
			self.dialect.render(&self.stmt)
		} else {
			let mut stmt = self.stmt.clone();
			stmt.column((Alias::new(self.table.as_str()), Asterisk));
			self.dialect.render(&stmt)
		}
	}

	/// Take the underlying statement, e.g. to combine it with other query
	/// builder machinery.
	pub fn into_select(mut self) -> SelectStatement {
		self.ensure_parent_projection();
		self.stmt
	}

	fn ensure_parent_projection(&mut self) {
		if !self.has_columns {
			self.stmt
				.column((Alias::new(self.table.as_str()), Asterisk));
			self.has_columns = true;
		}
	}

	fn array_function(&self) -> Result<&'static str, AggregateError> {
		self.dialect.array_aggregate_function().ok_or(
			AggregateError::UnsupportedAggregateFunction {
				dialect: self.dialect,
			},
		)
	}

	fn attach(mut self, path: &str, spec: AggregateSpec) -> Result<Self, AggregateError> {
		let request = AggregateRequest::parse(path)?;
		let relation = self
			.relations
			.get(request.relation())
			.cloned()
			.ok_or_else(|| AggregateError::UnknownRelation(request.relation().to_string()))?;

		self.ensure_parent_projection();
		let compiled = compile(&self.table, &request, &relation, spec);
		tracing::debug!(
			relation = request.relation(),
			alias = compiled.alias.as_str(),
			"attaching correlated aggregate column"
		);

		let subquery = self.dialect.render(&compiled.subquery);
		self.stmt.expr_as(
			Expr::cust(format!("({subquery})")),
			Alias::new(compiled.alias.as_str()),
		);
		Ok(self)
	}
}
