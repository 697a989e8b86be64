//! Correlated aggregate subquery compilation
//!
//! [`compile`] turns one parsed request plus its resolved relation into a
//! scalar subquery and a column alias. The subquery selects exactly one
//! expression over the related table, correlated to the parent row through
//! the relation's key pair, with refinement callbacks applied before the
//! relation's default scope is merged in.

use crate::alias::derive_alias;
use crate::relation::Relation;
use crate::request::AggregateRequest;
use sea_query::{Alias, Condition, Expr, ExprTrait, Order, Query, SelectStatement, SimpleExpr};

/// Refinement callback applied to an aggregate subquery before it is
/// finalized.
pub(crate) type RefineFn = Box<dyn FnOnce(&mut AggregateQuery) + Send>;

/// What a single aggregate request computes.
///
/// `label` is the word folded into the derived alias; it usually equals the
/// function name but diverges for dialect-dependent functions, where the
/// alias stays portable (`array`) while the SQL carries the dialect's own
/// function name.
pub(crate) enum AggregateSpec {
	/// `FUNC(column)` over the related table, e.g. `sum`, `avg`,
	/// `group_concat`.
	Function { function: String, label: String },
	/// A named function plus a refinement callback that may narrow the
	/// aggregated row set or replace the projection outright.
	FunctionWith {
		function: String,
		label: String,
		callback: RefineFn,
	},
	/// A raw SQL fragment used verbatim as the projection; the column part
	/// of the request is ignored.
	Raw(String),
	/// A callback-only aggregate. The callback is expected to set the
	/// projection itself; if it never does, the subquery falls back to
	/// `count(*)` so it still yields a value per parent row.
	Refine(RefineFn),
}

impl AggregateSpec {
	pub(crate) fn function(name: impl Into<String>) -> Self {
		let function = name.into();
		let label = function.clone();
		AggregateSpec::Function { function, label }
	}

	pub(crate) fn labeled(function: impl Into<String>, label: impl Into<String>) -> Self {
		AggregateSpec::Function {
			function: function.into(),
			label: label.into(),
		}
	}

	pub(crate) fn function_refined(name: impl Into<String>, callback: RefineFn) -> Self {
		let function = name.into();
		let label = function.clone();
		AggregateSpec::FunctionWith {
			function,
			label,
			callback,
		}
	}

	pub(crate) fn labeled_refined(
		function: impl Into<String>,
		label: impl Into<String>,
		callback: RefineFn,
	) -> Self {
		AggregateSpec::FunctionWith {
			function: function.into(),
			label: label.into(),
			callback,
		}
	}

	/// Label folded into the derived alias when no explicit alias is given.
	fn label(&self) -> &str {
		match self {
			AggregateSpec::Function { label, .. } | AggregateSpec::FunctionWith { label, .. } => {
				label
			}
			AggregateSpec::Raw(_) => "",
			AggregateSpec::Refine(_) => "aggregate",
		}
	}
}

/// One compiled aggregate: the scalar subquery and the parent-side column
/// alias it is attached under.
#[derive(Debug)]
pub(crate) struct CompiledAggregate {
	pub(crate) alias: String,
	pub(crate) subquery: SelectStatement,
}

/// Mutable view over an aggregate subquery, handed to refinement callbacks.
///
/// Predicates, ordering and limits go straight onto the underlying
/// statement. Projections are tracked separately: the subquery must stay
/// scalar, so only the first projection set here survives compilation and
/// none of them ever contribute parameter bindings.
pub struct AggregateQuery {
	stmt: SelectStatement,
	related_table: String,
	projections: Vec<SimpleExpr>,
}

impl AggregateQuery {
	pub(crate) fn new(related_table: &str) -> Self {
		let mut stmt = Query::select();
		stmt.from(Alias::new(related_table));
		Self {
			stmt,
			related_table: related_table.to_string(),
			projections: Vec::new(),
		}
	}

	/// Name of the related table this subquery selects from.
	pub fn table(&self) -> &str {
		&self.related_table
	}

	/// A column of the related table, qualified with its table name.
	pub fn col(&self, column: &str) -> Expr {
		Expr::col((
			Alias::new(self.related_table.as_str()),
			Alias::new(column),
		))
	}

	/// AND a predicate onto the subquery.
	pub fn and_where(&mut self, predicate: SimpleExpr) -> &mut Self {
		self.stmt.and_where(predicate);
		self
	}

	/// AND a whole condition tree onto the subquery.
	pub fn cond_where(&mut self, condition: Condition) -> &mut Self {
		self.stmt.cond_where(condition);
		self
	}

	/// Replace the default projection with an arbitrary expression.
	///
	/// Only the first projection is kept; setting more than one logs a
	/// warning and discards the rest.
	pub fn select_expr(&mut self, expr: impl Into<SimpleExpr>) -> &mut Self {
		self.projections.push(expr.into());
		self
	}

	/// Replace the default projection with a qualified column of the
	/// related table.
	pub fn select_column(&mut self, column: &str) -> &mut Self {
		let expr = self.col(column);
		self.projections.push(expr.into());
		self
	}

	/// Order the aggregated rows, useful with ordered aggregates such as
	/// `group_concat`.
	pub fn order_by(&mut self, column: &str, order: Order) -> &mut Self {
		let column = (
			Alias::new(self.related_table.as_str()),
			Alias::new(column),
		);
		self.stmt.order_by(column, order);
		self
	}

	/// Cap the number of rows feeding the aggregate.
	pub fn limit(&mut self, limit: u64) -> &mut Self {
		self.stmt.limit(limit);
		self
	}
}

/// `FUNC("table"."column")`, or `FUNC(*)` when the request carries no
/// column. The function name is spliced as SQL text, never bound as a
/// parameter; the column reference is a structured expression.
fn function_projection(function: &str, related_table: &str, column: &str) -> SimpleExpr {
	if column == "*" {
		Expr::cust(format!("{function}(*)")).into()
	} else {
		let qualified = Expr::col((Alias::new(related_table), Alias::new(column)));
		Expr::cust_with_exprs(format!("{function}(?)"), [qualified]).into()
	}
}

/// Compile one aggregate request against its resolved relation.
///
/// The pipeline, in order: correlate the fresh subquery to the parent row,
/// run the refinement callback if any, fall back to the default projection
/// when the callback set none, AND in the relation's default scope, then
/// keep the first projection and discard the rest with a warning.
pub(crate) fn compile(
	parent_table: &str,
	request: &AggregateRequest,
	relation: &Relation,
	spec: AggregateSpec,
) -> CompiledAggregate {
	let alias = match request.alias() {
		Some(explicit) => explicit.to_string(),
		None => derive_alias(request.relation(), request.column(), spec.label()),
	};

	let mut query = AggregateQuery::new(&relation.related_table);
	query.stmt.and_where(
		Expr::col((
			Alias::new(parent_table),
			Alias::new(relation.parent_key.as_str()),
		))
		.equals((
			Alias::new(relation.related_table.as_str()),
			Alias::new(relation.foreign_key.as_str()),
		)),
	);

	let (default_projection, callback) = match spec {
		AggregateSpec::Function { function, .. } => (
			Some(function_projection(
				&function,
				&relation.related_table,
				request.column(),
			)),
			None,
		),
		AggregateSpec::FunctionWith {
			function, callback, ..
		} => (
			Some(function_projection(
				&function,
				&relation.related_table,
				request.column(),
			)),
			Some(callback),
		),
		AggregateSpec::Raw(sql) => (Some(Expr::cust(sql).into()), None),
		AggregateSpec::Refine(callback) => (None, Some(callback)),
	};

	if let Some(callback) = callback {
		callback(&mut query);
	}

	if query.projections.is_empty() {
		let projection =
			default_projection.unwrap_or_else(|| Expr::cust("count(*)").into());
		query.projections.push(projection);
	}

	if let Some(scope) = relation.scope.clone() {
		query.stmt.cond_where(scope);
	}

	if query.projections.len() > 1 {
		let discarded = query.projections.len() - 1;
		tracing::warn!(
			alias = alias.as_str(),
			discarded,
			"aggregate subquery is scalar; keeping the first projection only"
		);
		query.projections.truncate(1);
	}

	let AggregateQuery {
		mut stmt,
		projections,
		..
	} = query;
	if let Some(projection) = projections.into_iter().next() {
		stmt.expr(projection);
	}

	CompiledAggregate {
		alias,
		subquery: stmt,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dialect::Dialect;
	use rstest::rstest;

	fn sqlite(compiled: &CompiledAggregate) -> String {
		Dialect::Sqlite.render(&compiled.subquery)
	}

	fn products() -> Relation {
		Relation::has_many("product_orders", "order_id")
	}

	#[rstest]
	fn test_named_function_qualifies_the_column() {
		// Arrange
		let request = AggregateRequest::parse("products.price").unwrap();

		// Act
		let compiled = compile(
			"orders",
			&request,
			&products(),
			AggregateSpec::function("sum"),
		);

		// Assert
		let sql = sqlite(&compiled);
		assert_eq!(compiled.alias, "products_price_sum");
		assert!(
			sql.contains(r#"sum("product_orders"."price")"#),
			"sql: {sql}"
		);
		assert!(sql.contains(r#"FROM "product_orders""#), "sql: {sql}");
		assert!(
			sql.contains(r#"WHERE "orders"."id" = "product_orders"."order_id""#),
			"sql: {sql}"
		);
	}

	#[rstest]
	fn test_count_without_column_uses_bare_star() {
		// Arrange
		let request = AggregateRequest::parse("products").unwrap();

		// Act
		let compiled = compile(
			"orders",
			&request,
			&products(),
			AggregateSpec::function("count"),
		);

		// Assert
		let sql = sqlite(&compiled);
		assert_eq!(compiled.alias, "products_count");
		assert!(sql.starts_with("SELECT count(*) FROM"), "sql: {sql}");
	}

	#[rstest]
	fn test_raw_projection_is_used_verbatim() {
		// Arrange
		let request = AggregateRequest::parse("products.price as total").unwrap();

		// Act
		let compiled = compile(
			"orders",
			&request,
			&products(),
			AggregateSpec::Raw("SUM(price * quantity)".to_string()),
		);

		// Assert
		let sql = sqlite(&compiled);
		assert_eq!(compiled.alias, "total");
		assert!(
			sql.starts_with("SELECT SUM(price * quantity) FROM"),
			"sql: {sql}"
		);
	}

	#[rstest]
	fn test_callback_projection_wins_over_the_named_function() {
		// Arrange
		let request = AggregateRequest::parse("products.price").unwrap();
		let callback: RefineFn = Box::new(|query| {
			query.select_expr(Expr::cust(r#"min("product_orders"."price")"#));
		});

		// Act
		let compiled = compile(
			"orders",
			&request,
			&products(),
			AggregateSpec::function_refined("max", callback),
		);

		// Assert
		let sql = sqlite(&compiled);
		assert_eq!(compiled.alias, "products_price_max");
		assert!(
			sql.contains(r#"min("product_orders"."price")"#),
			"sql: {sql}"
		);
		assert!(!sql.contains("max("), "sql: {sql}");
	}

	#[rstest]
	fn test_predicate_only_callback_keeps_the_default_projection() {
		// Arrange
		let request = AggregateRequest::parse("products.price").unwrap();
		let callback: RefineFn = Box::new(|query| {
			let quantity = query.col("quantity");
			query.and_where(quantity.gt(1));
		});

		// Act
		let refined = compile(
			"orders",
			&request,
			&products(),
			AggregateSpec::function_refined("max", callback),
		);
		let plain = compile(
			"orders",
			&request,
			&products(),
			AggregateSpec::function("max"),
		);

		// Assert
		let refined_sql = sqlite(&refined);
		let plain_sql = sqlite(&plain);
		assert_eq!(
			refined_sql.split(" FROM ").next(),
			plain_sql.split(" FROM ").next(),
			"projections diverge: {refined_sql} vs {plain_sql}"
		);
		assert!(
			refined_sql.contains(r#""product_orders"."quantity" > 1"#),
			"sql: {refined_sql}"
		);
	}

	#[rstest]
	fn test_callback_only_aggregate_sets_its_own_projection() {
		// Arrange
		let request = AggregateRequest::parse("products as first_sku").unwrap();
		let callback: RefineFn = Box::new(|query| {
			query
				.select_column("name")
				.order_by("price", Order::Desc)
				.limit(1);
		});

		// Act
		let compiled = compile("orders", &request, &products(), AggregateSpec::Refine(callback));

		// Assert
		let sql = sqlite(&compiled);
		assert_eq!(compiled.alias, "first_sku");
		assert!(
			sql.starts_with(r#"SELECT "product_orders"."name" FROM"#),
			"sql: {sql}"
		);
		assert!(
			sql.contains(r#"ORDER BY "product_orders"."price" DESC"#),
			"sql: {sql}"
		);
		assert!(sql.contains("LIMIT 1"), "sql: {sql}");
	}

	#[rstest]
	fn test_callback_only_aggregate_without_projection_counts_rows() {
		// Arrange
		let request = AggregateRequest::parse("products").unwrap();
		let callback: RefineFn = Box::new(|query| {
			let discount = query.col("discount");
			query.and_where(discount.gt(0));
		});

		// Act
		let compiled = compile("orders", &request, &products(), AggregateSpec::Refine(callback));

		// Assert
		let sql = sqlite(&compiled);
		assert_eq!(compiled.alias, "products_aggregate");
		assert!(sql.starts_with("SELECT count(*) FROM"), "sql: {sql}");
		assert!(
			sql.contains(r#""product_orders"."discount" > 0"#),
			"sql: {sql}"
		);
	}

	#[rstest]
	fn test_extra_projections_are_discarded_first_wins() {
		// Arrange
		let request = AggregateRequest::parse("products as sample").unwrap();
		let callback: RefineFn = Box::new(|query| {
			query.select_column("price").select_column("quantity");
		});

		// Act
		let compiled = compile("orders", &request, &products(), AggregateSpec::Refine(callback));

		// Assert
		let sql = sqlite(&compiled);
		assert!(
			sql.starts_with(r#"SELECT "product_orders"."price" FROM"#),
			"sql: {sql}"
		);
		assert!(!sql.contains(r#""product_orders"."quantity""#), "sql: {sql}");
	}

	#[rstest]
	fn test_default_scope_is_merged_after_the_callback() {
		// Arrange
		let request = AggregateRequest::parse("products").unwrap();
		let relation = products()
			.scope(Condition::all().add(Expr::col(Alias::new("discount")).gt(0)));
		let callback: RefineFn = Box::new(|query| {
			let quantity = query.col("quantity");
			query.and_where(quantity.gt(1));
		});

		// Act
		let compiled = compile(
			"orders",
			&request,
			&relation,
			AggregateSpec::function_refined("count", callback),
		);

		// Assert
		let sql = sqlite(&compiled);
		assert!(sql.contains("count(*)"), "sql: {sql}");
		assert!(sql.contains(r#""discount" > 0"#), "sql: {sql}");
		assert!(
			sql.contains(r#""product_orders"."quantity" > 1"#),
			"sql: {sql}"
		);
		assert!(
			sql.contains(r#""orders"."id" = "product_orders"."order_id""#),
			"sql: {sql}"
		);
	}
}
