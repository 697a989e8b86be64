//! One-to-many relation metadata
//!
//! A [`Relation`] tells the compiler everything it needs to correlate a
//! subquery with the parent row: the related table, the foreign key on
//! that table pointing back at the parent, the parent-side key, and any
//! default scope the relation always applies.

use sea_query::Condition;

/// A declared one-to-many relation from the parent table to a related
/// table.
///
/// # Examples
///
/// ```
/// use basie::Relation;
/// use basie::sea_query::{Alias, Condition, Expr, ExprTrait};
///
/// // orders.id = product_orders.order_id
/// let products = Relation::has_many("product_orders", "order_id");
///
/// // visible rows only, regardless of caller-supplied constraints
/// let visible = Relation::has_many("product_orders", "order_id")
///     .scope(Condition::all().add(Expr::col(Alias::new("discount")).gt(0)));
/// # let _ = (products, visible);
/// ```
#[derive(Debug, Clone)]
pub struct Relation {
	pub(crate) related_table: String,
	pub(crate) foreign_key: String,
	pub(crate) parent_key: String,
	pub(crate) scope: Option<Condition>,
}

impl Relation {
	/// Declare a has-many relation: rows of `related_table` point back at
	/// the parent through `foreign_key`. The parent-side key defaults to
	/// `id`.
	pub fn has_many(related_table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
		Self {
			related_table: related_table.into(),
			foreign_key: foreign_key.into(),
			parent_key: "id".to_string(),
			scope: None,
		}
	}

	/// Override the parent-side key used by the correlation predicate.
	pub fn parent_key(mut self, key: impl Into<String>) -> Self {
		self.parent_key = key.into();
		self
	}

	/// Attach default constraints that every aggregate subquery over this
	/// relation applies, merged (ANDed) after any refinement callback has
	/// run. Calling `scope` again ANDs the new constraints onto the
	/// existing ones.
	pub fn scope(mut self, constraint: Condition) -> Self {
		self.scope = Some(match self.scope {
			Some(existing) => Condition::all().add(existing).add(constraint),
			None => constraint,
		});
		self
	}
}
