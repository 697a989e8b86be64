//! Parsing of textual aggregate specifications
//!
//! A specification names the relation to aggregate over, optionally a
//! column within the related table, and optionally an explicit alias:
//! `"products"`, `"products.price"`, `"products.price as min_price"`.
//! Every caller-facing operation funnels its strings through
//! [`AggregateRequest::parse`] exactly once; nothing downstream re-parses
//! raw text.

use crate::error::AggregateError;

/// One parsed aggregate request.
///
/// # Examples
///
/// ```
/// use basie::AggregateRequest;
///
/// let request = AggregateRequest::parse("products.price as min_price").unwrap();
/// assert_eq!(request.relation(), "products");
/// assert_eq!(request.column(), "price");
/// assert_eq!(request.alias(), Some("min_price"));
///
/// let bare = AggregateRequest::parse("products").unwrap();
/// assert_eq!(bare.column(), "*");
/// assert_eq!(bare.alias(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRequest {
	relation: String,
	column: String,
	alias: Option<String>,
}

impl AggregateRequest {
	/// Parse a specification string.
	///
	/// The optional alias clause is three whitespace-separated segments
	/// with a case-insensitive `as` in the middle. The remaining name is
	/// split on its first `.`; the right side (which may itself contain
	/// dots) is the column, and a missing column means `*` (row-count
	/// semantics).
	///
	/// # Errors
	///
	/// [`AggregateError::InvalidSpecification`] when the relation name is
	/// empty or the alias clause is malformed.
	pub fn parse(raw: &str) -> Result<Self, AggregateError> {
		let segments: Vec<&str> = raw.split_whitespace().collect();

		let (name, alias) = match segments.as_slice() {
			[] => {
				return Err(AggregateError::InvalidSpecification {
					spec: raw.to_string(),
					reason: "empty specification".to_string(),
				});
			}
			[name] => (*name, None),
			[name, keyword, alias] if keyword.eq_ignore_ascii_case("as") => {
				(*name, Some((*alias).to_string()))
			}
			_ => {
				return Err(AggregateError::InvalidSpecification {
					spec: raw.to_string(),
					reason: "expected `<relation[.column]> as <alias>`".to_string(),
				});
			}
		};

		let (relation, column) = match name.split_once('.') {
			Some((relation, column)) => (relation, column),
			None => (name, "*"),
		};

		if relation.is_empty() {
			return Err(AggregateError::InvalidSpecification {
				spec: raw.to_string(),
				reason: "empty relation name".to_string(),
			});
		}

		Ok(Self {
			relation: relation.to_string(),
			column: column.to_string(),
			alias,
		})
	}

	/// Name of the relation to aggregate over.
	pub fn relation(&self) -> &str {
		&self.relation
	}

	/// Column within the related table; `*` denotes row-count semantics.
	pub fn column(&self) -> &str {
		&self.column
	}

	/// Alias supplied through the `as` clause, if any.
	pub fn alias(&self) -> Option<&str> {
		self.alias.as_deref()
	}
}
