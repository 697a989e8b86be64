//! Error types for aggregate specification parsing and compilation

use crate::dialect::Dialect;

/// Errors raised while turning aggregate specifications into correlated
/// subquery columns.
///
/// All variants are fatal for the call that produced them; nothing is
/// retried and no partial aggregate is attached for the failing entry.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
	/// Malformed relation-path specification (empty relation name or a
	/// broken `as`-alias clause)
	#[error("invalid aggregate specification {spec:?}: {reason}")]
	InvalidSpecification {
		/// The raw specification string as given by the caller
		spec: String,
		/// What was wrong with it
		reason: String,
	},

	/// The requested relation name is not declared on the parent builder
	#[error("unknown relation {0:?}")]
	UnknownRelation(String),

	/// The active dialect declares no JSON array aggregate function
	#[error("{dialect} does not support JSON array aggregate operations")]
	UnsupportedAggregateFunction {
		/// The dialect the builder was constructed with
		dialect: Dialect,
	},
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_error_messages_name_the_offender() {
		// Arrange
		let invalid = AggregateError::InvalidSpecification {
			spec: "products.price as".to_string(),
			reason: "expected `<relation[.column]> as <alias>`".to_string(),
		};
		let unknown = AggregateError::UnknownRelation("products".to_string());
		let unsupported = AggregateError::UnsupportedAggregateFunction {
			dialect: Dialect::Postgres,
		};

		// Assert
		assert!(invalid.to_string().contains("products.price as"));
		assert!(unknown.to_string().contains("products"));
		assert!(
			unsupported
				.to_string()
				.contains("does not support JSON array aggregate operations")
		);
		assert!(unsupported.to_string().contains("PostgreSQL"));
	}
}
