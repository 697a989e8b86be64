//! Default alias derivation for aggregate columns

/// Derive the default column alias for an aggregate.
///
/// The alias is built from the relation name, the column (omitted when it
/// is `*`), and the lowercased aggregate label, snake_cased and joined
/// with underscores. Derivation is pure: identical inputs always produce
/// identical aliases, and no collision detection is attempted across
/// requests.
///
/// # Examples
///
/// ```
/// use basie::alias::derive_alias;
///
/// assert_eq!(derive_alias("products", "price", "sum"), "products_price_sum");
/// assert_eq!(derive_alias("products", "*", "count"), "products_count");
/// ```
pub fn derive_alias(relation: &str, column: &str, label: &str) -> String {
	let label = label.to_lowercase();
	let parts = [relation, if column == "*" { "" } else { column }, &label];
	let joined = parts
		.iter()
		.filter(|part| !part.is_empty())
		.copied()
		.collect::<Vec<_>>()
		.join("_");
	snake_case(&joined)
}

/// Lowercase `input`, turning camel/Pascal word boundaries and spaces into
/// underscores. Existing underscores and other characters pass through.
fn snake_case(input: &str) -> String {
	let mut out = String::with_capacity(input.len() + 4);
	let mut prev_breaks = false;
	for ch in input.chars() {
		if ch == ' ' {
			if !out.ends_with('_') {
				out.push('_');
			}
			prev_breaks = false;
		} else if ch.is_uppercase() {
			if prev_breaks && !out.ends_with('_') {
				out.push('_');
			}
			out.extend(ch.to_lowercase());
			prev_breaks = false;
		} else {
			out.push(ch);
			prev_breaks = ch.is_lowercase() || ch.is_ascii_digit();
		}
	}
	out
}
