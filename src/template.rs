//! Placeholder interpolation shared by catalog templates and policy predicates.
//!
//! Placeholders look like `$(name)s` or `%(name)s`; the trailing `s` is optional. Everything
//! outside a placeholder is copied verbatim.

// self
use crate::_prelude::*;

/// Interpolation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TemplateError {
	/// A placeholder names a key the lookup cannot resolve.
	#[error("Template references undefined key `{key}`.")]
	Undefined {
		/// Missing key.
		key: String,
	},
	/// A placeholder was opened but never closed.
	#[error("Template contains an unterminated placeholder.")]
	Unterminated,
}

/// Expands every placeholder in `template` through `lookup`.
pub fn expand<F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
	F: Fn(&str) -> Option<String>,
{
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(start) = find_open(rest) {
		out.push_str(&rest[..start]);

		let after_open = &rest[start + 2..];
		let end = after_open.find(')').ok_or(TemplateError::Unterminated)?;
		let key = &after_open[..end];
		let value = lookup(key).ok_or_else(|| TemplateError::Undefined { key: key.to_owned() })?;

		out.push_str(&value);

		let tail = &after_open[end + 1..];

		rest = tail.strip_prefix('s').unwrap_or(tail);
	}

	out.push_str(rest);

	Ok(out)
}

/// Expands `template` against a string map.
pub fn expand_with(
	template: &str,
	context: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
	expand(template, |key| context.get(key).cloned())
}

/// Returns `true` if `template` contains at least one placeholder.
pub fn has_placeholders(template: &str) -> bool {
	find_open(template).is_some()
}

fn find_open(haystack: &str) -> Option<usize> {
	let bytes = haystack.as_bytes();

	bytes.windows(2).position(|pair| matches!(pair, [b'$' | b'%', b'(']))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn context() -> BTreeMap<String, String> {
		BTreeMap::from_iter([
			("public_port".to_owned(), "5000".to_owned()),
			("tenant_id".to_owned(), "bar".to_owned()),
		])
	}

	#[test]
	fn both_placeholder_styles_expand() {
		assert_eq!(
			expand_with("http://localhost:$(public_port)s/v2.0", &context()),
			Ok("http://localhost:5000/v2.0".into())
		);
		assert_eq!(expand_with("/v1.1/%(tenant_id)s", &context()), Ok("/v1.1/bar".into()));
		assert_eq!(expand_with("$(tenant_id)", &context()), Ok("bar".into()));
	}

	#[test]
	fn plain_text_is_untouched() {
		assert_eq!(expand_with("'Compute Service' $ % ()", &context()), Ok("'Compute Service' $ % ()".into()));
		assert!(!has_placeholders("no placeholders here"));
		assert!(has_placeholders("$(x)s"));
	}

	#[test]
	fn undefined_and_unterminated_placeholders_fail() {
		assert_eq!(
			expand_with("http://localhost:$(admin_port)s/", &context()),
			Err(TemplateError::Undefined { key: "admin_port".into() })
		);
		assert_eq!(expand_with("http://$(public_port", &context()), Err(TemplateError::Unterminated));
	}
}
