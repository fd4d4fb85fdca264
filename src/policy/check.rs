//! Rule language: compiled checks, the expression parser, and evaluation.
//!
//! A rule is either a string expression or the legacy list form, where the outer list is OR'd
//! and each inner list is AND'd. Expressions combine predicates with `or`, `and`, `not` and
//! parentheses. Predicates:
//!
//! - `@` always matches, `!` never matches;
//! - `rule:<name>` evaluates another rule;
//! - `role:<name>` matches a credential role, ignoring case;
//! - `'<literal>':<value>` compares a literal against the substituted value;
//! - `<attribute>:<value>` compares a credential (or target) attribute against the substituted
//!   value.
//!
//! Values may reference `%(name)s` placeholders resolved from the target, then the credentials.

// self
use crate::{_prelude::*, template};

/// Maximum `rule:` indirection depth; deeper chains (and cycles) deny.
pub const MAX_RULE_DEPTH: usize = 32;

/// Compiled check expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Check {
	/// `@`, or an empty rule.
	Always,
	/// `!`.
	Never,
	/// `rule:<name>`.
	Rule(String),
	/// `role:<name>`.
	Role(String),
	/// `'<literal>':<value>`.
	Literal {
		/// Quoted left-hand side.
		literal: String,
		/// Right-hand side, possibly containing placeholders.
		value: String,
	},
	/// `<key>:<value>`.
	Generic {
		/// Attribute name.
		key: String,
		/// Expected value, possibly containing placeholders.
		value: String,
	},
	/// `not <check>`.
	Not(Box<Check>),
	/// All operands must match.
	And(Vec<Check>),
	/// Any operand must match.
	Or(Vec<Check>),
}
impl Check {
	/// Compiles a string expression. An empty or blank expression always matches.
	pub fn parse(expr: &str) -> Result<Self, RuleSyntaxError> {
		let tokens = tokenize(expr)?;

		if tokens.is_empty() {
			return Ok(Self::Always);
		}

		let mut parser = Parser { tokens: tokens.into_iter().peekable() };
		let check = parser.parse_or()?;

		match parser.tokens.next() {
			None => Ok(check),
			Some(Token::Close) => Err(RuleSyntaxError::UnbalancedParens),
			Some(token) => Err(RuleSyntaxError::Unexpected(token.describe())),
		}
	}

	/// Compiles the legacy list form. An empty list always matches.
	pub fn from_clauses(clauses: &[Vec<String>]) -> Result<Self, RuleSyntaxError> {
		if clauses.is_empty() {
			return Ok(Self::Always);
		}

		let alternatives = clauses
			.iter()
			.map(|clause| {
				let mut terms = clause.iter().map(|expr| Self::parse(expr)).collect::<Result<Vec<_>, _>>()?;

				Ok(if terms.len() == 1 { terms.remove(0) } else { Self::And(terms) })
			})
			.collect::<Result<Vec<_>, RuleSyntaxError>>()?;

		Ok(Self::Or(alternatives))
	}

	fn parse_predicate(token: &str) -> Result<Self, RuleSyntaxError> {
		match token {
			"@" => return Ok(Self::Always),
			"!" => return Ok(Self::Never),
			_ => (),
		}

		let (kind, value) =
			token.split_once(':').ok_or_else(|| RuleSyntaxError::MissingKind(token.to_owned()))?;
		let value = value.to_owned();

		if let Some(literal) = unquote(kind) {
			return Ok(Self::Literal { literal: literal.to_owned(), value });
		}

		Ok(match kind {
			"rule" => Self::Rule(value),
			"role" => Self::Role(value),
			_ => Self::Generic { key: kind.to_owned(), value },
		})
	}
}

/// Source form of a rule as it appears in a policy document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSource {
	/// String expression.
	Expr(String),
	/// Legacy list of AND'd clauses, OR'd together.
	Clauses(Vec<Vec<String>>),
}
impl RuleSource {
	/// Compiles the source into a [`Check`].
	pub fn compile(&self) -> Result<Check, RuleSyntaxError> {
		match self {
			Self::Expr(expr) => Check::parse(expr),
			Self::Clauses(clauses) => Check::from_clauses(clauses),
		}
	}
}

/// Expression syntax errors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RuleSyntaxError {
	/// Parentheses do not pair up.
	#[error("unbalanced parentheses")]
	UnbalancedParens,
	/// Expression ended where an operand was expected.
	#[error("expression ends where an operand is expected")]
	UnexpectedEnd,
	/// A token appeared where an operand was expected.
	#[error("unexpected `{0}`")]
	Unexpected(String),
	/// A predicate lacks the `kind:` prefix.
	#[error("predicate `{0}` is missing a `kind:` prefix")]
	MissingKind(String),
}

/// Compiled rules plus the name of the fallback rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
	rules: HashMap<String, Check>,
	default_rule: String,
}
impl RuleSet {
	/// Creates an empty set falling back to `default_rule`.
	pub fn new(default_rule: impl Into<String>) -> Self {
		Self { rules: HashMap::new(), default_rule: default_rule.into() }
	}

	/// Compiles every source, naming the first rule that fails.
	pub fn compile<'a, I>(sources: I, default_rule: impl Into<String>) -> Result<Self, crate::error::ConfigError>
	where
		I: IntoIterator<Item = (&'a String, &'a RuleSource)>,
	{
		let mut set = Self::new(default_rule);

		for (name, source) in sources {
			let check = source.compile().map_err(|e| crate::error::ConfigError::MalformedRule {
				rule: name.clone(),
				reason: e.to_string(),
			})?;

			set.insert(name.clone(), check);
		}

		Ok(set)
	}

	/// Adds or replaces a rule.
	pub fn insert(&mut self, name: impl Into<String>, check: Check) {
		self.rules.insert(name.into(), check);
	}

	/// Looks up a compiled rule.
	pub fn get(&self, name: &str) -> Option<&Check> {
		self.rules.get(name)
	}

	/// Fallback rule name.
	pub fn default_rule(&self) -> &str {
		&self.default_rule
	}

	/// Number of compiled rules.
	pub fn len(&self) -> usize {
		self.rules.len()
	}

	/// Returns `true` when no rules are compiled.
	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Returns `true` when any check in `match_list` matches.
	pub fn enforce(&self, match_list: &[Check], target: &Attributes, credentials: &Attributes) -> bool {
		let evaluator = Evaluator { rules: self, target, credentials };

		match_list.iter().any(|check| evaluator.check(check, 0))
	}
}

struct Evaluator<'a> {
	rules: &'a RuleSet,
	target: &'a Attributes,
	credentials: &'a Attributes,
}
impl Evaluator<'_> {
	fn check(&self, check: &Check, depth: usize) -> bool {
		match check {
			Check::Always => true,
			Check::Never => false,
			Check::Rule(name) => self.check_rule(name, depth + 1),
			Check::Role(role) => self.check_role(role),
			Check::Literal { literal, value } =>
				self.substitute(value).is_some_and(|value| &value == literal),
			Check::Generic { key, value } => self.check_generic(key, value),
			Check::Not(inner) => !self.check(inner, depth),
			Check::And(checks) => checks.iter().all(|check| self.check(check, depth)),
			Check::Or(checks) => checks.iter().any(|check| self.check(check, depth)),
		}
	}

	fn check_rule(&self, name: &str, depth: usize) -> bool {
		if depth > MAX_RULE_DEPTH {
			return false;
		}
		if let Some(check) = self.rules.get(name) {
			return self.check(check, depth);
		}

		let default = self.rules.default_rule();

		if default.is_empty() || name == default {
			return false;
		}

		self.check_rule(default, depth + 1)
	}

	fn check_role(&self, role: &str) -> bool {
		let role = role.to_lowercase();

		match self.credentials.get("roles") {
			Some(JsonValue::Array(roles)) => roles
				.iter()
				.filter_map(JsonValue::as_str)
				.any(|candidate| candidate.to_lowercase() == role),
			Some(JsonValue::String(candidate)) => candidate.to_lowercase() == role,
			_ => false,
		}
	}

	fn check_generic(&self, key: &str, value: &str) -> bool {
		let Some(expected) = self.substitute(value) else {
			return false;
		};

		match self.credentials.get(key).or_else(|| self.target.get(key)) {
			Some(actual) => value_matches(actual, &expected),
			None => false,
		}
	}

	fn substitute(&self, value: &str) -> Option<String> {
		template::expand(value, |name| {
			self.target.get(name).or_else(|| self.credentials.get(name)).and_then(render)
		})
		.ok()
	}
}

#[derive(Debug, PartialEq)]
enum Token {
	Open,
	Close,
	And,
	Or,
	Not,
	Check(Check),
}
impl Token {
	fn describe(&self) -> String {
		match self {
			Self::Open => "(".into(),
			Self::Close => ")".into(),
			Self::And => "and".into(),
			Self::Or => "or".into(),
			Self::Not => "not".into(),
			Self::Check(check) => format!("{check:?}"),
		}
	}
}

struct Parser {
	tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
}
impl Parser {
	fn eat(&mut self, expected: &Token) -> bool {
		self.tokens.next_if(|token| token == expected).is_some()
	}

	fn parse_or(&mut self) -> Result<Check, RuleSyntaxError> {
		let mut terms = vec![self.parse_and()?];

		while self.eat(&Token::Or) {
			terms.push(self.parse_and()?);
		}

		Ok(if terms.len() == 1 { terms.remove(0) } else { Check::Or(terms) })
	}

	fn parse_and(&mut self) -> Result<Check, RuleSyntaxError> {
		let mut terms = vec![self.parse_not()?];

		while self.eat(&Token::And) {
			terms.push(self.parse_not()?);
		}

		Ok(if terms.len() == 1 { terms.remove(0) } else { Check::And(terms) })
	}

	fn parse_not(&mut self) -> Result<Check, RuleSyntaxError> {
		if self.eat(&Token::Not) {
			return Ok(Check::Not(Box::new(self.parse_not()?)));
		}

		self.parse_atom()
	}

	fn parse_atom(&mut self) -> Result<Check, RuleSyntaxError> {
		match self.tokens.next() {
			Some(Token::Open) => {
				let inner = self.parse_or()?;

				if self.eat(&Token::Close) { Ok(inner) } else { Err(RuleSyntaxError::UnbalancedParens) }
			},
			Some(Token::Check(check)) => Ok(check),
			Some(token) => Err(RuleSyntaxError::Unexpected(token.describe())),
			None => Err(RuleSyntaxError::UnexpectedEnd),
		}
	}
}

fn tokenize(expr: &str) -> Result<Vec<Token>, RuleSyntaxError> {
	let mut tokens = Vec::new();

	for word in expr.split_whitespace() {
		let trimmed = word.trim_start_matches('(');

		for _ in 0..word.len() - trimmed.len() {
			tokens.push(Token::Open);
		}

		let (core, closes) = split_group_closes(trimmed);

		if !core.is_empty() {
			tokens.push(match core.to_ascii_lowercase().as_str() {
				"and" => Token::And,
				"or" => Token::Or,
				"not" => Token::Not,
				_ => Token::Check(Check::parse_predicate(core)?),
			});
		}

		for _ in 0..closes {
			tokens.push(Token::Close);
		}
	}

	Ok(tokens)
}

/// Splits trailing group closes off `word`, leaving parens that close a `%(`/`$(` placeholder.
fn split_group_closes(word: &str) -> (&str, usize) {
	let bytes = word.as_bytes();
	let mut placeholders = 0_usize;
	let mut end = 0;

	for (i, &byte) in bytes.iter().enumerate() {
		match byte {
			b'(' if i > 0 && matches!(bytes[i - 1], b'%' | b'$') => placeholders += 1,
			b')' if placeholders > 0 => placeholders -= 1,
			b')' => continue,
			_ => {},
		}

		end = i + 1;
	}

	(&word[..end], word.len() - end)
}

fn unquote(kind: &str) -> Option<&str> {
	kind.strip_prefix('\'')
		.and_then(|rest| rest.strip_suffix('\''))
		.or_else(|| kind.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')))
}

fn render(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::String(s) => Some(s.clone()),
		JsonValue::Number(n) => Some(n.to_string()),
		JsonValue::Bool(true) => Some("True".into()),
		JsonValue::Bool(false) => Some("False".into()),
		_ => None,
	}
}

fn value_matches(actual: &JsonValue, expected: &str) -> bool {
	match actual {
		JsonValue::String(s) => s == expected,
		JsonValue::Number(n) => n.to_string() == expected,
		JsonValue::Bool(true) => matches!(expected, "True" | "true" | "1"),
		JsonValue::Bool(false) => matches!(expected, "False" | "false" | "0"),
		JsonValue::Array(items) => items.iter().any(|item| value_matches(item, expected)),
		JsonValue::Null | JsonValue::Object(_) => false,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn attrs(value: JsonValue) -> Attributes {
		value.as_object().cloned().expect("Fixture must be a JSON object.")
	}

	fn rules(entries: &[(&str, &str)]) -> RuleSet {
		let mut set = RuleSet::new("default");

		for (name, expr) in entries {
			set.insert(*name, Check::parse(expr).expect("Fixture rule should parse."));
		}

		set
	}

	fn allowed(set: &RuleSet, action: &str, target: JsonValue, credentials: JsonValue) -> bool {
		set.enforce(&[Check::Rule(action.into())], &attrs(target), &attrs(credentials))
	}

	#[test]
	fn precedence_is_not_then_and_then_or() {
		let check = Check::parse("role:a or role:b and not role:c").expect("Expression should parse.");

		assert_eq!(
			check,
			Check::Or(vec![
				Check::Role("a".into()),
				Check::And(vec![Check::Role("b".into()), Check::Not(Box::new(Check::Role("c".into())))]),
			])
		);
		assert_eq!(
			Check::parse("(role:a or role:b) and @").expect("Expression should parse."),
			Check::And(vec![
				Check::Or(vec![Check::Role("a".into()), Check::Role("b".into())]),
				Check::Always,
			])
		);
	}

	#[test]
	fn empty_rules_always_match() {
		assert_eq!(Check::parse("  "), Ok(Check::Always));
		assert_eq!(Check::from_clauses(&[]), Ok(Check::Always));
	}

	#[test]
	fn syntax_errors() {
		assert_eq!(Check::parse("(role:a"), Err(RuleSyntaxError::UnbalancedParens));
		assert_eq!(Check::parse("role:a)"), Err(RuleSyntaxError::UnbalancedParens));
		assert_eq!(Check::parse("role:a and"), Err(RuleSyntaxError::UnexpectedEnd));
		assert_eq!(Check::parse("or role:a"), Err(RuleSyntaxError::Unexpected("or".into())));
		assert_eq!(Check::parse("admin"), Err(RuleSyntaxError::MissingKind("admin".into())));
	}

	#[test]
	fn placeholders_may_end_a_predicate() {
		for placeholder in ["%(tenant_id)s", "%(tenant_id)", "$(tenant_id)s", "$(tenant_id)"] {
			let bare = format!("tenant_id:{placeholder}");
			let grouped = format!("(role:member and tenant_id:{placeholder})");
			let expected = Check::Generic { key: "tenant_id".into(), value: placeholder.into() };

			assert_eq!(Check::parse(&bare), Ok(expected.clone()), "{bare}");
			assert_eq!(
				Check::parse(&grouped),
				Ok(Check::And(vec![Check::Role("member".into()), expected])),
				"{grouped}"
			);

			let set = rules(&[("act", grouped.as_str())]);
			let member = json!({ "roles": ["member"], "tenant_id": "t-1" });

			assert!(allowed(&set, "act", json!({ "tenant_id": "t-1" }), member.clone()), "{grouped}");
			assert!(!allowed(&set, "act", json!({ "tenant_id": "t-2" }), member), "{grouped}");
		}

		assert_eq!(Check::parse("tenant_id:%(tenant_id))"), Err(RuleSyntaxError::UnbalancedParens));
	}

	#[test]
	fn legacy_clauses_or_outer_and_inner() {
		let check = Check::from_clauses(&[
			vec!["role:admin".into()],
			vec!["role:member".into(), "tenant_id:%(tenant_id)s".into()],
		])
		.expect("Clauses should compile.");
		let mut set = RuleSet::new("default");

		set.insert("act", check);

		let member = json!({ "roles": ["member"], "tenant_id": "t-1" });

		assert!(allowed(&set, "act", json!({ "tenant_id": "t-1" }), member.clone()));
		assert!(!allowed(&set, "act", json!({ "tenant_id": "t-2" }), member));
		assert!(allowed(&set, "act", json!({}), json!({ "roles": ["Admin"] })));
	}

	#[test]
	fn missing_rules_fall_back_to_default() {
		let deny_default = rules(&[("default", "!")]);

		assert!(!allowed(&deny_default, "anything", json!({}), json!({})));

		let allow_default = rules(&[("default", "@")]);

		assert!(allowed(&allow_default, "anything", json!({}), json!({})));

		let no_default = rules(&[]);

		assert!(!allowed(&no_default, "anything", json!({}), json!({})));
	}

	#[test]
	fn cycles_deny_instead_of_recursing() {
		let set = rules(&[("a", "rule:b"), ("b", "rule:a"), ("default", "@")]);

		assert!(!allowed(&set, "a", json!({}), json!({})));
	}

	#[test]
	fn generic_checks_substitute_and_coerce() {
		let set = rules(&[
			("owner", "user_id:%(owner)s"),
			("admin", "is_admin:1"),
			("group", "groups:ops"),
			("literal", "'ops':%(team)s"),
		]);
		let credentials = json!({ "user_id": "u-1", "is_admin": true, "groups": ["dev", "ops"] });

		assert!(allowed(&set, "owner", json!({ "owner": "u-1" }), credentials.clone()));
		assert!(!allowed(&set, "owner", json!({ "owner": "u-2" }), credentials.clone()));
		assert!(!allowed(&set, "owner", json!({}), credentials.clone()));
		assert!(allowed(&set, "admin", json!({}), credentials.clone()));
		assert!(allowed(&set, "group", json!({}), credentials.clone()));
		assert!(allowed(&set, "literal", json!({ "team": "ops" }), credentials.clone()));
		assert!(!allowed(&set, "literal", json!({ "team": "dev" }), credentials));
	}

	#[test]
	fn compile_names_the_malformed_rule() {
		let sources = BTreeMap::from_iter([
			("good".to_owned(), RuleSource::Expr("role:admin".into())),
			("bad".to_owned(), RuleSource::Expr("role:admin and (".into())),
		]);
		let err = RuleSet::compile(&sources, "default").expect_err("Malformed rule must fail.");

		assert!(matches!(
			err,
			crate::error::ConfigError::MalformedRule { ref rule, .. } if rule == "bad"
		));
	}
}
