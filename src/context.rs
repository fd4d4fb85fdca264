//! Request context handed from the transport layer to managers.
//!
//! The transport extracts the auth token header, flags administrative requests, and filters
//! request parameters before any manager sees them. Managers receive the context as their
//! leading argument and never forward it to drivers.

// self
use crate::_prelude::*;

/// Header carrying the caller's token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Per-request context built by the transport layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
	/// Token presented by the caller, if any.
	pub token_id: Option<String>,
	/// Set when the caller presented the configured admin token.
	pub is_admin: bool,
	/// Filtered query/body parameters.
	pub params: Attributes,
}
impl RequestContext {
	/// Builds a context from request headers.
	///
	/// Header names match case-insensitively. `is_admin` is set only when the presented token
	/// equals `admin_token`.
	pub fn from_headers<I, K, V>(headers: I, admin_token: &str) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let token_id = headers
			.into_iter()
			.find(|(name, _)| name.as_ref().eq_ignore_ascii_case(AUTH_TOKEN_HEADER))
			.map(|(_, value)| value.as_ref().to_owned());
		let is_admin = token_id.as_deref() == Some(admin_token);

		Self { token_id, is_admin, params: Attributes::new() }
	}

	/// Creates a context for the provided token.
	pub fn with_token(token_id: impl Into<String>) -> Self {
		Self { token_id: Some(token_id.into()), ..Default::default() }
	}

	/// Creates an administrative context.
	pub fn admin() -> Self {
		Self { is_admin: true, ..Default::default() }
	}

	/// Replaces the parameters, dropping reserved keys.
	pub fn with_params(mut self, params: Attributes) -> Self {
		self.params = filter_params(params);

		self
	}

	/// Parses a JSON request body into filtered parameters.
	///
	/// An empty body or a non-object document yields no parameters; malformed JSON is a
	/// [`Error::BadRequest`].
	pub fn with_json_body(self, body: &[u8]) -> Result<Self> {
		let params = params_from_json(body)?;

		Ok(self.with_params(params))
	}
}

/// Parses a JSON body into a parameter mapping (see [`RequestContext::with_json_body`]).
pub fn params_from_json(body: &[u8]) -> Result<Attributes> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(Attributes::new());
	}

	let value: JsonValue = serde_json::from_slice(body)
		.map_err(|_| Error::BadRequest { reason: "Malformed json in request body".into() })?;

	match value {
		JsonValue::Object(map) => Ok(filter_params(map)),
		_ => Ok(Attributes::new()),
	}
}

fn filter_params(params: Attributes) -> Attributes {
	params
		.into_iter()
		.filter(|(key, _)| key != "self" && key != "context" && !key.starts_with('_'))
		.collect()
}
