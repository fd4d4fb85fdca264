//! Password hashing contract backed by SHA-512 crypt.
//!
//! Hashes use the modular crypt format `$6$[rounds=N$]<salt>$<digest>` shared with glibc and
//! passlib, so stored hashes from either are recognised and verified as-is.

// crates.io
use sha_crypt::{Sha512Params, sha512_crypt_b64, sha512_simple};
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

const PREFIX: &str = "$6$";
const ROUNDS_PREFIX: &str = "rounds=";
const ROUNDS_MIN: u32 = 1_000;
const ROUNDS_MAX: u32 = 999_999_999;
// Applies when a stored hash carries no `rounds=` segment.
const ROUNDS_IMPLICIT: u32 = 5_000;
const SALT_MAX_LEN: usize = 16;
const DIGEST_LEN: usize = 86;

/// Default key-stretching round count (`crypt_strength`).
pub const DEFAULT_CRYPT_STRENGTH: u32 = 40_000;

/// Hashes `password` with a fresh salt and `strength` rounds, clamped to the range
/// SHA-512 crypt accepts.
///
/// Input that already is a SHA-512 crypt hash is returned unchanged so callers can pass
/// through stored values without double hashing.
pub fn hash_password(strength: u32, password: &str) -> Result<String> {
	if identify(password) {
		return Ok(password.to_owned());
	}

	let params = params(strength.clamp(ROUNDS_MIN, ROUNDS_MAX))?;

	sha512_simple(password, &params)
		.map_err(|e| Error::PasswordHash { reason: format!("{e:?}") })
}

/// Checks a plaintext password against a stored hash. `None` never matches.
pub fn check_password(password: Option<&str>, hashed: &str) -> bool {
	let Some(password) = password else {
		return false;
	};
	let Some(parsed) = ParsedHash::parse(hashed) else {
		return false;
	};
	let Ok(params) = params(parsed.rounds) else {
		return false;
	};
	let Ok(candidate) = sha512_crypt_b64(password.as_bytes(), parsed.salt.as_bytes(), &params)
	else {
		return false;
	};

	candidate.as_bytes().ct_eq(parsed.digest.as_bytes()).into()
}

/// Returns `true` when `value` is a SHA-512 crypt hash.
pub fn identify(value: &str) -> bool {
	ParsedHash::parse(value).is_some()
}

fn params(rounds: u32) -> Result<Sha512Params> {
	Sha512Params::new(rounds as usize)
		.map_err(|e| Error::PasswordHash { reason: format!("{e:?}") })
}

#[derive(Debug)]
struct ParsedHash<'a> {
	rounds: u32,
	salt: &'a str,
	digest: &'a str,
}
impl<'a> ParsedHash<'a> {
	fn parse(value: &'a str) -> Option<Self> {
		let rest = value.strip_prefix(PREFIX)?;
		let (rounds, rest) = match rest.strip_prefix(ROUNDS_PREFIX) {
			Some(rest) => {
				let (rounds, rest) = rest.split_once('$')?;

				(rounds.parse::<u32>().ok()?, rest)
			},
			None => (ROUNDS_IMPLICIT, rest),
		};
		let (salt, digest) = rest.split_once('$')?;

		if !(ROUNDS_MIN..=ROUNDS_MAX).contains(&rounds)
			|| salt.len() > SALT_MAX_LEN
			|| !salt.bytes().all(is_crypt_char)
			|| digest.len() != DIGEST_LEN
			|| !digest.bytes().all(is_crypt_char)
		{
			return None;
		}

		Some(Self { rounds, salt, digest })
	}
}

fn is_crypt_char(byte: u8) -> bool {
	byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'/'
}
