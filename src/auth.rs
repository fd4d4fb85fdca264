//! Auth-domain identifiers and the password hashing contract.

pub mod id;
pub mod passwd;

pub use id::*;
pub use passwd::*;
