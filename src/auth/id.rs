//! Validated identifiers used as credential storage keys and OAuth client identifiers.
//!
//! Both identifiers share one representation, [`Identifier`], parameterized by a zero-sized
//! [`IdentifierRules`] marker that names the identifier and decides which characters it accepts.

// std
use std::{borrow::Borrow, marker::PhantomData, ops::Deref};
// self
use crate::_prelude::*;

/// Naming and validation rules for one identifier family.
pub trait IdentifierRules
where
	Self: 'static + Copy + Debug + Ord + Hash + Send + Sync,
{
	/// Human-readable family name used in errors and `Debug` output.
	const NAME: &'static str;
	/// Maximum byte length.
	const MAX_LEN: usize = 128;

	/// Whether `c` may appear in the identifier.
	fn accepts(c: char) -> bool;
}

/// Storage-key rules: ASCII alphanumerics plus `.`, `_`, `-`, and `:`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKeyRules {}
impl IdentifierRules for StorageKeyRules {
	const NAME: &'static str = "TokenKind";

	fn accepts(c: char) -> bool {
		c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':')
	}
}

/// OAuth client identifier rules: visible ASCII, no spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClientIdRules {}
impl IdentifierRules for ClientIdRules {
	const NAME: &'static str = "Client";

	fn accepts(c: char) -> bool {
		c.is_ascii_graphic()
	}
}

/// Credential discriminator used as the storage key.
pub type TokenKind = Identifier<StorageKeyRules>;
/// OAuth 2.0 client identifier sent with refresh grants.
pub type ClientId = Identifier<ClientIdRules>;

/// Non-empty string checked against the rules of `R` at construction and deserialization.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier<R>
where
	R: IdentifierRules,
{
	value: String,
	#[serde(skip)]
	rules: PhantomData<R>,
}
impl<R> Identifier<R>
where
	R: IdentifierRules,
{
	/// Validates `value` and wraps it.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind: R::NAME });
		}
		if value.len() > R::MAX_LEN {
			return Err(IdentifierError::TooLong { kind: R::NAME, max: R::MAX_LEN });
		}
		if let Some(character) = value.chars().find(|c| !R::accepts(*c)) {
			return Err(IdentifierError::InvalidCharacter { kind: R::NAME, character });
		}

		Ok(Self { value, rules: PhantomData })
	}

	/// Borrowed string form.
	pub fn as_str(&self) -> &str {
		&self.value
	}
}
impl<R> Deref for Identifier<R>
where
	R: IdentifierRules,
{
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.value
	}
}
impl<R> AsRef<str> for Identifier<R>
where
	R: IdentifierRules,
{
	fn as_ref(&self) -> &str {
		&self.value
	}
}
impl<R> Borrow<str> for Identifier<R>
where
	R: IdentifierRules,
{
	fn borrow(&self) -> &str {
		&self.value
	}
}
impl<R> From<Identifier<R>> for String
where
	R: IdentifierRules,
{
	fn from(id: Identifier<R>) -> Self {
		id.value
	}
}
impl<R> TryFrom<String> for Identifier<R>
where
	R: IdentifierRules,
{
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl<R> FromStr for Identifier<R>
where
	R: IdentifierRules,
{
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl<R> Debug for Identifier<R>
where
	R: IdentifierRules,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", R::NAME, self.value)
	}
}
impl<R> Display for Identifier<R>
where
	R: IdentifierRules,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}

/// Reasons an identifier is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// Nothing to identify with.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier family.
		kind: &'static str,
	},
	/// A character outside the family's alphabet.
	#[error("{kind} identifier contains the disallowed character {character:?}.")]
	InvalidCharacter {
		/// Identifier family.
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// Longer than the family allows.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Identifier family.
		kind: &'static str,
		/// Maximum permitted byte length.
		max: usize,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn storage_keys_use_a_narrow_alphabet() {
		let kind = TokenKind::new("api:access_v2").expect("Token kind fixture should be valid.");

		assert_eq!(kind.as_str(), "api:access_v2");
		assert_eq!(format!("{kind:?}"), "TokenKind(api:access_v2)");
		assert_eq!(
			TokenKind::new("with space"),
			Err(IdentifierError::InvalidCharacter { kind: "TokenKind", character: ' ' })
		);
		assert!(TokenKind::new("slash/key").is_err());
		assert_eq!(TokenKind::new(""), Err(IdentifierError::Empty { kind: "TokenKind" }));
	}

	#[test]
	fn client_ids_accept_visible_ascii() {
		assert!(ClientId::new("client+1@example.com").is_ok());
		assert!(ClientId::new("tab\tseparated").is_err());
		assert!(ClientId::new("a".repeat(128)).is_ok());
		assert_eq!(
			ClientId::new("a".repeat(129)),
			Err(IdentifierError::TooLong { kind: "Client", max: 128 })
		);
	}

	#[test]
	fn deserialization_enforces_validation() {
		let kind: TokenKind =
			serde_json::from_str("\"session\"").expect("Token kind should deserialize.");

		assert_eq!(kind.as_str(), "session");
		assert!(serde_json::from_str::<TokenKind>("\"with space\"").is_err());
		assert_eq!(serde_json::to_string(&kind).expect("Token kind should serialize."), "\"session\"");
	}

	#[test]
	fn borrowed_lookup_by_str() {
		let map = HashMap::from([(TokenKind::new("access").expect("Valid token kind."), 7_u8)]);

		assert_eq!(map.get("access"), Some(&7));
	}
}
