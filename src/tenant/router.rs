//! Longest-prefix routing from phone numbers to telco descriptors.

// self
use crate::{
	_prelude::*,
	error::ClientError,
	tenant::{Prefix, TelcoDescriptor, normalize_phone},
};

/// Errors raised while building a routing table.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RoutingError {
	/// Prefix is empty or contains non-digits.
	#[error("Prefix `{prefix}` must be a non-empty run of digits.")]
	InvalidPrefix {
		/// Offending prefix.
		prefix: String,
	},
	/// The same prefix was declared twice.
	#[error("Prefix `{prefix}` is declared more than once.")]
	DuplicatePrefix {
		/// Duplicated prefix.
		prefix: String,
	},
}

/// Process-wide, immutable routing table.
///
/// Entries are kept sorted by prefix length (descending) and then lexicographically, so the
/// first matching entry is always the most specific one.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
	entries: Vec<Arc<TelcoDescriptor>>,
}
impl RoutingTable {
	/// Builds a table, rejecting duplicate prefixes.
	pub fn new<I>(descriptors: I) -> Result<Self, RoutingError>
	where
		I: IntoIterator<Item = TelcoDescriptor>,
	{
		let mut entries = descriptors.into_iter().map(Arc::new).collect::<Vec<_>>();

		entries.sort_by(|a, b| {
			b.prefix.len().cmp(&a.prefix.len()).then_with(|| a.prefix.cmp(&b.prefix))
		});

		if let Some(pair) = entries.windows(2).find(|pair| pair[0].prefix == pair[1].prefix) {
			return Err(RoutingError::DuplicatePrefix { prefix: pair[0].prefix.to_string() });
		}

		Ok(Self { entries })
	}

	/// Resolves `phone` to the telco owning its longest matching prefix.
	pub fn route(&self, phone: &str) -> Result<Arc<TelcoDescriptor>, ClientError> {
		let normalized = normalize_phone(phone);

		self.entries
			.iter()
			.find(|entry| entry.prefix.matches(normalized))
			.cloned()
			.ok_or_else(|| ClientError::NoRouteFound { phone: normalized.to_owned() })
	}

	/// Looks up the descriptor registered for an exact prefix.
	pub fn get(&self, prefix: &Prefix) -> Option<&Arc<TelcoDescriptor>> {
		self.entries.iter().find(|entry| &entry.prefix == prefix)
	}

	/// Iterates descriptors from most to least specific.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<TelcoDescriptor>> {
		self.entries.iter()
	}

	/// Number of prefixes in the table.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true when no prefix is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
