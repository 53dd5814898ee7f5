//! Process configuration for the broker and telco roles.
//!
//! Both roles read the process environment after loading an optional `.env` file. Loading is
//! split from lookup: every `*_from_lookup` function takes a `name -> value` closure, so tests
//! never touch the real environment.

// std
use std::net::{Ipv4Addr, SocketAddr};
// self
use crate::{
	_prelude::*,
	auth::{KeyId, TenantId, TokenSecret},
	error::ConfigError,
	exchange::DEFAULT_BROKER_ISSUER,
	tenant::{Prefix, RoutingTable, TelcoDescriptor},
	token::DEFAULT_RSA_BITS,
	upstream::UpstreamSettings,
};

/// Path of the YAML prefix map.
pub const PREFIX_MAP_PATH_ENV: &str = "PREFIX_MAP_PATH";
/// Pre-shared HMAC secret for broker tokens.
pub const SIGNING_KEY_ENV: &str = "SIGNING_KEY";
/// Listen port or address.
pub const PORT_ENV: &str = "PORT";
/// Issuer written into broker tokens.
pub const BROKER_ISSUER_ENV: &str = "BROKER_ISSUER";
/// Opt-in switch exposing raw upstream error text in responses.
pub const EXPOSE_ERROR_DETAILS_ENV: &str = "EXPOSE_ERROR_DETAILS";

/// Broker role settings.
#[derive(Debug)]
pub struct BrokerConfig {
	/// Prefix routing table.
	pub routing: RoutingTable,
	/// HMAC secret for broker tokens.
	pub signing_secret: TokenSecret,
	/// Socket the HTTP server binds.
	pub listen_addr: SocketAddr,
	/// `iss` of broker tokens.
	pub issuer: String,
	/// Whether error bodies carry raw upstream and internal error text.
	pub expose_error_details: bool,
	/// Per-tenant resilience settings.
	pub upstream: UpstreamSettings,
}
impl BrokerConfig {
	/// Loads `.env` when present, then reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		load_dotenv()?;

		Self::from_lookup(process_env)
	}

	/// Builds the configuration from an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let path = require(&lookup, PREFIX_MAP_PATH_ENV)?;
		let yaml = std::fs::read_to_string(&path)
			.map_err(|source| ConfigError::PrefixMapRead { path: path.clone(), source })?;
		let routing = parse_prefix_map(&yaml, &lookup)?;

		tracing::info!(%path, prefixes = routing.len(), "prefix map loaded");

		Ok(Self {
			routing,
			signing_secret: TokenSecret::new(require(&lookup, SIGNING_KEY_ENV)?),
			listen_addr: parse_listen_addr(PORT_ENV, &require(&lookup, PORT_ENV)?)?,
			issuer: optional(&lookup, BROKER_ISSUER_ENV)
				.unwrap_or_else(|| DEFAULT_BROKER_ISSUER.into()),
			expose_error_details: match optional(&lookup, EXPOSE_ERROR_DETAILS_ENV) {
				Some(raw) => parse_flag(EXPOSE_ERROR_DETAILS_ENV, &raw)?,
				None => false,
			},
			upstream: UpstreamSettings::default(),
		})
	}
}

/// Telco role settings.
#[derive(Debug)]
pub struct TelcoConfig {
	/// Key id advertised in the key set and token headers.
	pub key_id: KeyId,
	/// Client id the broker must present.
	pub client_id: String,
	/// Client secret the broker must present.
	pub client_secret: TokenSecret,
	/// `iss` of telco tokens, verbatim.
	pub issuer: String,
	/// Socket the HTTP server binds.
	pub listen_addr: SocketAddr,
	/// RSA modulus size.
	pub rsa_bits: usize,
}
impl TelcoConfig {
	/// Loads `.env` when present, then reads `<PREFIX>_*` variables from the process environment.
	pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
		load_dotenv()?;

		Self::from_lookup(prefix, process_env)
	}

	/// Builds the configuration from an arbitrary variable lookup.
	///
	/// The listen port comes from `PORT` when set, otherwise from the issuer URL.
	pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let prefix = prefix.to_ascii_uppercase();
		let name = |suffix: &str| format!("{prefix}_{suffix}");
		let issuer = require(&lookup, &name("ISSUER_URL"))?;
		let issuer_url = Url::parse(&issuer)
			.map_err(|source| ConfigError::InvalidUrl { value: issuer.clone(), source })?;
		let listen_addr = match optional(&lookup, PORT_ENV) {
			Some(raw) => parse_listen_addr(PORT_ENV, &raw)?,
			None => {
				let port = issuer_url.port_or_known_default().ok_or_else(|| {
					ConfigError::InvalidEnv {
						name: name("ISSUER_URL"),
						reason: "cannot derive a listen port".into(),
					}
				})?;

				SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
			},
		};

		Ok(Self {
			key_id: KeyId::new(require(&lookup, &name("KEY_ID"))?)?,
			client_id: require(&lookup, &name("CLIENT_ID"))?,
			client_secret: TokenSecret::new(require(&lookup, &name("CLIENT_SECRET"))?),
			issuer,
			listen_addr,
			rsa_bits: DEFAULT_RSA_BITS,
		})
	}
}

#[derive(Deserialize)]
struct PrefixMapFile {
	#[serde(default)]
	prefixes: BTreeMap<String, PrefixEntry>,
}

#[derive(Deserialize)]
struct PrefixEntry {
	base_url: String,
	/// Name of the variable holding the client id.
	client_id: String,
	/// Name of the variable holding the client secret.
	client_secret: String,
	#[serde(default)]
	tenant: Option<String>,
}

/// Parses a YAML prefix map, resolving credential variable names through `lookup`.
pub fn parse_prefix_map<F>(yaml: &str, lookup: F) -> Result<RoutingTable, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	if yaml.trim().is_empty() {
		return Err(ConfigError::EmptyPrefixMap);
	}

	let file: PrefixMapFile = serde_yaml::from_str(yaml)?;

	if file.prefixes.is_empty() {
		return Err(ConfigError::EmptyPrefixMap);
	}

	let mut descriptors = Vec::with_capacity(file.prefixes.len());

	for (prefix, entry) in file.prefixes {
		let base_url = Url::parse(&entry.base_url)
			.map_err(|source| ConfigError::InvalidUrl { value: entry.base_url.clone(), source })?;
		let mut descriptor = TelcoDescriptor::new(
			Prefix::new(&prefix)?,
			base_url,
			require(&lookup, &entry.client_id)?,
			require(&lookup, &entry.client_secret)?,
		)?;

		if let Some(tenant) = entry.tenant {
			descriptor = descriptor.with_tenant(TenantId::new(tenant)?);
		}

		descriptors.push(descriptor);
	}

	Ok(RoutingTable::new(descriptors)?)
}

/// Parses `8080`, `:8080`, or a full socket address; bare ports bind every interface.
pub fn parse_listen_addr(name: &str, raw: &str) -> Result<SocketAddr, ConfigError> {
	let raw = raw.trim();
	let port = raw.strip_prefix(':').unwrap_or(raw);

	if let Ok(port) = port.parse::<u16>() {
		return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
	}

	raw.parse().map_err(|_| ConfigError::InvalidEnv {
		name: name.to_owned(),
		reason: format!("`{raw}` is neither a port nor a socket address"),
	})
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::InvalidEnv {
			name: name.to_owned(),
			reason: format!("`{raw}` is not a boolean"),
		}),
	}
}

fn require<F>(lookup: F, name: &str) -> Result<String, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	optional(lookup, name).ok_or_else(|| ConfigError::MissingEnv { name: name.to_owned() })
}

fn optional<F>(lookup: F, name: &str) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name).filter(|value| !value.is_empty())
}

fn process_env(name: &str) -> Option<String> {
	std::env::var(name).ok()
}

fn load_dotenv() -> Result<(), ConfigError> {
	match dotenvy::dotenv() {
		Ok(path) => {
			tracing::debug!(path = %path.display(), "loaded .env");

			Ok(())
		},
		Err(e) if e.not_found() => Ok(()),
		Err(e) => Err(e.into()),
	}
}
