//! Registry of long-lived per-tenant upstream clients.

// self
use crate::{
	_prelude::*,
	auth::TenantId,
	clock::{SharedClock, system_clock},
	error::ConfigError,
	tenant::{RoutingTable, TelcoDescriptor},
	upstream::{TelcoClient, UpstreamSettings},
};

/// Read-mostly map from tenant to its [`TelcoClient`].
///
/// Clients are built once (normally at startup from the routing table) and shared by every
/// request, which is what lets rate budgets and breaker streaks accumulate.
pub struct TelcoRegistry {
	clients: RwLock<HashMap<TenantId, Arc<TelcoClient>>>,
	settings: UpstreamSettings,
	http: ReqwestClient,
	clock: SharedClock,
}
impl TelcoRegistry {
	/// Creates an empty registry with its own reqwest client.
	pub fn new(settings: UpstreamSettings) -> Result<Self, ConfigError> {
		settings.validate()?;

		let http = ReqwestClient::builder()
			.timeout(settings.call_timeout.unsigned_abs())
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self::with_http_client(http, settings, system_clock()))
	}

	/// Creates an empty registry around a caller-provided client and clock.
	pub fn with_http_client(
		http: ReqwestClient,
		settings: UpstreamSettings,
		clock: SharedClock,
	) -> Self {
		Self { clients: Default::default(), settings, http, clock }
	}

	/// Registers one client per tenant found in `table`.
	pub fn populate(self, table: &RoutingTable) -> Result<Self, ConfigError> {
		for descriptor in table.iter() {
			self.client_for(descriptor)?;
		}

		Ok(self)
	}

	/// Returns the tenant's client, creating it on first use.
	///
	/// Fails when a different descriptor already registered the same tenant with another
	/// endpoint or other credentials.
	pub fn client_for(
		&self,
		descriptor: &Arc<TelcoDescriptor>,
	) -> Result<Arc<TelcoClient>, ConfigError> {
		if let Some(client) = self.clients.read().get(&descriptor.tenant) {
			return check_same_upstream(client, descriptor);
		}

		let mut clients = self.clients.write();

		if let Some(client) = clients.get(&descriptor.tenant) {
			return check_same_upstream(client, descriptor);
		}

		let client = Arc::new(TelcoClient::new(
			descriptor.clone(),
			&self.settings,
			self.http.clone(),
			self.clock.clone(),
		)?);

		tracing::info!(
			tenant = %descriptor.tenant,
			base_url = %descriptor.base_url,
			"registered telco upstream client"
		);
		clients.insert(descriptor.tenant.clone(), client.clone());

		Ok(client)
	}

	/// Returns the client registered for `tenant`, if any.
	pub fn get(&self, tenant: &TenantId) -> Option<Arc<TelcoClient>> {
		self.clients.read().get(tenant).cloned()
	}

	/// Number of registered tenants.
	pub fn len(&self) -> usize {
		self.clients.read().len()
	}

	/// Returns true when no tenant is registered.
	pub fn is_empty(&self) -> bool {
		self.clients.read().is_empty()
	}
}
impl Debug for TelcoRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TelcoRegistry").field("tenants", &self.len()).finish()
	}
}

fn check_same_upstream(
	client: &Arc<TelcoClient>,
	descriptor: &TelcoDescriptor,
) -> Result<Arc<TelcoClient>, ConfigError> {
	if client.descriptor().same_upstream(descriptor) {
		Ok(client.clone())
	} else {
		Err(ConfigError::ConflictingTenant { tenant: descriptor.tenant.to_string() })
	}
}
