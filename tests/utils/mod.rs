//! In-memory provider implementation shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tmi_core::authz::{AdminGrant, AdminStore, GranteeRef};
use tmi_core::core::generate;
use tmi_core::identity::client::AuthorizeRequestBuilder;
use tmi_core::identity::endpoint;
use tmi_core::identity::provider::{Blocklist, Idp, Keyring, Metadata, StateStore, Subject};
use tmi_core::identity::types::{
    CallbackRequest, CallbackResponse, IdentityConfig, IdpTokens, IssuedToken, Principal, Profile,
};
use tmi_core::oauth::{ProviderConfig, ProviderKind, TokenGrant};
use tmi_core::resource::provider::{ResourceStore, SessionGate};
use tmi_core::resource::types::{Diagram, ThreatModel};
use uuid::Uuid;

/// The OAuth/OIDC test provider id.
pub const OAUTH_PROVIDER: &str = "test";

/// The SAML test provider id.
pub const SAML_PROVIDER: &str = "saml-test";

/// Entity id of the SAML test IdP.
pub const IDP_ENTITY_ID: &str = "https://idp.example.com";

/// Certificate pinned for the SAML test provider.
pub const IDP_CERTIFICATE: &str = "MIITestCertificate0123456789==";

/// The SP entity id used in test configuration.
pub const SP_ENTITY_ID: &str = "urn:tmi:sp";

/// Registered prefix for client callbacks.
pub const CLIENT_PREFIX: &str = "https://app.example.com";

const KEY_SEED: [u8; 32] = [7; 32];

#[derive(Clone)]
pub struct ProviderImpl {
    config: Arc<Mutex<IdentityConfig>>,
    registrations: Vec<ProviderConfig>,
    state: Arc<Mutex<HashMap<String, (Value, DateTime<Utc>)>>>,
    blocked: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    principals: Arc<Mutex<HashMap<Uuid, Principal>>>,
    issued: Arc<Mutex<HashMap<Uuid, Vec<IssuedToken>>>>,
    codes: Arc<Mutex<HashMap<String, Profile>>>,
    threat_models: Arc<Mutex<HashMap<Uuid, ThreatModel>>>,
    diagrams: Arc<Mutex<HashMap<Uuid, Diagram>>>,
    grants: Arc<Mutex<Vec<AdminGrant>>>,
    fail_diagram_puts: Arc<AtomicBool>,
    signing: SigningKey,
}

impl ProviderImpl {
    pub fn new() -> Self {
        let registrations = vec![
            ProviderConfig {
                id: OAUTH_PROVIDER.to_string(),
                name: "Test IdP".to_string(),
                kind: ProviderKind::Oidc,
                client_id: "tmi-client".to_string(),
                client_secret: None,
                authorization_endpoint: "https://idp.test/authorize".to_string(),
                token_endpoint: "https://idp.test/token".to_string(),
                userinfo_endpoint: "https://idp.test/userinfo".to_string(),
                redirect_prefix: CLIENT_PREFIX.to_string(),
                entity_id: None,
                slo_endpoint: None,
                certificate: None,
            },
            ProviderConfig {
                id: SAML_PROVIDER.to_string(),
                name: "Test SAML IdP".to_string(),
                kind: ProviderKind::Saml2,
                authorization_endpoint: format!("{IDP_ENTITY_ID}/sso"),
                entity_id: Some(IDP_ENTITY_ID.to_string()),
                slo_endpoint: Some(format!("{IDP_ENTITY_ID}/slo")),
                certificate: Some(IDP_CERTIFICATE.to_string()),
                ..ProviderConfig::default()
            },
        ];

        let config = IdentityConfig {
            access_ttl_secs: 3600,
            refresh_ttl_secs: 30 * 24 * 3600,
            provider_timeout_secs: 2,
            callback_url: "https://tmi.example.com/oauth2/callback".to_string(),
            sp_entity_id: SP_ENTITY_ID.to_string(),
            acs_url: "https://tmi.example.com/saml/acs".to_string(),
        };

        Self {
            config: Arc::new(Mutex::new(config)),
            registrations,
            state: Arc::new(Mutex::new(HashMap::new())),
            blocked: Arc::new(Mutex::new(HashMap::new())),
            principals: Arc::new(Mutex::new(HashMap::new())),
            issued: Arc::new(Mutex::new(HashMap::new())),
            codes: Arc::new(Mutex::new(HashMap::new())),
            threat_models: Arc::new(Mutex::new(HashMap::new())),
            diagrams: Arc::new(Mutex::new(HashMap::new())),
            grants: Arc::new(Mutex::new(vec![])),
            fail_diagram_puts: Arc::new(AtomicBool::new(false)),
            signing: SigningKey::from_bytes(&KEY_SEED),
        }
    }

    /// Register an authorization code with the fake IdP.
    pub fn register_code(&self, code: &str, profile: &Profile) {
        self.codes.lock().expect("should lock").insert(code.to_string(), profile.clone());
    }

    /// Shorten the access token lifetime (negative values mint
    /// already-expired tokens).
    pub fn set_access_ttl(&self, secs: i64) {
        self.config.lock().expect("should lock").access_ttl_secs = secs;
    }

    /// Make diagram writes fail, exercising the rejected-server path.
    pub fn set_fail_diagram_puts(&self, fail: bool) {
        self.fail_diagram_puts.store(fail, Ordering::SeqCst);
    }

    /// Find a principal by provider-scoped id.
    pub fn principal_of(&self, provider_id: &str) -> Principal {
        self.principals
            .lock()
            .expect("should lock")
            .values()
            .find(|p| p.provider_id == provider_id)
            .cloned()
            .expect("principal should exist")
    }
}

impl Metadata for ProviderImpl {
    async fn providers(&self) -> Result<Vec<ProviderConfig>> {
        Ok(self.registrations.clone())
    }

    async fn provider(&self, provider_id: &str) -> Result<ProviderConfig> {
        self.registrations
            .iter()
            .find(|p| p.id == provider_id)
            .cloned()
            .ok_or_else(|| anyhow!("provider not found: {provider_id}"))
    }

    async fn config(&self) -> Result<IdentityConfig> {
        Ok(self.config.lock().expect("should lock").clone())
    }
}

impl StateStore for ProviderImpl {
    async fn put(
        &self, key: &str, state: &(impl Serialize + Sync), expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let value = serde_json::to_value(state)?;
        self.state.lock().expect("should lock").insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let guard = self.state.lock().expect("should lock");
        let Some((value, expires_at)) = guard.get(key) else {
            return Err(anyhow!("state not found: {key}"));
        };
        if *expires_at < Utc::now() {
            return Err(anyhow!("state expired: {key}"));
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.state.lock().expect("should lock").remove(key);
        Ok(())
    }
}

impl Blocklist for ProviderImpl {
    async fn block(&self, fingerprint: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.blocked
            .lock()
            .expect("should lock")
            .entry(fingerprint.to_string())
            .or_insert(expires_at);
        Ok(())
    }

    async fn blocked(&self, fingerprint: &str) -> Result<bool> {
        let guard = self.blocked.lock().expect("should lock");
        Ok(guard.get(fingerprint).is_some_and(|expires_at| *expires_at > Utc::now()))
    }
}

impl Subject for ProviderImpl {
    async fn upsert(&self, principal: &Principal) -> Result<Principal> {
        let mut guard = self.principals.lock().expect("should lock");

        let existing = guard
            .values()
            .find(|p| p.provider == principal.provider && p.provider_id == principal.provider_id)
            .map(|p| p.id);

        let stored = match existing {
            Some(id) => {
                let record = guard.get_mut(&id).expect("record should exist");
                record.name = principal.name.clone();
                record.email = principal.email.clone();
                record.groups = principal.groups.clone();
                record.clone()
            }
            None => {
                let mut record = principal.clone();
                record.id = Uuid::new_v4();
                guard.insert(record.id, record.clone());
                record
            }
        };
        Ok(stored)
    }

    async fn principal(&self, id: Uuid) -> Result<Option<Principal>> {
        Ok(self.principals.lock().expect("should lock").get(&id).cloned())
    }

    async fn record_token(&self, principal_id: Uuid, token: &IssuedToken) -> Result<()> {
        self.issued
            .lock()
            .expect("should lock")
            .entry(principal_id)
            .or_default()
            .push(token.clone());
        Ok(())
    }

    async fn issued_tokens(&self, principal_id: Uuid) -> Result<Vec<IssuedToken>> {
        Ok(self.issued.lock().expect("should lock").get(&principal_id).cloned().unwrap_or_default())
    }
}

impl Idp for ProviderImpl {
    async fn exchange_code(
        &self, _provider: &ProviderConfig, code: &str, verifier: &str,
    ) -> Result<IdpTokens> {
        if verifier.is_empty() {
            return Err(anyhow!("missing PKCE verifier"));
        }
        if !self.codes.lock().expect("should lock").contains_key(code) {
            return Err(anyhow!("unknown code"));
        }
        Ok(IdpTokens {
            access_token: format!("idp-{code}"),
            refresh_token: None,
            id_token: None,
        })
    }

    async fn fetch_profile(
        &self, _provider: &ProviderConfig, access_token: &str,
    ) -> Result<Profile> {
        let code = access_token
            .strip_prefix("idp-")
            .ok_or_else(|| anyhow!("unknown access token"))?;
        self.codes
            .lock()
            .expect("should lock")
            .get(code)
            .cloned()
            .ok_or_else(|| anyhow!("unknown access token"))
    }
}

impl Keyring for ProviderImpl {
    async fn signing_key(&self) -> Result<SigningKey> {
        Ok(self.signing.clone())
    }

    async fn verifying_key(&self) -> Result<VerifyingKey> {
        Ok(self.signing.verifying_key())
    }
}

impl ResourceStore for ProviderImpl {
    async fn threat_model(&self, id: Uuid) -> Result<Option<ThreatModel>> {
        Ok(self.threat_models.lock().expect("should lock").get(&id).cloned())
    }

    async fn put_threat_model(&self, threat_model: &ThreatModel) -> Result<()> {
        self.threat_models
            .lock()
            .expect("should lock")
            .insert(threat_model.id, threat_model.clone());
        Ok(())
    }

    async fn delete_threat_model(&self, id: Uuid) -> Result<()> {
        self.threat_models.lock().expect("should lock").remove(&id);
        // cascade children
        self.diagrams.lock().expect("should lock").retain(|_, d| d.threat_model_id != id);
        Ok(())
    }

    async fn diagrams(&self, threat_model_id: Uuid) -> Result<Vec<Diagram>> {
        Ok(self
            .diagrams
            .lock()
            .expect("should lock")
            .values()
            .filter(|d| d.threat_model_id == threat_model_id)
            .cloned()
            .collect())
    }

    async fn diagram(&self, id: Uuid) -> Result<Option<Diagram>> {
        Ok(self.diagrams.lock().expect("should lock").get(&id).cloned())
    }

    async fn put_diagram(&self, diagram: &Diagram, expected_vector: Option<u64>) -> Result<()> {
        if self.fail_diagram_puts.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable"));
        }
        if !self
            .threat_models
            .lock()
            .expect("should lock")
            .contains_key(&diagram.threat_model_id)
        {
            return Err(anyhow!("orphan diagram: parent threat model does not exist"));
        }

        let mut guard = self.diagrams.lock().expect("should lock");
        if let Some(expected) = expected_vector {
            if let Some(stored) = guard.get(&diagram.id) {
                if stored.update_vector != expected {
                    return Err(anyhow!("update_vector conflict"));
                }
            }
        }
        guard.insert(diagram.id, diagram.clone());
        Ok(())
    }

    async fn delete_diagram(&self, id: Uuid) -> Result<()> {
        self.diagrams.lock().expect("should lock").remove(&id);
        Ok(())
    }
}

impl AdminStore for ProviderImpl {
    async fn grants(&self) -> Result<Vec<AdminGrant>> {
        Ok(self.grants.lock().expect("should lock").clone())
    }

    async fn put_grant(&self, grant: &AdminGrant) -> Result<()> {
        self.grants.lock().expect("should lock").push(grant.clone());
        Ok(())
    }

    async fn delete_grant(&self, grantee: &GranteeRef) -> Result<()> {
        self.grants.lock().expect("should lock").retain(|g| &g.grantee != grantee);
        Ok(())
    }
}

/// A gate with no sessions, for tests exercising REST operations without
/// the hub.
pub struct NoSessions;

impl SessionGate for NoSessions {
    fn has_active_session(&self, _diagram_id: Uuid) -> bool {
        false
    }
}

/// Drive a full OAuth login for `user`, returning the minted grant.
pub async fn login(provider: &ProviderImpl, user: &str) -> TokenGrant {
    login_with_groups(provider, user, &[]).await
}

/// Drive a full OAuth login for `user` carrying group memberships.
pub async fn login_with_groups(
    provider: &ProviderImpl, user: &str, groups: &[&str],
) -> TokenGrant {
    let code = generate::auth_code();
    provider.register_code(&code, &Profile {
        provider_id: user.to_string(),
        name: user.to_string(),
        email: Some(format!("{user}@example.com")),
        groups: groups.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
    });

    let request = AuthorizeRequestBuilder::new()
        .provider(OAUTH_PROVIDER)
        .scope("openid")
        .login_hint(user)
        .build();
    let authorize =
        endpoint::handle(request, provider).await.expect("should begin authorization");

    let request = CallbackRequest { code, state: authorize.state.clone() };
    let response = endpoint::handle(request, provider).await.expect("should complete callback");

    match response.body {
        CallbackResponse::Grant(grant) => grant,
        CallbackResponse::Redirect(_) => panic!("expected a JSON grant"),
    }
}

/// Receive the next server message, failing fast if none arrives.
pub async fn recv(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<tmi_core::collab::ServerMessage>,
) -> tmi_core::collab::ServerMessage {
    tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("should receive a message in time")
        .expect("channel should be open")
}

/// Poll until a condition holds; the worker processes commands
/// asynchronously.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Build a base64-encoded `samlp:Response` the way the test IdP would.
pub fn saml_response(request_id: &str, name_id: &str, certificate: &str) -> String {
    let xml = format!(
        r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="r-{rid}" InResponseTo="{rid}" Version="2.0">
  <saml:Issuer>{idp}</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>
  <saml:Assertion ID="a-{rid}" Version="2.0">
    <saml:Issuer>{idp}</saml:Issuer>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
      <ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
    </ds:Signature>
    <saml:Subject><saml:NameID>{name_id}</saml:NameID></saml:Subject>
    <saml:Conditions NotBefore="2020-01-01T00:00:00Z" NotOnOrAfter="2099-01-01T00:00:00Z">
      <saml:AudienceRestriction><saml:Audience>{sp}</saml:Audience></saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AttributeStatement>
      <saml:Attribute Name="displayName"><saml:AttributeValue>{name_id}</saml:AttributeValue></saml:Attribute>
      <saml:Attribute Name="email"><saml:AttributeValue>{name_id}</saml:AttributeValue></saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#,
        rid = request_id,
        idp = IDP_ENTITY_ID,
        sp = SP_ENTITY_ID,
    );
    Base64::encode_string(xml.as_bytes())
}
