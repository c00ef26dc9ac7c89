//! # Assertion Parsing and Validation
//!
//! Pull-parses a `samlp:Response` and validates it against the provider
//! registration: success status, expected issuer, pinned certificate,
//! audience restriction, validity window, and the single-use
//! `InResponseTo` correlation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::identity::state::RelayState;
use crate::identity::types::{IdentityConfig, Profile};
use crate::invalid;
use crate::oauth::ProviderConfig;

/// The parts of a `samlp:Response` the service provider acts on.
#[derive(Clone, Debug, Default)]
pub struct Assertion {
    /// `InResponseTo` attribute of the response element.
    pub in_response_to: Option<String>,

    /// `Value` of the `StatusCode` element.
    pub status_code: Option<String>,

    /// Asserting party's entity id.
    pub issuer: Option<String>,

    /// Subject `NameID`.
    pub name_id: Option<String>,

    /// `Conditions/@NotBefore`.
    pub not_before: Option<DateTime<Utc>>,

    /// `Conditions/@NotOnOrAfter`.
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// `AudienceRestriction/Audience`.
    pub audience: Option<String>,

    /// Base64 DER certificate embedded in the signature.
    pub certificate: Option<String>,

    /// Attribute statement, multi-valued.
    pub attributes: BTreeMap<String, Vec<String>>,
}

/// Parse a decoded `samlp:Response` document.
///
/// # Errors
///
/// Returns `invalid_request` when the document is not well-formed XML.
pub fn parse(xml: &str) -> Result<Assertion> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut assertion = Assertion::default();
    let mut element = String::new();
    let mut attribute_name: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                element = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match element.as_str() {
                    "Response" => {
                        assertion.in_response_to = attr(&e, "InResponseTo");
                    }
                    "StatusCode" => {
                        assertion.status_code = attr(&e, "Value");
                    }
                    "Conditions" => {
                        assertion.not_before = attr(&e, "NotBefore").and_then(|v| timestamp(&v));
                        assertion.not_on_or_after =
                            attr(&e, "NotOnOrAfter").and_then(|v| timestamp(&v));
                    }
                    "Attribute" => {
                        attribute_name = attr(&e, "Name");
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let Ok(text) = t.unescape() else {
                    continue;
                };
                let text = text.trim().to_string();
                match element.as_str() {
                    // the response-level issuer arrives first; keep it
                    "Issuer" => {
                        if assertion.issuer.is_none() {
                            assertion.issuer = Some(text);
                        }
                    }
                    "NameID" => assertion.name_id = Some(text),
                    "Audience" => assertion.audience = Some(text),
                    "X509Certificate" => {
                        assertion.certificate =
                            Some(text.split_whitespace().collect::<String>());
                    }
                    "AttributeValue" => {
                        if let Some(name) = &attribute_name {
                            assertion.attributes.entry(name.clone()).or_default().push(text);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Attribute" {
                    attribute_name = None;
                }
                element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(invalid!("malformed SAML response: {e}")),
            Ok(_) => {}
        }
    }

    Ok(assertion)
}

fn attr(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
}

impl Assertion {
    /// Validate the assertion against the provider registration and the
    /// stored relay state. Failures deliberately do not reveal which
    /// check rejected the response.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for any failed check.
    pub fn verify(
        &self, registration: &ProviderConfig, config: &IdentityConfig, relay: &RelayState,
    ) -> Result<()> {
        tracing::debug!("assertion::verify");

        let rejected = || Error::InvalidRequest("assertion rejected".to_string());

        if !self.status_code.as_deref().unwrap_or_default().ends_with(":Success") {
            tracing::warn!(provider = %registration.id, "SAML status is not success");
            return Err(rejected());
        }

        if let Some(entity_id) = &registration.entity_id {
            if self.issuer.as_deref() != Some(entity_id) {
                tracing::warn!(provider = %registration.id, "SAML issuer mismatch");
                return Err(rejected());
            }
        }

        // the embedded certificate must match the pinned registration
        let Some(pinned) = &registration.certificate else {
            tracing::warn!(provider = %registration.id, "no pinned certificate");
            return Err(rejected());
        };
        let pinned: String = pinned
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect::<String>()
            .split_whitespace()
            .collect();
        if self.certificate.as_deref() != Some(pinned.as_str()) {
            tracing::warn!(provider = %registration.id, "SAML certificate mismatch");
            return Err(rejected());
        }

        if !config.sp_entity_id.is_empty() {
            if let Some(audience) = &self.audience {
                if audience != &config.sp_entity_id {
                    tracing::warn!(provider = %registration.id, "SAML audience mismatch");
                    return Err(rejected());
                }
            }
        }

        let now = Utc::now();
        if self.not_before.is_some_and(|nb| now < nb)
            || self.not_on_or_after.is_some_and(|na| now >= na)
        {
            tracing::warn!(provider = %registration.id, "SAML assertion outside validity window");
            return Err(rejected());
        }

        if self.in_response_to.as_deref() != Some(relay.request_id.as_str()) {
            tracing::warn!(provider = %registration.id, "SAML InResponseTo mismatch");
            return Err(rejected());
        }

        Ok(())
    }

    /// Map assertion attributes to a provider profile. The subject
    /// `NameID` becomes the provider-scoped id.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` when the assertion carries no subject.
    pub fn to_profile(&self) -> Result<Profile> {
        let Some(name_id) = &self.name_id else {
            return Err(invalid!("assertion has no subject"));
        };

        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| self.attributes.get(*n))
                .and_then(|vs| vs.first())
                .cloned()
        };

        Ok(Profile {
            provider_id: name_id.clone(),
            name: first(&["displayName", "name", "cn"]).unwrap_or_else(|| name_id.clone()),
            email: first(&["email", "mail"]),
            groups: self
                .attributes
                .get("groups")
                .or_else(|| self.attributes.get("memberOf"))
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RESPONSE: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="r1" InResponseTo="id-abc" Version="2.0">
  <saml:Issuer>https://idp.example.com</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>
  <saml:Assertion ID="a1" Version="2.0">
    <saml:Issuer>https://idp.example.com</saml:Issuer>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
      <ds:KeyInfo><ds:X509Data><ds:X509Certificate>MIICert==</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
    </ds:Signature>
    <saml:Subject><saml:NameID>alice@example.com</saml:NameID></saml:Subject>
    <saml:Conditions NotBefore="2020-01-01T00:00:00Z" NotOnOrAfter="2099-01-01T00:00:00Z">
      <saml:AudienceRestriction><saml:Audience>urn:tmi:sp</saml:Audience></saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AttributeStatement>
      <saml:Attribute Name="displayName"><saml:AttributeValue>Alice</saml:AttributeValue></saml:Attribute>
      <saml:Attribute Name="groups">
        <saml:AttributeValue>engineering</saml:AttributeValue>
        <saml:AttributeValue>security</saml:AttributeValue>
      </saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#;

    #[test]
    fn parses_response() {
        let assertion = parse(RESPONSE).unwrap();
        assert_eq!(assertion.in_response_to.as_deref(), Some("id-abc"));
        assert_eq!(assertion.issuer.as_deref(), Some("https://idp.example.com"));
        assert_eq!(assertion.name_id.as_deref(), Some("alice@example.com"));
        assert_eq!(assertion.audience.as_deref(), Some("urn:tmi:sp"));
        assert_eq!(assertion.certificate.as_deref(), Some("MIICert=="));
        assert_eq!(assertion.attributes["groups"].len(), 2);
    }

    #[test]
    fn profile_from_attributes() {
        let assertion = parse(RESPONSE).unwrap();
        let profile = assertion.to_profile().unwrap();
        assert_eq!(profile.provider_id, "alice@example.com");
        assert_eq!(profile.name, "Alice");
        assert!(profile.groups.contains("security"));
    }
}
