//! # SAML 2.0 Service Provider
//!
//! SAML bindings analogous to the OAuth flow: `login` builds a deflated
//! redirect-binding `AuthnRequest`, `acs` consumes the posted assertion
//! and mints tokens exactly as the OAuth callback does, `slo` ends the
//! session, and `metadata` serves the SP descriptor.

pub(crate) mod acs;
pub(crate) mod assertion;
pub(crate) mod login;
pub(crate) mod metadata;
pub(crate) mod slo;
