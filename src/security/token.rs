//! Bearer token verification and issuance.
//!
//! # Responsibilities
//! - Verify JWT signature, issuer, audience and validity window
//! - Expose the verified claim set as an immutable `Claims` map
//! - Sign tokens for successful logins when a private key is configured
//!
//! # Design Decisions
//! - Zero leeway: `nbf <= now <= exp` against the server clock
//! - Key material is read once at boot; a missing or unreadable key turns
//!   the feature off instead of aborting startup
//! - No caching of validation results

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use thiserror::Error;

use crate::config::JwtConfig;
use crate::error::GateError;

/// Claim whose check failed during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Issuer,
    Audience,
    Expiry,
    NotBefore,
    MissingClaim,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Constraint::Issuer => "issuer",
            Constraint::Audience => "audience",
            Constraint::Expiry => "expiry",
            Constraint::NotBefore => "not_before",
            Constraint::MissingClaim => "missing_claim",
        };
        f.write_str(name)
    }
}

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("constraint violated: {0}")]
    ConstraintViolation(Constraint),
}

impl AuthError {
    /// Metric label for this failure.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed",
            AuthError::InvalidSignature => "signature",
            AuthError::ConstraintViolation(Constraint::Issuer) => "issuer",
            AuthError::ConstraintViolation(Constraint::Audience) => "audience",
            AuthError::ConstraintViolation(Constraint::Expiry) => "expired",
            AuthError::ConstraintViolation(Constraint::NotBefore) => "not_before",
            AuthError::ConstraintViolation(Constraint::MissingClaim) => "missing_claim",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                AuthError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => AuthError::ConstraintViolation(Constraint::Expiry),
            ErrorKind::ImmatureSignature => AuthError::ConstraintViolation(Constraint::NotBefore),
            ErrorKind::InvalidIssuer => AuthError::ConstraintViolation(Constraint::Issuer),
            ErrorKind::InvalidAudience => AuthError::ConstraintViolation(Constraint::Audience),
            ErrorKind::MissingRequiredClaim(_) => {
                AuthError::ConstraintViolation(Constraint::MissingClaim)
            }
            _ => AuthError::MalformedToken,
        }
    }
}

/// Verified claim set, attached to request extensions by the auth stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(Arc<BTreeMap<String, Value>>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The `sub` claim, when it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Verifies bearer tokens against one key and one issuer/audience pair.
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(key: DecodingKey, algorithm: Algorithm, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        Self { key, validation }
    }

    /// Build the validator from configuration.
    ///
    /// Returns `None` (and logs why) when no public key is configured or the
    /// key cannot be used, which leaves protected routes unauthenticated.
    pub fn from_config(config: &JwtConfig) -> Option<Self> {
        let Some(path) = config.public_key_path.as_deref() else {
            tracing::warn!("No JWT public key configured, bearer authentication disabled");
            return None;
        };

        match Self::load(config, path) {
            Ok(validator) => {
                tracing::info!(
                    key_path = %path,
                    algorithm = %config.algorithm,
                    issuer = %config.issuer,
                    "Bearer authentication enabled"
                );
                Some(validator)
            }
            Err(e) => {
                tracing::error!(
                    key_path = %path,
                    error = %e,
                    "Unusable JWT public key, bearer authentication disabled"
                );
                None
            }
        }
    }

    fn load(config: &JwtConfig, path: &str) -> Result<Self, GateError> {
        let algorithm = parse_algorithm(&config.algorithm)?;
        let material = read_key_material(path)?;
        let key = decoding_key(algorithm, &material)?;
        Ok(Self::new(key, algorithm, &config.issuer, &config.audience))
    }

    /// Validate a compact JWT. Either every check passes or the token is rejected.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<BTreeMap<String, Value>>(
            token,
            &self.key,
            &self.validation,
        )?;
        Ok(Claims(Arc::new(data.claims)))
    }
}

/// Signs tokens the matching `TokenValidator` accepts.
pub struct TokenIssuer {
    key: EncodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        key: EncodingKey,
        algorithm: Algorithm,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            key,
            algorithm,
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
        }
    }

    /// Build the issuer from configuration. `None` when no private key is usable.
    pub fn from_config(config: &JwtConfig) -> Option<Self> {
        let path = config.private_key_path.as_deref()?;

        let loaded = parse_algorithm(&config.algorithm).and_then(|algorithm| {
            let material = read_key_material(path)?;
            let key = encoding_key(algorithm, &material)?;
            Ok(Self::new(
                key,
                algorithm,
                config.issuer.clone(),
                config.audience.clone(),
                Duration::from_secs(config.ttl_secs),
            ))
        });

        match loaded {
            Ok(issuer) => {
                tracing::info!(key_path = %path, "Token issuance enabled");
                Some(issuer)
            }
            Err(e) => {
                tracing::error!(
                    key_path = %path,
                    error = %e,
                    "Unusable JWT private key, token issuance disabled"
                );
                None
            }
        }
    }

    /// Sign a token for `subject` valid from now for the configured ttl.
    pub fn issue(&self, subject: &str) -> Result<String, GateError> {
        let now = chrono::Utc::now().timestamp();
        let exp = now + self.ttl.as_secs() as i64;
        let claims = serde_json::json!({
            "sub": subject,
            "iss": self.issuer,
            "aud": self.audience,
            "iat": now,
            "nbf": now,
            "exp": exp,
        });

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.key)
            .map_err(|e| GateError::Internal(format!("token signing failed: {e}")))
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, GateError> {
    Algorithm::from_str(name)
        .map_err(|_| GateError::Configuration(format!("unsupported JWT algorithm {name}")))
}

fn read_key_material(path: &str) -> Result<Vec<u8>, GateError> {
    std::fs::read(path)
        .map_err(|e| GateError::Configuration(format!("cannot read key file {path}: {e}")))
}

fn decoding_key(algorithm: Algorithm, material: &[u8]) -> Result<DecodingKey, GateError> {
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(material.trim_ascii()))
        }
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(material),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(material),
        _ => DecodingKey::from_rsa_pem(material),
    };
    key.map_err(|e| GateError::Configuration(format!("invalid verification key: {e}")))
}

fn encoding_key(algorithm: Algorithm, material: &[u8]) -> Result<EncodingKey, GateError> {
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(EncodingKey::from_secret(material.trim_ascii()))
        }
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(material),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(material),
        _ => EncodingKey::from_rsa_pem(material),
    };
    key.map_err(|e| GateError::Configuration(format!("invalid signing key: {e}")))
}
