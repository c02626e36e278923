// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate template — the unsigned description of a leaf certificate.

use chrono::{DateTime, Utc};
use leafca_core::config::IssuerConfig;
use leafca_core::error::{LeafcaError, Result};
use leafca_core::types::CertificateRequest;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

use crate::keys::{KeyAlgorithm, PublicKey};

/// Serial numbers are 128 random bits.
pub const SERIAL_NUMBER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha256WithRsa,
}

impl SignatureAlgorithm {
    /// The signature algorithm a CA key of `algorithm` signs with.
    pub fn for_key(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Rsa => Self::Sha256WithRsa,
        }
    }
}

/// Key usages a leaf may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    DigitalSignature,
}

#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    pub serial_number: [u8; SERIAL_NUMBER_LEN],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub organization: String,
    pub common_name: String,
    /// Subject alternative names, in request order.
    pub dns_names: Vec<String>,
    pub signature_algorithm: SignatureAlgorithm,
    pub key_usage: KeyUsage,
    /// Always false for leaves; emitted as a valid basicConstraints CA:FALSE.
    pub is_ca: bool,
    pub public_key: PublicKey,
}

/// Build the template for `request`, valid from `now` for the configured
/// duration.
///
/// The signature algorithm follows the subject key's algorithm; the signer
/// rejects the template if the CA key cannot produce it.
#[instrument(skip_all, fields(common_name = request.common_name().unwrap_or_default()))]
pub fn build_template(
    request: &CertificateRequest,
    public_key: PublicKey,
    config: &IssuerConfig,
    now: DateTime<Utc>,
) -> Result<CertificateTemplate> {
    request.validate()?;
    let common_name = request
        .common_name()
        .ok_or_else(|| LeafcaError::InvalidRequest("no DNS names".into()))?
        .to_owned();

    let serial_number = random_serial()?;

    let duration = chrono::Duration::from_std(config.certificate_duration).map_err(|e| {
        LeafcaError::TemplateConstruction(format!("certificate duration out of range: {e}"))
    })?;
    let not_after = now.checked_add_signed(duration).ok_or_else(|| {
        LeafcaError::TemplateConstruction("certificate expiry overflows the calendar".into())
    })?;

    debug!(serial = %hex::encode(serial_number), %not_after, "template built");

    Ok(CertificateTemplate {
        serial_number,
        not_before: now,
        not_after,
        organization: config.organization.clone(),
        common_name,
        dns_names: request.dns_names.clone(),
        signature_algorithm: SignatureAlgorithm::for_key(public_key.algorithm()),
        key_usage: KeyUsage::DigitalSignature,
        is_ca: false,
        public_key,
    })
}

fn random_serial() -> Result<[u8; SERIAL_NUMBER_LEN]> {
    let mut serial = [0u8; SERIAL_NUMBER_LEN];
    SystemRandom::new().fill(&mut serial).map_err(|_| {
        LeafcaError::TemplateConstruction("failed to generate serial number".into())
    })?;
    Ok(serial)
}
