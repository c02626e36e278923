// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One year, the lifetime of every issued leaf certificate unless overridden.
pub const DEFAULT_CERTIFICATE_DURATION: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Organization written into the subject of every issued certificate.
pub const DEFAULT_ORGANIZATION: &str = "leafca";

/// Modulus size for freshly generated subject keys.
pub const DEFAULT_RSA_KEY_BITS: usize = 2048;

/// Settings applied to every issuance performed by one issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Subject organization (O=) of issued certificates.
    pub organization: String,
    /// Validity window length: not-after = not-before + this.
    pub certificate_duration: Duration,
    /// RSA modulus size used when a subject key has to be generated.
    pub rsa_key_bits: usize,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            organization: DEFAULT_ORGANIZATION.to_owned(),
            certificate_duration: DEFAULT_CERTIFICATE_DURATION,
            rsa_key_bits: DEFAULT_RSA_KEY_BITS,
        }
    }
}

impl IssuerConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
