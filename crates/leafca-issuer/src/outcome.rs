// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuance outcomes — an immutable value the caller applies to its own state.

use leafca_core::error::LeafcaError;
use leafca_core::types::Condition;
use leafca_pki::SignedCertificate;

/// Progress of a single issuance. A failed outcome records the last stage
/// that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    KeyResolved,
    CaResolved,
    Signed,
    Encoded,
}

/// Artifacts of a successful issuance.
#[derive(Clone)]
pub struct IssuedCertificate {
    /// Subject private key, PKCS#1 PEM.
    pub private_key_pem: Vec<u8>,
    /// Signed certificate, PEM `CERTIFICATE` block.
    pub certificate_pem: Vec<u8>,
    pub certificate: SignedCertificate,
    /// The store had no subject key and a new one was generated. The caller
    /// must persist `private_key_pem` or the next issuance will rotate it.
    pub key_generated: bool,
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("private_key_pem", &"<redacted>")
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("certificate", &self.certificate)
            .field("key_generated", &self.key_generated)
            .finish()
    }
}

#[derive(Debug)]
pub enum IssuanceOutcome {
    Issued {
        condition: Condition,
        certificate: IssuedCertificate,
    },
    Failed {
        condition: Condition,
        stage: Stage,
        error: LeafcaError,
    },
}

impl IssuanceOutcome {
    pub fn condition(&self) -> &Condition {
        match self {
            Self::Issued { condition, .. } | Self::Failed { condition, .. } => condition,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Issued { .. })
    }

    pub fn private_key_pem(&self) -> Option<&[u8]> {
        match self {
            Self::Issued { certificate, .. } => Some(&certificate.private_key_pem),
            Self::Failed { .. } => None,
        }
    }

    pub fn certificate_pem(&self) -> Option<&[u8]> {
        match self {
            Self::Issued { certificate, .. } => Some(&certificate.certificate_pem),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&LeafcaError> {
        match self {
            Self::Issued { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Drop the condition and keep only the artifacts or the error.
    pub fn into_result(self) -> Result<IssuedCertificate, LeafcaError> {
        match self {
            Self::Issued { certificate, .. } => Ok(certificate),
            Self::Failed { error, .. } => Err(error),
        }
    }
}
