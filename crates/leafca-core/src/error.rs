// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for leafca.

use thiserror::Error;

use crate::types::Reason;

/// Failure reported by a key-material store.
///
/// `NotFound` is the only variant the issuer treats as recoverable: a missing
/// subject key is generated fresh, everything else aborts the issuance.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("access denied to {namespace}/{name}: {reason}")]
    AccessDenied {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("invalid key material in {namespace}/{name}: {reason}")]
    InvalidData {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the entry is simply absent from the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Top-level error type for all leafca operations.
#[derive(Debug, Error)]
pub enum LeafcaError {
    // -- Request --
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),

    // -- Subject key material --
    #[error("error loading certificate private key: {0}")]
    KeyRetrieval(#[source] StoreError),

    #[error("error generating private key: {0}")]
    KeyGeneration(String),

    // -- Issuance --
    #[error("error getting issuer {what}: {source}")]
    SigningInput {
        what: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("error creating x509 certificate template: {0}")]
    TemplateConstruction(String),

    #[error("error creating x509 certificate: {0}")]
    Signing(String),

    #[error("error encoding {0}")]
    Encoding(String),

    #[error("error decoding DER certificate bytes: {0}")]
    Decoding(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LeafcaError {
    /// Outcome reason reported when an issuance fails with this error.
    ///
    /// Only subject-key errors are `ErrGetCertKeyPair`; every other failure,
    /// including an unusable request, is `ErrIssueCert`.
    pub fn reason(&self) -> Reason {
        match self {
            Self::KeyRetrieval(_) | Self::KeyGeneration(_) => Reason::ErrGetCertKeyPair,
            Self::InvalidRequest(_)
            | Self::SigningInput { .. }
            | Self::TemplateConstruction(_)
            | Self::Signing(_)
            | Self::Encoding(_)
            | Self::Decoding(_)
            | Self::Io(_)
            | Self::Serialization(_) => Reason::ErrIssueCert,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeafcaError>;
