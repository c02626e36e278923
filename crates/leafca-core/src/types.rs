// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for leafca: requests and status conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LeafcaError, Result};

/// Prefix of the condition message when subject key material is unavailable.
pub const MESSAGE_ERROR_GET_CERT_KEY_PAIR: &str = "Error getting keypair for certificate: ";
/// Prefix of the condition message when signing fails.
pub const MESSAGE_ERROR_ISSUE_CERT: &str = "Error issuing TLS certificate: ";
/// Condition message for a successful issuance.
pub const MESSAGE_CERT_ISSUED: &str = "Certificate issued successfully";

/// Location of a piece of key material in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl SecretRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A request for one leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Subject names. The first one becomes the Common Name; all of them
    /// become DNS subject alternative names, in order.
    pub dns_names: Vec<String>,
    /// Where the subject's private key lives (or will live).
    pub secret_ref: SecretRef,
    /// Where the signing CA's certificate and key live.
    pub ca_ref: SecretRef,
}

impl CertificateRequest {
    /// Build a request, rejecting an empty DNS-name list.
    pub fn new(dns_names: Vec<String>, secret_ref: SecretRef, ca_ref: SecretRef) -> Result<Self> {
        let request = Self {
            dns_names,
            secret_ref,
            ca_ref,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check invariants that deserialised requests may have skipped.
    pub fn validate(&self) -> Result<()> {
        if self.dns_names.is_empty() {
            return Err(LeafcaError::InvalidRequest(
                "at least one DNS name is required".into(),
            ));
        }
        match self.dns_names.iter().position(|name| name.trim().is_empty()) {
            Some(index) => Err(LeafcaError::InvalidRequest(format!(
                "DNS name {index} is blank"
            ))),
            None => Ok(()),
        }
    }

    /// The Common Name for the subject, if the request has any names.
    pub fn common_name(&self) -> Option<&str> {
        self.dns_names.first().map(String::as_str)
    }
}

/// The only condition type an issuance reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

/// Stable machine-readable reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    /// Certificate signed and encoded.
    CertIssueSuccess,
    /// Subject key could not be loaded or generated.
    ErrGetCertKeyPair,
    /// CA material, template, signing, or encoding failed.
    ErrIssueCert,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CertIssueSuccess => "CertIssueSuccess",
            Self::ErrGetCertKeyPair => "ErrGetCertKeyPair",
            Self::ErrIssueCert => "ErrIssueCert",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status condition describing the result of one issuance. Callers apply it
/// to their own copy of the certificate resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: Reason,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// `Ready=True` with the success reason and message.
    pub fn ready(at: DateTime<Utc>) -> Self {
        Self {
            condition_type: ConditionType::Ready,
            status: ConditionStatus::True,
            reason: Reason::CertIssueSuccess,
            message: MESSAGE_CERT_ISSUED.to_owned(),
            last_transition_time: at,
        }
    }

    /// `Ready=False` for a failed issuance; `message` carries the cause.
    pub fn not_ready(reason: Reason, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            condition_type: ConditionType::Ready,
            status: ConditionStatus::False,
            reason,
            message: message.into(),
            last_transition_time: at,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ConditionStatus::True
    }
}
