// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuance orchestrator.
//
//   Start -> KeyResolved -> CaResolved -> Signed -> Encoded -> Issued
//
// Any stage may fail straight to `Failed`. Key-stage failures report
// `ErrGetCertKeyPair`; everything after reports `ErrIssueCert`. Nothing is
// retried here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leafca_core::clock::{Clock, SystemClock};
use leafca_core::config::IssuerConfig;
use leafca_core::error::{LeafcaError, Result};
use leafca_core::types::{
    CertificateRequest, Condition, MESSAGE_ERROR_GET_CERT_KEY_PAIR, MESSAGE_ERROR_ISSUE_CERT,
    Reason,
};
use leafca_pki::{
    CaMaterial, PrivateKey, Signer, build_template, encode_certificate_pem, encode_private_key_pem,
};
use leafca_store::KeyMaterialStore;
use tracing::{debug, info, instrument, warn};

use crate::outcome::{IssuanceOutcome, IssuedCertificate, Stage};

/// Issues leaf certificates against CA material held in `S`.
///
/// Stateless across calls: concurrent `issue` calls share nothing but the
/// store, and two calls for the same subject are not deduplicated.
#[derive(Debug)]
pub struct Issuer<S> {
    store: S,
    config: IssuerConfig,
    clock: Arc<dyn Clock>,
}

impl<S: KeyMaterialStore> Issuer<S> {
    pub fn new(store: S, config: IssuerConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock, e.g. with a `FixedClock` in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issue one certificate for `request`.
    #[instrument(skip_all, fields(secret = %request.secret_ref, ca = %request.ca_ref))]
    pub fn issue(&self, request: &CertificateRequest) -> IssuanceOutcome {
        let now = self.clock.now();

        if let Err(error) = request.validate() {
            return failed(Stage::Start, error, now);
        }

        let (subject_key, key_generated) = match self.resolve_subject_key(request) {
            Ok(resolved) => resolved,
            Err(error) => return failed(Stage::Start, error, now),
        };

        let mut stage = Stage::KeyResolved;
        match self.obtain_certificate(request, &subject_key, key_generated, now, &mut stage) {
            Ok(certificate) => {
                info!(
                    common_name = %certificate.certificate.common_name,
                    serial = %certificate.certificate.serial,
                    fingerprint = %certificate.certificate.fingerprint,
                    key_generated,
                    "certificate issued"
                );
                IssuanceOutcome::Issued {
                    condition: Condition::ready(now),
                    certificate,
                }
            }
            Err(error) => failed(stage, error, now),
        }
    }

    /// Load the subject key, generating one only when the store has none.
    fn resolve_subject_key(&self, request: &CertificateRequest) -> Result<(PrivateKey, bool)> {
        match self.store.load_private_key(&request.secret_ref) {
            Ok(key) => {
                debug!(bits = key.bits(), "reusing stored subject key");
                Ok((key, false))
            }
            Err(e) if e.is_not_found() => {
                debug!(bits = self.config.rsa_key_bits, "no subject key stored, generating");
                let key = PrivateKey::generate_rsa(self.config.rsa_key_bits)?;
                Ok((key, true))
            }
            Err(e) => Err(LeafcaError::KeyRetrieval(e)),
        }
    }

    fn load_ca(&self, request: &CertificateRequest) -> Result<CaMaterial> {
        let certificate = self
            .store
            .load_certificate(&request.ca_ref)
            .map_err(|source| LeafcaError::SigningInput {
                what: "certificate",
                source,
            })?;
        let private_key = self
            .store
            .load_private_key(&request.ca_ref)
            .map_err(|source| LeafcaError::SigningInput {
                what: "private key",
                source,
            })?;
        Ok(CaMaterial {
            certificate,
            private_key,
        })
    }

    fn obtain_certificate(
        &self,
        request: &CertificateRequest,
        subject_key: &PrivateKey,
        key_generated: bool,
        now: DateTime<Utc>,
        stage: &mut Stage,
    ) -> Result<IssuedCertificate> {
        let ca = self.load_ca(request)?;
        *stage = Stage::CaResolved;

        let signer = Signer::new(&ca)?;
        let template = build_template(request, subject_key.public_key(), &self.config, now)?;
        let certificate = signer.sign(&template, subject_key)?;
        *stage = Stage::Signed;

        let certificate_pem = encode_certificate_pem(&certificate.der)?;
        let private_key_pem = encode_private_key_pem(subject_key)?;
        *stage = Stage::Encoded;

        Ok(IssuedCertificate {
            private_key_pem: private_key_pem.into_bytes(),
            certificate_pem: certificate_pem.into_bytes(),
            certificate,
            key_generated,
        })
    }
}

fn failed(stage: Stage, error: LeafcaError, now: DateTime<Utc>) -> IssuanceOutcome {
    let reason = error.reason();
    let prefix = match reason {
        Reason::ErrGetCertKeyPair => MESSAGE_ERROR_GET_CERT_KEY_PAIR,
        _ => MESSAGE_ERROR_ISSUE_CERT,
    };
    let message = format!("{prefix}{error}");
    warn!(%reason, ?stage, %message, "certificate issuance failed");
    IssuanceOutcome::Failed {
        condition: Condition::not_ready(reason, message, now),
        stage,
        error,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::OnceLock;
    use std::time::Duration;

    use chrono::TimeZone;
    use leafca_core::clock::FixedClock;
    use leafca_core::error::StoreError;
    use leafca_core::types::{ConditionStatus, SecretRef};
    use leafca_pki::{decode_certificate_pem, self_signed_ca};
    use leafca_store::MemoryStore;
    use rustls::pki_types::CertificateDer;
    use x509_parser::parse_x509_certificate;

    use super::*;

    fn ca() -> &'static CaMaterial {
        static CA: OnceLock<CaMaterial> = OnceLock::new();
        CA.get_or_init(|| {
            let key = PrivateKey::generate_rsa(2048).expect("CA key");
            self_signed_ca(
                "issuer test root",
                "leafca",
                &key,
                Duration::from_secs(86_400 * 30),
                Utc::now(),
            )
            .expect("CA")
        })
    }

    fn subject_key() -> &'static PrivateKey {
        static KEY: OnceLock<PrivateKey> = OnceLock::new();
        KEY.get_or_init(|| PrivateKey::generate_rsa(2048).expect("subject key"))
    }

    fn secret_ref() -> SecretRef {
        SecretRef::new("default", "web-tls")
    }

    fn ca_ref() -> SecretRef {
        SecretRef::new("default", "ca-key-pair")
    }

    fn request(names: &[&str]) -> CertificateRequest {
        CertificateRequest {
            dns_names: names.iter().map(|n| n.to_string()).collect(),
            secret_ref: secret_ref(),
            ca_ref: ca_ref(),
        }
    }

    /// Store holding the CA and an existing subject key.
    fn populated_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_ca(ca_ref(), ca());
        store.insert_private_key(secret_ref(), subject_key().clone());
        store
    }

    /// A store whose every lookup fails with the same backend error.
    #[derive(Debug)]
    struct BrokenStore(&'static str);

    impl KeyMaterialStore for BrokenStore {
        fn load_private_key(&self, _: &SecretRef) -> std::result::Result<PrivateKey, StoreError> {
            Err(StoreError::Backend(self.0.into()))
        }

        fn load_certificate(
            &self,
            _: &SecretRef,
        ) -> std::result::Result<CertificateDer<'static>, StoreError> {
            Err(StoreError::Backend(self.0.into()))
        }
    }

    #[test]
    fn issues_with_fresh_key_when_none_stored() {
        let store = MemoryStore::new();
        store.insert_ca(ca_ref(), ca());
        let issuer = Issuer::new(store, IssuerConfig::default());

        let outcome = issuer.issue(&request(&["a.example.com"]));

        assert!(outcome.is_ready(), "unexpected failure: {:?}", outcome.error());
        let condition = outcome.condition();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, Reason::CertIssueSuccess);
        assert_eq!(condition.message, "Certificate issued successfully");
        assert!(!outcome.private_key_pem().expect("key").is_empty());
        assert!(!outcome.certificate_pem().expect("cert").is_empty());

        let issued = outcome.into_result().expect("issued");
        assert!(issued.key_generated);
        let key = PrivateKey::from_pem(&issued.private_key_pem).expect("key PEM parses");
        assert_eq!(key.bits(), 2048);
    }

    #[test]
    fn subject_names_match_request_in_order() {
        let issuer = Issuer::new(populated_store(), IssuerConfig::default());
        let names = ["z.example.com", "a.example.com", "m.example.com"];

        let issued = issuer
            .issue(&request(&names))
            .into_result()
            .expect("issued");

        assert_eq!(issued.certificate.common_name, "z.example.com");
        assert_eq!(issued.certificate.dns_names, names);
    }

    #[test]
    fn stored_subject_key_is_reused() {
        let issuer = Issuer::new(populated_store(), IssuerConfig::default());
        let req = request(&["a.example.com"]);

        let first = issuer.issue(&req).into_result().expect("first");
        let second = issuer.issue(&req).into_result().expect("second");

        assert!(!first.key_generated);
        assert_eq!(first.private_key_pem, second.private_key_pem);
        assert_eq!(
            first.private_key_pem,
            subject_key().to_pkcs1_pem().expect("pem").into_bytes()
        );
    }

    #[test]
    fn serials_differ_across_issuances() {
        let issuer = Issuer::new(populated_store(), IssuerConfig::default());
        let req = request(&["a.example.com"]);

        let serials: HashSet<String> = (0..8)
            .map(|_| {
                issuer
                    .issue(&req)
                    .into_result()
                    .expect("issued")
                    .certificate
                    .serial
            })
            .collect();
        assert_eq!(serials.len(), 8);
    }

    #[test]
    fn validity_window_follows_injected_clock() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let issuer = Issuer::new(populated_store(), IssuerConfig::default())
            .with_clock(Arc::new(FixedClock(now)));

        let outcome = issuer.issue(&request(&["a.example.com"]));
        assert_eq!(outcome.condition().last_transition_time, now);

        let cert = outcome.into_result().expect("issued").certificate;
        assert_eq!(cert.not_before, now);
        assert_eq!(cert.not_after - cert.not_before, chrono::Duration::days(365));
    }

    #[test]
    fn wall_clock_issuance_covers_now() {
        let issuer = Issuer::new(populated_store(), IssuerConfig::default());
        let cert = issuer
            .issue(&request(&["a.example.com"]))
            .into_result()
            .expect("issued")
            .certificate;

        let now = Utc::now();
        assert!(cert.not_before <= now && now <= cert.not_after);
        assert_eq!(cert.not_after - cert.not_before, chrono::Duration::days(365));
    }

    #[test]
    fn pem_output_decodes_to_signed_der() {
        let issuer = Issuer::new(populated_store(), IssuerConfig::default());
        let issued = issuer
            .issue(&request(&["a.example.com"]))
            .into_result()
            .expect("issued");

        let der = decode_certificate_pem(&issued.certificate_pem).expect("decode");
        assert_eq!(der, issued.certificate.der);

        let (_, ca_cert) = parse_x509_certificate(&ca().certificate).expect("CA");
        let (_, leaf) = parse_x509_certificate(&der).expect("leaf");
        leaf.verify_signature(Some(ca_cert.public_key()))
            .expect("signed by the CA");
    }

    #[test]
    fn missing_ca_fails_with_err_issue_cert() {
        let store = MemoryStore::new();
        store.insert_private_key(secret_ref(), subject_key().clone());
        let issuer = Issuer::new(store, IssuerConfig::default());

        let outcome = issuer.issue(&request(&["a.example.com"]));

        assert!(!outcome.is_ready());
        let condition = outcome.condition();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, Reason::ErrIssueCert);
        assert!(
            condition
                .message
                .starts_with("Error issuing TLS certificate: error getting issuer certificate:"),
            "{}",
            condition.message
        );
        assert!(outcome.private_key_pem().is_none());
        assert!(outcome.certificate_pem().is_none());
        assert!(matches!(
            outcome,
            IssuanceOutcome::Failed {
                stage: Stage::KeyResolved,
                error: LeafcaError::SigningInput { .. },
                ..
            }
        ));
    }

    #[test]
    fn ca_certificate_without_key_fails_with_err_issue_cert() {
        let store = MemoryStore::new();
        store.insert_certificate(ca_ref(), ca().certificate.clone());
        store.insert_private_key(secret_ref(), subject_key().clone());
        let issuer = Issuer::new(store, IssuerConfig::default());

        let outcome = issuer.issue(&request(&["a.example.com"]));

        assert_eq!(outcome.condition().reason, Reason::ErrIssueCert);
        assert!(
            outcome
                .condition()
                .message
                .contains("error getting issuer private key")
        );
    }

    #[test]
    fn denied_subject_key_fails_without_generating() {
        let store = populated_store();
        store.deny(secret_ref(), "forbidden");
        let issuer = Issuer::new(store, IssuerConfig::default());

        let outcome = issuer.issue(&request(&["a.example.com"]));

        let condition = outcome.condition();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, Reason::ErrGetCertKeyPair);
        assert!(
            condition
                .message
                .starts_with("Error getting keypair for certificate: ")
        );
        assert!(outcome.private_key_pem().is_none());
        assert!(outcome.certificate_pem().is_none());
        assert!(matches!(
            outcome.error(),
            Some(LeafcaError::KeyRetrieval(StoreError::AccessDenied { .. }))
        ));
    }

    #[test]
    fn backend_errors_are_not_treated_as_absence() {
        let issuer = Issuer::new(BrokenStore("request timed out"), IssuerConfig::default());

        let outcome = issuer.issue(&request(&["a.example.com"]));

        assert_eq!(outcome.condition().reason, Reason::ErrGetCertKeyPair);
        assert!(outcome.condition().message.contains("request timed out"));
    }

    #[test]
    fn key_generation_failure_is_err_get_cert_key_pair() {
        let store = MemoryStore::new();
        store.insert_ca(ca_ref(), ca());
        let config = IssuerConfig {
            rsa_key_bits: 0,
            ..IssuerConfig::default()
        };
        let issuer = Issuer::new(store, config);

        let outcome = issuer.issue(&request(&["a.example.com"]));

        let condition = outcome.condition();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, Reason::ErrGetCertKeyPair);
        assert!(
            condition
                .message
                .starts_with("Error getting keypair for certificate: ")
        );
        assert!(matches!(outcome.error(), Some(LeafcaError::KeyGeneration(_))));
        assert!(outcome.private_key_pem().is_none());
        assert!(outcome.certificate_pem().is_none());
    }

    #[test]
    fn blank_later_name_fails_before_signing() {
        let issuer = Issuer::new(populated_store(), IssuerConfig::default());

        let outcome = issuer.issue(&request(&["a.example.com", ""]));

        assert_eq!(outcome.condition().reason, Reason::ErrIssueCert);
        assert!(outcome.certificate_pem().is_none());
        assert!(matches!(
            outcome,
            IssuanceOutcome::Failed {
                stage: Stage::Start,
                error: LeafcaError::InvalidRequest(_),
                ..
            }
        ));
    }

    #[test]
    fn empty_request_fails_before_touching_the_store() {
        let issuer = Issuer::new(BrokenStore("must not be called"), IssuerConfig::default());

        let outcome = issuer.issue(&request(&[]));

        assert_eq!(outcome.condition().reason, Reason::ErrIssueCert);
        assert!(matches!(
            outcome,
            IssuanceOutcome::Failed {
                stage: Stage::Start,
                error: LeafcaError::InvalidRequest(_),
                ..
            }
        ));
    }

    #[test]
    fn configured_organization_reaches_the_certificate() {
        let config = IssuerConfig {
            organization: "Example Corp".into(),
            ..IssuerConfig::default()
        };
        let issuer = Issuer::new(populated_store(), config);

        let cert = issuer
            .issue(&request(&["a.example.com"]))
            .into_result()
            .expect("issued")
            .certificate;
        assert_eq!(cert.organization.as_deref(), Some("Example Corp"));
    }

    #[test]
    fn concurrent_issuances_are_independent() {
        let store = MemoryStore::new();
        store.insert_ca(ca_ref(), ca());
        for i in 0..4 {
            store.insert_private_key(
                SecretRef::new("default", format!("web-{i}")),
                subject_key().clone(),
            );
        }
        let issuer = Issuer::new(store, IssuerConfig::default());

        let names: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let issuer = &issuer;
                    scope.spawn(move || {
                        let req = CertificateRequest {
                            dns_names: vec![format!("host{i}.example.com")],
                            secret_ref: SecretRef::new("default", format!("web-{i}")),
                            ca_ref: ca_ref(),
                        };
                        issuer
                            .issue(&req)
                            .into_result()
                            .expect("issued")
                            .certificate
                            .common_name
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread"))
                .collect()
        });

        assert_eq!(
            names,
            vec![
                "host0.example.com",
                "host1.example.com",
                "host2.example.com",
                "host3.example.com"
            ]
        );
    }
}
