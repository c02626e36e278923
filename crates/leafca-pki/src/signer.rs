// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signer — turns a certificate template into a CA-signed X.509 v3 certificate.
//
// The heavy lifting is rcgen's; this module maps the template onto rcgen
// parameters, signs, and then re-parses the DER with x509-parser so that a
// certificate that cannot be read back never leaves the issuer.

use chrono::{DateTime, Utc};
use leafca_core::error::{LeafcaError, Result};
use rcgen::string::Ia5String;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair, KeyUsagePurpose,
    SanType, SerialNumber,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;
use x509_parser::x509::AttributeTypeAndValue;

use crate::ca::CaMaterial;
use crate::fingerprint::sha256_fingerprint;
use crate::keys::PrivateKey;
use crate::template::{CertificateTemplate, KeyUsage, SignatureAlgorithm};

/// Signs templates with one CA's key.
#[derive(Debug)]
pub struct Signer {
    issuer: Issuer<'static, KeyPair>,
    algorithm: SignatureAlgorithm,
}

impl Signer {
    /// Prepare a signer from CA material.
    ///
    /// Fails with `Signing` when the CA key cannot be used by the signing
    /// primitive or the CA certificate cannot be parsed.
    #[instrument(skip_all)]
    pub fn new(ca: &CaMaterial) -> Result<Self> {
        let key_pair = ca.private_key.to_rcgen()?;
        let issuer = Issuer::from_ca_cert_der(&ca.certificate, key_pair)
            .map_err(|e| LeafcaError::Signing(format!("unusable issuer certificate: {e}")))?;

        Ok(Self {
            issuer,
            algorithm: SignatureAlgorithm::for_key(ca.private_key.algorithm()),
        })
    }

    /// Sign `template` for the holder of `subject_key`.
    ///
    /// Only the public half of `subject_key` ends up in the certificate; it
    /// must be the key the template was built for.
    #[instrument(skip_all, fields(common_name = %template.common_name))]
    pub fn sign(
        &self,
        template: &CertificateTemplate,
        subject_key: &PrivateKey,
    ) -> Result<SignedCertificate> {
        if template.signature_algorithm != self.algorithm {
            return Err(LeafcaError::Signing(format!(
                "template asks for {:?} but the issuer key signs with {:?}",
                template.signature_algorithm, self.algorithm
            )));
        }
        if subject_key.public_key() != template.public_key {
            return Err(LeafcaError::Signing(
                "subject key does not match the template's public key".into(),
            ));
        }

        let params = certificate_params(template)?;
        let subject = subject_key.to_rcgen()?;
        let cert = params
            .signed_by(&subject, &self.issuer)
            .map_err(|e| LeafcaError::Signing(e.to_string()))?;

        let signed = SignedCertificate::from_der(cert.der().to_vec())?;
        debug!(
            serial = %signed.serial,
            fingerprint = %signed.fingerprint,
            der_len = signed.der.len(),
            "certificate signed"
        );
        Ok(signed)
    }
}

fn certificate_params(template: &CertificateTemplate) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.serial_number = Some(SerialNumber::from_slice(&template.serial_number));
    params.not_before = to_offset(template.not_before)?;
    params.not_after = to_offset(template.not_after)?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, template.organization.clone());
    dn.push(DnType::CommonName, template.common_name.clone());
    params.distinguished_name = dn;

    params.subject_alt_names = template
        .dns_names
        .iter()
        .map(|name| {
            Ia5String::try_from(name.clone())
                .map(SanType::DnsName)
                .map_err(|e| LeafcaError::Signing(format!("invalid DNS name {name:?}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    params.is_ca = if template.is_ca {
        IsCa::Ca(rcgen::BasicConstraints::Unconstrained)
    } else {
        IsCa::ExplicitNoCa
    };
    params.key_usages = match template.key_usage {
        KeyUsage::DigitalSignature => vec![KeyUsagePurpose::DigitalSignature],
    };
    params.use_authority_key_identifier_extension = true;
    Ok(params)
}

pub(crate) fn to_offset(at: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| LeafcaError::Signing(format!("timestamp {at} not representable: {e}")))
}

/// A signed certificate and the facts read back from its DER encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedCertificate {
    #[serde(skip)]
    pub der: Vec<u8>,
    /// Colon-separated hex, as printed by most X.509 tooling.
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub common_name: String,
    pub organization: Option<String>,
    pub dns_names: Vec<String>,
    pub is_ca: bool,
    /// SHA-256 over the DER bytes, lowercase hex.
    pub fingerprint: String,
}

impl SignedCertificate {
    /// Parse DER bytes into a structured certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (serial, not_before, not_after, common_name, organization, dns_names, is_ca) = {
            let (rest, cert) =
                parse_x509_certificate(&der).map_err(|e| LeafcaError::Decoding(e.to_string()))?;
            if !rest.is_empty() {
                return Err(LeafcaError::Decoding(format!(
                    "{} trailing bytes after certificate",
                    rest.len()
                )));
            }

            let common_name = first_attr(cert.subject().iter_common_name().next())
                .ok_or_else(|| LeafcaError::Decoding("certificate has no common name".into()))?;
            let organization = first_attr(cert.subject().iter_organization().next());

            let dns_names = match cert.subject_alternative_name() {
                Ok(Some(san)) => san
                    .value
                    .general_names
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::DNSName(dns) => Some(dns.to_string()),
                        _ => None,
                    })
                    .collect(),
                Ok(None) => Vec::new(),
                Err(e) => return Err(LeafcaError::Decoding(format!("subjectAltName: {e}"))),
            };
            let is_ca = match cert.basic_constraints() {
                Ok(bc) => bc.is_some_and(|bc| bc.value.ca),
                Err(e) => return Err(LeafcaError::Decoding(format!("basicConstraints: {e}"))),
            };

            let validity = cert.validity();
            (
                cert.raw_serial_as_string(),
                from_timestamp(validity.not_before.timestamp())?,
                from_timestamp(validity.not_after.timestamp())?,
                common_name,
                organization,
                dns_names,
                is_ca,
            )
        };

        Ok(Self {
            fingerprint: sha256_fingerprint(&der),
            der,
            serial,
            not_before,
            not_after,
            common_name,
            organization,
            dns_names,
            is_ca,
        })
    }
}

fn first_attr(attr: Option<&AttributeTypeAndValue<'_>>) -> Option<String> {
    attr.and_then(|a| a.as_str().ok()).map(str::to_owned)
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| LeafcaError::Decoding(format!("validity timestamp {secs} out of range")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use leafca_core::config::IssuerConfig;
    use leafca_core::types::{CertificateRequest, SecretRef};
    use x509_parser::oid_registry::OID_PKCS1_SHA256WITHRSA;
    use x509_parser::x509::X509Version;

    use super::*;
    use crate::template::build_template;
    use crate::test_support::{ca, subject_key};

    fn template(names: &[&str]) -> CertificateTemplate {
        let req = CertificateRequest {
            dns_names: names.iter().map(|n| n.to_string()).collect(),
            secret_ref: SecretRef::new("default", "web-tls"),
            ca_ref: SecretRef::new("default", "ca"),
        };
        build_template(
            &req,
            subject_key().public_key(),
            &IssuerConfig::default(),
            Utc::now(),
        )
        .expect("template")
    }

    #[test]
    fn signed_certificate_reflects_template() {
        let tpl = template(&["a.example.com", "b.example.com"]);
        let signer = Signer::new(ca()).expect("signer");
        let signed = signer.sign(&tpl, subject_key()).expect("sign");

        assert_eq!(signed.common_name, "a.example.com");
        assert_eq!(signed.organization.as_deref(), Some("leafca"));
        assert_eq!(signed.dns_names, vec!["a.example.com", "b.example.com"]);
        assert!(!signed.is_ca);
        assert_eq!(signed.not_before.timestamp(), tpl.not_before.timestamp());
        assert_eq!(signed.not_after.timestamp(), tpl.not_after.timestamp());
    }

    #[test]
    fn certificate_verifies_against_ca_and_is_leaf_v3() {
        let signer = Signer::new(ca()).expect("signer");
        let signed = signer
            .sign(&template(&["a.example.com"]), subject_key())
            .expect("sign");

        let (_, ca_cert) = parse_x509_certificate(&ca().certificate).expect("parse CA");
        let (_, leaf) = parse_x509_certificate(&signed.der).expect("parse leaf");

        leaf.verify_signature(Some(ca_cert.public_key()))
            .expect("leaf must verify against the CA key");
        assert_eq!(leaf.version(), X509Version::V3);
        let issuer_cn = leaf.issuer().iter_common_name().next().expect("issuer CN");
        assert_eq!(issuer_cn.as_str().expect("utf8"), "leafca test root");
        assert_eq!(leaf.signature_algorithm.algorithm, OID_PKCS1_SHA256WITHRSA);

        let key_usage = leaf.key_usage().expect("ku").expect("ku present").value;
        assert!(key_usage.digital_signature());
        assert!(!key_usage.key_cert_sign());

        let bc = leaf
            .basic_constraints()
            .expect("bc")
            .expect("bc present")
            .value;
        assert!(!bc.ca);
        assert!(leaf.extended_key_usage().expect("eku").is_none());

        let spki = subject_key().public_key().to_spki_der().expect("spki");
        assert_eq!(leaf.public_key().raw, spki.as_slice());
    }

    #[test]
    fn mismatched_subject_key_is_rejected() {
        let tpl = template(&["a.example.com"]);
        let signer = Signer::new(ca()).expect("signer");
        let err = signer.sign(&tpl, &ca().private_key).unwrap_err();
        assert!(matches!(err, LeafcaError::Signing(_)));
    }

    #[test]
    fn garbage_ca_certificate_is_rejected() {
        let bogus = CaMaterial {
            certificate: vec![0x30, 0x03, 0x02, 0x01, 0x00].into(),
            private_key: ca().private_key.clone(),
        };
        let err = Signer::new(&bogus).unwrap_err();
        assert!(matches!(err, LeafcaError::Signing(_)));
    }

    #[test]
    fn garbage_der_is_a_decoding_error() {
        let err = SignedCertificate::from_der(vec![0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, LeafcaError::Decoding(_)));
    }
}
