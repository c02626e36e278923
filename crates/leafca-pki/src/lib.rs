// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! leafca-pki — the cryptographic half of leaf certificate issuance.
//!
//! Subject key generation and loading, certificate template construction,
//! signing against a CA certificate and key, and PEM encoding of the result.
//! Nothing in this crate touches a store; the issuer crate fetches material
//! and hands it in.

pub mod ca;
pub mod encoding;
pub mod fingerprint;
pub mod keys;
pub mod signer;
pub mod template;

pub use ca::{CaMaterial, self_signed_ca};
pub use encoding::{decode_certificate_pem, encode_certificate_pem, encode_private_key_pem};
pub use fingerprint::sha256_fingerprint;
pub use keys::{KeyAlgorithm, PrivateKey, PublicKey};
pub use signer::{SignedCertificate, Signer};
pub use template::{CertificateTemplate, KeyUsage, SignatureAlgorithm, build_template};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::OnceLock;

    use chrono::Utc;

    use crate::{CaMaterial, PrivateKey, self_signed_ca};

    /// One CA per test binary; RSA generation is the slow part.
    pub fn ca() -> &'static CaMaterial {
        static CA: OnceLock<CaMaterial> = OnceLock::new();
        CA.get_or_init(|| {
            let key = PrivateKey::generate_rsa(2048).expect("generate CA key");
            self_signed_ca(
                "leafca test root",
                "leafca",
                &key,
                std::time::Duration::from_secs(3600 * 24 * 30),
                Utc::now(),
            )
            .expect("self-sign CA")
        })
    }

    pub fn subject_key() -> &'static PrivateKey {
        static KEY: OnceLock<PrivateKey> = OnceLock::new();
        KEY.get_or_init(|| PrivateKey::generate_rsa(2048).expect("generate subject key"))
    }
}
