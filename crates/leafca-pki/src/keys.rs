// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key material — a closed set of supported key algorithms (RSA only for now).
//
// Subject keys are either loaded from a store or generated here. Generation
// is pure: persisting a fresh key is the caller's job.

use leafca_core::error::{LeafcaError, Result};
use rcgen::KeyPair;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use rustls::pki_types::PrivatePkcs8KeyDer;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const PEM_TAG_PKCS1: &str = "RSA PRIVATE KEY";
const PEM_TAG_PKCS8: &str = "PRIVATE KEY";

/// Supported asymmetric key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Rsa,
}

/// A private key of one of the supported algorithms.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
}

/// The public half of a [`PrivateKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "PrivateKey::{:?}({} bits)", self.algorithm(), self.bits())
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(value: RsaPrivateKey) -> Self {
        Self::Rsa(value)
    }
}

impl PrivateKey {
    /// Generate a fresh RSA key of `bits` modulus size using the OS CSPRNG.
    #[instrument]
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| LeafcaError::KeyGeneration(format!("RSA-{bits}: {e}")))?;
        debug!(bits, "RSA private key generated");
        Ok(Self::Rsa(key))
    }

    /// Parse a PEM private key. Accepts PKCS#1 (`RSA PRIVATE KEY`) and
    /// PKCS#8 (`PRIVATE KEY`) blocks.
    pub fn from_pem(input: &[u8]) -> Result<Self> {
        let block = pem::parse(input)
            .map_err(|e| LeafcaError::Decoding(format!("private key PEM: {e}")))?;

        let key = match block.tag() {
            PEM_TAG_PKCS1 => RsaPrivateKey::from_pkcs1_der(block.contents())
                .map_err(|e| LeafcaError::Decoding(format!("PKCS#1 private key: {e}")))?,
            PEM_TAG_PKCS8 => RsaPrivateKey::from_pkcs8_der(block.contents())
                .map_err(|e| LeafcaError::Decoding(format!("PKCS#8 private key: {e}")))?,
            other => {
                return Err(LeafcaError::Decoding(format!(
                    "unsupported private key PEM block {other:?}"
                )));
            }
        };
        Ok(Self::Rsa(key))
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Rsa(key) => key.size() * 8,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
        }
    }

    /// PKCS#1 DER wrapped in an `RSA PRIVATE KEY` PEM block.
    pub fn to_pkcs1_pem(&self) -> Result<String> {
        match self {
            Self::Rsa(key) => key
                .to_pkcs1_pem(LineEnding::LF)
                .map(|pem| pem.to_string())
                .map_err(|e| LeafcaError::Encoding(format!("PKCS#1 private key: {e}"))),
        }
    }

    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        match self {
            Self::Rsa(key) => key
                .to_pkcs8_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| LeafcaError::Encoding(format!("PKCS#8 private key: {e}"))),
        }
    }

    /// The same key as an rcgen signing handle.
    pub(crate) fn to_rcgen(&self) -> Result<KeyPair> {
        let der = self.to_pkcs8_der()?;
        let alg = match self {
            Self::Rsa(_) => &rcgen::PKCS_RSA_SHA256,
        };
        KeyPair::from_pkcs8_der_and_sign_algo(&PrivatePkcs8KeyDer::from(der.as_slice()), alg)
            .map_err(|e| LeafcaError::Signing(format!("unusable {:?} key: {e}", self.algorithm())))
    }
}

impl PublicKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    /// X.509 SubjectPublicKeyInfo DER.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        match self {
            Self::Rsa(key) => key
                .to_public_key_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| LeafcaError::Encoding(format!("public key: {e}"))),
        }
    }
}
