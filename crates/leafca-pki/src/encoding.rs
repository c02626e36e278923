// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PEM encoding of issued artifacts.

use leafca_core::error::{LeafcaError, Result};
use pem::{EncodeConfig, LineEnding, Pem};

use crate::keys::PrivateKey;

pub const CERTIFICATE_PEM_TAG: &str = "CERTIFICATE";

/// Wrap certificate DER in a `CERTIFICATE` PEM block (LF line endings).
pub fn encode_certificate_pem(der: &[u8]) -> Result<String> {
    if der.is_empty() {
        return Err(LeafcaError::Encoding(
            "certificate PEM: no DER bytes to encode".into(),
        ));
    }
    let block = Pem::new(CERTIFICATE_PEM_TAG, der.to_vec());
    Ok(pem::encode_config(
        &block,
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    ))
}

/// Extract the DER bytes of the first `CERTIFICATE` block in `input`.
pub fn decode_certificate_pem(input: &[u8]) -> Result<Vec<u8>> {
    let block = pem::parse(input)
        .map_err(|e| LeafcaError::Decoding(format!("certificate PEM: {e}")))?;
    if block.tag() != CERTIFICATE_PEM_TAG {
        return Err(LeafcaError::Decoding(format!(
            "expected {CERTIFICATE_PEM_TAG} PEM block, got {}",
            block.tag()
        )));
    }
    Ok(block.contents().to_vec())
}

/// The subject key as PKCS#1 PEM, the format written next to the certificate.
pub fn encode_private_key_pem(key: &PrivateKey) -> Result<String> {
    key.to_pkcs1_pem()
}
