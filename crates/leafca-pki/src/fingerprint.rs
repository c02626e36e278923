// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate fingerprints — SHA-256 over the DER encoding.

use sha2::{Digest, Sha256};

/// SHA-256 of `der` as a lowercase hex string.
///
/// Logged with every issuance so operators can match a certificate in the
/// wild to the issuance that produced it.
pub fn sha256_fingerprint(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    hex::encode(hasher.finalize())
}
