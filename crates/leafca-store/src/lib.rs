// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! leafca-store — where subject keys and CA material are looked up.
//!
//! The issuer only reads through [`KeyMaterialStore`]. Writing newly
//! generated keys back is up to whoever drives the issuer.

use std::sync::Arc;

use leafca_core::error::StoreError;
use leafca_core::types::SecretRef;
use leafca_pki::PrivateKey;
use rustls::pki_types::CertificateDer;

pub mod directory;
pub mod memory;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// Keyed lookup of private keys and certificates by namespace and name.
///
/// Implementations must report absence as [`StoreError::NotFound`] and
/// nothing else; the issuer generates a subject key only in that case.
pub trait KeyMaterialStore: Send + Sync {
    fn load_private_key(&self, secret: &SecretRef) -> Result<PrivateKey, StoreError>;

    fn load_certificate(&self, secret: &SecretRef) -> Result<CertificateDer<'static>, StoreError>;
}

impl<T: KeyMaterialStore + ?Sized> KeyMaterialStore for Arc<T> {
    fn load_private_key(&self, secret: &SecretRef) -> Result<PrivateKey, StoreError> {
        (**self).load_private_key(secret)
    }

    fn load_certificate(&self, secret: &SecretRef) -> Result<CertificateDer<'static>, StoreError> {
        (**self).load_certificate(secret)
    }
}

pub(crate) fn not_found(secret: &SecretRef) -> StoreError {
    StoreError::NotFound {
        namespace: secret.namespace.clone(),
        name: secret.name.clone(),
    }
}
