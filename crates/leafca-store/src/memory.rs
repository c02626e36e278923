// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory store, for tests and embedding.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use leafca_core::error::StoreError;
use leafca_core::types::SecretRef;
use leafca_pki::{CaMaterial, PrivateKey};
use rustls::pki_types::CertificateDer;
use tracing::debug;

use crate::{KeyMaterialStore, not_found};

#[derive(Debug, Default, Clone)]
struct Entry {
    private_key: Option<PrivateKey>,
    certificate: Option<CertificateDer<'static>>,
    /// When set, every lookup of this entry fails with `AccessDenied`.
    denied: Option<String>,
}

/// A `HashMap` of secrets behind a `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SecretRef, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_private_key(&self, secret: SecretRef, key: PrivateKey) {
        self.update(secret, |entry| entry.private_key = Some(key));
    }

    pub fn insert_certificate(&self, secret: SecretRef, certificate: CertificateDer<'static>) {
        self.update(secret, |entry| entry.certificate = Some(certificate));
    }

    /// Store a CA certificate and key under one reference.
    pub fn insert_ca(&self, secret: SecretRef, ca: &CaMaterial) {
        self.update(secret, |entry| {
            entry.private_key = Some(ca.private_key.clone());
            entry.certificate = Some(ca.certificate.clone());
        });
    }

    /// Make every lookup of `secret` fail with `AccessDenied`.
    pub fn deny(&self, secret: SecretRef, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(secret, |entry| entry.denied = Some(reason));
    }

    pub fn remove(&self, secret: &SecretRef) {
        self.write().remove(secret);
    }

    fn update(&self, secret: SecretRef, f: impl FnOnce(&mut Entry)) {
        f(self.write().entry(secret).or_default());
    }

    // Every mutation replaces whole fields, so a writer that panicked cannot
    // leave an entry half-updated and the map stays usable after poisoning.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SecretRef, Entry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SecretRef, Entry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_entry<T>(
        &self,
        secret: &SecretRef,
        f: impl FnOnce(&Entry) -> Option<T>,
    ) -> Result<T, StoreError> {
        let entries = self.read();
        let entry = entries.get(secret).ok_or_else(|| not_found(secret))?;
        if let Some(reason) = &entry.denied {
            return Err(StoreError::AccessDenied {
                namespace: secret.namespace.clone(),
                name: secret.name.clone(),
                reason: reason.clone(),
            });
        }
        f(entry).ok_or_else(|| not_found(secret))
    }
}

impl KeyMaterialStore for MemoryStore {
    fn load_private_key(&self, secret: &SecretRef) -> Result<PrivateKey, StoreError> {
        debug!(%secret, "loading private key from memory");
        self.with_entry(secret, |entry| entry.private_key.clone())
    }

    fn load_certificate(&self, secret: &SecretRef) -> Result<CertificateDer<'static>, StoreError> {
        debug!(%secret, "loading certificate from memory");
        self.with_entry(secret, |entry| entry.certificate.clone())
    }
}
