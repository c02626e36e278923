// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Directory-backed store using the TLS secret layout:
//
//   <root>/<namespace>/<name>/tls.key   PEM private key (PKCS#1 or PKCS#8)
//   <root>/<namespace>/<name>/tls.crt   PEM certificate
//
// A missing file is `NotFound`; unreadable files are `AccessDenied`; files
// that do not parse are `InvalidData`.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use leafca_core::error::StoreError;
use leafca_core::types::SecretRef;
use leafca_pki::{CaMaterial, PrivateKey, decode_certificate_pem};
use rustls::pki_types::CertificateDer;
use tracing::{debug, instrument, warn};

use crate::{KeyMaterialStore, not_found};

pub const TLS_KEY_FILE: &str = "tls.key";
pub const TLS_CERT_FILE: &str = "tls.crt";

const DIR_MODE_RESTRICTED: u32 = 0o700;
const FILE_MODE_RESTRICTED: u32 = 0o600;
const FILE_MODE_READABLE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files for `secret`.
    pub fn secret_dir(&self, secret: &SecretRef) -> Result<PathBuf, StoreError> {
        for component in [&secret.namespace, &secret.name] {
            if component.is_empty()
                || component == "."
                || component == ".."
                || component.contains(['/', '\\'])
            {
                return Err(invalid(secret, format!("{component:?} is not a valid path segment")));
            }
        }
        Ok(self.root.join(&secret.namespace).join(&secret.name))
    }

    /// Write a key and certificate under `secret`, replacing what was there.
    ///
    /// Both files are staged next to their targets with their final mode and
    /// then renamed into place. If the certificate cannot be put in place the
    /// previous key is restored, so the pair on disk always matches.
    #[instrument(skip(self, key_pem, cert_pem), fields(%secret))]
    pub fn save_key_pair(
        &self,
        secret: &SecretRef,
        key_pem: &[u8],
        cert_pem: &[u8],
    ) -> Result<(), StoreError> {
        let dir = self.secret_dir(secret)?;
        fs::create_dir_all(&dir).map_err(|e| io_error(secret, e))?;
        set_permissions(&dir, DIR_MODE_RESTRICTED).map_err(|e| io_error(secret, e))?;

        let staged_key = stage_file(&dir, TLS_KEY_FILE, key_pem, FILE_MODE_RESTRICTED)
            .map_err(|e| io_error(secret, e))?;
        let staged_cert = match stage_file(&dir, TLS_CERT_FILE, cert_pem, FILE_MODE_READABLE) {
            Ok(path) => path,
            Err(e) => {
                discard(&staged_key);
                return Err(io_error(secret, e));
            }
        };

        commit_pair(&dir, &staged_key, &staged_cert).map_err(|e| io_error(secret, e))?;
        debug!(dir = %dir.display(), "key pair saved");
        Ok(())
    }

    /// Persist CA material in the same layout as any other secret.
    pub fn save_ca(&self, secret: &SecretRef, ca: &CaMaterial) -> Result<(), StoreError> {
        let key_pem = ca
            .private_key_pem()
            .map_err(|e| invalid(secret, e.to_string()))?;
        let cert_pem = ca
            .certificate_pem()
            .map_err(|e| invalid(secret, e.to_string()))?;
        self.save_key_pair(secret, key_pem.as_bytes(), cert_pem.as_bytes())
    }

    fn read(&self, secret: &SecretRef, file: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.secret_dir(secret)?.join(file);
        debug!(path = %path.display(), "reading secret file");
        fs::read(&path).map_err(|e| io_error(secret, e))
    }
}

impl KeyMaterialStore for DirectoryStore {
    fn load_private_key(&self, secret: &SecretRef) -> Result<PrivateKey, StoreError> {
        let raw = self.read(secret, TLS_KEY_FILE)?;
        PrivateKey::from_pem(&raw).map_err(|e| invalid(secret, e.to_string()))
    }

    fn load_certificate(&self, secret: &SecretRef) -> Result<CertificateDer<'static>, StoreError> {
        let raw = self.read(secret, TLS_CERT_FILE)?;
        decode_certificate_pem(&raw)
            .map(CertificateDer::from)
            .map_err(|e| invalid(secret, e.to_string()))
    }
}

fn invalid(secret: &SecretRef, reason: String) -> StoreError {
    StoreError::InvalidData {
        namespace: secret.namespace.clone(),
        name: secret.name.clone(),
        reason,
    }
}

fn io_error(secret: &SecretRef, err: io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => not_found(secret),
        ErrorKind::PermissionDenied => StoreError::AccessDenied {
            namespace: secret.namespace.clone(),
            name: secret.name.clone(),
            reason: err.to_string(),
        },
        _ => StoreError::Backend(format!("{secret}: {err}")),
    }
}

/// Hidden sibling of `file` inside `dir`, e.g. `.tls.key.staged`.
fn sibling(dir: &Path, file: &str, suffix: &str) -> PathBuf {
    dir.join(format!(".{file}.{suffix}"))
}

/// Write `contents` to a fresh staging file that already carries `mode`.
fn stage_file(dir: &Path, file: &str, contents: &[u8], mode: u32) -> io::Result<PathBuf> {
    let staged = sibling(dir, file, "staged");
    remove_if_present(&staged)?;
    let written = create_file_with_mode(&staged, mode).and_then(|mut out| {
        out.write_all(contents)?;
        out.sync_all()
    });
    match written.and_then(|()| set_permissions(&staged, mode)) {
        Ok(()) => Ok(staged),
        Err(e) => {
            discard(&staged);
            Err(e)
        }
    }
}

/// Rename the staged key, then the staged certificate, into place. A failed
/// certificate rename puts the previous key back (or removes the new one
/// when there was none).
fn commit_pair(dir: &Path, staged_key: &Path, staged_cert: &Path) -> io::Result<()> {
    let key_path = dir.join(TLS_KEY_FILE);
    let backup = sibling(dir, TLS_KEY_FILE, "previous");
    remove_if_present(&backup)?;

    let had_key = match fs::rename(&key_path, &backup) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            discard(staged_key);
            discard(staged_cert);
            return Err(e);
        }
    };

    let committed = fs::rename(staged_key, &key_path)
        .and_then(|()| fs::rename(staged_cert, dir.join(TLS_CERT_FILE)));
    if let Err(e) = committed {
        if had_key {
            if let Err(restore) = fs::rename(&backup, &key_path) {
                warn!(error = %restore, "could not restore previous key");
            }
        } else {
            discard(&key_path);
        }
        discard(staged_key);
        discard(staged_cert);
        return Err(e);
    }

    if had_key {
        discard(&backup);
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Best-effort cleanup of a file this store created.
fn discard(path: &Path) {
    if let Err(e) = remove_if_present(path) {
        warn!(path = %path.display(), error = %e, "could not remove leftover file");
    }
}

#[cfg(unix)]
fn create_file_with_mode(path: &Path, mode: u32) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_file_with_mode(path: &Path, _mode: u32) -> io::Result<fs::File> {
    fs::OpenOptions::new().create_new(true).write(true).open(path)
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
