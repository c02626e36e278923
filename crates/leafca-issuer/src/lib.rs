// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! leafca-issuer — issues leaf certificates from a locally held CA.
//!
//! [`Issuer::issue`] resolves the subject key (loading it, or generating one
//! when the store has none), fetches the CA material, builds and signs the
//! certificate, and returns an [`IssuanceOutcome`] carrying a `Ready`
//! condition plus the PEM artifacts on success.

pub mod issuer;
pub mod outcome;

pub use issuer::Issuer;
pub use outcome::{IssuanceOutcome, IssuedCertificate, Stage};
