// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// leafca — issue leaf TLS certificates from a local CA directory.
//
// Entry point. Initialises logging, parses the command line, and drives the
// issuer against a directory store. Unlike the library, this binary acts as
// the controller: it persists issued keys and certificates.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use leafca_core::config::IssuerConfig;
use leafca_core::error::{LeafcaError, StoreError};
use leafca_core::types::{CertificateRequest, SecretRef};
use leafca_issuer::{IssuanceOutcome, Issuer};
use leafca_pki::{PrivateKey, SignedCertificate, decode_certificate_pem, self_signed_ca};
use leafca_store::DirectoryStore;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Leafca(#[from] LeafcaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "leafca", version, about = "Issue leaf TLS certificates from a local CA")]
struct Cli {
    /// Issuer configuration (JSON). Defaults apply when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a self-signed CA key pair into the store.
    InitCa {
        #[arg(long)]
        store: PathBuf,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "leafca root CA")]
        common_name: String,
        /// CA validity in days.
        #[arg(long, default_value_t = 3650)]
        days: u64,
    },
    /// Issue (or re-issue) a leaf certificate and save it next to its key.
    Issue {
        #[arg(long)]
        store: PathBuf,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long)]
        secret_name: String,
        #[arg(long)]
        ca_name: String,
        /// DNS name; repeat for more. The first one is the Common Name.
        #[arg(long = "dns", required = true)]
        dns_names: Vec<String>,
    },
    /// Print the subject, SANs, and validity of a PEM certificate.
    Inspect {
        #[arg(long)]
        cert: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "leafca failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = match &cli.config {
        Some(path) => IssuerConfig::load(path)?,
        None => IssuerConfig::default(),
    };

    match cli.command {
        Command::InitCa {
            store,
            namespace,
            name,
            common_name,
            days,
        } => {
            init_ca(&store, SecretRef::new(namespace, name), &common_name, days, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Issue {
            store,
            namespace,
            secret_name,
            ca_name,
            dns_names,
        } => {
            let request = CertificateRequest::new(
                dns_names,
                SecretRef::new(namespace.clone(), secret_name),
                SecretRef::new(namespace, ca_name),
            )?;
            let ready = issue(&store, &request, config)?;
            Ok(if ready {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Inspect { cert } => {
            let raw = std::fs::read(&cert).map_err(LeafcaError::from)?;
            let der = decode_certificate_pem(&raw)?;
            let parsed = SignedCertificate::from_der(der)?;
            println!("{}", to_json(&parsed)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_ca(
    store: &Path,
    ca_ref: SecretRef,
    common_name: &str,
    days: u64,
    config: &IssuerConfig,
) -> Result<(), CliError> {
    let validity = days
        .checked_mul(SECONDS_PER_DAY)
        .map(Duration::from_secs)
        .ok_or_else(|| CliError::InvalidArgument(format!("--days {days} is out of range")))?;
    let key = PrivateKey::generate_rsa(config.rsa_key_bits)?;
    let ca = self_signed_ca(common_name, &config.organization, &key, validity, Utc::now())?;
    DirectoryStore::new(store).save_ca(&ca_ref, &ca)?;
    tracing::info!(ca = %ca_ref, "CA material written");
    Ok(())
}

/// Run one issuance and persist the result. Returns whether it succeeded.
fn issue(store: &Path, request: &CertificateRequest, config: IssuerConfig) -> Result<bool, CliError> {
    let issuer = Issuer::new(DirectoryStore::new(store), config);
    let outcome = issuer.issue(request);
    println!("{}", to_json(outcome.condition())?);

    match outcome {
        IssuanceOutcome::Issued { certificate, .. } => {
            issuer.store().save_key_pair(
                &request.secret_ref,
                &certificate.private_key_pem,
                &certificate.certificate_pem,
            )?;
            Ok(true)
        }
        IssuanceOutcome::Failed { .. } => Ok(false),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, LeafcaError> {
    Ok(serde_json::to_string_pretty(value)?)
}
