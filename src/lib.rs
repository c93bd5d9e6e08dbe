//! Installs a locally generated root CA into the operating system's trust
//! store and, on macOS, pins explicit per-policy trust settings for it.

use anyhow::Context;

pub mod command;
pub mod config;
pub mod darwin;
pub mod error;
pub mod identity;
pub mod property;
pub mod proxy;
pub mod trust;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(test)]
mod testutil;

pub use command::{Runner, SystemRunner};
pub use config::Config;
pub use error::{Error, Result};
pub use identity::CertificateRecord;

/// How the installed CA ended up trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Explicit trust settings were written to the given trust list entry.
    ExplicitTrust { entry: String },
    /// The certificate was added but no trust entry matched it, so the OS
    /// default trust for the certificate applies.
    DefaultTrust,
    /// Copied into the system anchor directory.
    Anchored,
}

pub fn install(record: &CertificateRecord, runner: &dyn Runner) -> Result<InstallOutcome> {
    #[cfg(target_os = "macos")]
    return crate::darwin::install(record, runner);

    #[cfg(target_os = "linux")]
    return crate::linux::install(record, runner).map(|_| InstallOutcome::Anchored);

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    Err(Error::UnsupportedEnvironment(format!(
        "Unable to install CA certificate '{}' on this platform",
        record.path().display()
    )))
}

pub fn uninstall(record: &CertificateRecord, runner: &dyn Runner) -> Result<()> {
    #[cfg(target_os = "macos")]
    return crate::darwin::uninstall(record, runner);

    #[cfg(target_os = "linux")]
    return crate::linux::uninstall(record, runner);

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    Err(Error::UnsupportedEnvironment(format!(
        "Unable to uninstall CA certificate '{}' on this platform",
        record.path().display()
    )))
}

/// Installs the CA unless the configuration says it already is, then records
/// that in the configuration. Returns whether an install ran.
pub fn ensure_ca_installed(
    config: &mut Config,
    record: &CertificateRecord,
    runner: &dyn Runner,
) -> Result<bool> {
    ensure_installed_with(config, || install(record, runner))
}

fn ensure_installed_with<F>(config: &mut Config, install: F) -> Result<bool>
where
    F: FnOnce() -> Result<InstallOutcome>,
{
    if config.ca_installed() {
        log::debug!("CA already installed, skipping");
        return Ok(false);
    }

    let outcome = install()?;
    log::info!("CA installed: {:?}", outcome);

    config.set_ca_installed(true);
    config.save()?;

    Ok(true)
}

pub fn install_ca(filename: &str) -> Result<(), anyhow::Error> {
    let record = CertificateRecord::from_path(filename)
        .with_context(|| format!("Unable to read CA certificate '{}'", filename))?;

    install(&record, &SystemRunner)
        .with_context(|| format!("Unable to install CA certificate '{}'", filename))?;

    Ok(())
}

pub fn uninstall_ca(filename: &str) -> Result<(), anyhow::Error> {
    let record = CertificateRecord::from_path(filename)
        .with_context(|| format!("Unable to read CA certificate '{}'", filename))?;

    uninstall(&record, &SystemRunner)
        .with_context(|| format!("Unable to uninstall CA certificate '{}'", filename))
}
