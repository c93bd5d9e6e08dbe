//! macOS: System keychain install via `security`, followed by explicit
//! per-policy trust settings for the new certificate.
//!
//! Everything runs through a [`Runner`], so the sequence is available on
//! every platform; only the top-level dispatch in `lib.rs` is macOS-gated.

use std::io::Write;

use crate::{
    command::{run_checked, run_elevated_checked, Invocation, Runner},
    error::{Error, Result},
    identity::{canonical_issuer_key, CertificateRecord},
    property::{self, Format},
    trust::{default_policies, inject_explicit_trust},
    InstallOutcome,
};

const SECURITY: &str = "security";
const SYSTEM_KEYCHAIN: &str = "/Library/Keychains/System.keychain";

pub const INSTALL_PROMPT: &str = "Please authorize Zen to install a certificate";
pub const IMPORT_PROMPT: &str = "Please authorize Zen to update certificate trust settings";
pub const UNINSTALL_PROMPT: &str = "Please authorize Zen to remove a certificate";

pub fn install(record: &CertificateRecord, runner: &dyn Runner) -> Result<InstallOutcome> {
    log::debug!(
        "installing {} ({}) into {}",
        record.path().display(),
        record.subject(),
        SYSTEM_KEYCHAIN
    );

    let cert_path = record.path_str()?;
    run_elevated_checked(
        runner,
        &Invocation::new(
            SECURITY,
            ["add-trusted-cert", "-d", "-k", SYSTEM_KEYCHAIN, cert_path],
        ),
        INSTALL_PROMPT,
    )?;

    // Removed when dropped, whichever way we leave this function.
    let plist_file = tempfile::Builder::new()
        .prefix("trust-settings")
        .suffix(".plist")
        .tempfile()
        .map_err(Error::TempFile)?;
    let plist_path = plist_file.path().to_str().ok_or_else(|| {
        Error::TempFile(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", plist_file.path().display()),
        ))
    })?;

    run_checked(
        runner,
        &Invocation::new(SECURITY, ["trust-settings-export", "-d", plist_path]),
    )?;

    let exported = std::fs::read(plist_file.path()).map_err(Error::TempFile)?;
    let mut tree = property::decode(&exported)?;
    let issuer_key = canonical_issuer_key(record)?;

    let entry = match inject_explicit_trust(&mut tree, &issuer_key, &default_policies()) {
        Ok(entry) => entry,
        Err(e) if !e.is_fatal() => {
            log::warn!(
                "no trust settings entry for {}; leaving OS default trust in place",
                record.subject()
            );
            return Ok(InstallOutcome::DefaultTrust);
        }
        Err(e) => return Err(e),
    };

    let encoded = property::encode(&tree, Format::Xml)?;
    overwrite(&plist_file, &encoded).map_err(Error::TempFile)?;

    run_elevated_checked(
        runner,
        &Invocation::new(SECURITY, ["trust-settings-import", "-d", plist_path]),
        IMPORT_PROMPT,
    )?;

    log::info!(
        "installed {} with explicit trust (entry {})",
        record.subject(),
        entry
    );

    Ok(InstallOutcome::ExplicitTrust { entry })
}

pub fn uninstall(record: &CertificateRecord, runner: &dyn Runner) -> Result<()> {
    let cert_path = record.path_str()?;
    run_elevated_checked(
        runner,
        &Invocation::new(SECURITY, ["remove-trusted-cert", "-d", cert_path]),
        UNINSTALL_PROMPT,
    )?;

    Ok(())
}

fn overwrite(file: &tempfile::NamedTempFile, data: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    // the export may have replaced the file, so write by path
    let mut out = std::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(file.path())?;
    out.write_all(data)?;
    out.sync_all()
}
