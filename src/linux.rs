use std::path::{Path, PathBuf};

use glob::glob;

use crate::{
    command::{run_checked, run_elevated_checked, Invocation, Runner},
    error::{Error, Result},
    identity::CertificateRecord,
};

const CERTUTIL: &str = "certutil";
const PROMPT: &str = "Please authorize Zen to install a certificate";

/// Anchor directory of the distribution's CA store and the command that
/// rebuilds the bundle from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    pub dir: PathBuf,
    pub bin: &'static str,
    pub args: &'static [&'static str],
}

const TRUST_STORES: &[(&str, &str, &[&str])] = &[
    ("etc/pki/ca-trust/source/anchors", "update-ca-trust", &["extract"]),
    (
        "usr/local/share/ca-certificates",
        "update-ca-certificates",
        &[],
    ),
    (
        "etc/ca-certificates/trust-source/anchors",
        "trust",
        &["extract-compat"],
    ),
    ("usr/share/pki/trust/anchors", "update-ca-certificates", &[]),
];

/// Picks the first known anchor directory present under `root`.
pub fn detect_trust_store(root: &Path) -> Result<TrustStore> {
    TRUST_STORES
        .iter()
        .map(|(dir, bin, args)| TrustStore {
            dir: root.join(dir),
            bin: *bin,
            args: *args,
        })
        .find(|tsc| tsc.dir.is_dir())
        .ok_or_else(|| {
            Error::UnsupportedEnvironment("CA location could not be determined".to_string())
        })
}

/// NSS databases belonging to the current user plus the system one.
pub fn nss_databases(home: &Path) -> Result<Vec<PathBuf>> {
    let pattern = home.join(".mozilla/firefox/*");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| Error::UnsupportedEnvironment(format!("non-UTF-8 home {}", home.display())))?;

    let mut paths = glob(pattern)
        .map_err(|e| Error::UnsupportedEnvironment(e.to_string()))?
        .filter_map(|p| p.ok())
        .collect::<Vec<PathBuf>>();

    paths.extend([
        home.join(".pki/nssdb"),
        home.join("snap/chromium/current/.pki/nssdb"),
        PathBuf::from("/etc/pki/nssdb"),
    ]);

    Ok(paths.into_iter().filter(|p| p.is_dir()).collect())
}

/// File name inside the anchor directory: spaces become `_` and `.pem`
/// becomes `.crt`, which is what the update tools pick up.
pub fn anchor_filename(cert: &Path, tsc: &TrustStore) -> Result<PathBuf> {
    let name = cert
        .file_name()
        .ok_or_else(|| Error::Certificate(format!("{} has no file name", cert.display())))?;

    Ok(tsc.dir.join(
        name.to_string_lossy()
            .replace(' ', "_")
            .replace(".pem", ".crt"),
    ))
}

fn nickname(cert: &Path) -> String {
    cert.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "zen".to_string())
}

fn update_ca(tsc: &TrustStore, runner: &dyn Runner) -> Result<()> {
    run_elevated_checked(runner, &Invocation::new(tsc.bin, tsc.args.iter().copied()), PROMPT)?;
    Ok(())
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

pub fn install(record: &CertificateRecord, runner: &dyn Runner) -> Result<()> {
    let tsc = detect_trust_store(Path::new("/"))?;
    install_into(record, runner, &tsc, &nss_databases(&home_dir())?)
}

pub fn uninstall(record: &CertificateRecord, runner: &dyn Runner) -> Result<()> {
    let tsc = detect_trust_store(Path::new("/"))?;
    uninstall_from(record, runner, &tsc, &nss_databases(&home_dir())?)
}

pub fn install_into(
    record: &CertificateRecord,
    runner: &dyn Runner,
    tsc: &TrustStore,
    nssdbs: &[PathBuf],
) -> Result<()> {
    let source = record.path_str()?;
    let target = anchor_filename(record.path(), tsc)?;

    log::debug!("copying cert from {} to {}", source, target.display());

    run_elevated_checked(
        runner,
        &Invocation::new(
            "install",
            [
                "-m".to_string(),
                "0644".to_string(),
                source.to_string(),
                target.to_string_lossy().into_owned(),
            ],
        ),
        PROMPT,
    )?;
    update_ca(tsc, runner)?;

    install_nss(record.path(), source, runner, nssdbs);

    Ok(())
}

pub fn uninstall_from(
    record: &CertificateRecord,
    runner: &dyn Runner,
    tsc: &TrustStore,
    nssdbs: &[PathBuf],
) -> Result<()> {
    record.path_str()?;
    let target = anchor_filename(record.path(), tsc)?;

    run_elevated_checked(
        runner,
        &Invocation::new("rm", ["-f".to_string(), target.to_string_lossy().into_owned()]),
        PROMPT,
    )?;
    update_ca(tsc, runner)?;

    uninstall_nss(record, runner, nssdbs);

    Ok(())
}

fn install_nss(cert: &Path, source: &str, runner: &dyn Runner, nssdbs: &[PathBuf]) {
    let nick = nickname(cert);

    for_each_nssdb(runner, nssdbs, |db| {
        vec![
            "-A".to_string(),
            "-d".to_string(),
            db,
            "-t".to_string(),
            "C,,".to_string(),
            "-n".to_string(),
            nick.clone(),
            "-i".to_string(),
            source.to_string(),
        ]
    });
}

fn uninstall_nss(record: &CertificateRecord, runner: &dyn Runner, nssdbs: &[PathBuf]) {
    let nick = nickname(record.path());

    for_each_nssdb(runner, nssdbs, |db| {
        vec![
            "-D".to_string(),
            "-d".to_string(),
            db,
            "-n".to_string(),
            nick.clone(),
        ]
    });
}

/// Runs certutil against each database. Browsers keep working without
/// these, so failures are only logged.
fn for_each_nssdb<F>(runner: &dyn Runner, nssdbs: &[PathBuf], args: F)
where
    F: Fn(String) -> Vec<String>,
{
    if nssdbs.is_empty() {
        return;
    }

    let certutil = match runner.lookup(CERTUTIL) {
        Some(path) => path,
        None => {
            log::warn!("certutil not found; skipping {} NSS databases", nssdbs.len());
            return;
        }
    };

    for db in nssdbs {
        log::debug!("Running certutil against {}", db.display());

        let inv = Invocation::new(
            &certutil.to_string_lossy(),
            args(format!("sql:{}", db.display())),
        );
        if let Err(e) = run_checked(runner, &inv) {
            log::warn!("certutil failed for {}: {}", db.display(), e);
        }
    }
}
