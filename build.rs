//! Stamps `APP_VERSION` for `duosida --version`.
//!
//! Release builds report the crate version. With `DUOSIDA_NIGHTLY=1` the
//! version gains a `-nightly` suffix and, when known, the commit as build
//! metadata (`0.3.0-nightly+abc1234`).

use std::process::Command;

const NIGHTLY_ENV: &str = "DUOSIDA_NIGHTLY";
const SHA_ENV: &str = "GIT_SHA";

fn main() {
    let version = app_version(env!("CARGO_PKG_VERSION"), nightly_requested(), commit_sha());
    println!("cargo:rustc-env=APP_VERSION={version}");

    for var in [NIGHTLY_ENV, SHA_ENV] {
        println!("cargo:rerun-if-env-changed={var}");
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn nightly_requested() -> bool {
    std::env::var(NIGHTLY_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Short commit hash from git, else from `GIT_SHA` (CI without a checkout)
fn commit_sha() -> Option<String> {
    let from_git = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|sha| !sha.is_empty());

    from_git.or_else(|| std::env::var(SHA_ENV).ok().filter(|sha| !sha.is_empty()))
}

fn app_version(base: &str, nightly: bool, sha: Option<String>) -> String {
    if !nightly {
        return base.to_string();
    }
    match sha {
        Some(sha) => format!("{base}-nightly+{sha}"),
        None => format!("{base}-nightly"),
    }
}
