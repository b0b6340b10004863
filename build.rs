//! Build script: embed the git short hash for `version_string()`.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if std::env::var_os("CARGO_FEATURE_CUDA").is_some() && Command::new("nvcc").arg("--version").output().is_err() {
        println!("cargo::warning=feature `cuda` is enabled but nvcc was not found; whisper-rs will fail to build");
    }
}
