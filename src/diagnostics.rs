//! System diagnostics and dependency checking.
//!
//! Verifies that the external tools and services named in the configuration are
//! reachable before a long batch is started.

use crate::config::{Config, TranscriptionBackend};
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues (e.g., server not answering)
    Warning(String),
}

/// Check if a command exists and is executable.
///
/// Some tools reject `--version`; anything that could be spawned counts as present.
fn check_command(command: &str) -> CheckResult {
    match Command::new(command).arg("--version").output() {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{}' found but --version failed", command)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", command, e)),
    }
}

/// Check that the Ollama server answers on `/api/tags` and lists `model`.
#[cfg(feature = "ollama")]
fn check_ollama(url: &str, model: &str) -> CheckResult {
    let client = match reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(e) => return CheckResult::Warning(format!("HTTP client error: {}", e)),
    };
    let tags = format!("{}/api/tags", url.trim_end_matches('/'));
    match client.get(&tags).send() {
        Ok(response) if response.status().is_success() => {
            let body = response.text().unwrap_or_default();
            if body.contains(model) {
                CheckResult::Ok
            } else {
                CheckResult::Warning(format!(
                    "server is up but model '{}' is not pulled (ollama pull {})",
                    model, model
                ))
            }
        }
        Ok(response) => CheckResult::Warning(format!("server answered {}", response.status())),
        Err(_) => CheckResult::NotFound,
    }
}

/// Print one check line and report whether the dependency is usable.
fn report(label: &str, result: CheckResult, hint: &str) -> bool {
    print!("{}: ", label);
    match result {
        CheckResult::Ok => {
            println!("✓ OK");
            true
        }
        CheckResult::NotFound => {
            println!("✗ NOT FOUND");
            if !hint.is_empty() {
                println!("  {}", hint);
            }
            false
        }
        CheckResult::Warning(msg) => {
            println!("⚠ WARNING: {}", msg);
            true
        }
    }
}

fn program_of(argv: &[String]) -> &str {
    argv.first().map(String::as_str).unwrap_or_default()
}

/// Run all dependency checks and print results.
///
/// Returns `false` when a mandatory stage has no usable backend.
pub fn check_dependencies(config: &Config) -> bool {
    println!("Checking redub dependencies...\n");
    let mut ready = true;

    if config.denoise.enabled {
        // optional stage: never blocks the batch
        report(
            "denoise (optional)",
            check_command(program_of(&config.denoise.command)),
            "Install: pip install deepfilternet  (or set denoise.enabled = false)",
        );
    } else {
        println!("denoise (optional): - disabled");
    }

    ready &= report(
        "separation",
        check_command(program_of(&config.separation.command)),
        "Install: pip install demucs",
    );

    match config.transcription.backend {
        TranscriptionBackend::Command => {
            ready &= report(
                "transcription",
                check_command(program_of(&config.transcription.command)),
                "Install: pip install openai-whisper  (or use backend = \"whisper\")",
            );
        }
        TranscriptionBackend::Whisper => {
            let model = &config.transcription.whisper_model;
            let result = if !cfg!(feature = "whisper") {
                CheckResult::Warning("built without the `whisper` feature".to_string())
            } else if model.is_file() {
                CheckResult::Ok
            } else {
                CheckResult::NotFound
            };
            let usable = report(
                "transcription (whisper-rs)",
                result,
                &format!("Model file missing: {}", model.display()),
            );
            ready &= usable && cfg!(feature = "whisper");
        }
    }

    #[cfg(feature = "ollama")]
    {
        ready &= report(
            &format!("translation ({})", config.translation.ollama_url),
            check_ollama(&config.translation.ollama_url, &config.translation.model),
            "Start the server: ollama serve",
        );
    }
    #[cfg(not(feature = "ollama"))]
    {
        println!("translation: ✗ built without the `ollama` feature");
        ready = false;
    }

    ready &= report(
        "synthesis",
        check_command(program_of(&config.synthesis.command)),
        "Set synthesis.command to your voice-cloning TTS tool",
    );

    println!();
    if ready {
        println!("✓ Ready to redub.");
    } else {
        println!("⚠ Some mandatory stages are unavailable; files will fail at those stages.");
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_equality() {
        assert_eq!(CheckResult::Ok, CheckResult::Ok);
        assert_eq!(CheckResult::NotFound, CheckResult::NotFound);
        assert_eq!(
            CheckResult::Warning("test".to_string()),
            CheckResult::Warning("test".to_string())
        );
    }

    #[test]
    fn test_check_command_echo_exists() {
        // echo might not support --version on all systems, so we accept both Ok and Warning
        match check_command("echo") {
            CheckResult::Ok | CheckResult::Warning(_) => {}
            CheckResult::NotFound => panic!("echo command should be found on Unix systems"),
        }
    }

    #[test]
    fn test_check_command_nonexistent() {
        let result = check_command("nonexistent-command-xyz-12345");
        assert_eq!(result, CheckResult::NotFound);
    }

    #[test]
    fn test_report_treats_warning_as_usable() {
        assert!(report("x", CheckResult::Ok, ""));
        assert!(report("x", CheckResult::Warning("slow".to_string()), ""));
        assert!(!report("x", CheckResult::NotFound, "hint"));
    }

    #[test]
    fn test_missing_tools_are_not_ready() {
        let mut config = Config::default();
        config.separation.command = vec!["nonexistent-separator-xyz".to_string()];
        assert!(!check_dependencies(&config));
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_unreachable_ollama_is_not_found() {
        assert_eq!(check_ollama("http://127.0.0.1:9", "llama3.1"), CheckResult::NotFound);
    }
}
