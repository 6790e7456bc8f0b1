//!
//! src/generator.rs
//!
//! Text generation through a local model cli: the prompt goes in on
//! stdin, the character comes back on stdout
//!

use std::{io::ErrorKind, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command, time::timeout};

use crate::config::GeneratorConfig;
use crate::errors::AlterEgoError;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AlterEgoError>;
}

/// `<binary> run <model>`, e.g. `ollama run llama3`
#[derive(Debug, Clone)]
pub struct OllamaCli {
    binary: String,
    args: Vec<String>,
    timeout: Option<Duration>
}

impl OllamaCli {
    pub fn new(cfg: &GeneratorConfig) -> Self {
        Self {
            binary: cfg.binary.clone(),
            args: vec!["run".to_string(), cfg.model.clone()],
            timeout: cfg.timeout
        }
    }

    /// Any program that reads a prompt on stdin and answers on stdout
    pub fn with_command(binary: impl Into<String>, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { binary: binary.into(), args, timeout }
    }

    async fn run(&self, prompt: &str) -> Result<String, AlterEgoError> {
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AlterEgoError::Generation(format!("spawn {}: {e}", self.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(prompt.as_bytes()).await {
                Ok(()) => {}
                // cli exited before reading, its status and stderr tell why
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!("generator.stdin.closed");
                }
                Err(e) => return Err(AlterEgoError::Generation(format!("write prompt: {e}")))
            }
            // dropping stdin closes the pipe so the cli starts answering
        }

        let output = child.wait_with_output().await
            .map_err(|e| AlterEgoError::Generation(format!("wait {}: {e}", self.binary)))?;

        tracing::debug!(status = ?output.status.code(), bytes = output.stdout.len(), "generator.exit");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AlterEgoError::Generation(format!(
                "{} exited with {}: {}", self.binary, output.status, stderr.trim()
            )));
        }
        Ok( String::from_utf8_lossy(&output.stdout).into_owned() )
    }
}

#[async_trait]
impl TextGenerator for OllamaCli {
    async fn generate(&self, prompt: &str) -> Result<String, AlterEgoError> {
        tracing::info!(binary = %self.binary, args = ?self.args, prompt_len = prompt.len(), "generator.start");
        match self.timeout {
            Some(limit) => timeout(limit, self.run(prompt)).await
                .map_err(|_| AlterEgoError::Generation(
                    format!("{} timed out after {}s", self.binary, limit.as_secs())
                ))?,
            None => self.run(prompt).await
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Option<Duration>) -> OllamaCli {
        OllamaCli::with_command("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[test]
    fn builds_run_model_args() {
        let cli = OllamaCli::new(&GeneratorConfig::default());
        assert_eq!(cli.binary, "ollama");
        assert_eq!(cli.args, vec!["run".to_string(), "llama3".to_string()]);
    }

    #[tokio::test]
    async fn stdout_is_returned_verbatim() {
        let out = sh("cat", None).generate("### DESCRIPTION\nA\n### IMAGE\nB\n").await.unwrap();
        assert_eq!(out, "### DESCRIPTION\nA\n### IMAGE\nB\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_generation_error_with_stderr() {
        let err = sh("cat >/dev/null; echo 'model not found' >&2; exit 3", None)
            .generate("prompt")
            .await
            .unwrap_err();
        match err {
            AlterEgoError::Generation(msg) => assert!(msg.contains("model not found"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn early_exit_reports_stderr_not_broken_pipe() {
        // exits without reading stdin; a large prompt overflows the pipe buffer
        let prompt = "x".repeat(1 << 20);
        let err = sh("echo 'pull llama3 first' >&2; exit 1", None)
            .generate(&prompt)
            .await
            .unwrap_err();
        match err {
            AlterEgoError::Generation(msg) => {
                assert!(msg.contains("pull llama3 first"), "{msg}");
                assert!(!msg.contains("write prompt"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_generation_error() {
        let cli = OllamaCli::with_command("definitely-not-a-real-binary-xyz", vec![], None);
        assert!(matches!(cli.generate("p").await, Err(AlterEgoError::Generation(_))));
    }

    #[tokio::test]
    async fn timeout_wrapper_fires() {
        let err = sh("sleep 5", Some(Duration::from_millis(100)))
            .generate("p")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
