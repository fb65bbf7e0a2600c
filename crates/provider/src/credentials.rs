//! GitHub token resolution: explicit flag, then `GITHUB_TOKEN`, then the
//! git credential helper.

use orgaudit_core::error::{OrgAuditError, OrgAuditResult};
use std::fmt;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const CREDENTIAL_HOST: &str = "github.com";

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Flag,
    Environment,
    CredentialHelper,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flag => "flag",
            Self::Environment => TOKEN_ENV,
            Self::CredentialHelper => "git credential helper",
        })
    }
}

/// An API token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    secret: String,
    pub source: TokenSource,
}

impl Token {
    pub fn new(secret: impl Into<String>, source: TokenSource) -> Self {
        Self {
            secret: secret.into(),
            source,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn into_secret(self) -> String {
        self.secret
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolves a token in priority order. Empty values count as absent.
///
/// A failing credential helper is logged and treated as "no token"; only
/// the absence of every source is an error.
pub async fn resolve_token(explicit: Option<&str>) -> OrgAuditResult<Token> {
    let env = std::env::var(TOKEN_ENV).ok();
    if let Some(token) = pick_token(explicit, env.as_deref()) {
        return Ok(token);
    }

    match git_credential_fill(CREDENTIAL_HOST).await {
        Ok(secret) => Ok(Token::new(secret, TokenSource::CredentialHelper)),
        Err(e) => {
            tracing::warn!(error = %e, "could not get token from git credential helper");
            Err(OrgAuditError::Credential(format!(
                "no token provided; use --token, {TOKEN_ENV}, or configure a git credential helper"
            )))
        }
    }
}

/// Flag beats environment.
fn pick_token(explicit: Option<&str>, env: Option<&str>) -> Option<Token> {
    non_empty(explicit)
        .map(|s| Token::new(s, TokenSource::Flag))
        .or_else(|| non_empty(env).map(|s| Token::new(s, TokenSource::Environment)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Asks `git credential fill` for the stored password of `host`.
pub async fn git_credential_fill(host: &str) -> OrgAuditResult<String> {
    let mut child = Command::new("git")
        .args(["credential", "fill"])
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| OrgAuditError::Credential(format!("failed to run git: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(format!("protocol=https\nhost={host}\n\n").as_bytes())
            .await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(OrgAuditError::Credential(format!(
            "git credential fill failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_credential_output(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| OrgAuditError::Credential("no password found in git credential output".into()))
}

/// Extracts the `password=` line of a git credential response.
pub fn parse_credential_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("password="))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}
