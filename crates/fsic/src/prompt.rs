use fsic_core::error::{AuthFailure, Result};
use fsic_core::{PasswordPrompt, PromptKind};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "FSIC_PASSWORD";
pub const NEW_PASSWORD_ENV: &str = "FSIC_NEW_PASSWORD";
pub const NEW_PASSWORD_CONFIRM_ENV: &str = "FSIC_NEW_PASSWORD_CONFIRM";

/// Masked terminal input, unless the matching environment variable is set.
pub struct TerminalPrompt;

fn from_env(name: &str) -> Option<Zeroizing<String>> {
    match std::env::var(name) {
        Ok(pw) if !pw.is_empty() => Some(Zeroizing::new(pw)),
        _ => None,
    }
}

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&mut self, kind: PromptKind) -> Result<Zeroizing<String>> {
        let env = match kind {
            PromptKind::Current => from_env(PASSWORD_ENV),
            PromptKind::New => from_env(NEW_PASSWORD_ENV),
            PromptKind::Confirm => {
                from_env(NEW_PASSWORD_CONFIRM_ENV).or_else(|| from_env(NEW_PASSWORD_ENV))
            }
        };
        if let Some(pw) = env {
            return Ok(pw);
        }
        let pw = rpassword::prompt_password(kind.text())
            .map_err(|e| AuthFailure::Prompt(e.to_string()))?;
        Ok(Zeroizing::new(pw))
    }
}
