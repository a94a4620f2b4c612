//! Invite email delivery abstraction.
//!
//! The admin core hands a fully formed `InviteEmail` to an `EmailSender` after
//! the invite has been committed. Delivery is best effort: a failing sender
//! is logged by the caller and never rolls back or fails the invite.
//!
//! The default sender is `LogEmailSender`, which logs the message and returns
//! `Ok(())`. Real deployments plug in an SMTP or API-backed implementation.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InviteEmail {
    pub to_email: String,
    pub org_name: String,
    pub invite_url: String,
    pub inviter_name: Option<String>,
}

/// Email delivery abstraction used by the invite engine.
pub trait EmailSender: Send + Sync {
    /// Deliver an invite or return an error; the caller logs it and moves on.
    ///
    /// # Errors
    /// Any delivery failure.
    fn send_invite(&self, message: &InviteEmail) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send_invite(&self, message: &InviteEmail) -> Result<()> {
        info!(
            to_email = %message.to_email,
            org_name = %message.org_name,
            invite_url = %message.invite_url,
            inviter_name = message.inviter_name.as_deref().unwrap_or("-"),
            "invite email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_every_message() {
        let message = InviteEmail {
            to_email: "u2@x.com".to_string(),
            org_name: "Acme".to_string(),
            invite_url: "http://localhost:3000/invite/tok".to_string(),
            inviter_name: None,
        };
        assert!(LogEmailSender.send_invite(&message).is_ok());
    }
}
