//! Delivery of password reset tokens.
//!
//! Sending mail is outside this crate; the HTTP layer hands every issued
//! ticket to a `ResetNotifier` and answers the client the same way whether
//! or not a ticket existed.

use tracing::info;

use super::PasswordResetTicket;

pub trait ResetNotifier: Send + Sync {
    fn deliver(&self, ticket: &PasswordResetTicket);
}

/// Records that a reset was requested. Never logs the token itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingResetNotifier;

impl ResetNotifier for LoggingResetNotifier {
    fn deliver(&self, ticket: &PasswordResetTicket) {
        info!(
            user_id = %ticket.user_id,
            expires_in = ticket.expires_in,
            "Password reset requested; no mail transport configured"
        );
    }
}

/// Keeps delivered tickets in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CapturingResetNotifier {
    pub(crate) tickets: parking_lot::Mutex<Vec<PasswordResetTicket>>,
}

#[cfg(test)]
impl ResetNotifier for CapturingResetNotifier {
    fn deliver(&self, ticket: &PasswordResetTicket) {
        self.tickets.lock().push(ticket.clone());
    }
}
