//! Double-submit guard.
//!
//! A form submission takes a [`SubmitTicket`] keyed by form and visitor
//! before calling the backend. A second submission of the same form by the
//! same visitor is refused until the ticket is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Shown inline when a submission is refused.
pub const IN_FLIGHT_MESSAGE: &str = "Envio em andamento. Aguarde a conclusão.";

/// The same form is already being submitted.
#[derive(Debug, Clone, Copy, Error)]
#[error("envio em andamento")]
pub struct InFlight;

/// Forms currently being submitted, shared across requests.
#[derive(Clone, Default)]
pub struct SubmitGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SubmitGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `form` for `owner` (session or user id).
    ///
    /// Visitors without a session id yet cannot have a concurrent
    /// submission, so they get a ticket that holds nothing.
    ///
    /// # Errors
    ///
    /// Returns [`InFlight`] if the same form is already claimed by the owner.
    pub fn try_begin(&self, form: &str, owner: Option<&str>) -> Result<SubmitTicket, InFlight> {
        let Some(owner) = owner else {
            return Ok(SubmitTicket {
                key: None,
                in_flight: Arc::clone(&self.in_flight),
            });
        };

        let key = format!("{form}:{owner}");
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key.clone()) {
            tracing::debug!(form, "Rejected duplicate submission");
            return Err(InFlight);
        }

        Ok(SubmitTicket {
            key: Some(key),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Number of submissions in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its claim when dropped.
#[must_use = "the claim is released as soon as the ticket is dropped"]
pub struct SubmitTicket {
    key: Option<String>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SubmitTicket {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_submission_rejected_until_release() {
        let guard = SubmitGuard::new();
        let ticket = guard.try_begin("cadastro", Some("s1")).unwrap();
        assert!(guard.try_begin("cadastro", Some("s1")).is_err());

        // Other forms and other visitors are independent.
        let _other_form = guard.try_begin("perfil", Some("s1")).unwrap();
        let _other_owner = guard.try_begin("cadastro", Some("s2")).unwrap();
        assert_eq!(guard.len(), 3);

        drop(ticket);
        assert!(guard.try_begin("cadastro", Some("s1")).is_ok());
    }

    #[test]
    fn test_anonymous_ticket_holds_nothing() {
        let guard = SubmitGuard::new();
        let _a = guard.try_begin("cadastro", None).unwrap();
        let _b = guard.try_begin("cadastro", None).unwrap();
        assert!(guard.is_empty());
    }
}
