//! The signed-in user, as far as the attendance core cares: who is stamping records, and whether
//! that sign-in has gone stale.

use crate::error::{Error, Result};
use crate::models::UserId;
use chrono::{NaiveDateTime, TimeDelta};
use tracing::{info, warn};

/// Idle time after which a sign-in is no longer trusted.
pub const DEFAULT_INACTIVITY_TIMEOUT: TimeDelta = TimeDelta::minutes(30);

#[derive(Debug, Clone, PartialEq, Eq)]
struct SignedIn {
    user_id: UserId,
    last_activity: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Identity {
    current: Option<SignedIn>,
    inactivity_timeout: TimeDelta,
}

impl Identity {
    pub fn new(inactivity_timeout: TimeDelta) -> Self {
        Self {
            current: None,
            inactivity_timeout,
        }
    }

    pub fn sign_in(&mut self, user_id: impl Into<UserId>, now: NaiveDateTime) {
        let user_id = user_id.into();
        info!(user = %user_id, "signed in");
        self.current = Some(SignedIn {
            user_id,
            last_activity: now,
        });
    }

    /// Clears the identity, returning who was signed in.
    pub fn sign_out(&mut self) -> Option<UserId> {
        self.current.take().map(|signed_in| signed_in.user_id)
    }

    /// Who is signed in, without checking for expiry.
    pub fn user_id(&self) -> Option<&str> {
        self.current.as_ref().map(|signed_in| signed_in.user_id.as_str())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// Returns the signed-in user and records activity.
    ///
    /// An identity idle for longer than the inactivity timeout is signed out on the spot and
    /// [`Error::SessionExpired`] is returned, so nothing can be written on its behalf.
    pub fn current_user(&mut self, now: NaiveDateTime) -> Result<UserId> {
        let signed_in = self.current.as_mut().ok_or(Error::NotSignedIn)?;

        if now - signed_in.last_activity > self.inactivity_timeout {
            let expired = self.sign_out();
            warn!(user = ?expired, "session expired after inactivity, forcing sign-out");
            return Err(Error::SessionExpired);
        }

        signed_in.last_activity = now;
        Ok(signed_in.user_id.clone())
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_TIMEOUT)
    }
}
