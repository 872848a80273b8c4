//! Grant status polling.
//!
//! [`transition`] is the pure state machine: it maps one status report to an
//! outcome. [`GrantPoller`] drives it on a fixed tick until a terminal status,
//! the absolute deadline, or cancellation, whichever comes first.

use std::time::Duration;

use {
    tokio::time::{Instant, MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    defaults,
    error::{Error, Result},
    flow::LoginEvents,
    server::AuthServer,
    types::{GrantStatus, StatusReport},
};

/// Tick interval and overall deadline for one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: defaults::POLL_INTERVAL,
            timeout: defaults::LOGIN_TIMEOUT,
        }
    }
}

/// Non-terminal phase of a grant. Ordered: a grant never goes back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GrantPhase {
    Pending,
    Scanned,
}

#[derive(Debug)]
pub enum PollOutcome {
    Waiting(GrantPhase),
    Approved(String),
    Failed(Error),
}

pub fn transition(report: &StatusReport) -> PollOutcome {
    match report.status {
        GrantStatus::Authorized => match report.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => PollOutcome::Approved(code.to_string()),
            _ => PollOutcome::Failed(Error::Protocol(
                "grant was authorized but the authorization code is missing".into(),
            )),
        },
        GrantStatus::Expired | GrantStatus::Canceled => {
            PollOutcome::Failed(Error::GrantTerminated {
                status: report.status,
                message: report.message.clone(),
            })
        },
        GrantStatus::Scanned => PollOutcome::Waiting(GrantPhase::Scanned),
        GrantStatus::Pending | GrantStatus::Unknown => PollOutcome::Waiting(GrantPhase::Pending),
    }
}

pub struct GrantPoller<'a, S: ?Sized> {
    server: &'a S,
    schedule: PollSchedule,
}

impl<'a, S: AuthServer + ?Sized> GrantPoller<'a, S> {
    pub fn new(server: &'a S, schedule: PollSchedule) -> Self {
        Self { server, schedule }
    }

    /// Block until the grant is approved and return its authorization code.
    pub async fn wait_for_code(
        &self,
        qr_code_id: &str,
        events: &dyn LoginEvents,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let deadline = Instant::now() + self.schedule.timeout;
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(qr_code_id, "grant polling cancelled");
                Err(Error::Cancelled)
            },
            () = tokio::time::sleep_until(deadline) => Err(Error::Timeout {
                waited: self.schedule.timeout,
            }),
            result = self.poll_until_terminal(qr_code_id, events) => result,
        }
    }

    async fn poll_until_terminal(
        &self,
        qr_code_id: &str,
        events: &dyn LoginEvents,
    ) -> Result<String> {
        let period = self.schedule.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut phase = GrantPhase::Pending;
        loop {
            ticker.tick().await;

            let report = match self.server.grant_status(qr_code_id).await {
                Ok(report) => report,
                Err(e) if e.is_transient() => {
                    debug!(qr_code_id, error = %e, "grant status check failed, will retry");
                    continue;
                },
                Err(e) => return Err(e),
            };

            match transition(&report) {
                PollOutcome::Waiting(next) => {
                    if next > phase {
                        phase = next;
                        info!(qr_code_id, "QR code scanned, waiting for approval");
                        events.scanned();
                    }
                },
                PollOutcome::Approved(code) => {
                    info!(qr_code_id, "grant authorized");
                    return Ok(code);
                },
                PollOutcome::Failed(e) => return Err(e),
            }
        }
    }
}
