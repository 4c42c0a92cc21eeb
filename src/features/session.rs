//! Session manager — gets the primary page into a logged-in state.
//!
//! ```text
//! NoSession → CredentialCheck ─(cookies)─→ ChallengeWait → Stealth → AuthProbe ─(ok)─→ Authenticated
//!                    │                                                   │
//!                    └─(none)─→ NoCredentials ─→ InteractiveLogin ←─(login required)
//!                                                       │
//!                                                       └─→ Authenticated | LoginTimeout (fatal)
//! ```
//!
//! The slider challenge is solved by a human in the visible browser window.
//! The manager only suspends on a [`ChallengeGate`] until the operator says
//! they are done (or the ceiling passes) and then re-checks the page URL.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::core::{SiteProfile, Timings};
use crate::features::session_store::CredentialStore;
use crate::features::stealth::Stealth;
use crate::scraping::page::{BrowsingContext, Page};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    CredentialCheck,
    NoCredentials,
    ChallengeWait,
    Stealth,
    AuthProbe,
    InteractiveLogin,
    Authenticated,
}

fn log_state(state: SessionState) {
    info!("session_state={:?}", state);
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("login was not completed within {}s", .0.as_secs())]
    LoginTimeout(Duration),

    #[error("browser automation failed: {0}")]
    Browser(String),
}

impl SessionError {
    fn browser(e: anyhow::Error) -> Self {
        SessionError::Browser(format!("{:#}", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Challenge gate
// ─────────────────────────────────────────────────────────────────────────────

/// How a [`ChallengeGate::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The operator confirmed.
    Signalled,
    TimedOut,
    /// No operator can ever confirm (signal side dropped).
    Closed,
}

/// Operator side: call [`ChallengeSignal::confirm`] once the challenge is solved.
#[derive(Debug)]
pub struct ChallengeSignal {
    tx: watch::Sender<u64>,
}

impl ChallengeSignal {
    pub fn confirm(&self) {
        self.tx.send_modify(|n| *n = n.wrapping_add(1));
    }
}

/// Automation side of the operator-confirmation channel.
#[derive(Debug)]
pub struct ChallengeGate {
    rx: watch::Receiver<u64>,
}

pub fn challenge_channel() -> (ChallengeSignal, ChallengeGate) {
    let (tx, rx) = watch::channel(0u64);
    (ChallengeSignal { tx }, ChallengeGate { rx })
}

impl ChallengeGate {
    /// A gate nobody can open; waits degrade to timed re-checks.
    pub fn disconnected() -> Self {
        let (_, gate) = challenge_channel();
        gate
    }

    /// Forget confirmations sent before the current challenge appeared.
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }

    pub async fn wait(&mut self, timeout: Duration) -> GateOutcome {
        match tokio::time::timeout(timeout, self.rx.changed()).await {
            Ok(Ok(())) => GateOutcome::Signalled,
            Ok(Err(_)) => GateOutcome::Closed,
            Err(_) => GateOutcome::TimedOut,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

pub struct SessionManager {
    ctx: Arc<dyn BrowsingContext>,
    site: SiteProfile,
    credentials: CredentialStore,
    stealth: Stealth,
    gate: ChallengeGate,
    timings: Timings,
}

impl SessionManager {
    pub fn new(
        ctx: Arc<dyn BrowsingContext>,
        site: SiteProfile,
        credentials: CredentialStore,
        gate: ChallengeGate,
        timings: Timings,
    ) -> Self {
        Self {
            ctx,
            site,
            credentials,
            stealth: Stealth::new(),
            gate,
            timings,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn stealth_applied(&self) -> bool {
        self.stealth.is_applied()
    }

    /// Run the full machine from `CredentialCheck`.
    pub async fn login(&mut self, page: &dyn Page) -> Result<(), SessionError> {
        log_state(SessionState::NoSession);
        log_state(SessionState::CredentialCheck);

        if self.credentials.inject_into(self.ctx.as_ref()).await {
            page.goto(&self.site.home_url)
                .await
                .map_err(SessionError::browser)?;
            tokio::time::sleep(self.timings.settle).await;

            log_state(SessionState::ChallengeWait);
            self.wait_for_challenge(page).await;

            log_state(SessionState::Stealth);
            self.apply_stealth().await;

            log_state(SessionState::AuthProbe);
            if !self.is_login_required(page).await {
                info!("session: ✅ stored session accepted");
                log_state(SessionState::Authenticated);
                return Ok(());
            }
            info!("session: stored session expired, QR-code login required");
        } else {
            log_state(SessionState::NoCredentials);
            info!("session: no stored session, QR-code login required");
            self.apply_stealth().await;
        }

        log_state(SessionState::InteractiveLogin);
        self.interactive_login(page).await?;
        log_state(SessionState::Authenticated);
        Ok(())
    }

    /// Re-run [`Self::login`] when the probe says the session was lost.
    pub async fn ensure_login(&mut self, page: &dyn Page) -> Result<(), SessionError> {
        if self.is_login_required(page).await {
            warn!("session: logged out mid-run, re-authenticating");
            self.login(page).await
        } else {
            info!("session: still logged in");
            Ok(())
        }
    }

    async fn apply_stealth(&self) {
        let referer = format!("{}/", self.site.home_url.trim_end_matches('/'));
        if let Err(e) = self.stealth.apply(self.ctx.as_ref(), &referer).await {
            warn!("session: stealth setup failed (continuing): {:#}", e);
        }
    }

    /// `true` when the page shows the logged-out navigation, or an
    /// access-denied interstitial after a failed probe.
    pub async fn is_login_required(&self, page: &dyn Page) -> bool {
        let sel = &self.site.selectors;
        match page.text(&sel.nav_figure).await {
            Ok(Some(text)) => text.contains(&self.site.markers.not_logged_in),
            Ok(None) => false,
            Err(e) => {
                warn!("session: login probe failed: {:#}", e);
                match page
                    .wait_for_selector(&sel.interstitial_heading, self.timings.interstitial_timeout)
                    .await
                {
                    Ok(()) => {
                        if page.count(&sel.access_denied_login).await.unwrap_or(0) > 0 {
                            if let Err(e) = page.click(&sel.access_denied_login, 0).await {
                                warn!("session: access-denied login link click failed: {:#}", e);
                            }
                        }
                        true
                    }
                    Err(_) => {
                        info!("session: no access-denied interstitial, treating session as valid");
                        false
                    }
                }
            }
        }
    }

    /// Block while the page sits on the slider challenge, up to the ceiling.
    pub async fn wait_for_challenge(&mut self, page: &dyn Page) {
        let start = Instant::now();
        let ceiling = self.timings.challenge_timeout;
        let mut announced = false;

        loop {
            let url = page.current_url().await.unwrap_or_default();
            if !url.starts_with(&self.site.slider_url) {
                if announced {
                    info!("session: slider challenge cleared");
                }
                return;
            }

            let elapsed = start.elapsed();
            if elapsed >= ceiling {
                warn!(
                    "session: slider challenge still open after {}s, proceeding anyway",
                    ceiling.as_secs()
                );
                return;
            }
            let remaining = ceiling - elapsed;

            if !announced {
                self.gate.mark_seen();
                info!("session: 🧩 slider challenge detected, solve it in the browser window and press Enter to continue");
                announced = true;
            }

            match self.gate.wait(remaining).await {
                GateOutcome::Signalled => {
                    tokio::time::sleep(self.timings.settle).await;
                }
                GateOutcome::TimedOut => {}
                GateOutcome::Closed => {
                    tokio::time::sleep(self.timings.challenge_recheck.min(remaining)).await;
                }
            }
        }
    }

    /// Open the login page and wait for the user to scan the QR code.
    pub async fn interactive_login(&self, page: &dyn Page) -> Result<(), SessionError> {
        let sel = &self.site.selectors;
        page.goto(&self.site.login_url())
            .await
            .map_err(SessionError::browser)?;
        tokio::time::sleep(self.timings.settle).await;

        match page.count(&sel.scan_login_switch).await {
            Ok(n) if n > 0 => {
                if let Err(e) = page.click(&sel.scan_login_switch, 0).await {
                    warn!("session: QR-code switch click failed: {:#}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("session: QR-code switch lookup failed: {:#}", e),
        }

        let limit = self.timings.login_timeout;
        info!(
            "session: 📱 waiting for QR-code login (up to {} min)",
            limit.as_secs() / 60
        );
        let start = Instant::now();
        loop {
            match page.is_visible(&sel.job_list_container).await {
                Ok(true) => {
                    info!("session: ✅ login detected");
                    match self.credentials.capture_from(self.ctx.as_ref()).await {
                        Ok(n) => info!("session: persisted {} cookies", n),
                        Err(e) => warn!("session: failed to persist cookies: {:#}", e),
                    }
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => warn!("session: login poll failed: {:#}", e),
            }

            if start.elapsed() >= limit {
                error!(
                    "session: login not completed within {} min, giving up",
                    limit.as_secs() / 60
                );
                return Err(SessionError::LoginTimeout(limit));
            }
            tokio::time::sleep(self.timings.login_poll).await;
        }
    }
}
