mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use boss_scout::page::{BrowsingContext, Page};
use boss_scout::session::{challenge_channel, ChallengeGate, SessionError, SessionManager};
use boss_scout::session_store::CredentialStore;
use boss_scout::{SiteProfile, Timings};
use common::{init_logger, session_cookie, FakeSite, SiteState};

fn manager(site: &FakeSite, dir: &std::path::Path, gate: ChallengeGate) -> SessionManager {
    let ctx: Arc<dyn BrowsingContext> = Arc::new(site.clone());
    SessionManager::new(
        ctx,
        SiteProfile::default(),
        CredentialStore::new(dir.join("cookie.json")),
        gate,
        Timings::fast(),
    )
}

fn store_cookie(dir: &std::path::Path) {
    CredentialStore::new(dir.join("cookie.json"))
        .save(&[session_cookie("stored-token")])
        .unwrap();
}

#[tokio::test]
async fn test_stored_session_skips_qr_login() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    store_cookie(dir.path());
    let site = FakeSite::new(SiteState::default());
    let page = site.page();
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());

    session.login(&page).await.unwrap();

    let profile = SiteProfile::default();
    let st = site.state();
    assert_eq!(st.gotos, vec![profile.home_url.clone()]);
    assert_eq!(st.login_polls, 0);
    assert!(st.logged_in);
    assert!(st.headers.iter().any(|(k, v)| k == "sec-ch-ua-platform" && v.contains("macOS")));
    assert_eq!(st.init_scripts.len(), 1);
    drop(st);
    assert!(session.stealth_applied());
}

#[tokio::test]
async fn test_missing_store_goes_straight_to_qr_login_and_persists_cookies() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState {
        login_after_polls: Some(3),
        ..Default::default()
    });
    let page = site.page();
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());

    session.login(&page).await.unwrap();

    assert_eq!(site.state().gotos, vec![SiteProfile::default().login_url()]);
    assert_eq!(site.state().login_polls, 3);
    assert!(session.stealth_applied());
    assert!(site
        .state()
        .clicks
        .contains(&SiteProfile::default().selectors.scan_login_switch));

    let saved = session.credentials().load_raw().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["value"], "fresh-token");
}

#[tokio::test]
async fn test_expired_store_falls_back_to_qr_login() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    store_cookie(dir.path());
    let site = FakeSite::new(SiteState {
        stored_cookies_valid: false,
        login_after_polls: Some(1),
        ..Default::default()
    });
    let page = site.page();
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());

    session.login(&page).await.unwrap();

    let profile = SiteProfile::default();
    assert_eq!(
        site.state().gotos,
        vec![profile.home_url.clone(), profile.login_url()]
    );
    // Stealth is applied once even though both paths ran.
    assert_eq!(site.state().init_scripts.len(), 1);
    let saved = session.credentials().load_raw().unwrap();
    assert_eq!(saved[0]["value"], "fresh-token");
}

#[tokio::test]
async fn test_qr_login_timeout_is_fatal() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState::default());
    let page = site.page();
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());

    let err = session.login(&page).await.unwrap_err();
    assert!(matches!(err, SessionError::LoginTimeout(_)), "{:?}", err);
    assert!(site.state().login_polls > 1);
    assert!(!dir.path().join("cookie.json").exists());
}

#[tokio::test]
async fn test_probe_failure_with_interstitial_requires_login() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState {
        logged_in: true,
        probe_fails: true,
        show_interstitial: true,
        ..Default::default()
    });
    let page = site.page();
    let session = manager(&site, dir.path(), ChallengeGate::disconnected());

    assert!(session.is_login_required(&page).await);
    assert!(site
        .state()
        .clicks
        .contains(&SiteProfile::default().selectors.access_denied_login));
}

#[tokio::test]
async fn test_probe_failure_without_interstitial_keeps_session() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState {
        logged_in: true,
        probe_fails: true,
        ..Default::default()
    });
    let page = site.page();
    let session = manager(&site, dir.path(), ChallengeGate::disconnected());

    assert!(!session.is_login_required(&page).await);
    assert!(site.state().clicks.is_empty());
}

#[tokio::test]
async fn test_ensure_login_reauthenticates_after_logout() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState {
        login_after_polls: Some(1),
        ..Default::default()
    });
    let page = site.page();
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());
    session.login(&page).await.unwrap();

    // Still logged in: no navigation.
    page.goto(&SiteProfile::default().home_url).await.unwrap();
    let before = site.state().gotos.len();
    session.ensure_login(&page).await.unwrap();
    assert_eq!(site.state().gotos.len(), before);

    // The site drops the session; stored cookies no longer help.
    {
        let mut st = site.state();
        st.logged_in = false;
        st.stored_cookies_valid = false;
        st.login_polls = 0;
    }
    session.ensure_login(&page).await.unwrap();
    assert!(site.state().logged_in);
    assert_eq!(
        site.state().gotos.last().cloned(),
        Some(SiteProfile::default().login_url())
    );
}

#[tokio::test]
async fn test_challenge_wait_returns_once_operator_confirms() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState::default());
    let profile = SiteProfile::default();
    let page = site.page();
    page.set_url(&format!("{}?callbackUrl=x", profile.slider_url));

    let (signal, gate) = challenge_channel();
    let mut session = manager(&site, dir.path(), gate);

    let solver = page.clone();
    let home = profile.home_url.clone();
    let operator = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        solver.set_url(&home);
        signal.confirm();
        // Keep the sender alive until the waiter has re-checked.
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let start = Instant::now();
    session.wait_for_challenge(&page).await;
    let elapsed = start.elapsed();
    operator.await.unwrap();

    assert!(elapsed >= Duration::from_millis(30), "{:?}", elapsed);
    assert!(elapsed < Timings::fast().challenge_timeout, "{:?}", elapsed);
}

#[tokio::test]
async fn test_unsolved_challenge_gives_up_at_ceiling() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState::default());
    let page = site.page();
    page.set_url(&SiteProfile::default().slider_url);
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());

    let start = Instant::now();
    session.wait_for_challenge(&page).await;
    assert!(start.elapsed() >= Timings::fast().challenge_timeout);
}

#[tokio::test]
async fn test_no_challenge_returns_immediately() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(SiteState::default());
    let page = site.page();
    page.set_url(&SiteProfile::default().home_url);
    let mut session = manager(&site, dir.path(), ChallengeGate::disconnected());

    let start = Instant::now();
    session.wait_for_challenge(&page).await;
    assert!(start.elapsed() < Timings::fast().challenge_timeout);
}
