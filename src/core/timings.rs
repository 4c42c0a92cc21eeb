use std::time::Duration;

/// Every fixed wait and poll bound of a run.
///
/// The defaults match how fast the real site renders; tests swap in
/// [`Timings::fast`] so nothing sleeps for whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause after a navigation before reading the page.
    pub settle: Duration,
    /// Listing scanner: pause after each bottom scroll.
    pub scroll_settle: Duration,
    /// Inbox: pause after opening the chat list.
    pub inbox_settle: Duration,
    /// Extractor: how long the detail pane may take to appear.
    pub detail_timeout: Duration,
    /// Submission: spacing of the chat-button and input-field polls.
    pub submit_poll: Duration,
    pub chat_button_attempts: u32,
    pub input_field_attempts: u32,
    /// Session: how long an `h1` interstitial may take after a failed probe.
    pub interstitial_timeout: Duration,
    pub login_poll: Duration,
    pub login_timeout: Duration,
    /// Ceiling of the slider-challenge wait; the run proceeds afterwards.
    pub challenge_timeout: Duration,
    /// Re-check spacing of the challenge wait when no operator signal can arrive.
    pub challenge_recheck: Duration,
    /// Length of one "second" of the randomised inter-job delay.
    pub pacing_unit: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            scroll_settle: Duration::from_secs(1),
            inbox_settle: Duration::from_secs(3),
            detail_timeout: Duration::from_secs(4),
            submit_poll: Duration::from_secs(1),
            chat_button_attempts: 5,
            input_field_attempts: 10,
            interstitial_timeout: Duration::from_secs(5),
            login_poll: Duration::from_secs(2),
            login_timeout: Duration::from_secs(10 * 60),
            challenge_timeout: Duration::from_secs(5 * 60),
            challenge_recheck: Duration::from_secs(2),
            pacing_unit: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// Millisecond-scale waits with the same attempt counts.
    pub fn fast() -> Self {
        let ms = Duration::from_millis;
        Self {
            settle: ms(1),
            scroll_settle: ms(1),
            inbox_settle: ms(1),
            detail_timeout: ms(40),
            submit_poll: ms(2),
            interstitial_timeout: ms(40),
            login_poll: ms(5),
            login_timeout: ms(200),
            challenge_timeout: ms(500),
            challenge_recheck: ms(5),
            pacing_unit: ms(1),
            ..Self::default()
        }
    }
}
