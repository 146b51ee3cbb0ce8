// =============================================
// Redirect gate for generated article pages
// =============================================
// Two independent gates must both clear before the outbound link works:
//  - time gate:   countdown from `countdown_start` to 0, then an explicit click
//  - scroll gate: viewport reached the bottom of the document (within tolerance)
//
// The gates may clear in either order. Once both are set the page is Unlocked and
// the continue affordance opens the destination in a new browsing context, once.
//
// All page mutation goes through `PageSurface`; a surface call that returns false
// means the element is missing and that stage is skipped.

pub mod driver;

use serde::Serialize;

pub const COUNTDOWN_START: u32 = 15;
pub const SCROLL_TOLERANCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    pub countdown_start: u32,
    pub scroll_tolerance: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            countdown_start: COUNTDOWN_START,
            scroll_tolerance: SCROLL_TOLERANCE,
        }
    }
}

/// Page-scoped gate flags plus the destination captured at synthesis time.
#[derive(Debug, Clone, PartialEq)]
pub struct GateState {
    pub time_gate_cleared: bool,
    pub scroll_gate_cleared: bool,
    destination_url: Option<String>,
}

impl GateState {
    pub fn new(destination_url: Option<String>) -> Self {
        Self {
            time_gate_cleared: false,
            scroll_gate_cleared: false,
            destination_url,
        }
    }

    /// The destination, if there is anything to navigate to.
    pub fn destination(&self) -> Option<&str> {
        self.destination_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn both_cleared(&self) -> bool {
        self.time_gate_cleared && self.scroll_gate_cleared
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Counting(u32),
    AwaitingClick,
    /// click registered, scroll not yet
    AwaitingScroll,
    /// scroll registered, click not yet
    AwaitingClickScrollDone,
    Unlocked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl Viewport {
    pub fn at_bottom(&self, tolerance: f64) -> bool {
        self.scroll_top + self.viewport_height >= self.document_height - tolerance
    }
}

/// The parts of the rendered document the gate touches.
pub trait PageSurface {
    fn set_countdown(&mut self, remaining: u32) -> bool;
    fn show_click_affordance(&mut self) -> bool;
    fn show_scroll_hint(&mut self) -> bool;
    fn reveal_continue(&mut self) -> bool;
    fn open_in_new_context(&mut self, url: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Countdown {
    /// no countdown element; the timer never started
    Idle(u32),
    Running(u32),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    Requested,
    Coalesced,
}

pub struct GateMachine<S: PageSurface> {
    cfg: GateConfig,
    state: GateState,
    surface: S,
    countdown: Countdown,
    affordance_live: bool,
    frame_pending: bool,
    latest_viewport: Option<Viewport>,
    scroll_evaluations: u32,
    unlocked: bool,
    continue_bound: bool,
    navigated: Option<String>,
}

impl<S: PageSurface> GateMachine<S> {
    /// Attach to a freshly synthesized page and enter `Counting(countdown_start)`.
    pub fn attach(cfg: GateConfig, state: GateState, mut surface: S) -> Self {
        let start = cfg.countdown_start;
        let countdown = if surface.set_countdown(start) {
            Countdown::Running(start)
        } else {
            tracing::debug!("countdown element missing; time gate stays closed");
            Countdown::Idle(start)
        };
        Self {
            cfg,
            state,
            surface,
            countdown,
            affordance_live: false,
            frame_pending: false,
            latest_viewport: None,
            scroll_evaluations: 0,
            unlocked: false,
            continue_bound: false,
            navigated: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.unlocked {
            return Phase::Unlocked;
        }
        match self.countdown {
            Countdown::Idle(n) | Countdown::Running(n) => Phase::Counting(n),
            Countdown::Done => match (self.state.time_gate_cleared, self.state.scroll_gate_cleared) {
                (false, false) => Phase::AwaitingClick,
                (true, false) => Phase::AwaitingScroll,
                (false, true) => Phase::AwaitingClickScrollDone,
                // both set always goes through evaluate_unlock
                (true, true) => Phase::Unlocked,
            },
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn timer_running(&self) -> bool {
        matches!(self.countdown, Countdown::Running(_))
    }

    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn scroll_evaluations(&self) -> u32 {
        self.scroll_evaluations
    }

    /// URL handed to `open_in_new_context`, if the continue click has fired.
    pub fn navigated(&self) -> Option<&str> {
        self.navigated.as_deref()
    }

    /// One countdown period elapsed.
    pub fn tick(&mut self) -> Phase {
        match self.countdown {
            Countdown::Running(0) => {
                self.countdown = Countdown::Done;
                self.affordance_live = self.surface.show_click_affordance();
                tracing::debug!(affordance = self.affordance_live, "countdown finished");
            }
            Countdown::Running(n) => {
                self.countdown = Countdown::Running(n - 1);
                self.surface.set_countdown(n - 1);
            }
            Countdown::Idle(_) | Countdown::Done => {}
        }
        self.phase()
    }

    /// Click on the post-countdown affordance. Clears the time gate.
    pub fn click_affordance(&mut self) -> Phase {
        if !self.affordance_live || self.state.time_gate_cleared {
            return self.phase();
        }
        self.state.time_gate_cleared = true;
        self.affordance_live = false;
        self.surface.show_scroll_hint();
        self.evaluate_unlock();
        self.phase()
    }

    /// Raw scroll event. Only the latest viewport before the next frame is evaluated.
    pub fn on_scroll(&mut self, viewport: Viewport) -> FrameRequest {
        self.latest_viewport = Some(viewport);
        if self.frame_pending {
            return FrameRequest::Coalesced;
        }
        self.frame_pending = true;
        FrameRequest::Requested
    }

    /// Animation frame callback scheduled by `on_scroll`.
    pub fn on_frame(&mut self) -> Phase {
        if !self.frame_pending {
            return self.phase();
        }
        self.frame_pending = false;
        if let Some(vp) = self.latest_viewport.take() {
            self.scroll_evaluations += 1;
            if !self.state.scroll_gate_cleared && vp.at_bottom(self.cfg.scroll_tolerance) {
                self.state.scroll_gate_cleared = true;
                tracing::debug!("scroll gate cleared");
                self.evaluate_unlock();
            }
        }
        self.phase()
    }

    /// Click on the continue affordance. Navigates at most once.
    pub fn click_continue(&mut self) -> Option<&str> {
        if !self.unlocked || !self.continue_bound || self.navigated.is_some() {
            return None;
        }
        let url = self.state.destination()?.to_string();
        self.surface.open_in_new_context(&url);
        tracing::info!(destination = %url, "continuing to destination");
        self.navigated = Some(url);
        self.navigated.as_deref()
    }

    fn evaluate_unlock(&mut self) {
        if self.unlocked || !self.state.both_cleared() {
            return;
        }
        self.unlocked = true;
        self.continue_bound = self.surface.reveal_continue();
        if self.state.destination().is_none() {
            tracing::warn!("page unlocked without a destination; continue is inert");
        }
    }
}
