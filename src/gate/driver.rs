//! Single-task event loop for a [`GateMachine`].
//!
//! Countdown ticks, animation frames and page events are multiplexed on one task, so
//! the machine is never touched concurrently. Tests drive it with a paused tokio clock.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use super::{GateMachine, PageSurface, Viewport};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const FRAME_PERIOD: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageEvent {
    /// click on the post-countdown affordance
    Click,
    Scroll(Viewport),
    /// click on the continue affordance
    Continue,
    /// page navigated away
    Close,
}

/// Runs until `Close` arrives or every sender is dropped, then hands the machine back.
pub async fn run<S: PageSurface>(
    mut machine: GateMachine<S>,
    mut events: mpsc::Receiver<PageEvent>,
) -> GateMachine<S> {
    let mut countdown = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames = interval(FRAME_PERIOD);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = countdown.tick(), if machine.timer_running() => {
                machine.tick();
            }
            _ = frames.tick(), if machine.frame_pending() => {
                machine.on_frame();
            }
            ev = events.recv() => match ev {
                Some(PageEvent::Click) => {
                    machine.click_affordance();
                }
                Some(PageEvent::Scroll(vp)) => {
                    machine.on_scroll(vp);
                }
                Some(PageEvent::Continue) => {
                    machine.click_continue();
                }
                Some(PageEvent::Close) | None => break,
            },
        }
    }
    tracing::debug!(phase = ?machine.phase(), "gate loop closed");
    machine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::tests::{FakeSurface, BOTTOM};
    use crate::gate::{GateConfig, GateState, Phase};

    fn spawn(
        dest: &str,
    ) -> (
        mpsc::Sender<PageEvent>,
        tokio::task::JoinHandle<GateMachine<FakeSurface>>,
    ) {
        let machine = GateMachine::attach(
            GateConfig::default(),
            GateState::new(Some(dest.to_string())),
            FakeSurface::default(),
        );
        let (tx, rx) = mpsc::channel(64);
        (tx, tokio::spawn(run(machine, rx)))
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_on_one_second_ticks() {
        let (tx, handle) = spawn("https://example.com/x");
        tokio::time::sleep(Duration::from_millis(15_500)).await;
        tx.send(PageEvent::Close).await.unwrap();
        let m = handle.await.unwrap();
        assert_eq!(m.phase(), Phase::Counting(0));
        assert!(!m.surface().affordance_shown);
    }

    #[tokio::test(start_paused = true)]
    async fn full_flow_opens_destination() {
        let (tx, handle) = spawn("https://example.com/x");
        tokio::time::sleep(Duration::from_millis(16_500)).await;
        tx.send(PageEvent::Click).await.unwrap();
        tx.send(PageEvent::Scroll(BOTTOM)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        tx.send(PageEvent::Continue).await.unwrap();
        tx.send(PageEvent::Close).await.unwrap();
        let m = handle.await.unwrap();
        assert_eq!(m.phase(), Phase::Unlocked);
        assert_eq!(m.navigated(), Some("https://example.com/x"));
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_burst_is_evaluated_once_per_frame() {
        let (tx, handle) = spawn("https://example.com/x");
        for _ in 0..50 {
            tx.send(PageEvent::Scroll(BOTTOM)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(40)).await;
        tx.send(PageEvent::Close).await.unwrap();
        let m = handle.await.unwrap();
        assert!(m.state().scroll_gate_cleared);
        // the burst lands inside at most a couple of frames
        assert!(m.scroll_evaluations() >= 1);
        assert!(m.scroll_evaluations() <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_sender_stops_the_loop() {
        let (tx, handle) = spawn("https://example.com/x");
        drop(tx);
        let m = handle.await.unwrap();
        assert_eq!(m.phase(), Phase::Counting(15));
    }
}
