use crate::body::System;
use crate::canvas::Surface;
use crate::render::Renderer;
use anyhow::Result;
use tracing::debug;

pub(crate) const SPEED_MAX: u32 = 500;
const SPEED_EXPONENT: f64 = 1.75;

/// Hands out one monotonic timestamp (ms) per display refresh.
pub(crate) trait FrameScheduler {
    /// `None` once teardown has been signalled; the loop stops re-requesting.
    fn next_frame(&mut self) -> Option<f64>;
}

pub(crate) trait SpeedInput {
    fn raw_value(&self) -> u32;

    fn speed_factor(&self) -> f64 {
        speed_factor(self.raw_value())
    }
}

/// Fine control near zero, large range near the top.
pub(crate) fn speed_factor(raw: u32) -> f64 {
    (raw as f64).powf(SPEED_EXPONENT)
}

/// Integer slider over `0..=SPEED_MAX`, step 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SpeedSlider {
    value: u32,
}

impl SpeedSlider {
    pub(crate) fn new(value: u32) -> Self {
        Self {
            value: value.min(SPEED_MAX),
        }
    }

    pub(crate) fn set(&mut self, value: u32) {
        self.value = value.min(SPEED_MAX);
    }

    pub(crate) fn nudge(&mut self, delta: i64) {
        let v = (self.value as i64 + delta).clamp(0, SPEED_MAX as i64);
        self.value = v as u32;
    }
}

impl SpeedInput for SpeedSlider {
    fn raw_value(&self) -> u32 {
        self.value
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    NotYetDrawn,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Drew,
    Skipped,
}

/// Per-frame driver: advance the model, then paint it.
pub(crate) struct AnimationLoop {
    phase: Phase,
    last_timestamp: f64,
}

impl Default for AnimationLoop {
    fn default() -> Self {
        Self {
            phase: Phase::NotYetDrawn,
            last_timestamp: 0.0,
        }
    }
}

impl AnimationLoop {
    pub(crate) fn tick<S: Surface>(
        &mut self,
        timestamp: f64,
        speed: &impl SpeedInput,
        system: &mut System,
        renderer: &mut Renderer,
        surface: &mut S,
    ) -> TickOutcome {
        let speed_factor = speed.speed_factor();
        let outcome = if speed_factor > 0.0 || self.phase == Phase::NotYetDrawn {
            let delta_time = match self.phase {
                Phase::NotYetDrawn => 0.0,
                Phase::Running => (timestamp - self.last_timestamp) / 1000.0,
            };
            system.update_all(delta_time, speed_factor);
            renderer.draw(system, surface);
            self.phase = Phase::Running;
            TickOutcome::Drew
        } else {
            TickOutcome::Skipped
        };
        self.last_timestamp = timestamp;
        outcome
    }

    /// Ticks once per scheduled frame until the scheduler tears down.
    ///
    /// `frame` runs after every tick with the tick's outcome; it is where
    /// the host presents the surface and polls its own inputs. Returns the
    /// number of ticks consumed.
    pub(crate) fn run<F, I, S>(
        &mut self,
        scheduler: &mut F,
        speed: &mut I,
        system: &mut System,
        renderer: &mut Renderer,
        surface: &mut S,
        mut frame: impl FnMut(TickOutcome, &mut I, &mut System, &mut Renderer, &mut S) -> Result<()>,
    ) -> Result<u64>
    where
        F: FrameScheduler,
        I: SpeedInput,
        S: Surface,
    {
        let mut ticks = 0u64;
        while let Some(timestamp) = scheduler.next_frame() {
            let outcome = self.tick(timestamp, &*speed, system, renderer, surface);
            ticks += 1;
            frame(outcome, speed, system, renderer, surface)?;
        }
        debug!(ticks, "scheduler torn down");
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodySpec;
    use crate::color::Rgba;
    use crate::render::tests::Recorder;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;
    use std::f64::consts::PI;

    struct Synthetic(VecDeque<f64>);

    impl FrameScheduler for Synthetic {
        fn next_frame(&mut self) -> Option<f64> {
            self.0.pop_front()
        }
    }

    fn sun_earth() -> System {
        let grey = Rgba::rgb(128, 128, 128);
        System::from_spec(&BodySpec::new("Sun", 0.0, 20.0, grey).with_child(BodySpec::new("Earth", 150.0, 10.0, grey)))
    }

    fn earth_angle(s: &System) -> f64 {
        s.body(s.find("Earth").unwrap()).angle
    }

    struct Rig {
        system: System,
        renderer: Renderer,
        surface: Recorder,
        anim: AnimationLoop,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                system: sun_earth(),
                renderer: Renderer::new(0.25),
                surface: Recorder::new(400.0, 300.0),
                anim: AnimationLoop::default(),
            }
        }

        fn tick(&mut self, ts: f64, raw: u32) -> TickOutcome {
            let slider = SpeedSlider::new(raw);
            self.anim
                .tick(ts, &slider, &mut self.system, &mut self.renderer, &mut self.surface)
        }
    }

    #[test]
    fn speed_curve() {
        assert_eq!(speed_factor(0), 0.0);
        assert_eq!(speed_factor(1), 1.0);
        assert_relative_eq!(speed_factor(16), 128.0);
        assert!(speed_factor(500) > 50_000.0);
    }

    #[test]
    fn slider_clamps() {
        let mut s = SpeedSlider::new(9000);
        assert_eq!(s.raw_value(), SPEED_MAX);
        s.nudge(-600);
        assert_eq!(s.raw_value(), 0);
        s.nudge(7);
        s.set(3);
        assert_eq!(s.raw_value(), 3);
    }

    #[test]
    fn first_tick_draws_even_when_paused() {
        let mut rig = Rig::new();
        assert_eq!(rig.anim.phase, Phase::NotYetDrawn);
        assert_eq!(rig.tick(5_000.0, 0), TickOutcome::Drew);
        assert_eq!(rig.anim.phase, Phase::Running);
        assert_eq!(rig.surface.clears(), 1);
        assert_eq!(earth_angle(&rig.system), 0.0);
    }

    #[test]
    fn first_tick_uses_zero_delta() {
        let mut rig = Rig::new();
        rig.tick(123_456.0, 500);
        assert_eq!(earth_angle(&rig.system), 0.0);
    }

    #[test]
    fn paused_ticks_skip_everything() {
        let mut rig = Rig::new();
        rig.tick(0.0, 10);
        rig.tick(16.0, 10);
        let angle = earth_angle(&rig.system);
        rig.surface.ops.clear();
        for i in 0..5 {
            assert_eq!(rig.tick(32.0 + 16.0 * i as f64, 0), TickOutcome::Skipped);
        }
        assert!(rig.surface.ops.is_empty());
        assert_eq!(earth_angle(&rig.system), angle);
    }

    #[test]
    fn delta_is_frame_time_in_seconds() {
        let mut rig = Rig::new();
        rig.tick(1_000.0, 1);
        rig.tick(2_000.0, 1);
        assert_relative_eq!(earth_angle(&rig.system), PI / 150f64.powf(1.5));
    }

    #[test]
    fn timestamp_is_recorded_while_paused() {
        let mut rig = Rig::new();
        rig.tick(0.0, 1);
        rig.tick(10_000.0, 0);
        rig.tick(11_000.0, 1);
        // only the last second counts, not the paused stretch
        assert_relative_eq!(earth_angle(&rig.system), PI / 150f64.powf(1.5));
    }

    #[test]
    fn run_stops_at_teardown() {
        let mut rig = Rig::new();
        let mut scheduler = Synthetic(VecDeque::from(vec![0.0, 16.0, 32.0, 48.0]));
        let mut slider = SpeedSlider::new(0);
        let mut outcomes = Vec::new();
        let ticks = rig
            .anim
            .run(
                &mut scheduler,
                &mut slider,
                &mut rig.system,
                &mut rig.renderer,
                &mut rig.surface,
                |outcome, slider, _, _, _| {
                    outcomes.push(outcome);
                    // user drags the slider after the second frame
                    if outcomes.len() == 2 {
                        slider.set(2);
                    }
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(ticks, 4);
        assert_eq!(
            outcomes,
            vec![TickOutcome::Drew, TickOutcome::Skipped, TickOutcome::Drew, TickOutcome::Drew]
        );
        assert_relative_eq!(
            earth_angle(&rig.system),
            PI / 150f64.powf(1.5) * 0.032 * speed_factor(2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn run_propagates_frame_errors() {
        let mut rig = Rig::new();
        let mut scheduler = Synthetic(VecDeque::from(vec![0.0, 16.0]));
        let mut slider = SpeedSlider::new(1);
        let res = rig.anim.run(
            &mut scheduler,
            &mut slider,
            &mut rig.system,
            &mut rig.renderer,
            &mut rig.surface,
            |_, _, _, _, _| anyhow::bail!("terminal went away"),
        );
        assert!(res.is_err());
        assert_eq!(scheduler.0.len(), 1);
    }
}
