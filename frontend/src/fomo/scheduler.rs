use rand::Rng;

use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// What the scheduler needs to know about the hosting page.
pub trait PageEnvironment {
    fn device_class(&self) -> DeviceClass;
    fn is_visible(&self) -> bool;
}

/// Identifies a pending timer so it can be cancelled or recognised when it
/// fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// Next scheduler firing. The generation lets stale ticks be ignored.
    Tick(u64),
    /// Auto-dismiss of one display event.
    Expire(String),
}

pub trait TimerDriver {
    /// Arms `token`, replacing any timer already armed under it.
    fn arm(&mut self, token: TimerToken, delay_ms: u32);
    fn cancel(&mut self, token: &TimerToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting { generation: u64 },
    Paused,
    Stopped,
}

/// Jittered single-timer loop. At most one tick is ever pending.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: ScheduleConfig,
    state: SchedulerState,
    generation: u64,
    has_fired: bool,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            generation: 0,
            has_fired: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, device: DeviceClass, rng: &mut R) -> u32 {
        if !self.has_fired {
            if let Some(cold) = self.config.cold_start_ms {
                return cold;
            }
        }
        let (lo, hi) = match device {
            DeviceClass::Desktop => self.config.desktop_range_ms,
            DeviceClass::Mobile => self.config.mobile_range_ms,
        };
        if hi <= lo {
            return lo;
        }
        rng.gen_range(lo..=hi)
    }

    pub fn start<R: Rng + ?Sized>(
        &mut self,
        active: bool,
        device: DeviceClass,
        timers: &mut dyn TimerDriver,
        rng: &mut R,
    ) {
        self.set_active(active, device, timers, rng);
    }

    /// True when `generation` is the pending tick; the caller should fire.
    pub fn on_tick(&mut self, generation: u64) -> bool {
        match self.state {
            SchedulerState::Waiting { generation: pending } if pending == generation => {
                self.state = SchedulerState::Idle;
                self.has_fired = true;
                true
            }
            _ => {
                log::debug!("Ignoring stale tick {}", generation);
                false
            }
        }
    }

    /// Re-arms after a firing, whether or not it produced an event.
    pub fn after_fire<R: Rng + ?Sized>(
        &mut self,
        active: bool,
        device: DeviceClass,
        timers: &mut dyn TimerDriver,
        rng: &mut R,
    ) {
        self.set_active(active, device, timers, rng);
    }

    /// Pauses on inactive, schedules a fresh delay on becoming active. A
    /// tick that is already pending is left alone.
    pub fn set_active<R: Rng + ?Sized>(
        &mut self,
        active: bool,
        device: DeviceClass,
        timers: &mut dyn TimerDriver,
        rng: &mut R,
    ) {
        match (self.state, active) {
            (SchedulerState::Stopped, _) => {}
            (SchedulerState::Waiting { .. }, true) => {}
            (_, true) => self.arm(device, timers, rng),
            (_, false) => {
                self.cancel_pending(timers);
                self.state = SchedulerState::Paused;
            }
        }
    }

    pub fn stop(&mut self, timers: &mut dyn TimerDriver) {
        self.cancel_pending(timers);
        self.state = SchedulerState::Stopped;
    }

    fn arm<R: Rng + ?Sized>(&mut self, device: DeviceClass, timers: &mut dyn TimerDriver, rng: &mut R) {
        self.cancel_pending(timers);
        self.generation += 1;
        let delay = self.next_delay(device, rng);
        timers.arm(TimerToken::Tick(self.generation), delay);
        self.state = SchedulerState::Waiting {
            generation: self.generation,
        };
    }

    fn cancel_pending(&mut self, timers: &mut dyn TimerDriver) {
        if let SchedulerState::Waiting { generation } = self.state {
            timers.cancel(&TimerToken::Tick(generation));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::fomo::testing::FakeTimers;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn toast_scheduler() -> Scheduler {
        Scheduler::new(FeedConfig::purchase_toasts().schedule)
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(3)
    }

    #[test]
    fn first_delay_is_the_cold_start() {
        let mut timers = FakeTimers::new();
        let mut s = toast_scheduler();
        s.start(true, DeviceClass::Desktop, &mut timers, &mut rng());
        assert_eq!(timers.armed(), vec![(TimerToken::Tick(1), 4500)]);
    }

    #[rstest]
    #[case(DeviceClass::Desktop, 12_000, 20_000)]
    #[case(DeviceClass::Mobile, 16_000, 26_000)]
    fn steady_delays_stay_in_range(#[case] device: DeviceClass, #[case] lo: u32, #[case] hi: u32) {
        let mut timers = FakeTimers::new();
        let mut r = rng();
        let mut s = toast_scheduler();
        s.start(true, device, &mut timers, &mut r);
        for round in 0..50 {
            let (token, delay) = timers.tick().unwrap();
            if round > 0 {
                assert!((lo..=hi).contains(&delay), "{} outside {}..={}", delay, lo, hi);
            }
            let TimerToken::Tick(generation) = token else {
                panic!("expected a tick, got {:?}", token);
            };
            assert!(s.on_tick(generation));
            s.after_fire(true, device, &mut timers, &mut r);
        }
        assert_eq!(timers.active(), 1);
    }

    #[test]
    fn testimonials_have_no_cold_start() {
        let s = Scheduler::new(FeedConfig::testimonials().schedule);
        let delay = s.next_delay(DeviceClass::Desktop, &mut rng());
        assert!((6_000..=9_000).contains(&delay));
    }

    #[test]
    fn repeated_visibility_flips_leave_one_timer() {
        let mut timers = FakeTimers::new();
        let mut r = rng();
        let mut s = toast_scheduler();
        s.start(true, DeviceClass::Desktop, &mut timers, &mut r);
        for _ in 0..2 {
            s.set_active(false, DeviceClass::Desktop, &mut timers, &mut r);
            assert_eq!(timers.active(), 0);
            assert_eq!(s.state(), SchedulerState::Paused);
            s.set_active(true, DeviceClass::Desktop, &mut timers, &mut r);
            s.set_active(true, DeviceClass::Desktop, &mut timers, &mut r);
            assert_eq!(timers.active(), 1);
        }
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut timers = FakeTimers::new();
        let mut r = rng();
        let mut s = toast_scheduler();
        s.start(true, DeviceClass::Desktop, &mut timers, &mut r);
        s.set_active(false, DeviceClass::Desktop, &mut timers, &mut r);
        s.set_active(true, DeviceClass::Desktop, &mut timers, &mut r);
        assert!(!s.on_tick(1));
        assert!(s.on_tick(2));
    }

    #[test]
    fn starting_hidden_waits_for_visibility() {
        let mut timers = FakeTimers::new();
        let mut r = rng();
        let mut s = toast_scheduler();
        s.start(false, DeviceClass::Desktop, &mut timers, &mut r);
        assert_eq!(timers.active(), 0);
        s.set_active(true, DeviceClass::Desktop, &mut timers, &mut r);
        assert_eq!(timers.armed(), vec![(TimerToken::Tick(1), 4500)]);
    }

    #[test]
    fn stop_is_final() {
        let mut timers = FakeTimers::new();
        let mut r = rng();
        let mut s = toast_scheduler();
        s.start(true, DeviceClass::Desktop, &mut timers, &mut r);
        s.stop(&mut timers);
        s.set_active(true, DeviceClass::Desktop, &mut timers, &mut r);
        assert_eq!(timers.active(), 0);
        assert_eq!(s.state(), SchedulerState::Stopped);
    }
}
