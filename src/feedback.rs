//! Feedback controller: indicator lights, buzzer and gate relay.
//!
//! The orchestrator hands over one [`FeedbackCommand`] per state entry.
//! `apply` drives the outputs immediately and records deadlines; `tick`
//! ends each time-bounded effect once its deadline elapses.  All actuator
//! timers in the firmware live here.
//!
//! ## Safety bound
//!
//! Every relay engagement is clamped to `max_access_open_ms`.  A stuck-open
//! gate is the worst failure this device can have, so the ceiling is
//! enforced at the single place the relay is energised.

use log::warn;

use crate::app::ports::ActuatorPort;
use crate::config::SystemConfig;
use crate::error::ActuatorFault;

/// Indicator colour on the two-LED board.  Amber lights both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Green,
    Red,
    Amber,
}

impl Colour {
    const fn levels(self) -> (bool, bool) {
        match self {
            Self::Green => (true, false),
            Self::Red => (false, true),
            Self::Amber => (true, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkRate {
    Fast,
    Slow,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    GreenOn,
    RedOn,
    AmberOn,
    Off,
    Blink { colour: Colour, rate: BlinkRate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerCommand {
    Tone { freq_hz: u32, duration_ms: u32 },
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Release the latch for `duration_ms`.  Zero means release now.
    Engage { duration_ms: u32 },
    Release,
}

/// One-shot directive covering every output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackCommand {
    pub lights: LightCommand,
    pub buzzer: BuzzerCommand,
    pub relay: RelayCommand,
}

impl FeedbackCommand {
    pub const OFF: Self = Self {
        lights: LightCommand::Off,
        buzzer: BuzzerCommand::Silent,
        relay: RelayCommand::Release,
    };
}

#[derive(Debug, Clone, Copy)]
struct BlinkTimer {
    colour: Colour,
    period_ms: u32,
    lit: bool,
    next_toggle_at: u64,
}

pub struct FeedbackController {
    blink_fast_ms: u32,
    blink_slow_ms: u32,
    blink_processing_ms: u32,
    max_relay_ms: u32,

    current: Option<FeedbackCommand>,
    green: bool,
    red: bool,
    blink: Option<BlinkTimer>,
    buzzer_stop_at: Option<u64>,
    relay_release_at: Option<u64>,
    clamp_count: u32,
}

impl FeedbackController {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            blink_fast_ms: config.blink_fast_ms.max(1),
            blink_slow_ms: config.blink_slow_ms.max(1),
            blink_processing_ms: config.blink_processing_ms.max(1),
            max_relay_ms: config.max_access_open_ms,
            current: None,
            green: false,
            red: false,
            blink: None,
            buzzer_stop_at: None,
            relay_release_at: None,
            clamp_count: 0,
        }
    }

    /// Replace whatever is in flight with `cmd`.
    ///
    /// Returns the guard fault when the relay duration had to be clamped.
    pub fn apply(
        &mut self,
        cmd: FeedbackCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
    ) -> Option<ActuatorFault> {
        self.current = Some(cmd);
        self.blink = None;
        self.buzzer_stop_at = None;

        // Lights
        let (green, red) = match cmd.lights {
            LightCommand::GreenOn => Colour::Green.levels(),
            LightCommand::RedOn => Colour::Red.levels(),
            LightCommand::AmberOn => Colour::Amber.levels(),
            LightCommand::Off => (false, false),
            LightCommand::Blink { colour, rate } => {
                let period_ms = self.blink_period(rate);
                self.blink = Some(BlinkTimer {
                    colour,
                    period_ms,
                    lit: true,
                    next_toggle_at: now_ms + u64::from(period_ms),
                });
                colour.levels()
            }
        };
        self.set_lights(green, red, hw);

        // Buzzer
        match cmd.buzzer {
            BuzzerCommand::Tone {
                freq_hz,
                duration_ms,
            } if freq_hz > 0 && duration_ms > 0 => {
                hw.start_tone(freq_hz);
                self.buzzer_stop_at = Some(now_ms + u64::from(duration_ms));
            }
            _ => hw.stop_tone(),
        }

        // Relay
        let mut fault = None;
        match cmd.relay {
            RelayCommand::Engage { duration_ms } if duration_ms > 0 => {
                let applied_ms = duration_ms.min(self.max_relay_ms);
                if applied_ms < duration_ms {
                    let f = ActuatorFault::RelayDurationClamped {
                        requested_ms: duration_ms,
                        applied_ms,
                    };
                    warn!("FEEDBACK: {f}");
                    self.clamp_count = self.clamp_count.wrapping_add(1);
                    fault = Some(f);
                }
                hw.set_relay(true);
                self.relay_release_at = Some(now_ms + u64::from(applied_ms));
            }
            _ => {
                hw.set_relay(false);
                self.relay_release_at = None;
            }
        }
        fault
    }

    /// End any effect whose deadline has passed.
    pub fn tick(&mut self, now_ms: u64, hw: &mut impl ActuatorPort) {
        if self.relay_release_at.is_some_and(|t| now_ms >= t) {
            hw.set_relay(false);
            self.relay_release_at = None;
        }

        if self.buzzer_stop_at.is_some_and(|t| now_ms >= t) {
            hw.stop_tone();
            self.buzzer_stop_at = None;
        }

        if let Some(mut blink) = self.blink {
            if now_ms >= blink.next_toggle_at {
                blink.lit = !blink.lit;
                // Schedule from the missed deadline so the rate does not drift,
                // but never fall more than one period behind.
                let next = blink.next_toggle_at + u64::from(blink.period_ms);
                blink.next_toggle_at = next.max(now_ms + 1);
                let (green, red) = if blink.lit {
                    blink.colour.levels()
                } else {
                    (false, false)
                };
                self.blink = Some(blink);
                self.set_lights(green, red, hw);
            }
        }
    }

    /// Everything off, all timers dropped.
    pub fn all_off(&mut self, hw: &mut impl ActuatorPort) {
        self.current = None;
        self.blink = None;
        self.buzzer_stop_at = None;
        self.relay_release_at = None;
        self.green = false;
        self.red = false;
        hw.all_off();
    }

    // -- queries ------------------------------------------------------------

    pub fn relay_engaged(&self) -> bool {
        self.relay_release_at.is_some()
    }

    pub fn relay_release_at(&self) -> Option<u64> {
        self.relay_release_at
    }

    pub fn buzzer_active(&self) -> bool {
        self.buzzer_stop_at.is_some()
    }

    /// Current `(green, red)` output levels.
    pub fn lights(&self) -> (bool, bool) {
        (self.green, self.red)
    }

    /// Last command applied, if any.
    pub fn current(&self) -> Option<FeedbackCommand> {
        self.current
    }

    /// Number of relay engagements clamped since boot.
    pub fn clamp_count(&self) -> u32 {
        self.clamp_count
    }

    fn blink_period(&self, rate: BlinkRate) -> u32 {
        match rate {
            BlinkRate::Fast => self.blink_fast_ms,
            BlinkRate::Slow => self.blink_slow_ms,
            BlinkRate::Processing => self.blink_processing_ms,
        }
    }

    fn set_lights(&mut self, green: bool, red: bool, hw: &mut impl ActuatorPort) {
        self.green = green;
        self.red = red;
        hw.set_lights(green, red);
    }
}
