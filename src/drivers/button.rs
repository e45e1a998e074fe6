//! ISR-debounced manual test button.
//!
//! ## Hardware
//!
//! Active-low momentary switch with external pull-up. GPIO fires on
//! falling edge; the ISR records the raw timestamp into an atomic, and
//! `tick()` (called from the main loop at control-tick rate) runs the
//! debounce + gesture state machine.
//!
//! ## Gestures
//!
//! | Gesture     | Condition                        | Command       |
//! |-------------|----------------------------------|---------------|
//! | Short press | Released before the long window  | `ManualTrigger` |
//! | Long press  | Held >= `button_long_press_ms`   | `ClearFault`  |
//!
//! A press that is not still held once the debounce window elapses is
//! treated as contact bounce and dropped.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::app::commands::AppCommand;
use crate::config::SystemConfig;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
/// Written by the ISR, read by the main loop.
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
}

impl ButtonEvent {
    /// The application command this gesture maps to.
    pub fn command(self) -> AppCommand {
        match self {
            Self::ShortPress => AppCommand::ManualTrigger,
            Self::LongPress => AppCommand::ClearFault,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    /// Long press already reported; wait for release.
    Latched,
}

pub struct ButtonDriver {
    gpio: i32,
    debounce_ms: u32,
    long_press_ms: u32,
    state: GestureState,
    last_isr_ms: u32,
}

impl ButtonDriver {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            gpio: config.pins.button,
            debounce_ms: config.button_debounce_ms,
            long_press_ms: config.button_long_press_ms,
            state: GestureState::Idle,
            last_isr_ms: 0,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Call from the main loop at each control tick.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        self.tick_with_level(now_ms, self.is_pressed_hw())
    }

    /// Gesture state machine with the line level supplied by the caller.
    pub fn tick_with_level(&mut self, now_ms: u32, pressed: bool) -> Option<ButtonEvent> {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_edge = isr_ms != self.last_isr_ms && isr_ms != 0;
        if new_edge {
            self.last_isr_ms = isr_ms;
        }

        match self.state {
            GestureState::Idle => {
                if new_edge {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if now_ms.wrapping_sub(since_ms) >= self.debounce_ms {
                    self.state = if pressed {
                        GestureState::Pressed { since_ms }
                    } else {
                        GestureState::Idle
                    };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::ShortPress);
                }
                if now_ms.wrapping_sub(since_ms) >= self.long_press_ms {
                    self.state = GestureState::Latched;
                    return Some(ButtonEvent::LongPress);
                }
                None
            }

            GestureState::Latched => {
                if !pressed {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }

    fn is_pressed_hw(&self) -> bool {
        !crate::drivers::hw_init::gpio_read(self.gpio)
    }
}

/// ISR handler; register this on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}
