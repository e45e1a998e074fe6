//! Default GPIO / peripheral pin assignments for the GymGate controller board.
//!
//! These are the factory defaults baked into [`PinMap::default()`](crate::config::PinMap).
//! Drivers never read these constants directly; they receive the
//! [`PinMap`](crate::config::PinMap) from the loaded configuration, so a
//! board variant only needs a different NVS config blob.
//!
//! Numbers follow the NodeMCU-style carrier board silkscreen (D-pin noted).

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// Access-granted indicator (green LED), D4.  Active HIGH.
pub const LED_GREEN_GPIO: i32 = 2;
/// Access-denied indicator (red LED), D0.  Active HIGH.
pub const LED_RED_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// Buzzer (LEDC PWM)
// ---------------------------------------------------------------------------

/// Piezo buzzer, D5.  Driven by an LEDC channel whose timer frequency is
/// retuned for every tone.
pub const BUZZER_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// Gate relay
// ---------------------------------------------------------------------------

/// Door / turnstile latch relay, D6.  HIGH = latch released (gate open).
pub const RELAY_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Manual test button (active-low with external pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button for operator actuator checks, D7.
pub const BUTTON_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// QR scanner (UART RX)
// ---------------------------------------------------------------------------

/// Scanner serial data line, D2.  Routed to UART1 RX.
pub const SCANNER_RX_GPIO: i32 = 4;

/// UART peripheral used for the scanner feed.
pub const SCANNER_UART_PORT: i32 = 1;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// Duty used while a tone is sounding (50 % square wave).
pub const BUZZER_TONE_DUTY: u8 = 128;
