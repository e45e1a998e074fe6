//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions, the buzzer LEDC timer/channel and the
//! scanner UART using raw ESP-IDF sys calls. Called once from `main()`
//! before the control loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::config::PinMap;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    UartInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::UartInitFailed(rc) => write!(f, "scanner UART init failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        crate::error::Error::Init("peripheral init")
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals(map: &PinMap, scanner_baud: u32) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio_outputs(map)?;
        init_gpio_inputs(map)?;
        init_ledc(map)?;
        init_uart(map, scanner_baud)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_map: &PinMap, _scanner_baud: u32) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs(map: &PinMap) -> Result<(), HwInitError> {
    let output_pins = [map.led_green, map.led_red, map.relay];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Boot with the gate latched and both indicators dark.
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (green, red, relay)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs(map: &PinMap) -> Result<(), HwInitError> {
    let btn_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << map.button,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
    };
    let ret = unsafe { gpio_config(&btn_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: button input configured on GPIO{}", map.button);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: the button line idles high (released).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── LEDC PWM (buzzer) ─────────────────────────────────────────

/// LEDC channel driving the piezo.
pub const LEDC_CH_BUZZER: u32 = 0;
/// LEDC timer whose frequency is retuned per tone.
pub const LEDC_TIMER_BUZZER: u32 = 0;
/// Timer frequency used while silent.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const BUZZER_IDLE_FREQ_HZ: u32 = 1000;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc(map: &PinMap) -> Result<(), HwInitError> {
    // SAFETY: Called from single main-task context via init_peripherals().
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: LEDC_TIMER_BUZZER,
        duty_resolution: pins::PWM_RESOLUTION_BITS,
        freq_hz: BUZZER_IDLE_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_BUZZER,
            timer_sel: LEDC_TIMER_BUZZER,
            gpio_num: map.buzzer,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!("hw_init: LEDC configured (buzzer=CH0 on GPIO{})", map.buzzer);
    Ok(())
}

/// Set the buzzer duty (0 = silent).  Returns `false` on a driver error.
#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) -> bool {
    // SAFETY: LEDC channel configured in init_ledc(); only the main loop
    // writes duty registers.
    unsafe {
        let a = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, u32::from(duty));
        let b = ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
        a == ESP_OK as i32 && b == ESP_OK as i32
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) -> bool {
    true
}

/// Retune the buzzer timer.  Returns `false` if the frequency is
/// unreachable at the configured resolution.
#[cfg(target_os = "espidf")]
pub fn ledc_set_freq(timer: u32, freq_hz: u32) -> bool {
    // SAFETY: timer configured in init_ledc(); main loop only.
    unsafe { esp_idf_svc::sys::ledc_set_freq(ledc_mode_t_LEDC_LOW_SPEED_MODE, timer, freq_hz) == ESP_OK as i32 }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set_freq(_timer: u32, freq_hz: u32) -> bool {
    freq_hz > 0
}

// ── Scanner UART ──────────────────────────────────────────────

/// Driver-side RX ring buffer.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const UART_RX_BUFFER: i32 = 512;

#[cfg(target_os = "espidf")]
unsafe fn init_uart(map: &PinMap, baud: u32) -> Result<(), HwInitError> {
    let cfg = uart_config_t {
        baud_rate: baud as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };

    let port = pins::SCANNER_UART_PORT;
    let ret = unsafe { uart_param_config(port, &cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::UartInitFailed(ret));
    }

    // TX is unused: the scanner is a one-way feed.
    let ret = unsafe { uart_set_pin(port, -1, map.scanner_rx, -1, -1) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::UartInitFailed(ret));
    }

    let ret = unsafe {
        uart_driver_install(port, UART_RX_BUFFER, 0, 0, core::ptr::null_mut(), 0)
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::UartInitFailed(ret));
    }

    info!(
        "hw_init: scanner UART{} RX=GPIO{} @ {} baud",
        port, map.scanner_rx, baud
    );
    Ok(())
}

/// Read whatever the UART driver has buffered, without blocking.
#[cfg(target_os = "espidf")]
pub fn uart_read(buf: &mut [u8]) -> usize {
    // SAFETY: driver installed in init_uart(); zero tick timeout never blocks.
    let n = unsafe {
        uart_read_bytes(
            pins::SCANNER_UART_PORT,
            buf.as_mut_ptr().cast(),
            buf.len() as u32,
            0,
        )
    };
    n.max(0) as usize
}

#[cfg(not(target_os = "espidf"))]
pub fn uart_read(_buf: &mut [u8]) -> usize {
    0
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::drivers::button::button_isr_handler;

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is a RTC counter read; safe in ISR context.
    let now_ms = (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u32;
    button_isr_handler(now_ms);
}

/// Install the GPIO ISR service and register the button handler.
/// Call after init_peripherals() and before the control loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(map: &PinMap) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed. The handler only stores an atomic.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Button: falling edge (active-low with pull-up already configured)
        gpio_set_intr_type(map.button, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        gpio_isr_handler_add(map.button, Some(button_gpio_isr), core::ptr::null_mut());
        gpio_intr_enable(map.button);

        info!("hw_init: ISR service installed (button)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_map: &PinMap) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
