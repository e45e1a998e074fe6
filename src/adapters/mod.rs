//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements     | Connects to               |
//! |------------------|----------------|---------------------------|
//! | `hardware`       | ActuatorPort   | ESP32 GPIO, LEDC PWM      |
//! | `http_transport` | HttpTransport  | TCP (lwIP / host stack)   |
//! | `log_sink`       | EventSink      | Serial log output         |
//! | `nvs`            | ConfigPort     | NVS / in-memory store     |
//! | `time`           | (clock)        | ESP32 system timer        |
//! | `wifi`           | LinkPort       | ESP-IDF WiFi STA          |
//! | `device_id`      | (identity)     | eFuse MAC                 |

pub mod device_id;
pub mod hardware;
pub mod http_transport;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
