//! Device identity.
//!
//! Every validation and status request names the reader that sent it.
//! The id is `GG-` followed by the low three bytes of the factory eFuse
//! MAC in uppercase hex, so it survives reflashing and NVS erases.

use core::fmt::{self, Write};

pub type MacAddress = [u8; 6];

/// Reader identity, e.g. `GG-EF0C0A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(heapless::String<16>);

impl DeviceId {
    pub fn from_mac(mac: &MacAddress) -> Self {
        let mut id = heapless::String::new();
        // Nine ASCII bytes always fit.
        let _ = write!(id, "GG-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
        Self(id)
    }

    /// Identity of the board this runs on.
    pub fn of_this_board() -> Self {
        Self::from_mac(&factory_mac())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(target_os = "espidf")]
pub fn factory_mac() -> MacAddress {
    let mut mac = [0u8; 6];
    // SAFETY: the call writes exactly six bytes into `mac`.
    let ret = unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    if ret != esp_idf_svc::sys::ESP_OK {
        log::warn!("eFuse MAC read failed ({}), device id will be GG-000000", ret);
    }
    mac
}

/// Host builds get a fixed address so ids in logs and tests are stable.
#[cfg(not(target_os = "espidf"))]
pub fn factory_mac() -> MacAddress {
    [0x02, 0x47, 0x47, 0xEF, 0x0C, 0x0A]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_low_mac_bytes_in_upper_hex() {
        let id = DeviceId::from_mac(&[0x00, 0x11, 0x22, 0xaa, 0xbb, 0x0c]);
        assert_eq!(id.as_str(), "GG-AABB0C");
        assert_eq!(id.to_string(), "GG-AABB0C");
    }

    #[test]
    fn host_board_id_is_stable() {
        assert_eq!(DeviceId::of_this_board(), DeviceId::of_this_board());
        assert_eq!(DeviceId::of_this_board().as_str(), "GG-EF0C0A");
    }
}
