//! Register addressing and the BK4819 register knowledge used by the firmware's
//! debug menus.

use core::fmt;

/// The contents of one BK4819 register.
pub type RegisterValue = u16;

/// The address of a register on the radio's BK4819 transceiver.
///
/// Every `u8` is a valid address; the chip ignores reads of unimplemented
/// registers and returns zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterAddress(u8);

impl RegisterAddress {
    pub const fn new(address: u8) -> Self {
        Self(address)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for RegisterAddress {
    fn from(address: u8) -> Self {
        Self(address)
    }
}

impl From<RegisterAddress> for u8 {
    fn from(address: RegisterAddress) -> Self {
        address.0
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// A bit field within a register: `(value >> offset) & max_value`.
///
/// `step` is how far one menu press moves the field; it is 1 unless the field
/// is tuned in coarser units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterField {
    pub name: &'static str,
    pub address: RegisterAddress,
    pub offset: u8,
    pub max_value: RegisterValue,
    pub step: RegisterValue,
}

impl RegisterField {
    pub const fn new(name: &'static str, address: u8, offset: u8, max_value: RegisterValue) -> Self {
        Self {
            name,
            address: RegisterAddress::new(address),
            offset,
            max_value,
            step: 1,
        }
    }

    pub const fn with_step(self, step: RegisterValue) -> Self {
        Self { step, ..self }
    }

    /// The field value one step up or down from `current`.
    ///
    /// A step that would leave `0..=max_value` is not taken and `current` comes
    /// back unchanged.
    pub fn stepped(&self, current: RegisterValue, up: bool) -> RegisterValue {
        let ceiling = self.max_value.checked_sub(self.step);
        if up && ceiling.map_or(false, |ceiling| current <= ceiling) {
            current + self.step
        } else if !up && current >= self.step {
            current - self.step
        } else {
            current
        }
    }

    /// All-ones mask as wide as `max_value`'s highest set bit, before shifting.
    pub fn mask(&self) -> RegisterValue {
        let width = RegisterValue::BITS - self.max_value.leading_zeros();
        if width >= RegisterValue::BITS {
            RegisterValue::MAX
        } else {
            (1 << width) - 1
        }
    }

    /// Pull this field out of a whole register value.
    pub fn extract(&self, register: RegisterValue) -> RegisterValue {
        register.checked_shr(self.offset.into()).unwrap_or(0) & self.max_value
    }

    /// Replace this field inside `register` with `value`, leaving other bits untouched.
    ///
    /// `value` is assumed to already fit in the field.
    pub fn insert(&self, register: RegisterValue, value: RegisterValue) -> RegisterValue {
        let shift = u32::from(self.offset);
        let mask = self.mask().checked_shl(shift).unwrap_or(0);
        let bits = value.checked_shl(shift).unwrap_or(0) & mask;
        (register & !mask) | bits
    }
}

/// Convert a raw RSSI reading (register `0x67`) to dBm.
///
/// The register holds half-dB steps in its low nine bits, offset by 160 dB.
pub fn rssi_to_dbm(raw: RegisterValue) -> i16 {
    ((raw & 0x01FF) >> 1) as i16 - 160
}

/// Named registers and fields of the BK4819 as used by the UV-K5 firmware.
///
/// This mirrors the firmware's hidden register menu and is not a complete
/// datasheet; unnamed registers are still reachable by raw address.
pub mod bk4819 {
    use super::{RegisterAddress, RegisterField};

    pub const CHIP_ID: RegisterAddress = RegisterAddress::new(0x00);
    pub const REV_ID: RegisterAddress = RegisterAddress::new(0x01);
    pub const REG_30: RegisterAddress = RegisterAddress::new(0x30);
    pub const REG_37: RegisterAddress = RegisterAddress::new(0x37);
    pub const REG_43: RegisterAddress = RegisterAddress::new(0x43);
    pub const REG_47: RegisterAddress = RegisterAddress::new(0x47);
    pub const SNR: RegisterAddress = RegisterAddress::new(0x61);
    pub const LNA_RSSI: RegisterAddress = RegisterAddress::new(0x62);
    pub const GLITCH: RegisterAddress = RegisterAddress::new(0x63);
    pub const NOISE: RegisterAddress = RegisterAddress::new(0x65);
    pub const RSSI: RegisterAddress = RegisterAddress::new(0x67);
    pub const AGC: RegisterAddress = RegisterAddress::new(0x7E);

    pub const FIELDS: &[RegisterField] = &[
        RegisterField::new("chip_id", 0x00, 0, 0xFFFF),
        RegisterField::new("rev_id", 0x01, 0, 0xFFFF),
        // Front-end gain tables, one register per AGC index; 0x13 is the one
        // the main menu tunes.
        RegisterField::new("lnas", 0x13, 8, 0b11),
        RegisterField::new("lna", 0x13, 5, 0b111),
        RegisterField::new("mix", 0x13, 3, 0b11),
        RegisterField::new("pga", 0x13, 0, 0b111),
        RegisterField::new("lnas_10", 0x10, 8, 0b11),
        RegisterField::new("lna_10", 0x10, 5, 0b111),
        RegisterField::new("mix_10", 0x10, 3, 0b11),
        RegisterField::new("pga_10", 0x10, 0, 0b111),
        RegisterField::new("lnas_11", 0x11, 8, 0b11),
        RegisterField::new("lna_11", 0x11, 5, 0b111),
        RegisterField::new("mix_11", 0x11, 3, 0b11),
        RegisterField::new("pga_11", 0x11, 0, 0b111),
        RegisterField::new("lnas_12", 0x12, 8, 0b11),
        RegisterField::new("lna_12", 0x12, 5, 0b111),
        RegisterField::new("mix_12", 0x12, 3, 0b11),
        RegisterField::new("pga_12", 0x12, 0, 0b111),
        RegisterField::new("lnas_14", 0x14, 8, 0b11),
        RegisterField::new("lna_14", 0x14, 5, 0b111),
        RegisterField::new("mix_14", 0x14, 3, 0b11),
        RegisterField::new("pga_14", 0x14, 0, 0b111),
        RegisterField::new("weak_rssi", 0x0C, 7, 0b1),
        RegisterField::new("freq_scan_indicator", 0x0D, 15, 0b1),
        RegisterField::new("soft_mute_en", 0x20, 12, 0b1),
        RegisterField::new("soft_mute_rate", 0x20, 8, 0b11),
        RegisterField::new("soft_mute_atten", 0x20, 6, 0b11),
        RegisterField::new("soft_mute_snr_threshold", 0x20, 0, 0b11_1111),
        RegisterField::new("ext_lna_gain", 0x2C, 0, 0b1_1111),
        RegisterField::new("af_error_en", 0x30, 9, 0b1),
        RegisterField::new("xtal_enable", 0x37, 1, 0b1),
        RegisterField::new("xtal_f_low", 0x3B, 0, 0xFFFF).with_step(100),
        RegisterField::new("xtal_f_high", 0x3C, 8, 0xFF),
        RegisterField::new("xtal_f_mode", 0x3C, 6, 0b11),
        RegisterField::new("if", 0x3D, 0, 0xFFFF).with_step(0x2AAA),
        RegisterField::new("if_step", 0x3D, 0, 0xFFFF),
        RegisterField::new("band_selection_thr", 0x3E, 0, 0xFFFF).with_step(100),
        RegisterField::new("rf_filter_bw", 0x43, 12, 0b111),
        RegisterField::new("rf_filter_bw_weak", 0x43, 9, 0b111),
        RegisterField::new("af_tx_lpf2_bw", 0x43, 6, 0b111),
        RegisterField::new("bw_mode", 0x43, 4, 0b11),
        RegisterField::new("bypass_tx", 0x47, 0, 0b1),
        RegisterField::new("bypass_tx_gain", 0x47, 1, 0b1),
        RegisterField::new("snr_out", 0x61, 8, 0xFF),
        RegisterField::new("agc_rssi", 0x62, 8, 0xFF),
        RegisterField::new("lna_peak_rssi", 0x62, 0, 0xFF),
        RegisterField::new("glitch", 0x63, 0, 0xFF),
        RegisterField::new("rssi_rel", 0x65, 8, 0xFF),
        RegisterField::new("noise_sq", 0x65, 0, 0xFF),
        RegisterField::new("rssi_sq", 0x67, 0, 0xFF),
        RegisterField::new("agc_fix", 0x7E, 15, 0b1),
        RegisterField::new("agc_idx", 0x7E, 12, 0b111),
    ];

    /// Look up a field by its menu name, ignoring ASCII case.
    pub fn field_by_name(name: &str) -> Option<&'static RegisterField> {
        FIELDS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}
