//! Packing of indicator lamps and fuel level into the frame `flags` word.
//!
//! The low bits carry one boolean per indicator, in the order given by a
//! [`FlagLayout`]; every bit above them is an unsigned fuel percentage,
//! clamped to 100. Firmware revisions moved the split point without bumping
//! the frame version, so the layout is a configuration choice and not derived
//! from the header.

use serde::{Deserialize, Serialize};

/// Indicator lamps known to the cluster.
///
/// Not every indicator is carried on the wire; the ones a layout omits are
/// driven through the store's direct setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Indicator {
    LeftBlink = 0,
    RightBlink = 1,
    HighBeam = 2,
    LowBeam = 3,
    RearFog = 4,
    Park = 5,
    Underglow = 6,
    CheckEngine = 7,
    ChargingWarning = 8,
    AbsWarning = 9,
    LowTirePressure = 10,
}

impl Indicator {
    pub const ALL: [Indicator; 11] = [
        Indicator::LeftBlink,
        Indicator::RightBlink,
        Indicator::HighBeam,
        Indicator::LowBeam,
        Indicator::RearFog,
        Indicator::Park,
        Indicator::Underglow,
        Indicator::CheckEngine,
        Indicator::ChargingWarning,
        Indicator::AbsWarning,
        Indicator::LowTirePressure,
    ];

    #[inline]
    const fn mask(self) -> u16 {
        1 << (self as u8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Indicator::LeftBlink => "left_blink",
            Indicator::RightBlink => "right_blink",
            Indicator::HighBeam => "high_beam",
            Indicator::LowBeam => "low_beam",
            Indicator::RearFog => "rear_fog",
            Indicator::Park => "park",
            Indicator::Underglow => "underglow",
            Indicator::CheckEngine => "check_engine",
            Indicator::ChargingWarning => "charging_warning",
            Indicator::AbsWarning => "abs_warning",
            Indicator::LowTirePressure => "low_tire_pressure",
        }
    }
}

/// Compact set of indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndicatorSet(u16);

impl IndicatorSet {
    pub const EMPTY: IndicatorSet = IndicatorSet(0);

    pub fn contains(&self, indicator: Indicator) -> bool {
        self.0 & indicator.mask() != 0
    }

    pub fn insert(&mut self, indicator: Indicator) {
        self.0 |= indicator.mask();
    }

    pub fn remove(&mut self, indicator: Indicator) {
        self.0 &= !indicator.mask();
    }

    pub fn set(&mut self, indicator: Indicator, on: bool) {
        if on {
            self.insert(indicator);
        } else {
            self.remove(indicator);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Indicator> + '_ {
        Indicator::ALL
            .into_iter()
            .filter(move |indicator| self.contains(*indicator))
    }
}

impl FromIterator<Indicator> for IndicatorSet {
    fn from_iter<I: IntoIterator<Item = Indicator>>(iter: I) -> Self {
        let mut set = IndicatorSet::EMPTY;
        for indicator in iter {
            set.insert(indicator);
        }
        set
    }
}

/// Result of splitting a `flags` word with a [`FlagLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFlags {
    /// Indicators the layout carries; only these should be written back.
    pub carried: IndicatorSet,
    /// Indicators whose bit was set.
    pub active: IndicatorSet,
    /// Fuel percentage, already clamped to `0..=100`.
    pub fuel_pct: u8,
}

impl DecodedFlags {
    pub fn is_active(&self, indicator: Indicator) -> bool {
        self.active.contains(indicator)
    }
}

/// Highest fuel percentage representable on the gauge.
pub const FUEL_MAX_PCT: u8 = 100;

/// Bit assignment of the `flags` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagLayout {
    name: &'static str,
    bits: &'static [Indicator],
}

impl FlagLayout {
    /// Original firmware: five lamp bits, fuel from bit 5.
    pub const REFERENCE: FlagLayout = FlagLayout::new(
        "reference",
        &[
            Indicator::LeftBlink,
            Indicator::RightBlink,
            Indicator::HighBeam,
            Indicator::RearFog,
            Indicator::Park,
        ],
    );

    /// Later firmware: fog bit dropped, fuel from bit 4.
    pub const COMPACT: FlagLayout = FlagLayout::new(
        "compact",
        &[
            Indicator::LeftBlink,
            Indicator::RightBlink,
            Indicator::HighBeam,
            Indicator::Park,
        ],
    );

    /// Build a layout where `bits[n]` names the indicator on bit `n`.
    ///
    /// At most 15 indicator bits are meaningful; anything past that leaves no
    /// room for fuel and is ignored.
    pub const fn new(name: &'static str, bits: &'static [Indicator]) -> Self {
        Self { name, bits }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Indicators in bit order.
    pub fn bits(&self) -> &'static [Indicator] {
        self.bits
    }

    /// Number of low bits holding booleans; fuel starts here.
    pub fn indicator_bits(&self) -> u32 {
        (self.bits.len() as u32).min(15)
    }

    /// Indicators this layout carries.
    pub fn carried(&self) -> IndicatorSet {
        self.bits
            .iter()
            .take(self.indicator_bits() as usize)
            .copied()
            .collect()
    }

    /// Split a raw `flags` word.
    pub fn decode(&self, flags: u16) -> DecodedFlags {
        let mut active = IndicatorSet::EMPTY;
        for (bit, indicator) in self
            .bits
            .iter()
            .take(self.indicator_bits() as usize)
            .enumerate()
        {
            if flags & (1u16 << bit) != 0 {
                active.insert(*indicator);
            }
        }

        let raw_fuel = flags >> self.indicator_bits();
        let fuel_pct = raw_fuel.min(u16::from(FUEL_MAX_PCT)) as u8;

        DecodedFlags {
            carried: self.carried(),
            active,
            fuel_pct,
        }
    }

    /// Pack indicators and fuel into a `flags` word.
    ///
    /// Indicators the layout does not carry are dropped; fuel is clamped to
    /// 100 and truncated to the bits left above the indicators.
    pub fn encode(&self, active: IndicatorSet, fuel_pct: u8) -> u16 {
        let shift = self.indicator_bits();
        let mut flags: u16 = 0;
        for (bit, indicator) in self.bits.iter().take(shift as usize).enumerate() {
            if active.contains(*indicator) {
                flags |= 1u16 << bit;
            }
        }
        let fuel = u16::from(fuel_pct.min(FUEL_MAX_PCT));
        flags | fuel.checked_shl(shift).unwrap_or(0)
    }
}

impl Default for FlagLayout {
    fn default() -> Self {
        FlagLayout::REFERENCE
    }
}

/// Configuration-facing name of a shipped layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    #[default]
    Reference,
    Compact,
}

impl LayoutKind {
    pub fn layout(self) -> FlagLayout {
        match self {
            LayoutKind::Reference => FlagLayout::REFERENCE,
            LayoutKind::Compact => FlagLayout::COMPACT,
        }
    }
}

impl std::str::FromStr for LayoutKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(LayoutKind::Reference),
            "compact" => Ok(LayoutKind::Compact),
            other => Err(format!("unknown flag layout '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_layout_bits() {
        let decoded = FlagLayout::REFERENCE.decode(0b1_1111);
        for indicator in [
            Indicator::LeftBlink,
            Indicator::RightBlink,
            Indicator::HighBeam,
            Indicator::RearFog,
            Indicator::Park,
        ] {
            assert!(decoded.is_active(indicator), "{indicator:?}");
        }
        assert_eq!(decoded.fuel_pct, 0);
        assert!(!decoded.carried.contains(Indicator::CheckEngine));
    }

    #[test]
    fn test_reference_fuel_starts_at_bit_five() {
        let decoded = FlagLayout::REFERENCE.decode(42 << 5 | 0b0_0001);
        assert_eq!(decoded.fuel_pct, 42);
        assert!(decoded.is_active(Indicator::LeftBlink));
        assert!(!decoded.is_active(Indicator::Park));
    }

    #[test]
    fn test_compact_layout_moves_fuel_and_park() {
        let flags = 0b1000 | (75 << 4);
        let decoded = FlagLayout::COMPACT.decode(flags);
        assert!(decoded.is_active(Indicator::Park));
        assert!(!decoded.carried.contains(Indicator::RearFog));
        assert_eq!(decoded.fuel_pct, 75);

        // the same word read with the reference layout means something else
        let misread = FlagLayout::REFERENCE.decode(flags);
        assert!(misread.is_active(Indicator::RearFog));
        assert_ne!(misread.fuel_pct, 75);
    }

    #[test]
    fn test_fuel_is_clamped() {
        let decoded = FlagLayout::REFERENCE.decode(u16::MAX);
        assert_eq!(decoded.fuel_pct, 100);
    }

    #[test]
    fn test_encode_decode_agree() {
        let active: IndicatorSet = [Indicator::RightBlink, Indicator::Park].into_iter().collect();
        for layout in [FlagLayout::REFERENCE, FlagLayout::COMPACT] {
            let flags = layout.encode(active, 63);
            let decoded = layout.decode(flags);
            assert_eq!(decoded.active, active, "{}", layout.name());
            assert_eq!(decoded.fuel_pct, 63);
        }
    }

    #[test]
    fn test_encode_drops_uncarried_indicators() {
        let active: IndicatorSet = [Indicator::RearFog].into_iter().collect();
        assert_eq!(FlagLayout::COMPACT.encode(active, 0), 0);
    }

    #[test]
    fn test_layout_kind_parsing() {
        assert_eq!("Compact".parse::<LayoutKind>(), Ok(LayoutKind::Compact));
        assert_eq!(" reference ".parse::<LayoutKind>(), Ok(LayoutKind::Reference));
        assert!("v2".parse::<LayoutKind>().is_err());
        assert_eq!(LayoutKind::default().layout(), FlagLayout::REFERENCE);
    }

    #[test]
    fn test_indicator_set_ops() {
        let mut set = IndicatorSet::EMPTY;
        assert!(set.is_empty());
        set.set(Indicator::AbsWarning, true);
        set.set(Indicator::LowBeam, true);
        assert_eq!(set.len(), 2);
        set.set(Indicator::AbsWarning, false);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Indicator::LowBeam]);
    }
}
