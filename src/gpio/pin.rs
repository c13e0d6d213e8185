//! The fixed J21 header pin enumeration.

use super::Controller;

/// A physical header pin, encoding which controller chip it belongs to and
/// its line offset on that chip.
///
/// The variant set is the fixed 21-entry table for the board this library
/// targets; there is no sentinel "invalid" variant — an out-of-range header
/// number simply fails to convert (see [`PinId::from_header_number`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PinId {
    Pin7,
    Pin8,
    Pin10,
    Pin11,
    Pin12,
    Pin13,
    Pin16,
    Pin18,
    Pin19,
    Pin21,
    Pin23,
    Pin24,
    Pin29,
    Pin31,
    Pin32,
    Pin33,
    Pin35,
    Pin36,
    Pin37,
    Pin38,
    Pin40,
}

impl PinId {
    const TABLE: &'static [(u32, PinId, Controller, u32)] = &[
        (7, PinId::Pin7, Controller::Main, 76),
        (8, PinId::Pin8, Controller::Main, 144),
        (10, PinId::Pin10, Controller::Main, 145),
        (11, PinId::Pin11, Controller::Main, 146),
        (12, PinId::Pin12, Controller::Main, 72),
        (13, PinId::Pin13, Controller::Main, 77),
        (16, PinId::Pin16, Controller::AlwaysOn, 40),
        (18, PinId::Pin18, Controller::Main, 161),
        (19, PinId::Pin19, Controller::Main, 109),
        (21, PinId::Pin21, Controller::Main, 108),
        (23, PinId::Pin23, Controller::Main, 107),
        (24, PinId::Pin24, Controller::Main, 110),
        (29, PinId::Pin29, Controller::Main, 78),
        (31, PinId::Pin31, Controller::AlwaysOn, 42),
        (32, PinId::Pin32, Controller::AlwaysOn, 41),
        (33, PinId::Pin33, Controller::Main, 69),
        (35, PinId::Pin35, Controller::Main, 75),
        (36, PinId::Pin36, Controller::Main, 147),
        (37, PinId::Pin37, Controller::Main, 68),
        (38, PinId::Pin38, Controller::Main, 74),
        (40, PinId::Pin40, Controller::Main, 73),
    ];

    /// Map a physical header number (e.g. `23`) to its `PinId`.
    ///
    /// Returns `None` for any number not in the fixed header table —
    /// the idiomatic substitute for the original's `INVALID_PIN` sentinel.
    pub fn from_header_number(n: u32) -> Option<Self> {
        Self::TABLE.iter().find(|(num, ..)| *num == n).map(|(_, id, ..)| *id)
    }

    /// Which controller chip this pin belongs to.
    pub fn controller(self) -> Controller {
        Self::TABLE.iter().find(|(_, id, ..)| *id == self).map(|(_, _, c, _)| *c).expect("exhaustive table")
    }

    /// Line offset within the owning controller chip.
    pub fn offset(self) -> u32 {
        Self::TABLE.iter().find(|(_, id, ..)| *id == self).map(|(_, _, _, o)| *o).expect("exhaustive table")
    }
}
