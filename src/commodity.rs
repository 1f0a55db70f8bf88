//! Commodities are the energy carriers which conversion subprocesses consume and produce.
use crate::id::define_id_type;

define_id_type!(CommodityID, "commodity");

/// The reserved commodity representing the boundary of the modelled system.
///
/// Primary energy enters the system from this commodity and final demand leaves through it, so it
/// is never subject to a power balance.
pub const DUMMY_COMMODITY: &str = "Dummy";

impl CommodityID {
    /// Whether this is the reserved boundary commodity
    pub fn is_dummy(&self) -> bool {
        &*self.0 == DUMMY_COMMODITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Dummy", true)]
    #[case("Electricity", false)]
    #[case("dummy", false)]
    fn test_is_dummy(#[case] id: &str, #[case] expected: bool) {
        assert_eq!(CommodityID::from(id).is_dummy(), expected);
    }
}
