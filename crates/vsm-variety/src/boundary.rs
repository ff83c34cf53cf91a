//! The four adjacent-level boundaries variety flows across, each with its
//! own default aggregation window (shorter near the operational edge, longer
//! near governance).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    S1S2,
    S2S3,
    S3S4,
    S4S5,
}

impl Boundary {
    pub fn default_window(self) -> Duration {
        match self {
            Boundary::S1S2 => Duration::from_secs(5),
            Boundary::S2S3 => Duration::from_secs(15),
            Boundary::S3S4 => Duration::from_secs(30),
            Boundary::S4S5 => Duration::from_secs(60),
        }
    }

    pub fn lower_bus_topic(self) -> &'static str {
        match self {
            Boundary::S1S2 => "s1.",
            Boundary::S2S3 => "coord.",
            Boundary::S3S4 => "control.",
            Boundary::S4S5 => "intelligence.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_grows_toward_governance() {
        assert!(Boundary::S1S2.default_window() < Boundary::S4S5.default_window());
    }
}
