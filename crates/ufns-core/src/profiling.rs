//! Phase timing for the decoder.
//!
//! [`DecodeProfile`] accumulates wall time per phase over one decode. The
//! decoder only records it when the `profiling` feature is enabled.

use std::time::Duration;

/// Per-phase timing summed over every round of the most recent decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeProfile {
    pub seed: Duration,
    pub grow: Duration,
    pub merge: Duration,
    pub place: Duration,
    pub total: Duration,
    pub rounds: u32,
}

impl DecodeProfile {
    /// Name and duration of the slowest phase.
    pub fn bottleneck_phase(&self) -> (&'static str, Duration) {
        [
            ("seed", self.seed),
            ("grow", self.grow),
            ("merge", self.merge),
            ("place", self.place),
        ]
        .into_iter()
        .fold(("seed", Duration::ZERO), |best, phase| {
            if phase.1 > best.1 { phase } else { best }
        })
    }

    /// Mean time of one round, excluding seeding.
    pub fn per_round(&self) -> Duration {
        if self.rounds == 0 {
            return Duration::ZERO;
        }
        (self.grow + self.merge + self.place) / self.rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottleneck_picks_slowest() {
        let profile = DecodeProfile {
            grow: Duration::from_micros(40),
            merge: Duration::from_micros(90),
            place: Duration::from_micros(10),
            rounds: 2,
            ..DecodeProfile::default()
        };
        assert_eq!(profile.bottleneck_phase(), ("merge", Duration::from_micros(90)));
        assert_eq!(profile.per_round(), Duration::from_micros(70));
    }

    #[test]
    fn empty_profile() {
        let profile = DecodeProfile::default();
        assert_eq!(profile.bottleneck_phase().1, Duration::ZERO);
        assert_eq!(profile.per_round(), Duration::ZERO);
    }

    #[cfg(feature = "profiling")]
    #[test]
    fn decoder_records_profile() {
        use crate::decoder::Decoder;
        use crate::id::{Orientation, QubitCoord, StabKind};
        use crate::lattice::LatticeGraph;

        let mut graph = LatticeGraph::toric(4).unwrap();
        graph
            .flip_edge(QubitCoord::new(1, 1, Orientation::Horizontal), StabKind::Primal)
            .unwrap();
        let mut decoder = Decoder::default();
        let outcome = decoder.decode(&mut graph);
        let profile = decoder.last_profile().unwrap();
        assert_eq!(profile.rounds, outcome.stats.rounds);
        assert!(profile.total >= profile.grow);
    }
}
