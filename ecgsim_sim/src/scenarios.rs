//! Verification scenarios for the conduction engine.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// ECG-001: pacemaker fires on its automatic interval, path follows
    SinusAutomaticity,

    /// ECG-002: fast sinus rate against a long AV refractory period
    RefractoryExclusion,

    /// ECG-003: two arrivals at one node, only the earliest activates
    Collision,

    /// ECG-004: paired reverse edge never echoes the impulse back
    ReverseExclusion,

    /// ECG-005: decremental conduction with a periodic dropped beat
    Wenckebach,

    /// ECG-006: jitter and probability gates replay identically per seed
    JitterDeterminism,

    /// ECG-007: standard heart in sinus rhythm
    FullHeartSinus,

    /// ECG-008: AV conduction cut, ventricular escape takes over
    CompleteHeartBlock,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SinusAutomaticity,
            ScenarioId::RefractoryExclusion,
            ScenarioId::Collision,
            ScenarioId::ReverseExclusion,
            ScenarioId::Wenckebach,
            ScenarioId::JitterDeterminism,
            ScenarioId::FullHeartSinus,
            ScenarioId::CompleteHeartBlock,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SinusAutomaticity => "sinus_automaticity",
            ScenarioId::RefractoryExclusion => "refractory_exclusion",
            ScenarioId::Collision => "collision",
            ScenarioId::ReverseExclusion => "reverse_exclusion",
            ScenarioId::Wenckebach => "wenckebach",
            ScenarioId::JitterDeterminism => "jitter_determinism",
            ScenarioId::FullHeartSinus => "full_heart_sinus",
            ScenarioId::CompleteHeartBlock => "complete_heart_block",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SinusAutomaticity => "SA at 80 bpm drives one 20 ms path; firings every 750 ms",
            ScenarioId::RefractoryExclusion => "Sinus at 180 bpm, AV refractory 350 ms forces 2:1 conduction",
            ScenarioId::Collision => "Fast and slow paths into one node; only the fast arrival fires it",
            ScenarioId::ReverseExclusion => "Bidirectional tract; the reverse edge stays gated after each beat",
            ScenarioId::Wenckebach => "Delay 100 ms, step 40 ms, refractory 250 ms: 3 conducted, 1 dropped",
            ScenarioId::JitterDeterminism => "Jittered, probabilistic AV conduction replayed from the same seed",
            ScenarioId::FullHeartSinus => "Standard heart at 72 bpm; rate, RR and signal checked",
            ScenarioId::CompleteHeartBlock => "AV-His blocked; ventricles escape at their own 30 bpm",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sinus_automaticity" | "sinus" | "ecg-001" => Ok(ScenarioId::SinusAutomaticity),
            "refractory_exclusion" | "refractory" | "ecg-002" => Ok(ScenarioId::RefractoryExclusion),
            "collision" | "ecg-003" => Ok(ScenarioId::Collision),
            "reverse_exclusion" | "reverse" | "ecg-004" => Ok(ScenarioId::ReverseExclusion),
            "wenckebach" | "ecg-005" => Ok(ScenarioId::Wenckebach),
            "jitter_determinism" | "jitter" | "ecg-006" => Ok(ScenarioId::JitterDeterminism),
            "full_heart_sinus" | "full_heart" | "ecg-007" => Ok(ScenarioId::FullHeartSinus),
            "complete_heart_block" | "chb" | "ecg-008" => Ok(ScenarioId::CompleteHeartBlock),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
        assert_eq!("ECG-005".parse::<ScenarioId>().unwrap(), ScenarioId::Wenckebach);
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
