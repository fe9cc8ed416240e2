//! Frequency zones used to spread bands and to pick filter widths.
//!
//! Two partitions coexist. [`Zone`] is the fixed partition that caps how many
//! bands a pass may spend in each region. [`ModalZone`] follows the room's
//! Schroeder frequency and drives error thresholds and Q windows.

/// Fixed regions across which a pass distributes its band budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// 20-40 Hz
    DeepBass,
    /// 40-80 Hz
    BassModes,
    /// 80-150 Hz
    UpperBass,
    /// 150-220 Hz
    ModalTransition,
    /// 220 Hz and above
    SpeakerRegion,
}

impl Zone {
    pub const ALL: [Zone; 5] = [
        Zone::DeepBass,
        Zone::BassModes,
        Zone::UpperBass,
        Zone::ModalTransition,
        Zone::SpeakerRegion,
    ];

    pub fn of(freq: f64) -> Self {
        if freq < 40.0 {
            Zone::DeepBass
        } else if freq < 80.0 {
            Zone::BassModes
        } else if freq < 150.0 {
            Zone::UpperBass
        } else if freq < 220.0 {
            Zone::ModalTransition
        } else {
            Zone::SpeakerRegion
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Zone::DeepBass => "Deep Bass",
            Zone::BassModes => "Bass Modes",
            Zone::UpperBass => "Upper Bass",
            Zone::ModalTransition => "Modal Transition",
            Zone::SpeakerRegion => "Speaker Region",
        }
    }

    /// Share of a pass budget each zone may use
    ///
    /// Large budgets lean on the low zones where the strongest modes live;
    /// small ones are spread more evenly.
    fn cap_fractions(total_bands: usize) -> [f64; 5] {
        if total_bands > 12 {
            [0.25, 0.30, 0.25, 0.12, 0.08]
        } else {
            [0.20, 0.25, 0.25, 0.15, 0.15]
        }
    }

    /// Per-zone band caps for a pass with `pass_budget` bands
    pub fn caps(total_bands: usize, pass_budget: usize) -> [usize; 5] {
        Self::cap_fractions(total_bands)
            .map(|fraction| ((pass_budget as f64 * fraction).ceil() as usize).max(1))
    }
}

/// Regions relative to the room's Schroeder frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalZone {
    /// Below 40 Hz
    Sub,
    /// 40-80 Hz
    Low,
    /// 80-150 Hz
    Mid,
    /// 150 Hz up to the Schroeder frequency
    Transition,
    /// At or above the Schroeder frequency
    Statistical,
}

impl ModalZone {
    pub fn of(freq: f64, schroeder_freq: f64) -> Self {
        if freq < 40.0 {
            ModalZone::Sub
        } else if freq < 80.0 {
            ModalZone::Low
        } else if freq < 150.0 {
            ModalZone::Mid
        } else if freq < schroeder_freq {
            ModalZone::Transition
        } else {
            ModalZone::Statistical
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Allowed Q range for a band in this zone
    pub fn q_window(self) -> (f64, f64) {
        match self {
            ModalZone::Sub => (0.5, 8.0),
            ModalZone::Low => (0.7, 12.0),
            ModalZone::Mid => (0.8, 14.0),
            ModalZone::Transition => (0.8, 12.0),
            ModalZone::Statistical => (0.5, 8.0),
        }
    }
}

/// Starting Q for a band at `freq`, before pass and error adjustments
pub fn base_q(freq: f64) -> f64 {
    if freq < 40.0 {
        2.5
    } else if freq < 80.0 {
        3.5
    } else if freq < 150.0 {
        4.5
    } else if freq < 250.0 {
        5.5
    } else {
        6.0
    }
}

/// Weight of an error when ranking candidates
pub fn frequency_weight(freq: f64, schroeder_freq: f64) -> f64 {
    if freq < 60.0 {
        3.0
    } else if freq < 100.0 {
        2.0
    } else if freq < schroeder_freq {
        1.5
    } else {
        1.0
    }
}
