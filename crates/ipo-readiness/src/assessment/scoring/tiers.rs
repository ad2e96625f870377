/// Threshold of a single tier. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Bound {
    AtLeast(f64),
    AtMost(f64),
    Below(f64),
}

impl Bound {
    fn admits(self, value: f64) -> bool {
        match self {
            Bound::AtLeast(limit) => value >= limit,
            Bound::AtMost(limit) => value <= limit,
            Bound::Below(limit) => value < limit,
        }
    }
}

/// Ordered tier table; the first admitting tier wins, otherwise zero points.
#[derive(Debug)]
pub(crate) struct TierTable {
    pub max_points: f64,
    pub tiers: &'static [(Bound, f64)],
}

impl TierTable {
    /// Missing or non-finite inputs score zero rather than failing.
    pub fn points(&self, value: Option<f64>) -> f64 {
        let Some(value) = value.filter(|value| value.is_finite()) else {
            return 0.0;
        };

        self.tiers
            .iter()
            .find(|(bound, _)| bound.admits(value))
            .map(|(_, points)| *points)
            .unwrap_or(0.0)
    }
}

pub(crate) const PAID_UP_CAPITAL: TierTable = TierTable {
    max_points: 10.0,
    tiers: &[
        (Bound::AtLeast(10.0), 10.0),
        (Bound::AtLeast(5.0), 7.5),
        (Bound::AtLeast(3.0), 5.0),
        (Bound::AtLeast(1.0), 2.5),
    ],
};

pub(crate) const NET_WORTH: TierTable = TierTable {
    max_points: 10.0,
    tiers: &[
        (Bound::AtLeast(10.0), 10.0),
        (Bound::AtLeast(5.0), 7.5),
        (Bound::AtLeast(3.0), 5.0),
        (Bound::AtLeast(1.0), 2.5),
    ],
};

pub(crate) const OUTSTANDING_SHARES: TierTable = TierTable {
    max_points: 5.0,
    tiers: &[
        (Bound::AtLeast(1_000_000.0), 5.0),
        (Bound::AtLeast(500_000.0), 3.75),
        (Bound::AtLeast(250_000.0), 2.5),
        (Bound::AtLeast(100_000.0), 1.25),
    ],
};

// Lower is better from here on.
pub(crate) const BORROWINGS: TierTable = TierTable {
    max_points: 5.0,
    tiers: &[
        (Bound::AtMost(0.0), 5.0),
        (Bound::Below(1.0), 3.75),
        (Bound::Below(5.0), 2.5),
        (Bound::Below(10.0), 1.25),
    ],
};

pub(crate) const DEBT_EQUITY_RATIO: TierTable = TierTable {
    max_points: 7.5,
    tiers: &[
        (Bound::Below(0.5), 7.5),
        (Bound::Below(1.0), 5.625),
        (Bound::Below(1.5), 3.75),
        (Bound::Below(2.0), 1.875),
    ],
};

pub(crate) const EPS: TierTable = TierTable {
    max_points: 5.0,
    tiers: &[
        (Bound::AtLeast(10.0), 5.0),
        (Bound::AtLeast(5.0), 3.75),
        (Bound::AtLeast(2.0), 2.5),
        (Bound::AtLeast(1.0), 1.25),
    ],
};
