use serde::{Deserialize, Serialize};

/// Map zoom sent to the provider. Lower values cover a wider area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RadiusLevel(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagePlan {
    pub radius: RadiusLevel,
    pub max_pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    #[default]
    Adaptive,
    Grid,
}

/// (minimum weight, zoom, pages), heaviest tier first.
const WEIGHT_TIERS: &[(u64, u8, u32)] = &[
    (500_000, 11, 5),
    (100_000, 12, 4),
    (50_000, 13, 3),
    (10_000, 14, 2),
];
const FALLBACK_PLAN: PagePlan = PagePlan {
    radius: RadiusLevel(15),
    max_pages: 1,
};

pub fn plan_for(weight: u64) -> PagePlan {
    WEIGHT_TIERS
        .iter()
        .find(|(min_weight, ..)| weight >= *min_weight)
        .map(|&(_, zoom, max_pages)| PagePlan {
            radius: RadiusLevel(zoom),
            max_pages,
        })
        .unwrap_or(FALLBACK_PLAN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDecision {
    Continue,
    Stop,
}

/// Exhaustive pagination of a single grid cell. Gives up after two
/// consecutive pages without new records or at the hard ceiling.
#[derive(Debug)]
pub struct GridPager {
    ceiling: u32,
    issued: u32,
    consecutive_empty: u32,
}

const MAX_CONSECUTIVE_EMPTY: u32 = 2;

impl GridPager {
    pub fn new(ceiling: u32) -> Self {
        GridPager {
            ceiling: ceiling.max(1),
            issued: 0,
            consecutive_empty: 0,
        }
    }

    pub fn plan(&self, radius: RadiusLevel) -> PagePlan {
        PagePlan {
            radius,
            max_pages: self.ceiling,
        }
    }

    pub fn pages_issued(&self) -> u32 {
        self.issued
    }

    pub fn record_page(&mut self, new_records: usize) -> PageDecision {
        self.issued += 1;
        match new_records {
            0 => self.consecutive_empty += 1,
            _ => self.consecutive_empty = 0,
        }

        match self.consecutive_empty >= MAX_CONSECUTIVE_EMPTY || self.issued >= self.ceiling {
            true => PageDecision::Stop,
            false => PageDecision::Continue,
        }
    }
}
