// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Facet ids and the selection snapshot that gates which trips are counted.
//!
//! A [`FacetSelection`] is a plain value. Toggling produces a new set rather
//! than mutating shared state, so a recomputation always reads a frozen copy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! category_id {
    ($name:ident, $max:expr) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u8);

        impl $name {
            pub const MAX: u8 = $max;

            /// Every id of the closed enumeration, in ascending order.
            pub fn domain() -> BTreeSet<$name> {
                (1..=Self::MAX).map($name).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u8>().map($name)
            }
        }
    };
}

category_id!(ModeId, 18);
category_id!(PeriodId, 6);
category_id!(PurposeId, 14);
category_id!(IncomeId, 7);

/// The three facets checked per feature. Mode is handled by choosing which
/// per-mode collection gets aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Period,
    Purpose,
    Income,
}

impl FromStr for Facet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "period" | "periods" => Ok(Facet::Period),
            "purpose" | "purposes" => Ok(Facet::Purpose),
            "income" | "incomes" | "income_bracket" => Ok(Facet::Income),
            _ => Err(format!(
                "Unknown facet: '{}'. Valid options: period, purpose, income",
                s
            )),
        }
    }
}

/// Point toggle: add the id if absent, remove it if present.
pub fn toggle<T: Ord + Copy>(set: &BTreeSet<T>, id: T) -> BTreeSet<T> {
    let mut next = set.clone();
    if !next.remove(&id) {
        next.insert(id);
    }
    next
}

/// Bulk toggle: a set the size of the full domain becomes empty, anything
/// else becomes the full domain.
pub fn toggle_all<T: Ord + Copy>(set: &BTreeSet<T>, domain: &BTreeSet<T>) -> BTreeSet<T> {
    if set.len() == domain.len() {
        BTreeSet::new()
    } else {
        domain.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSelection {
    pub periods: BTreeSet<PeriodId>,
    pub purposes: BTreeSet<PurposeId>,
    pub incomes: BTreeSet<IncomeId>,
}

impl Default for FacetSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl FacetSelection {
    pub fn all() -> Self {
        Self {
            periods: PeriodId::domain(),
            purposes: PurposeId::domain(),
            incomes: IncomeId::domain(),
        }
    }

    pub fn none() -> Self {
        Self {
            periods: BTreeSet::new(),
            purposes: BTreeSet::new(),
            incomes: BTreeSet::new(),
        }
    }

    /// A feature passes only when each of its ids is selected. Missing ids
    /// never pass.
    pub fn admits(
        &self,
        period: Option<PeriodId>,
        purpose: Option<PurposeId>,
        income: Option<IncomeId>,
    ) -> bool {
        period.is_some_and(|p| self.periods.contains(&p))
            && purpose.is_some_and(|p| self.purposes.contains(&p))
            && income.is_some_and(|i| self.incomes.contains(&i))
    }

    /// Point toggle on one facet. Ids outside the enumeration are accepted
    /// as-is.
    pub fn toggled(&self, facet: Facet, id: u8) -> Self {
        let mut next = self.clone();
        match facet {
            Facet::Period => next.periods = toggle(&self.periods, PeriodId(id)),
            Facet::Purpose => next.purposes = toggle(&self.purposes, PurposeId(id)),
            Facet::Income => next.incomes = toggle(&self.incomes, IncomeId(id)),
        }
        next
    }

    pub fn toggled_all(&self, facet: Facet) -> Self {
        let mut next = self.clone();
        match facet {
            Facet::Period => next.periods = toggle_all(&self.periods, &PeriodId::domain()),
            Facet::Purpose => next.purposes = toggle_all(&self.purposes, &PurposeId::domain()),
            Facet::Income => next.incomes = toggle_all(&self.incomes, &IncomeId::domain()),
        }
        next
    }

    /// True when every set of `self` contains the matching set of `other`.
    pub fn is_superset(&self, other: &FacetSelection) -> bool {
        self.periods.is_superset(&other.periods)
            && self.purposes.is_superset(&other.purposes)
            && self.incomes.is_superset(&other.incomes)
    }
}

/// Ordered mode selection. Order of selection is the order layers are
/// published in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSelection {
    modes: Vec<ModeId>,
}

impl ModeSelection {
    pub fn new(modes: impl IntoIterator<Item = ModeId>) -> Self {
        let mut selection = Self::default();
        for mode in modes {
            if !selection.contains(mode) {
                selection.modes.push(mode);
            }
        }
        selection
    }

    pub fn all() -> Self {
        Self::new(ModeId::domain())
    }

    pub fn contains(&self, mode: ModeId) -> bool {
        self.modes.contains(&mode)
    }

    pub fn iter(&self) -> impl Iterator<Item = ModeId> + '_ {
        self.modes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn toggled(&self, mode: ModeId) -> Self {
        let mut next = self.clone();
        match next.modes.iter().position(|m| *m == mode) {
            Some(idx) => {
                next.modes.remove(idx);
            }
            None => next.modes.push(mode),
        }
        next
    }

    pub fn toggled_all(&self) -> Self {
        if self.modes.len() == ModeId::MAX as usize {
            Self::default()
        } else {
            Self::all()
        }
    }
}

/// Parses a comma separated id list such as `1,2,5`. Empty input yields an
/// empty set.
pub fn parse_id_list<T: FromStr + Ord>(s: &str) -> Result<BTreeSet<T>, T::Err> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<T>)
        .collect()
}
