//! Button assignment drawn once when the module arms.
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Commute methods that can appear on the buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommuteMethod {
    Walk,
    Cycle,
    Car,
    Bus,
    Train,
}

/// Fixed enumeration order for method sampling and display.
pub const METHOD_ORDER: [CommuteMethod; 5] = [
    CommuteMethod::Walk,
    CommuteMethod::Cycle,
    CommuteMethod::Car,
    CommuteMethod::Bus,
    CommuteMethod::Train,
];

impl CommuteMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Cycle => "cycle",
            Self::Car => "car",
            Self::Bus => "bus",
            Self::Train => "train",
        }
    }

    /// Asset key for the button icon rendered by the presentation layer.
    #[must_use]
    pub const fn icon_key(self) -> &'static str {
        match self {
            Self::Walk => "commute.icons.walk",
            Self::Cycle => "commute.icons.cycle",
            Self::Car => "commute.icons.car",
            Self::Bus => "commute.icons.bus",
            Self::Train => "commute.icons.train",
        }
    }
}

impl std::fmt::Display for CommuteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommuteMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walk" => Ok(Self::Walk),
            "cycle" => Ok(Self::Cycle),
            "car" => Ok(Self::Car),
            "bus" => Ok(Self::Bus),
            "train" => Ok(Self::Train),
            _ => Err(()),
        }
    }
}

/// Errors raised when an assignment request cannot be satisfied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("assignment requires at least one slot")]
    NoSlots,
    #[error("requested {requested} slots but only {available} methods exist")]
    TooManySlots { requested: usize, available: usize },
    #[error("method {method} appears on more than one slot")]
    DuplicateMethod { method: CommuteMethod },
}

/// Slot-ordered mapping of buttons to methods, immutable once drawn.
///
/// Slots are indexed in reading order. Every drawn method is distinct, so
/// with fewer slots than methods some methods are left off the buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CommuteMethod>", into = "Vec<CommuteMethod>")]
pub struct Assignment {
    slots: SmallVec<[CommuteMethod; 5]>,
}

impl Assignment {
    /// Draw a collision-free assignment for `slot_count` buttons.
    ///
    /// Each slot samples uniformly from the full method set and redraws on
    /// collision without advancing, so every arrangement of distinct methods
    /// is equally likely.
    ///
    /// # Errors
    ///
    /// Returns an error when `slot_count` is zero or exceeds the method set.
    pub fn generate<R: Rng>(rng: &mut R, slot_count: usize) -> Result<Self, AssignmentError> {
        Self::generate_with(rng, slot_count, |_, _| {})
    }

    /// Draw an assignment, announcing each `(slot, method)` pair as it lands.
    ///
    /// The observer fires once per slot in reading order; redrawn collisions
    /// are not announced.
    ///
    /// # Errors
    ///
    /// Returns an error when `slot_count` is zero or exceeds the method set.
    pub fn generate_with<R, F>(
        rng: &mut R,
        slot_count: usize,
        mut on_assign: F,
    ) -> Result<Self, AssignmentError>
    where
        R: Rng,
        F: FnMut(usize, CommuteMethod),
    {
        Self::check_slot_count(slot_count)?;
        let mut slots: SmallVec<[CommuteMethod; 5]> = SmallVec::new();
        while slots.len() < slot_count {
            let candidate = METHOD_ORDER[rng.gen_range(0..METHOD_ORDER.len())];
            if slots.contains(&candidate) {
                continue;
            }
            on_assign(slots.len(), candidate);
            slots.push(candidate);
        }
        Ok(Self { slots })
    }

    /// Build an assignment from explicit methods, validating the invariants.
    ///
    /// # Errors
    ///
    /// Returns an error when the slice is empty, longer than the method set,
    /// or repeats a method.
    pub fn from_methods(methods: &[CommuteMethod]) -> Result<Self, AssignmentError> {
        Self::check_slot_count(methods.len())?;
        let mut slots: SmallVec<[CommuteMethod; 5]> = SmallVec::new();
        for &method in methods {
            if slots.contains(&method) {
                return Err(AssignmentError::DuplicateMethod { method });
            }
            slots.push(method);
        }
        Ok(Self { slots })
    }

    const fn check_slot_count(slot_count: usize) -> Result<(), AssignmentError> {
        if slot_count == 0 {
            return Err(AssignmentError::NoSlots);
        }
        if slot_count > METHOD_ORDER.len() {
            return Err(AssignmentError::TooManySlots {
                requested: slot_count,
                available: METHOD_ORDER.len(),
            });
        }
        Ok(())
    }

    /// Number of buttons carrying methods.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Method shown on `slot`, if that button exists.
    #[must_use]
    pub fn method_at(&self, slot: usize) -> Option<CommuteMethod> {
        self.slots.get(slot).copied()
    }

    /// Slot carrying `method`, if it was drawn.
    #[must_use]
    pub fn slot_of(&self, method: CommuteMethod) -> Option<usize> {
        self.slots.iter().position(|&m| m == method)
    }

    /// Whether `method` appears on any button.
    #[must_use]
    pub fn contains(&self, method: CommuteMethod) -> bool {
        self.slots.contains(&method)
    }

    /// Iterate `(slot, method)` pairs in reading order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, CommuteMethod)> + '_ {
        self.slots.iter().copied().enumerate()
    }

    /// Methods left off the buttons for this instance.
    #[must_use]
    pub fn excluded_methods(&self) -> SmallVec<[CommuteMethod; 5]> {
        METHOD_ORDER
            .into_iter()
            .filter(|method| !self.contains(*method))
            .collect()
    }
}

impl TryFrom<Vec<CommuteMethod>> for Assignment {
    type Error = AssignmentError;

    fn try_from(methods: Vec<CommuteMethod>) -> Result<Self, Self::Error> {
        Self::from_methods(&methods)
    }
}

impl From<Assignment> for Vec<CommuteMethod> {
    fn from(assignment: Assignment) -> Self {
        assignment.slots.into_vec()
    }
}
