//! Job service classes and the per-class lookup table used across the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Service class of a job; determines its nominal service length and arrival cadence.
///
/// The ordering is stable so per-class state can live in plain vectors indexed by
/// [`JobClass::index`]. Adding a class only requires appending it to [`JobClass::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    Short,
    Long,
}

impl JobClass {
    pub const ALL: [JobClass; 2] = [JobClass::Short, JobClass::Long];

    pub const fn index(self) -> usize {
        match self {
            JobClass::Short => 0,
            JobClass::Long => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            JobClass::Short => "short",
            JobClass::Long => "long",
        }
    }

    /// Single-letter tag used in job event logs (`AS12`, `AL13`).
    pub const fn tag(self) -> char {
        match self {
            JobClass::Short => 'S',
            JobClass::Long => 'L',
        }
    }
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per [`JobClass`], indexable by class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTable<T> {
    values: Vec<T>,
}

impl<T> ClassTable<T> {
    /// Build a table by calling `f` once per class, in [`JobClass::ALL`] order.
    pub fn from_fn(mut f: impl FnMut(JobClass) -> T) -> Self {
        let values = JobClass::ALL.iter().map(|&class| f(class)).collect();
        ClassTable { values }
    }

    pub fn get(&self, class: JobClass) -> &T {
        &self.values[class.index()]
    }

    pub fn get_mut(&mut self, class: JobClass) -> &mut T {
        &mut self.values[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobClass, &T)> {
        JobClass::ALL.iter().copied().zip(self.values.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(JobClass, &T) -> U) -> ClassTable<U> {
        ClassTable::from_fn(|class| f(class, self.get(class)))
    }
}

impl<T> Index<JobClass> for ClassTable<T> {
    type Output = T;

    fn index(&self, class: JobClass) -> &Self::Output {
        self.get(class)
    }
}

impl<T> IndexMut<JobClass> for ClassTable<T> {
    fn index_mut(&mut self, class: JobClass) -> &mut Self::Output {
        self.get_mut(class)
    }
}
