//! Bags of solutions with a declared variable schema.
//!
//! # Variants
//!
//! - [`Multiset::Identity`]: one empty solution, empty schema. Unit of join.
//! - [`Multiset::Null`]: no solutions, empty schema. Zero of join.
//! - [`Multiset::Ordinary`]: any number of solutions plus an explicit schema
//!   that may name variables no solution binds.
//!
//! # Invariants
//!
//! - Every variable bound by a solution of an ordinary multiset is in its
//!   schema. Variables in the schema but missing from a solution are unbound.
//! - The schema lists each variable once; its order is presentation order only.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::solution::{Solution, is_temporary_variable};
use crate::types::Term;

static IDENTITY_ROWS: [Solution; 1] = [Solution::EMPTY];

/// Schema plus solutions of an ordinary multiset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bag {
    variables: Vec<String>,
    solutions: Vec<Solution>,
}

/// A multiset of solutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Multiset {
    Identity,
    #[default]
    Null,
    Ordinary(Bag),
}

fn push_unique(variables: &mut Vec<String>, name: &str) {
    if !variables.iter().any(|v| v == name) {
        variables.push(name.to_owned());
    }
}

fn union_variables(left: &[String], right: &[String]) -> Vec<String> {
    let mut variables = left.to_vec();
    for name in right {
        push_unique(&mut variables, name);
    }
    variables
}

/// Hash table over one side of a join, keyed by the join variables.
///
/// Solutions that leave any join variable unbound can match many keys, so
/// they are kept apart in `partial` and checked one by one.
struct JoinTable<'a> {
    join_variables: Vec<&'a str>,
    keyed: HashMap<Vec<&'a Term>, Vec<&'a Solution>>,
    partial: Vec<&'a Solution>,
    all: &'a [Solution],
}

impl<'a> JoinTable<'a> {
    fn build(rows: &'a [Solution], join_variables: Vec<&'a str>) -> Self {
        let mut keyed: HashMap<Vec<&Term>, Vec<&Solution>> = HashMap::new();
        let mut partial = Vec::new();
        for row in rows {
            match key_of(row, &join_variables) {
                Some(key) => keyed.entry(key).or_default().push(row),
                None => partial.push(row),
            }
        }
        Self {
            join_variables,
            keyed,
            partial,
            all: rows,
        }
    }

    /// Solutions that are compatible with `probe`.
    fn matches<'s>(&'s self, probe: &'s Solution) -> Box<dyn Iterator<Item = &'a Solution> + 's> {
        match key_of(probe, &self.join_variables) {
            Some(key) => {
                let exact = self.keyed.get(&key).into_iter().flatten().copied();
                let loose = self
                    .partial
                    .iter()
                    .copied()
                    .filter(move |row| row.is_compatible_with(probe));
                Box::new(exact.chain(loose))
            }
            None => Box::new(self.all.iter().filter(move |row| row.is_compatible_with(probe))),
        }
    }
}

fn key_of<'a>(row: &'a Solution, variables: &[&str]) -> Option<Vec<&'a Term>> {
    variables.iter().map(|name| row.get(name)).collect()
}

impl Multiset {
    /// An ordinary multiset with the given schema and no solutions.
    #[must_use]
    pub fn empty<S: AsRef<str>>(variables: &[S]) -> Self {
        let mut declared = Vec::with_capacity(variables.len());
        for name in variables {
            push_unique(&mut declared, name.as_ref());
        }
        Self::Ordinary(Bag {
            variables: declared,
            solutions: Vec::new(),
        })
    }

    /// An ordinary multiset whose schema is every variable the solutions bind.
    #[must_use]
    pub fn from_solutions(solutions: Vec<Solution>) -> Self {
        let mut variables = Vec::new();
        for solution in &solutions {
            for name in solution.variables() {
                push_unique(&mut variables, name);
            }
        }
        Self::Ordinary(Bag {
            variables,
            solutions,
        })
    }

    /// An ordinary multiset with an explicit schema. Variables bound by the
    /// solutions but missing from `variables` are appended to the schema.
    #[must_use]
    pub fn with_variables<S: AsRef<str>>(variables: &[S], solutions: Vec<Solution>) -> Self {
        let mut bag = Self::empty(variables);
        for solution in solutions {
            bag.add(solution);
        }
        bag
    }

    /// Add a solution, turning degenerate multisets into ordinary ones.
    pub fn add(&mut self, solution: Solution) {
        match self {
            Self::Ordinary(bag) => {
                for name in solution.variables() {
                    push_unique(&mut bag.variables, name);
                }
                bag.solutions.push(solution);
            }
            Self::Identity => {
                let mut bag = Self::from_solutions(vec![Solution::new()]);
                bag.add(solution);
                *self = bag;
            }
            Self::Null => *self = Self::from_solutions(vec![solution]),
        }
    }

    /// Declare a variable without binding it.
    pub fn add_variable(&mut self, name: &str) {
        match self {
            Self::Ordinary(bag) => push_unique(&mut bag.variables, name),
            Self::Identity => {
                *self = Self::with_variables(&[name], vec![Solution::new()]);
            }
            Self::Null => *self = Self::empty(&[name]),
        }
    }

    /// Declared schema.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        match self {
            Self::Ordinary(bag) => &bag.variables,
            Self::Identity | Self::Null => &[],
        }
    }

    /// The solutions (Identity yields its single empty solution).
    #[must_use]
    pub fn solutions(&self) -> &[Solution] {
        match self {
            Self::Identity => &IDENTITY_ROWS,
            Self::Null => &[],
            Self::Ordinary(bag) => &bag.solutions,
        }
    }

    #[must_use]
    pub fn into_solutions(self) -> Vec<Solution> {
        match self {
            Self::Identity => vec![Solution::new()],
            Self::Null => Vec::new(),
            Self::Ordinary(bag) => bag.solutions,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.solutions().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solutions().is_empty()
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn contains_variable(&self, name: &str) -> bool {
        self.variables().iter().any(|v| v == name)
    }

    /// Whether the two schemas share no variable.
    #[must_use]
    pub fn is_disjoint_with(&self, other: &Self) -> bool {
        !self
            .variables()
            .iter()
            .any(|name| other.contains_variable(name))
    }

    fn shared_variables<'a>(&'a self, other: &Self) -> Vec<&'a str> {
        self.variables()
            .iter()
            .filter(|name| other.contains_variable(name))
            .map(String::as_str)
            .collect()
    }

    /// Natural join on shared variables.
    ///
    /// Identity is the unit and Null (or an empty multiset) the zero.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Identity, _) => return other.clone(),
            (_, Self::Identity) => return self.clone(),
            _ => {}
        }
        if self.is_empty() || other.is_empty() {
            return Self::Null;
        }
        if self.is_disjoint_with(other) {
            return self.product(other);
        }

        let table = JoinTable::build(other.solutions(), other.shared_variables(self));
        let mut solutions = Vec::new();
        for left in self.solutions() {
            for right in table.matches(left) {
                if let Some(joined) = left.join(right) {
                    solutions.push(joined);
                }
            }
        }
        Self::Ordinary(Bag {
            variables: union_variables(self.variables(), other.variables()),
            solutions,
        })
    }

    /// Optional join. Every left solution appears at least once; a joined
    /// solution is kept only when `accept` returns `true` for it, otherwise
    /// the left solution stands alone.
    #[must_use]
    pub fn left_join<F>(&self, other: &Self, mut accept: F) -> Self
    where
        F: FnMut(&Solution) -> bool,
    {
        if self.is_null() {
            return Self::Null;
        }
        if other.is_empty() {
            let mut result = self.clone();
            for variable in other.variables() {
                result.add_variable(variable);
            }
            return result;
        }

        let table = JoinTable::build(other.solutions(), other.shared_variables(self));
        let mut solutions = Vec::new();
        for left in self.solutions() {
            let mut matched = false;
            for right in table.matches(left) {
                if let Some(joined) = left.join(right) {
                    if accept(&joined) {
                        solutions.push(joined);
                        matched = true;
                    }
                }
            }
            if !matched {
                solutions.push(left.clone());
            }
        }
        Self::Ordinary(Bag {
            variables: union_variables(self.variables(), other.variables()),
            solutions,
        })
    }

    /// Bag union. The schema is the union of both schemas.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Null, _) => other.clone(),
            (_, Self::Null) => self.clone(),
            _ => {
                let mut solutions = self.solutions().to_vec();
                solutions.extend_from_slice(other.solutions());
                Self::Ordinary(Bag {
                    variables: union_variables(self.variables(), other.variables()),
                    solutions,
                })
            }
        }
    }

    /// Cartesian product, merging every pair of solutions.
    #[must_use]
    pub fn product(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Identity, _) => return other.clone(),
            (_, Self::Identity) => return self.clone(),
            _ => {}
        }
        if self.is_empty() || other.is_empty() {
            return Self::Null;
        }
        let mut solutions = Vec::with_capacity(self.len() * other.len());
        for left in self.solutions() {
            for right in other.solutions() {
                if let Some(joined) = left.join(right) {
                    solutions.push(joined);
                }
            }
        }
        Self::Ordinary(Bag {
            variables: union_variables(self.variables(), other.variables()),
            solutions,
        })
    }

    /// Remove left solutions that are compatible with, and share a bound
    /// variable with, some solution of `other`.
    #[must_use]
    pub fn minus(&self, other: &Self) -> Self {
        if self.is_null() || other.is_empty() || self.is_disjoint_with(other) {
            return self.clone();
        }
        let kept = self
            .solutions()
            .iter()
            .filter(|left| !excluded_by(left, other.solutions()))
            .cloned()
            .collect();
        Self::Ordinary(Bag {
            variables: self.variables().to_vec(),
            solutions: kept,
        })
    }

    /// Remove engine-generated temporary variables from schema and solutions.
    pub fn trim(&mut self) {
        if let Self::Ordinary(bag) = self {
            bag.variables.retain(|name| !is_temporary_variable(name));
            for solution in &mut bag.solutions {
                solution.trim_temporaries();
            }
        }
    }

    /// Remove one variable from schema and solutions.
    pub fn trim_variable(&mut self, name: &str) {
        if let Self::Ordinary(bag) = self {
            bag.variables.retain(|v| v != name);
            for solution in &mut bag.solutions {
                solution.remove(name);
            }
        }
    }

    /// Reorder the schema for presentation: listed variables first (those
    /// the schema declares), the rest after in their current order.
    pub fn set_variable_order<S: AsRef<str>>(&mut self, order: &[S]) {
        if let Self::Ordinary(bag) = self {
            let mut reordered = Vec::with_capacity(bag.variables.len());
            for name in order {
                let name = name.as_ref();
                if bag.variables.iter().any(|v| v == name) {
                    push_unique(&mut reordered, name);
                }
            }
            for name in &bag.variables {
                push_unique(&mut reordered, name);
            }
            bag.variables = reordered;
        }
    }

    /// Stable sort of the solutions.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Solution, &Solution) -> Ordering,
    {
        if let Self::Ordinary(bag) = self {
            bag.solutions.sort_by(compare);
        }
    }

    /// Drop duplicate solutions, keeping first occurrences.
    #[must_use]
    pub fn distinct(&self) -> Self {
        match self {
            Self::Ordinary(bag) => {
                let mut seen = HashSet::new();
                let solutions = bag
                    .solutions
                    .iter()
                    .filter(|s| seen.insert(*s))
                    .cloned()
                    .collect();
                Self::Ordinary(Bag {
                    variables: bag.variables.clone(),
                    solutions,
                })
            }
            other => other.clone(),
        }
    }

    /// Keep solutions for which `keep` returns `true`, preserving the schema.
    #[must_use]
    pub fn retain<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&Solution) -> bool,
    {
        match self {
            Self::Ordinary(mut bag) => {
                bag.solutions.retain(keep);
                Self::Ordinary(bag)
            }
            Self::Identity => {
                if keep(&Solution::EMPTY) {
                    Self::Identity
                } else {
                    Self::Null
                }
            }
            Self::Null => Self::Null,
        }
    }
}

/// Whether `left` is removed by MINUS against `right`.
#[must_use]
pub fn excluded_by(left: &Solution, right: &[Solution]) -> bool {
    right
        .iter()
        .any(|r| left.shares_variable_with(r) && left.is_compatible_with(r))
}
