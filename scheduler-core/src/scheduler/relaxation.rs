/*
 * Copyright (c) 2025 Clément GRENNERAT
 *
 * This program is free software: you can redistribute it and/or modify it under the terms of the
 * GNU General Public License as published by the Free Software Foundation, version 3.
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
 * even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
 * See the GNU General Public License for more details.
 * You should have received a copy of the GNU General Public License along with this program.
 * If not, see https://www.gnu.org/licenses/.
 *
 */

//! Runtime constraint relaxation. Raising the level only ever widens the feasible set; lowering
//! is refused. Constraints outside [`ConstraintKind::can_relax`] ignore relaxation entirely.

use crate::scheduler::constraints::ConstraintKind;
use scheduler_dao::model::violation::RelaxationResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum RelaxationLevel {
    None = 0,
    Minimal = 1,
    Moderate = 2,
    Significant = 3,
    Maximum = 4,
}

impl RelaxationLevel {
    pub const ALL_ABOVE_NONE: [RelaxationLevel; 4] = [
        RelaxationLevel::Minimal,
        RelaxationLevel::Moderate,
        RelaxationLevel::Significant,
        RelaxationLevel::Maximum,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// `DailyLimit`'s tabled extra-classes-allowed at this level.
    pub fn daily_extra(&self) -> u32 {
        self.as_u8() as u32
    }

    /// `WeeklyLimit`'s tabled extra-classes-allowed at this level (double the daily extra).
    pub fn weekly_extra(&self) -> u32 {
        self.as_u8() as u32 * 2
    }
}

/// The resolved effective parameters for a single solve; what [`Constraint::apply`] actually
/// reads. Computed from a [`RelaxationController`]'s per-constraint levels.
pub struct RelaxationState {
    daily_level: RelaxationLevel,
    weekly_level: RelaxationLevel,
}

impl RelaxationState {
    pub fn none() -> Self {
        RelaxationState {
            daily_level: RelaxationLevel::None,
            weekly_level: RelaxationLevel::None,
        }
    }

    pub fn daily_extra(&self) -> u32 {
        self.daily_level.daily_extra()
    }

    pub fn weekly_extra(&self) -> u32 {
        self.weekly_level.weekly_extra()
    }
}

/// Tracks relaxation level per constraint and the `never_relax` guard. Mirrors the source's
/// `RelaxableConstraint` flags (`can_relax`, `relaxation_priority`, `never_relax`).
#[derive(Debug, Clone)]
pub struct RelaxationController {
    levels: HashMap<ConstraintKind, RelaxationLevel>,
    never_relax: std::collections::HashSet<ConstraintKind>,
}

impl Default for RelaxationController {
    fn default() -> Self {
        RelaxationController {
            levels: HashMap::new(),
            never_relax: std::collections::HashSet::new(),
        }
    }
}

impl RelaxationController {
    pub fn mark_never_relax(&mut self, kind: ConstraintKind) {
        self.never_relax.insert(kind);
    }

    pub fn level_of(&self, kind: ConstraintKind) -> RelaxationLevel {
        self.levels.get(&kind).copied().unwrap_or(RelaxationLevel::None)
    }

    /// Raises every relaxable, non-`never_relax` constraint's level to at least `level`.
    /// Lowering is refused: a constraint already at a higher level keeps it. Returns one
    /// [`RelaxationResult`] per relaxable constraint, recording whether the raise took effect.
    pub fn raise_to(&mut self, level: RelaxationLevel, kinds: &[ConstraintKind]) -> Vec<RelaxationResult> {
        let mut sorted: Vec<&ConstraintKind> = kinds.iter().filter(|k| k.can_relax()).collect();
        sorted.sort_by_key(|k| k.relaxation_priority());

        let mut results = Vec::with_capacity(sorted.len());
        for kind in sorted {
            let original = self.level_of(*kind);
            if self.never_relax.contains(kind) {
                results.push(RelaxationResult {
                    constraint_name: kind.name().to_string(),
                    original_level: original.as_u8(),
                    applied_level: original.as_u8(),
                    success: false,
                    message: "constraint is marked never_relax".to_string(),
                });
                continue;
            }
            let new_level = if level > original { level } else { original };
            self.levels.insert(*kind, new_level);
            results.push(RelaxationResult {
                constraint_name: kind.name().to_string(),
                original_level: original.as_u8(),
                applied_level: new_level.as_u8(),
                success: new_level > original,
                message: if new_level > original {
                    format!("relaxed from {} to {}", original.as_u8(), new_level.as_u8())
                } else {
                    "already at or above the requested level".to_string()
                },
            });
        }
        results
    }

    pub fn state(&self) -> RelaxationState {
        RelaxationState {
            daily_level: self.level_of(ConstraintKind::DailyLimit),
            weekly_level: self.level_of(ConstraintKind::WeeklyLimit),
        }
    }

    /// The single level reported in response metadata: the maximum across relaxable
    /// constraints actually raised so far.
    pub fn overall_level(&self) -> RelaxationLevel {
        self.levels.values().copied().max().unwrap_or(RelaxationLevel::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_is_monotone() {
        let mut controller = RelaxationController::default();
        let kinds = [ConstraintKind::DailyLimit, ConstraintKind::WeeklyLimit];
        controller.raise_to(RelaxationLevel::Moderate, &kinds);
        assert_eq!(controller.level_of(ConstraintKind::DailyLimit), RelaxationLevel::Moderate);
        // Attempting to lower is a no-op: raising to Minimal after Moderate keeps Moderate.
        controller.raise_to(RelaxationLevel::Minimal, &kinds);
        assert_eq!(controller.level_of(ConstraintKind::DailyLimit), RelaxationLevel::Moderate);
        controller.raise_to(RelaxationLevel::Maximum, &kinds);
        assert_eq!(controller.level_of(ConstraintKind::DailyLimit), RelaxationLevel::Maximum);
    }

    #[test]
    fn never_relax_is_ignored() {
        let mut controller = RelaxationController::default();
        controller.mark_never_relax(ConstraintKind::DailyLimit);
        let results = controller.raise_to(RelaxationLevel::Maximum, &[ConstraintKind::DailyLimit]);
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(controller.level_of(ConstraintKind::DailyLimit), RelaxationLevel::None);
    }

    #[test]
    fn extras_follow_the_tabled_values() {
        assert_eq!(RelaxationLevel::None.daily_extra(), 0);
        assert_eq!(RelaxationLevel::Minimal.daily_extra(), 1);
        assert_eq!(RelaxationLevel::Moderate.daily_extra(), 2);
        assert_eq!(RelaxationLevel::Significant.daily_extra(), 3);
        assert_eq!(RelaxationLevel::Maximum.daily_extra(), 4);
        assert_eq!(RelaxationLevel::Minimal.weekly_extra(), 2);
        assert_eq!(RelaxationLevel::Maximum.weekly_extra(), 8);
    }
}
