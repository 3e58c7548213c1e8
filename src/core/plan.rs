//! Curriculum plan: validated prerequisite graph and eligibility queries.
//!
//! Units are stored in an id-indexed map and every edge is an id, so the
//! graph checked at load time is exactly the one consulted later. Eligibility
//! only looks at direct prerequisites. That is sound because the graph is
//! acyclic and a student can only pass a unit after its own prerequisites
//! were checked on enrollment.

use crate::domain::model::{CompletionRecord, CurricularUnit, UnitId};
use crate::domain::plan_description::PlanDescription;
use crate::utils::error::{EnrollError, Result};
use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Unmet direct prerequisites, in id order.
    Missing(Vec<UnitId>),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    pub fn missing(&self) -> &[UnitId] {
        match self {
            Eligibility::Eligible => &[],
            Eligibility::Missing(missing) => missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurriculumPlan {
    id: String,
    year: i32,
    units: BTreeMap<UnitId, CurricularUnit>,
}

impl CurriculumPlan {
    /// Builds and validates a plan. No partial plan is ever returned.
    pub fn load(description: PlanDescription) -> Result<Self> {
        let PlanDescription { id, year, units } = description;

        if id.trim().is_empty() {
            return Err(EnrollError::MalformedPlan {
                plan: id,
                message: "plan id cannot be empty".to_string(),
            });
        }

        let malformed = |message: String| EnrollError::MalformedPlan {
            plan: id.clone(),
            message,
        };

        let mut map = BTreeMap::new();
        for record in units {
            if record.id.as_str().trim().is_empty() {
                return Err(malformed("unit with an empty id".to_string()));
            }
            if record.name.trim().is_empty() {
                return Err(malformed(format!("unit {} has an empty name", record.id)));
            }
            if let Some(semester) = record.semester {
                if !(1..=10).contains(&semester) {
                    return Err(malformed(format!(
                        "unit {} has semester {} outside 1..=10",
                        record.id, semester
                    )));
                }
            }
            if record.corequisites.contains(&record.id) {
                return Err(malformed(format!(
                    "unit {} lists itself as a corequisite",
                    record.id
                )));
            }
            if map.contains_key(&record.id) {
                return Err(malformed(format!("duplicate unit id {}", record.id)));
            }

            let unit = CurricularUnit {
                id: record.id.clone(),
                name: record.name,
                credits: record.credits,
                semester: record.semester,
                kind: record.kind,
                prerequisites: record.prerequisites.into_iter().collect(),
                corequisites: record.corequisites.into_iter().collect(),
            };
            map.insert(record.id, unit);
        }

        for unit in map.values() {
            let dangling = unit
                .prerequisites
                .iter()
                .chain(unit.corequisites.iter())
                .find(|reference| !map.contains_key(*reference));
            if let Some(reference) = dangling {
                return Err(malformed(format!(
                    "unit {} references unknown unit {}",
                    unit.id, reference
                )));
            }
        }

        let graph: BTreeMap<&UnitId, &BTreeSet<UnitId>> = map
            .iter()
            .map(|(unit_id, unit)| (unit_id, &unit.prerequisites))
            .collect();
        if let Some(cycle) = find_cycle(&graph) {
            tracing::warn!("Rejecting plan {}: prerequisite cycle {:?}", id, cycle);
            return Err(EnrollError::CyclicPrerequisite { plan: id, cycle });
        }

        tracing::info!("Loaded plan {} ({}) with {} units", id, year, map.len());
        Ok(Self {
            id,
            year,
            units: map,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::load(PlanDescription::from_json_str(content)?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        self.units.contains_key(unit)
    }

    pub fn unit(&self, unit: &UnitId) -> Result<&CurricularUnit> {
        self.units.get(unit).ok_or_else(|| EnrollError::UnknownUnit {
            plan: self.id.clone(),
            unit: unit.clone(),
        })
    }

    /// All units in id order.
    pub fn units(&self) -> impl Iterator<Item = &CurricularUnit> {
        self.units.values()
    }

    /// Units that list `unit` as a direct prerequisite.
    pub fn dependents<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> Result<impl Iterator<Item = &'a CurricularUnit> + 'a> {
        self.unit(unit)?;
        Ok(self
            .units
            .values()
            .filter(move |candidate| candidate.prerequisites.contains(unit)))
    }

    pub fn check_eligibility(&self, unit: &UnitId, record: &CompletionRecord) -> Result<Eligibility> {
        let missing: Vec<UnitId> = self
            .unit(unit)?
            .prerequisites
            .iter()
            .filter(|prerequisite| !record.has_passed(prerequisite))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(Eligibility::Eligible)
        } else {
            Ok(Eligibility::Missing(missing))
        }
    }

    pub fn is_eligible(&self, unit: &UnitId, record: &CompletionRecord) -> Result<bool> {
        Ok(self.check_eligibility(unit, record)?.is_eligible())
    }

    /// Eligible units the student has not passed yet. The iterator borrows
    /// the record, so call again after the record changes.
    pub fn units_eligible_for<'a>(
        &'a self,
        record: &'a CompletionRecord,
    ) -> impl Iterator<Item = &'a CurricularUnit> + 'a {
        self.units.values().filter(move |unit| {
            !record.has_passed(&unit.id)
                && unit
                    .prerequisites
                    .iter()
                    .all(|prerequisite| record.has_passed(prerequisite))
        })
    }

    pub fn total_credits(&self) -> u32 {
        self.units.values().map(|unit| unit.credits).sum()
    }

    pub fn credits_earned(&self, record: &CompletionRecord) -> u32 {
        record
            .passed()
            .filter_map(|unit| self.units.get(unit))
            .map(|unit| unit.credits)
            .sum()
    }
}

impl fmt::Display for CurriculumPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan {} ({})", self.id, self.year)?;
        writeln!(f, "{}", "-".repeat(40))?;
        for unit in self.units.values() {
            writeln!(f, "{} - {} ({} credits)", unit.id, unit.name, unit.credits)?;
            if !unit.prerequisites.is_empty() {
                let ids: Vec<&str> = unit.prerequisites.iter().map(UnitId::as_str).collect();
                writeln!(f, "  prerequisites: {}", ids.join(", "))?;
            }
        }
        write!(f, "{}", "-".repeat(40))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

/// Iterative depth-first search. Reaching a node that is still in progress
/// closes a cycle; the returned path starts and ends on that node.
fn find_cycle<'g>(graph: &BTreeMap<&'g UnitId, &'g BTreeSet<UnitId>>) -> Option<Vec<UnitId>> {
    let mut state: HashMap<&'g UnitId, Visit> =
        graph.keys().map(|unit| (*unit, Visit::Unvisited)).collect();

    for (&root, &edges) in graph {
        if state.get(root) != Some(&Visit::Unvisited) {
            continue;
        }

        state.insert(root, Visit::InProgress);
        let mut stack: Vec<(&'g UnitId, btree_set::Iter<'g, UnitId>)> = vec![(root, edges.iter())];

        loop {
            let Some((current, pending)) = stack.last_mut() else {
                break;
            };
            let current: &'g UnitId = *current;
            let next = pending.next();

            match next {
                None => {
                    state.insert(current, Visit::Done);
                    stack.pop();
                }
                Some(next) => match state.get(next).copied().unwrap_or(Visit::Done) {
                    Visit::Unvisited => {
                        state.insert(next, Visit::InProgress);
                        let next_edges = graph.get(next).map(|edges| edges.iter());
                        if let Some(next_edges) = next_edges {
                            stack.push((next, next_edges));
                        }
                    }
                    Visit::InProgress => {
                        let start = stack
                            .iter()
                            .position(|(unit, _)| *unit == next)
                            .unwrap_or(0);
                        let mut cycle: Vec<UnitId> =
                            stack[start..].iter().map(|(unit, _)| (*unit).clone()).collect();
                        cycle.push(next.clone());
                        return Some(cycle);
                    }
                    Visit::Done => {}
                },
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plan_description::UnitRecord;
    use crate::domain::model::UnitKind;

    fn unit(id: &str, prerequisites: &[&str]) -> UnitRecord {
        UnitRecord {
            id: UnitId::from(id),
            name: format!("Unit {}", id),
            credits: 5,
            semester: None,
            kind: UnitKind::Regular,
            prerequisites: prerequisites.iter().map(|p| UnitId::from(*p)).collect(),
            corequisites: vec![],
        }
    }

    fn plan(units: Vec<UnitRecord>) -> Result<CurriculumPlan> {
        CurriculumPlan::load(PlanDescription {
            id: "test-plan".to_string(),
            year: 2024,
            units,
        })
    }

    fn ids(values: &[&str]) -> Vec<UnitId> {
        values.iter().map(|v| UnitId::from(*v)).collect()
    }

    #[test]
    fn test_direct_prerequisite_eligibility() {
        let plan = plan(vec![unit("A", &[]), unit("B", &["A"])]).unwrap();
        let b = UnitId::from("B");

        let empty = CompletionRecord::new();
        assert!(!plan.is_eligible(&b, &empty).unwrap());
        assert_eq!(
            plan.check_eligibility(&b, &empty).unwrap(),
            Eligibility::Missing(ids(&["A"]))
        );

        let mut record = CompletionRecord::new();
        record.mark_passed("A");
        assert!(plan.is_eligible(&b, &record).unwrap());
    }

    #[test]
    fn test_in_progress_and_regular_do_not_satisfy() {
        let plan = plan(vec![unit("A", &[]), unit("B", &["A"])]).unwrap();
        let b = UnitId::from("B");

        let mut record = CompletionRecord::new();
        record.mark_in_progress("A");
        assert!(!plan.is_eligible(&b, &record).unwrap());
        record.mark_regular("A");
        assert!(!plan.is_eligible(&b, &record).unwrap());
    }

    #[test]
    fn test_eligibility_is_one_level_only() {
        let plan = plan(vec![unit("A", &[]), unit("B", &["A"]), unit("C", &["B"])]).unwrap();
        let mut record = CompletionRecord::new();
        record.mark_passed("B");
        assert!(plan.is_eligible(&UnitId::from("C"), &record).unwrap());
    }

    #[test]
    fn test_unknown_unit_is_an_error() {
        let plan = plan(vec![unit("A", &[])]).unwrap();
        let result = plan.is_eligible(&UnitId::from("Z"), &CompletionRecord::new());
        assert!(matches!(result, Err(EnrollError::UnknownUnit { .. })));
    }

    #[test]
    fn test_two_cycle_is_rejected() {
        let result = plan(vec![unit("A", &[]), unit("B", &["C"]), unit("C", &["B"])]);
        match result {
            Err(EnrollError::CyclicPrerequisite { cycle, .. }) => {
                assert_eq!(cycle, ids(&["B", "C", "B"]));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let result = plan(vec![unit("A", &["A"])]);
        match result {
            Err(EnrollError::CyclicPrerequisite { cycle, .. }) => {
                assert_eq!(cycle, ids(&["A", "A"]));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_long_cycle_behind_acyclic_prefix() {
        let result = plan(vec![
            unit("A", &["B"]),
            unit("B", &["C"]),
            unit("C", &["D"]),
            unit("D", &["E"]),
            unit("E", &["C"]),
        ]);
        match result {
            Err(EnrollError::CyclicPrerequisite { cycle, .. }) => {
                assert_eq!(cycle, ids(&["C", "D", "E", "C"]));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let plan = plan(vec![
            unit("A", &[]),
            unit("B", &["A"]),
            unit("C", &["A"]),
            unit("D", &["B", "C"]),
        ])
        .unwrap();
        assert_eq!(plan.len(), 4);
        let a = UnitId::from("A");
        let dependents: Vec<&str> = plan
            .dependents(&a)
            .unwrap()
            .map(|u| u.id.as_str())
            .collect();
        assert_eq!(dependents, vec!["B", "C"]);
    }

    #[test]
    fn test_dangling_and_duplicate_references() {
        let dangling = plan(vec![unit("A", &["Z"])]);
        assert!(matches!(dangling, Err(EnrollError::MalformedPlan { .. })));

        let duplicate = plan(vec![unit("A", &[]), unit("A", &[])]);
        assert!(matches!(duplicate, Err(EnrollError::MalformedPlan { .. })));

        let mut coreq = unit("A", &[]);
        coreq.corequisites = ids(&["Q"]);
        assert!(matches!(plan(vec![coreq]), Err(EnrollError::MalformedPlan { .. })));
    }

    #[test]
    fn test_units_eligible_for_skips_passed_units() {
        let plan = plan(vec![
            unit("A", &[]),
            unit("B", &["A"]),
            unit("C", &["B"]),
            unit("D", &[]),
        ])
        .unwrap();

        let mut record = CompletionRecord::new();
        record.mark_passed("A");
        let eligible: Vec<&str> = plan
            .units_eligible_for(&record)
            .map(|u| u.id.as_str())
            .collect();
        assert_eq!(eligible, vec!["B", "D"]);
    }

    #[test]
    fn test_credit_totals() {
        let plan = plan(vec![unit("A", &[]), unit("B", &["A"])]).unwrap();
        let mut record = CompletionRecord::new();
        record.mark_passed("A");
        record.mark_passed("NOT-IN-PLAN");
        assert_eq!(plan.total_credits(), 10);
        assert_eq!(plan.credits_earned(&record), 5);
    }

    #[test]
    fn test_display_lists_prerequisites() {
        let plan = plan(vec![unit("A", &[]), unit("B", &["A"])]).unwrap();
        let listing = plan.to_string();
        assert!(listing.starts_with("Plan test-plan (2024)"));
        assert!(listing.contains("B - Unit B (5 credits)\n  prerequisites: A"));
    }
}
