use plan_enroll::{
    CompletionRecord, CompletionStatus, CourseOffering, CurriculumPlan, EnrollError, PlanDescription,
    Sitting, StudentId, UnitId, UnitKind, UnitRecord,
};
use proptest::prelude::*;
use std::sync::Arc;

fn unit(index: usize, prerequisites: Vec<usize>) -> UnitRecord {
    UnitRecord {
        id: unit_id(index),
        name: format!("Unit {}", index),
        credits: 6,
        semester: None,
        kind: UnitKind::Regular,
        prerequisites: prerequisites.into_iter().map(unit_id).collect(),
        corequisites: Vec::new(),
    }
}

fn unit_id(index: usize) -> UnitId {
    UnitId::new(format!("U{:02}", index))
}

fn description(units: Vec<UnitRecord>) -> PlanDescription {
    PlanDescription {
        id: "prop".to_string(),
        year: 2024,
        units,
    }
}

/// Each unit may only require units with a lower index, so the graph is acyclic.
fn acyclic_plan() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..10).prop_flat_map(|size| {
        (0..size)
            .map(|index| proptest::collection::vec(0..index.max(1), 0..=index.min(3)))
            .collect::<Vec<_>>()
            .prop_map(|mut edges| {
                for prerequisites in edges.iter_mut() {
                    prerequisites.sort_unstable();
                    prerequisites.dedup();
                }
                edges
            })
    })
}

#[derive(Debug, Clone)]
enum Op {
    Enroll(u64),
    Withdraw(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..6).prop_map(Op::Enroll),
        (0u64..6).prop_map(Op::Withdraw),
    ]
}

proptest! {
    #[test]
    fn cycles_of_any_length_are_rejected(length in 1usize..12) {
        // U00 <- U01 <- ... <- U(n-1), then U00 requires the last one.
        let mut units: Vec<UnitRecord> = (0..length)
            .map(|index| unit(index, if index == 0 { vec![] } else { vec![index - 1] }))
            .collect();
        units[0].prerequisites.push(unit_id(length - 1));

        let err = CurriculumPlan::load(description(units)).unwrap_err();
        match err {
            EnrollError::CyclicPrerequisite { cycle, .. } => {
                prop_assert_eq!(cycle.len(), length + 1);
                prop_assert_eq!(cycle.first(), cycle.last());
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn acyclic_plans_load(edges in acyclic_plan()) {
        let units = edges.iter().cloned().enumerate().map(|(i, pre)| unit(i, pre)).collect();
        let plan = CurriculumPlan::load(description(units)).unwrap();
        prop_assert_eq!(plan.len(), edges.len());
    }

    #[test]
    fn eligibility_matches_direct_prerequisites(
        edges in acyclic_plan(),
        passed in proptest::collection::vec(any::<bool>(), 10),
    ) {
        let units = edges.iter().cloned().enumerate().map(|(i, pre)| unit(i, pre)).collect();
        let plan = CurriculumPlan::load(description(units)).unwrap();
        let record: CompletionRecord = passed
            .iter()
            .enumerate()
            .filter(|(_, passed)| **passed)
            .map(|(index, _)| (unit_id(index), CompletionStatus::Passed))
            .collect();

        for (index, prerequisites) in edges.iter().enumerate() {
            let expected = prerequisites.iter().all(|pre| passed[*pre]);
            let id = unit_id(index);
            let first = plan.is_eligible(&id, &record).unwrap();
            let second = plan.is_eligible(&id, &record).unwrap();
            prop_assert_eq!(first, expected);
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn roster_stays_unique_and_bounded(
        capacity in proptest::option::of(0usize..4),
        ops in proptest::collection::vec(op(), 0..40),
    ) {
        let plan = Arc::new(CurriculumPlan::load(description(vec![unit(0, vec![])])).unwrap());
        let mut offering = CourseOffering::new(plan, unit_id(0), 2024, 1, capacity).unwrap();
        let record = CompletionRecord::new();

        for op in ops {
            let before = offering.roster().clone();
            let result = match op {
                Op::Enroll(student) => offering.enroll(StudentId::new(student), &record),
                Op::Withdraw(student) => offering.withdraw(StudentId::new(student)),
            };

            if result.is_err() {
                prop_assert_eq!(offering.roster(), &before);
            }
            if let Some(capacity) = capacity {
                prop_assert!(offering.roster().len() <= capacity);
            }
            let students: Vec<_> = offering.roster().students().collect();
            let mut deduped = students.clone();
            deduped.dedup();
            prop_assert_eq!(students, deduped);
        }
    }
}
