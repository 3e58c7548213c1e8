use crate::domain::model::{UnitId, UnitKind};
use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

/// Parsed, not yet validated, description of a curriculum plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDescription {
    pub id: String,
    pub year: i32,
    #[serde(default)]
    pub units: Vec<UnitRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: UnitId,
    pub name: String,
    pub credits: u32,
    #[serde(default)]
    pub semester: Option<u8>,
    #[serde(default)]
    pub kind: UnitKind,
    #[serde(default, alias = "prerequisiteIds", alias = "prerequisite_ids")]
    pub prerequisites: Vec<UnitId>,
    #[serde(default, alias = "corequisiteIds", alias = "corequisite_ids")]
    pub corequisites: Vec<UnitId>,
}

#[derive(Debug, Deserialize)]
struct SemesterEntry {
    #[serde(alias = "nombre")]
    name: String,
    #[serde(alias = "creditos")]
    credits: u32,
    #[serde(default)]
    kind: UnitKind,
    #[serde(default, alias = "prerequisiteIds", alias = "previas")]
    prerequisites: Vec<UnitId>,
    #[serde(default, alias = "corequisiteIds")]
    corequisites: Vec<UnitId>,
}

/// JSON object entries in document order. Unlike a map, repeated keys are
/// kept so the caller can reject them.
struct Entries<K, V>(Vec<(K, V)>);

impl<'de, K, V> Deserialize<'de> for Entries<K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor<K, V>(PhantomData<(K, V)>);

        impl<'de, K, V> Visitor<'de> for EntriesVisitor<K, V>
        where
            K: Deserialize<'de>,
            V: Deserialize<'de>,
        {
            type Value = Entries<K, V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

impl PlanDescription {
    pub fn new(id: impl Into<String>, year: i32) -> Self {
        Self {
            id: id.into(),
            year,
            units: Vec::new(),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_json_slice(content: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(content)?)
    }

    /// Reads the semester-keyed layout:
    /// `{"1": {"UC1S1": {"name": .., "credits": .., "prerequisites": [..]}}}`.
    /// The `nombre`/`creditos`/`previas` keys are accepted as well. A unit id
    /// listed twice anywhere in the layout is a [`EnrollError::MalformedPlan`].
    pub fn from_semester_map(id: impl Into<String>, year: i32, content: &str) -> Result<Self> {
        let id = id.into();
        let Entries(semesters): Entries<String, Entries<UnitId, SemesterEntry>> =
            serde_json::from_str(content)?;

        let mut description = Self::new(id.clone(), year);
        let mut seen = BTreeSet::new();
        for (semester_key, Entries(entries)) in semesters {
            let semester = semester_key.trim().parse::<u8>().map_err(|_| {
                EnrollError::MalformedPlan {
                    plan: id.clone(),
                    message: format!("semester key '{}' is not a number", semester_key),
                }
            })?;

            for (unit_id, entry) in entries {
                if !seen.insert(unit_id.clone()) {
                    return Err(EnrollError::MalformedPlan {
                        plan: id.clone(),
                        message: format!("unit {} is listed twice", unit_id),
                    });
                }
                description.units.push(UnitRecord {
                    id: unit_id,
                    name: entry.name,
                    credits: entry.credits,
                    semester: Some(semester),
                    kind: entry.kind,
                    prerequisites: entry.prerequisites,
                    corequisites: entry.corequisites,
                });
            }
        }

        tracing::debug!(
            "Parsed semester layout for plan {} with {} units",
            id,
            description.units.len()
        );
        Ok(description)
    }

    /// Appends a unit with a generated `UC{n}S{semester}` identifier and
    /// returns that identifier. `n` is one past the highest code already
    /// used in that semester.
    pub fn add_unit(
        &mut self,
        name: &str,
        credits: u32,
        semester: u8,
        prerequisites: Vec<UnitId>,
    ) -> Result<UnitId> {
        validate_non_empty_string("name", name)?;
        validate_range("semester", semester, 1, 10)?;

        let suffix = format!("S{}", semester);
        let highest = self
            .units
            .iter()
            .filter_map(|unit| {
                unit.id
                    .as_str()
                    .strip_prefix("UC")?
                    .strip_suffix(suffix.as_str())?
                    .parse::<u32>()
                    .ok()
            })
            .max()
            .unwrap_or(0);
        let id = UnitId::new(format!("UC{}{}", highest + 1, suffix));
        if self.units.iter().any(|unit| unit.id == id) {
            return Err(EnrollError::MalformedPlan {
                plan: self.id.clone(),
                message: format!("generated unit id {} is already taken", id),
            });
        }

        self.units.push(UnitRecord {
            id: id.clone(),
            name: sentence_case(name),
            credits,
            semester: Some(semester),
            kind: UnitKind::Regular,
            prerequisites,
            corequisites: Vec::new(),
        });

        Ok(id)
    }
}

fn sentence_case(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
