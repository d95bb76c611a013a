//! Compile-time table of the DiaVise entities and their sensitive fields.

use std::{fmt, str::FromStr};

use super::{EntitySchema, FieldKind, FieldRule, FieldSpec};

use FieldKind::{Integer, Number, Text};

/// Entities whose sensitive fields are known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Demographics and lifestyle answers from onboarding.
    UserPersonalInfo,
    /// Diagnosis, medications, lab results and vitals.
    UserMedicalInfo,
    /// Admin audit trail; encrypts the `changes.after` snapshot when flagged.
    AuditLog,
}

const USER_PERSONAL_INFO: &[(&str, FieldKind)] = &[
    ("date_of_birth", Text),
    ("gender", Text),
    ("height", Number),
    ("weight", Number),
    ("activity_level", Text),
    ("dietary_preference", Text),
    ("smoking_status", Text),
    ("alcohol_use", Text),
    ("sleep_hours", Integer),
    ("address.street", Text),
    ("address.city", Text),
    ("address.state", Text),
    ("address.zip_code", Text),
    ("address.country", Text),
    ("emergency_contact.name", Text),
    ("emergency_contact.phone", Text),
    ("emergency_contact.relationship", Text),
];

const USER_MEDICAL_INFO: &[(&str, FieldKind)] = &[
    ("diabetes_type", Text),
    ("diagnosis_date", Text),
    ("current_medications[].medication_name", Text),
    ("current_medications[].dosage", Text),
    ("current_medications[].frequency", Text),
    ("allergies[].allergen", Text),
    ("allergies[].reaction", Text),
    ("chronic_conditions[].condition_name", Text),
    ("chronic_conditions[].diagnosed_date", Text),
    ("family_history[].relation", Text),
    ("family_history[].condition", Text),
    ("recent_lab_results.hba1c.value", Number),
    ("recent_lab_results.hba1c.date", Text),
    ("recent_lab_results.hba1c.unit", Text),
    ("recent_lab_results.fasting_glucose.value", Number),
    ("recent_lab_results.fasting_glucose.date", Text),
    ("recent_lab_results.fasting_glucose.unit", Text),
    ("recent_lab_results.cholesterol.total", Number),
    ("recent_lab_results.cholesterol.ldl", Number),
    ("recent_lab_results.cholesterol.hdl", Number),
    ("recent_lab_results.cholesterol.date", Text),
    ("recent_lab_results.cholesterol.unit", Text),
    ("blood_pressure.systolic", Number),
    ("blood_pressure.diastolic", Number),
    ("blood_pressure.last_recorded", Text),
    ("last_medical_checkup", Text),
];

const AUDIT_LOG_SNAPSHOT: &str = "changes.after";
const AUDIT_LOG_FLAGS: &[&str] = &["involves_pii", "involves_phi"];

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::UserPersonalInfo,
        EntityKind::UserMedicalInfo,
        EntityKind::AuditLog,
    ];

    /// Name used in the entity header and the registry.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::UserPersonalInfo => "user_personal_info",
            EntityKind::UserMedicalInfo => "user_medical_info",
            EntityKind::AuditLog => "audit_log",
        }
    }

    /// Build the runtime schema for this entity.
    pub fn schema(&self) -> EntitySchema {
        let rule = match self {
            EntityKind::UserPersonalInfo => paths(USER_PERSONAL_INFO),
            EntityKind::UserMedicalInfo => paths(USER_MEDICAL_INFO),
            EntityKind::AuditLog => FieldRule::AllKeysUnder {
                path: AUDIT_LOG_SNAPSHOT.to_owned(),
                when_any: AUDIT_LOG_FLAGS.iter().map(|f| (*f).to_owned()).collect(),
            },
        };
        EntitySchema {
            name: self.name().to_owned(),
            rule,
        }
    }
}

fn paths(table: &[(&str, FieldKind)]) -> FieldRule {
    FieldRule::Paths(
        table
            .iter()
            .map(|(path, kind)| FieldSpec::new(*path, *kind))
            .collect(),
    )
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.name().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("patient".parse::<EntityKind>().is_err());
    }

    #[test]
    fn personal_info_numeric_kinds() {
        let schema = EntityKind::UserPersonalInfo.schema();
        let FieldRule::Paths(fields) = &schema.rule else {
            panic!("expected path rule");
        };
        let kind_of = |p: &str| fields.iter().find(|f| f.path == p).map(|f| f.kind);
        assert_eq!(kind_of("height"), Some(Number));
        assert_eq!(kind_of("sleep_hours"), Some(Integer));
        assert_eq!(kind_of("gender"), Some(Text));
        assert_eq!(kind_of("user_id"), None);
    }

    #[test]
    fn medical_info_covers_array_fields() {
        let schema = EntityKind::UserMedicalInfo.schema();
        let FieldRule::Paths(fields) = &schema.rule else {
            panic!("expected path rule");
        };
        assert!(fields
            .iter()
            .any(|f| f.path == "current_medications[].dosage"));
        assert!(fields
            .iter()
            .any(|f| f.path == "recent_lab_results.cholesterol.ldl" && f.kind == Number));
    }

    #[test]
    fn audit_log_gated_on_flags() {
        match EntityKind::AuditLog.schema().rule {
            FieldRule::AllKeysUnder { path, when_any } => {
                assert_eq!(path, "changes.after");
                assert_eq!(when_any, vec!["involves_pii", "involves_phi"]);
            }
            other => panic!("unexpected rule {other:?}"),
        }
    }
}
