use chrono::NaiveDate;
use std::collections::HashMap;

use crate::model::staff::{QualificationType, StaffMember, StaffRole};

pub const CURRICULUM_PLANNING: &str = "Curriculum Planning";
pub const CHILD_DEVELOPMENT: &str = "Child Development";
pub const EDUCATIONAL_PROGRAMMING: &str = "Educational Programming";
pub const BEHAVIOUR_GUIDANCE: &str = "Behaviour Guidance";
pub const FIRST_AID: &str = "First Aid";
pub const EMERGENCY_RESPONSE: &str = "Emergency Response";
pub const MEDICAL_MANAGEMENT: &str = "Medical Management";
pub const CHILD_PROTECTION: &str = "Child Protection";
pub const COMPLIANCE: &str = "Compliance";
pub const NUTRITION: &str = "Nutrition";
pub const LEADERSHIP: &str = "Leadership";

/// Level granted to everyone without a first aid qualification.
pub const FIRST_AID_FLOOR: u8 = 2;

/// Skill levels a qualification grants.
pub fn qualification_skills(qualification: QualificationType) -> &'static [(&'static str, u8)] {
    use QualificationType::*;
    match qualification {
        EarlyChildhoodTeacher => &[
            (CURRICULUM_PLANNING, 5),
            (CHILD_DEVELOPMENT, 5),
            (EDUCATIONAL_PROGRAMMING, 5),
            (BEHAVIOUR_GUIDANCE, 4),
        ],
        Diploma => &[
            (CURRICULUM_PLANNING, 4),
            (CHILD_DEVELOPMENT, 4),
            (EDUCATIONAL_PROGRAMMING, 3),
            (BEHAVIOUR_GUIDANCE, 3),
        ],
        CertificateIii => &[
            (CHILD_DEVELOPMENT, 3),
            (BEHAVIOUR_GUIDANCE, 2),
            (EDUCATIONAL_PROGRAMMING, 1),
        ],
        FirstAid => &[(FIRST_AID, 4), (EMERGENCY_RESPONSE, 3)],
        Cpr => &[(FIRST_AID, 3), (EMERGENCY_RESPONSE, 4)],
        Anaphylaxis => &[(MEDICAL_MANAGEMENT, 4)],
        Asthma => &[(MEDICAL_MANAGEMENT, 3)],
        ChildProtection => &[(CHILD_PROTECTION, 4), (COMPLIANCE, 3)],
        WorkingWithChildren => &[(COMPLIANCE, 2)],
        FoodSafety => &[(NUTRITION, 4)],
    }
}

/// Base competencies that come with a role regardless of qualifications.
pub fn role_competencies(role: StaffRole) -> &'static [(&'static str, u8)] {
    match role {
        StaffRole::CentreManager => &[(LEADERSHIP, 5), (COMPLIANCE, 4)],
        StaffRole::RoomLeader => &[(LEADERSHIP, 5), (EDUCATIONAL_PROGRAMMING, 3)],
        StaffRole::EarlyChildhoodTeacher => &[(EDUCATIONAL_PROGRAMMING, 4)],
        StaffRole::Educator => &[(CHILD_DEVELOPMENT, 2)],
        StaffRole::Assistant => &[],
        StaffRole::Cook => &[(NUTRITION, 3)],
    }
}

/// Skill name -> level (1-5) for a staff member on a given date.
///
/// Overlapping grants keep the highest level. Expired qualifications grant nothing.
pub fn derive_skill_levels(staff: &StaffMember, on: NaiveDate) -> HashMap<String, u8> {
    let mut levels: HashMap<String, u8> = HashMap::new();

    let grants = staff
        .qualifications_on(on)
        .flat_map(|q| qualification_skills(q).iter())
        .chain(role_competencies(staff.role).iter());

    for (skill, level) in grants {
        let entry = levels.entry((*skill).to_string()).or_insert(0);
        *entry = (*entry).max(*level);
    }

    levels.entry(FIRST_AID.to_string()).or_insert(FIRST_AID_FLOOR);
    levels
}
