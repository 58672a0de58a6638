use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a staff member as issued by the HR system.
pub type StaffId = String;

// ---------------------------------------------------------------------------
// Qualifications and roles
// ---------------------------------------------------------------------------

/// Qualification types recognised by the skill table and by shift requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationType {
    /// Bachelor-level early childhood teaching degree.
    EarlyChildhoodTeacher,
    Diploma,
    CertificateIii,
    FirstAid,
    Cpr,
    Anaphylaxis,
    Asthma,
    ChildProtection,
    WorkingWithChildren,
    FoodSafety,
}

/// Position a staff member holds at a centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    CentreManager,
    RoomLeader,
    EarlyChildhoodTeacher,
    Educator,
    Assistant,
    Cook,
}

impl StaffRole {
    /// Lead roles carry a Leadership competency on top of their qualifications.
    pub fn is_lead(&self) -> bool {
        matches!(self, StaffRole::CentreManager | StaffRole::RoomLeader)
    }
}

/// A qualification held by a staff member, optionally with an expiry date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldQualification {
    pub qualification: QualificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,
}

impl HeldQualification {
    pub fn new(qualification: QualificationType) -> Self {
        Self {
            qualification,
            expires_on: None,
        }
    }

    pub fn expiring(qualification: QualificationType, expires_on: NaiveDate) -> Self {
        Self {
            qualification,
            expires_on: Some(expires_on),
        }
    }

    /// A qualification counts on every date up to and including its expiry.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.expires_on.map_or(true, |expiry| date <= expiry)
    }
}

// ---------------------------------------------------------------------------
// StaffMember
// ---------------------------------------------------------------------------

/// A candidate for roster assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub name: String,
    pub role: StaffRole,
    #[serde(default)]
    pub qualifications: Vec<HeldQualification>,
}

impl StaffMember {
    pub fn new(id: impl Into<StaffId>, name: impl Into<String>, role: StaffRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            qualifications: Vec::new(),
        }
    }

    /// Add a non-expiring qualification.
    pub fn with_qualification(mut self, qualification: QualificationType) -> Self {
        self.qualifications.push(HeldQualification::new(qualification));
        self
    }

    /// Add a qualification that lapses after `expires_on`.
    pub fn with_expiring_qualification(
        mut self,
        qualification: QualificationType,
        expires_on: NaiveDate,
    ) -> Self {
        self.qualifications
            .push(HeldQualification::expiring(qualification, expires_on));
        self
    }

    /// Qualification types held and still valid on `date`.
    pub fn qualifications_on(&self, date: NaiveDate) -> impl Iterator<Item = QualificationType> + '_ {
        self.qualifications
            .iter()
            .filter(move |held| held.is_valid_on(date))
            .map(|held| held.qualification)
    }
}
