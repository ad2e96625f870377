use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::ReviewLedger;
use super::scoring::ScoreCard;
use super::snapshot::QuestionSnapshot;

/// Identifier wrapper for assessments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentId(pub String);

/// Identifier of the lead an assessment belongs to (one assessment per lead).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

/// Identifier of a snapshot or template question; also the key of answer maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl AssessmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssessmentStatus::Draft => "draft",
            AssessmentStatus::Submitted => "submitted",
            AssessmentStatus::Approved => "approved",
            AssessmentStatus::Rejected => "rejected",
        }
    }

    /// Answers and snapshot questions may only change in these states.
    pub const fn is_editable(self) -> bool {
        matches!(self, AssessmentStatus::Draft | AssessmentStatus::Rejected)
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Assessor,
    Reviewer,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Assessor => "assessor",
            ActorRole::Reviewer => "reviewer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "assessor" => Some(Self::Assessor),
            "reviewer" => Some(Self::Reviewer),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of whoever is driving an operation, resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
    pub name: String,
}

impl Actor {
    pub fn assessor(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Assessor,
            name: name.into(),
        }
    }

    pub fn reviewer(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Reviewer,
            name: name.into(),
        }
    }
}

/// Question bank categories held in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Company,
    Financial,
    Sector,
    Eligibility,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        QuestionType::Company,
        QuestionType::Financial,
        QuestionType::Sector,
        QuestionType::Eligibility,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            QuestionType::Company => "company",
            QuestionType::Financial => "financial",
            QuestionType::Sector => "sector",
            QuestionType::Eligibility => "eligibility",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three free-form answer sections. Eligibility questions are informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSection {
    Company,
    Financial,
    Sector,
}

impl AnswerSection {
    pub const ALL: [AnswerSection; 3] = [
        AnswerSection::Company,
        AnswerSection::Financial,
        AnswerSection::Sector,
    ];

    pub const fn question_type(self) -> QuestionType {
        match self {
            AnswerSection::Company => QuestionType::Company,
            AnswerSection::Financial => QuestionType::Financial,
            AnswerSection::Sector => QuestionType::Sector,
        }
    }

    pub const fn label(self) -> &'static str {
        self.question_type().label()
    }
}

/// Score attached to a free-form answer; only -1, 0, 1 and 2 are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct AnswerScore(i8);

impl AnswerScore {
    pub const POSITIVE: AnswerScore = AnswerScore(1);

    pub const fn value(self) -> i8 {
        self.0
    }

    /// A zero score counts as "not yet answered" for submission purposes.
    pub const fn is_answered(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("answer score {0} must be one of -1, 0, 1 or 2")]
pub struct InvalidAnswerScore(pub i8);

impl TryFrom<i8> for AnswerScore {
    type Error = InvalidAnswerScore;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        if (-1..=2).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidAnswerScore(value))
        }
    }
}

impl From<AnswerScore> for i8 {
    fn from(value: AnswerScore) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub score: AnswerScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_link: Option<String>,
}

impl AnswerRecord {
    pub fn scored(score: AnswerScore) -> Self {
        Self {
            score,
            remark: None,
            evidence_link: None,
        }
    }
}

pub type AnswerMap = BTreeMap<QuestionId, AnswerRecord>;

/// Free-form answers for the company, financial and sector sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionAnswers {
    pub company: AnswerMap,
    pub financial: AnswerMap,
    pub sector: AnswerMap,
}

impl SectionAnswers {
    pub fn section(&self, section: AnswerSection) -> &AnswerMap {
        match section {
            AnswerSection::Company => &self.company,
            AnswerSection::Financial => &self.financial,
            AnswerSection::Sector => &self.sector,
        }
    }

    pub fn section_mut(&mut self, section: AnswerSection) -> &mut AnswerMap {
        match section {
            AnswerSection::Company => &mut self.company,
            AnswerSection::Financial => &mut self.financial,
            AnswerSection::Sector => &mut self.sector,
        }
    }

    pub fn clear(&mut self) {
        self.company.clear();
        self.financial.clear();
        self.sector.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.company.is_empty() && self.financial.is_empty() && self.sector.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceFlags {
    pub independent_directors: Option<bool>,
    pub audit_committee: Option<bool>,
    pub related_party_policy: Option<bool>,
    pub whistleblower_mechanism: Option<bool>,
}

impl GovernanceFlags {
    pub fn count_affirmed(&self) -> usize {
        [
            self.independent_directors,
            self.audit_committee,
            self.related_party_policy,
            self.whistleblower_mechanism,
        ]
        .into_iter()
        .filter(|flag| *flag == Some(true))
        .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamFlags {
    pub full_time_cfo: Option<bool>,
    pub company_secretary: Option<bool>,
    pub experienced_promoters: Option<bool>,
    pub second_line_management: Option<bool>,
}

impl TeamFlags {
    pub fn count_affirmed(&self) -> usize {
        [
            self.full_time_cfo,
            self.company_secretary,
            self.experienced_promoters,
            self.second_line_management,
        ]
        .into_iter()
        .filter(|flag| *flag == Some(true))
        .count()
    }
}

/// Three consecutive financial years, oldest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearlyFigures {
    pub year1: Option<f64>,
    pub year2: Option<f64>,
    pub year3: Option<f64>,
}

impl YearlyFigures {
    pub fn new(year1: f64, year2: f64, year3: f64) -> Self {
        Self {
            year1: Some(year1),
            year2: Some(year2),
            year3: Some(year3),
        }
    }
}

/// Structured answers for the eleven fixed-weight questions.
///
/// Monetary figures are in crore rupees; `outstanding_shares` is a raw count.
/// Every field is optional so partially completed drafts still score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedAnswers {
    pub investment_plan: Option<bool>,
    pub governance: GovernanceFlags,
    pub team: TeamFlags,
    pub paid_up_capital: Option<f64>,
    pub net_worth: Option<f64>,
    pub borrowings: Option<f64>,
    pub debt_equity_ratio: Option<f64>,
    pub turnover: YearlyFigures,
    pub ebitda: YearlyFigures,
    pub eps: Option<f64>,
    pub outstanding_shares: Option<u64>,
}

/// Sections an assessor can mark as verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifiedSection {
    Company,
    Financial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Partial update produced by the auto-save coordinator: only dirty sections are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPatch {
    pub expected_revision: Option<u64>,
    pub current_step: Option<u8>,
    pub company: Option<AnswerMap>,
    pub financial: Option<AnswerMap>,
    pub sector: Option<AnswerMap>,
    pub fixed: Option<FixedAnswers>,
}

impl AnswerPatch {
    pub fn is_empty(&self) -> bool {
        self.current_step.is_none()
            && self.company.is_none()
            && self.financial.is_none()
            && self.sector.is_none()
            && self.fixed.is_none()
    }
}

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 3;

/// Persisted assessment record, one per lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub lead_id: LeadId,
    pub status: AssessmentStatus,
    pub current_step: u8,
    pub company_verification: Verification,
    pub financial_verification: Verification,
    pub fixed: FixedAnswers,
    pub answers: SectionAnswers,
    pub snapshot: QuestionSnapshot,
    pub score: Option<ScoreCard>,
    pub review_history: ReviewLedger,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub revision: u64,
}

impl Assessment {
    pub fn new(
        id: AssessmentId,
        lead_id: LeadId,
        snapshot: QuestionSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            lead_id,
            status: AssessmentStatus::Draft,
            current_step: FIRST_STEP,
            company_verification: Verification::default(),
            financial_verification: Verification::default(),
            fixed: FixedAnswers::default(),
            answers: SectionAnswers::default(),
            snapshot,
            score: None,
            review_history: ReviewLedger::default(),
            submitted_at: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn verification_mut(&mut self, section: VerifiedSection) -> &mut Verification {
        match section {
            VerifiedSection::Company => &mut self.company_verification,
            VerifiedSection::Financial => &mut self.financial_verification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_scores_outside_range_are_rejected() {
        assert!(AnswerScore::try_from(-1).is_ok());
        assert!(AnswerScore::try_from(2).is_ok());
        assert_eq!(AnswerScore::try_from(3), Err(InvalidAnswerScore(3)));
        assert_eq!(AnswerScore::try_from(-2), Err(InvalidAnswerScore(-2)));

        let parsed: Result<AnswerRecord, _> = serde_json::from_str(r#"{"score": 5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn answer_maps_serialize_with_plain_question_keys() {
        let mut answers = SectionAnswers::default();
        answers.company.insert(
            QuestionId::new("company-001"),
            AnswerRecord {
                score: AnswerScore::try_from(2).expect("valid score"),
                remark: Some("audited".to_string()),
                evidence_link: None,
            },
        );

        let json = serde_json::to_value(&answers).expect("serializes");
        assert_eq!(json["company"]["company-001"]["score"], 2);
        assert!(json["company"]["company-001"].get("evidence_link").is_none());
    }

    #[test]
    fn flag_counts_only_affirmed_answers() {
        let governance = GovernanceFlags {
            independent_directors: Some(true),
            audit_committee: Some(false),
            related_party_policy: None,
            whistleblower_mechanism: Some(true),
        };
        assert_eq!(governance.count_affirmed(), 2);
        assert_eq!(TeamFlags::default().count_affirmed(), 0);
    }

    #[test]
    fn only_draft_and_rejected_are_editable() {
        assert!(AssessmentStatus::Draft.is_editable());
        assert!(AssessmentStatus::Rejected.is_editable());
        assert!(!AssessmentStatus::Submitted.is_editable());
        assert!(!AssessmentStatus::Approved.is_editable());
    }
}
