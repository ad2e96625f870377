//! Fixed-weight IPO readiness rubric.
//!
//! Eleven structured questions carry hard-coded point tables; the free-form
//! answer sections are tallied alongside but never enter the total.

mod rating;
mod rules;
mod tiers;

pub use rating::{Rating, IPO_READY_THRESHOLD, NEEDS_IMPROVEMENT_THRESHOLD};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::domain::{AnswerSection, FixedAnswers, SectionAnswers};
use super::snapshot::QuestionSnapshot;

/// Highest achievable total: the sum of every criterion's top tier.
pub const MAX_SCORE: f64 = 82.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    InvestmentPlan,
    Governance,
    Team,
    PaidUpCapital,
    NetWorth,
    OutstandingShares,
    Borrowings,
    DebtEquityRatio,
    Turnover,
    Ebitda,
    Eps,
}

impl Criterion {
    pub const ALL: [Criterion; 11] = [
        Criterion::InvestmentPlan,
        Criterion::Governance,
        Criterion::Team,
        Criterion::PaidUpCapital,
        Criterion::NetWorth,
        Criterion::OutstandingShares,
        Criterion::Borrowings,
        Criterion::DebtEquityRatio,
        Criterion::Turnover,
        Criterion::Ebitda,
        Criterion::Eps,
    ];

    pub fn max_points(self) -> f64 {
        rules::max_points(self)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Criterion::InvestmentPlan => "Investment plan",
            Criterion::Governance => "Corporate governance",
            Criterion::Team => "Management team",
            Criterion::PaidUpCapital => "Paid-up capital",
            Criterion::NetWorth => "Net worth",
            Criterion::OutstandingShares => "Outstanding shares",
            Criterion::Borrowings => "Borrowings",
            Criterion::DebtEquityRatio => "Debt-equity ratio",
            Criterion::Turnover => "Turnover trend",
            Criterion::Ebitda => "EBITDA trend",
            Criterion::Eps => "Earnings per share",
        }
    }
}

/// Discrete contribution to the total, kept for reviewer audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub points: f64,
    pub max_points: f64,
    pub notes: String,
}

/// Answer coverage for one free-form section, restricted to snapshot questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTally {
    pub questions: usize,
    pub answered: usize,
    pub points: i32,
    /// Answers whose question was deleted from the snapshot; kept but not counted.
    pub orphaned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub breakdown: BTreeMap<Criterion, ScoreComponent>,
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub rating: Rating,
    #[serde(default)]
    pub section_tallies: BTreeMap<AnswerSection, SectionTally>,
}

impl ScoreCard {
    pub fn points(&self, criterion: Criterion) -> f64 {
        self.breakdown
            .get(&criterion)
            .map(|component| component.points)
            .unwrap_or(0.0)
    }

    pub fn with_section_tallies(mut self, tallies: BTreeMap<AnswerSection, SectionTally>) -> Self {
        self.section_tallies = tallies;
        self
    }
}

/// Pure scorer for the fixed rubric. Always produces a full card.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCalculator;

impl ScoreCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, answers: &FixedAnswers) -> ScoreCard {
        let breakdown: BTreeMap<Criterion, ScoreComponent> = Criterion::ALL
            .into_iter()
            .map(|criterion| (criterion, rules::score_criterion(criterion, answers)))
            .collect();

        let total_score: f64 = breakdown.values().map(|component| component.points).sum();
        let percentage = total_score / MAX_SCORE * 100.0;

        ScoreCard {
            breakdown,
            total_score,
            max_score: MAX_SCORE,
            percentage,
            rating: Rating::from_percentage(percentage),
            section_tallies: BTreeMap::new(),
        }
    }
}

/// Tallies each answer section against the questions currently in the snapshot.
pub fn section_tallies(
    answers: &SectionAnswers,
    snapshot: &QuestionSnapshot,
) -> BTreeMap<AnswerSection, SectionTally> {
    AnswerSection::ALL
        .into_iter()
        .map(|section| {
            let known: BTreeSet<_> = snapshot
                .questions(section.question_type())
                .iter()
                .map(|question| &question.id)
                .collect();

            let mut tally = SectionTally {
                questions: known.len(),
                ..SectionTally::default()
            };
            for (question_id, answer) in answers.section(section) {
                if !known.contains(question_id) {
                    tally.orphaned += 1;
                    continue;
                }
                tally.points += i32::from(answer.score.value());
                if answer.score.is_answered() {
                    tally.answered += 1;
                }
            }
            (section, tally)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::domain::{GovernanceFlags, TeamFlags, YearlyFigures};

    pub(crate) fn example_answers() -> FixedAnswers {
        FixedAnswers {
            investment_plan: Some(true),
            governance: GovernanceFlags {
                independent_directors: Some(true),
                audit_committee: Some(true),
                related_party_policy: Some(true),
                whistleblower_mechanism: Some(false),
            },
            team: TeamFlags {
                full_time_cfo: Some(true),
                company_secretary: Some(true),
                experienced_promoters: Some(true),
                second_line_management: Some(true),
            },
            paid_up_capital: Some(8.0),
            net_worth: Some(12.0),
            borrowings: Some(3.0),
            debt_equity_ratio: Some(0.8),
            turnover: YearlyFigures::new(40.0, 52.0, 61.0),
            ebitda: YearlyFigures::new(6.0, 7.5, 9.2),
            eps: Some(8.0),
            outstanding_shares: Some(750_000),
        }
    }

    #[test]
    fn max_score_matches_sum_of_criteria() {
        let sum: f64 = Criterion::ALL.iter().map(|criterion| criterion.max_points()).sum();
        assert_eq!(sum, MAX_SCORE);
    }

    #[test]
    fn example_company_scores_each_line_item() {
        let card = ScoreCalculator::new().compute(&example_answers());

        assert_eq!(card.points(Criterion::InvestmentPlan), 5.0);
        assert_eq!(card.points(Criterion::Governance), 7.5);
        assert_eq!(card.points(Criterion::Team), 10.0);
        assert_eq!(card.points(Criterion::PaidUpCapital), 7.5);
        assert_eq!(card.points(Criterion::OutstandingShares), 3.75);
        assert_eq!(card.points(Criterion::NetWorth), 10.0);
        assert_eq!(card.points(Criterion::Borrowings), 2.5);
        assert_eq!(card.points(Criterion::DebtEquityRatio), 5.625);
        assert_eq!(card.points(Criterion::Turnover), 7.5);
        assert_eq!(card.points(Criterion::Ebitda), 7.5);
        assert_eq!(card.points(Criterion::Eps), 3.75);
        assert_eq!(card.total_score, 70.625);
        assert_eq!(card.rating, Rating::IpoReady);
    }

    #[test]
    fn breakdown_sums_to_total_and_percentage_is_consistent() {
        let mut partial = example_answers();
        partial.net_worth = None;
        partial.eps = Some(1.5);
        partial.ebitda = YearlyFigures::default();

        for answers in [example_answers(), partial, FixedAnswers::default()] {
            let card = ScoreCalculator::new().compute(&answers);
            let sum: f64 = card.breakdown.values().map(|component| component.points).sum();
            assert_eq!(card.breakdown.len(), Criterion::ALL.len());
            assert!((sum - card.total_score).abs() < 1e-9);
            assert!((card.percentage - card.total_score / card.max_score * 100.0).abs() < 1e-9);
            assert_eq!(card.rating, Rating::from_percentage(card.percentage));
        }
    }

    #[test]
    fn empty_answers_score_zero_without_failing() {
        let card = ScoreCalculator::new().compute(&FixedAnswers::default());
        assert_eq!(card.total_score, 0.0);
        assert_eq!(card.percentage, 0.0);
        assert_eq!(card.rating, Rating::NotReady);
        assert_eq!(card.breakdown[&Criterion::NetWorth].notes, "not answered");
    }

    #[test]
    fn increasing_numeric_inputs_moves_line_items_in_their_direction() {
        let calculator = ScoreCalculator::new();
        let mut previous: Option<ScoreCard> = None;
        for value in [0.0, 0.4, 0.9, 1.0, 2.5, 3.0, 4.0, 5.0, 7.0, 10.0, 20.0] {
            let mut answers = FixedAnswers::default();
            answers.paid_up_capital = Some(value);
            answers.net_worth = Some(value);
            answers.eps = Some(value);
            answers.borrowings = Some(value);
            answers.debt_equity_ratio = Some(value);
            let card = calculator.compute(&answers);

            if let Some(before) = &previous {
                for criterion in [Criterion::PaidUpCapital, Criterion::NetWorth, Criterion::Eps] {
                    assert!(card.points(criterion) >= before.points(criterion));
                }
                for criterion in [Criterion::Borrowings, Criterion::DebtEquityRatio] {
                    assert!(card.points(criterion) <= before.points(criterion));
                }
            }
            previous = Some(card);
        }
    }

    #[test]
    fn rating_bands_follow_percentage() {
        let mut answers = FixedAnswers::default();
        answers.investment_plan = Some(true);
        let card = ScoreCalculator::new().compute(&answers);
        assert_eq!(card.rating, Rating::NotReady);

        let strong = FixedAnswers {
            debt_equity_ratio: Some(0.1),
            borrowings: Some(0.0),
            outstanding_shares: Some(2_000_000),
            eps: Some(12.0),
            ..example_answers()
        };
        let card = ScoreCalculator::new().compute(&strong);
        assert!(card.percentage > IPO_READY_THRESHOLD);
        assert_eq!(card.rating, Rating::IpoReady);
    }
}
