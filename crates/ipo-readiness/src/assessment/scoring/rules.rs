use super::super::domain::{FixedAnswers, YearlyFigures};
use super::tiers::{
    TierTable, BORROWINGS, DEBT_EQUITY_RATIO, EPS, NET_WORTH, OUTSTANDING_SHARES,
    PAID_UP_CAPITAL,
};
use super::{Criterion, ScoreComponent};

pub(crate) const INVESTMENT_PLAN_POINTS: f64 = 5.0;
pub(crate) const FLAG_POINTS: f64 = 2.5;
pub(crate) const FLAG_COUNT: usize = 4;
pub(crate) const TREND_MAX_POINTS: f64 = 7.5;

pub(crate) fn max_points(criterion: Criterion) -> f64 {
    match criterion {
        Criterion::InvestmentPlan => INVESTMENT_PLAN_POINTS,
        Criterion::Governance | Criterion::Team => FLAG_POINTS * FLAG_COUNT as f64,
        Criterion::PaidUpCapital => PAID_UP_CAPITAL.max_points,
        Criterion::NetWorth => NET_WORTH.max_points,
        Criterion::OutstandingShares => OUTSTANDING_SHARES.max_points,
        Criterion::Borrowings => BORROWINGS.max_points,
        Criterion::DebtEquityRatio => DEBT_EQUITY_RATIO.max_points,
        Criterion::Turnover | Criterion::Ebitda => TREND_MAX_POINTS,
        Criterion::Eps => EPS.max_points,
    }
}

pub(crate) fn score_criterion(criterion: Criterion, answers: &FixedAnswers) -> ScoreComponent {
    let (points, notes) = match criterion {
        Criterion::InvestmentPlan => match answers.investment_plan {
            Some(true) => (INVESTMENT_PLAN_POINTS, "investment plan documented".to_string()),
            Some(false) => (0.0, "no investment plan".to_string()),
            None => (0.0, "not answered".to_string()),
        },
        Criterion::Governance => {
            let affirmed = answers.governance.count_affirmed();
            (
                affirmed as f64 * FLAG_POINTS,
                format!("{affirmed}/{FLAG_COUNT} governance practices in place"),
            )
        }
        Criterion::Team => {
            let affirmed = answers.team.count_affirmed();
            (
                affirmed as f64 * FLAG_POINTS,
                format!("{affirmed}/{FLAG_COUNT} key team positions filled"),
            )
        }
        Criterion::PaidUpCapital => tiered(&PAID_UP_CAPITAL, answers.paid_up_capital, "Cr"),
        Criterion::NetWorth => tiered(&NET_WORTH, answers.net_worth, "Cr"),
        Criterion::OutstandingShares => tiered(
            &OUTSTANDING_SHARES,
            answers.outstanding_shares.map(|shares| shares as f64),
            "shares",
        ),
        Criterion::Borrowings => tiered(&BORROWINGS, answers.borrowings, "Cr"),
        Criterion::DebtEquityRatio => tiered(&DEBT_EQUITY_RATIO, answers.debt_equity_ratio, "x"),
        Criterion::Turnover => trend(&answers.turnover),
        Criterion::Ebitda => trend(&answers.ebitda),
        Criterion::Eps => tiered(&EPS, answers.eps, "per share"),
    };

    ScoreComponent {
        points,
        max_points: max_points(criterion),
        notes,
    }
}

fn tiered(table: &TierTable, value: Option<f64>, unit: &str) -> (f64, String) {
    let points = table.points(value);
    let notes = match value {
        Some(value) if value.is_finite() => format!("{value} {unit}"),
        Some(_) => "unusable figure".to_string(),
        None => "not answered".to_string(),
    };
    (points, notes)
}

/// A third of the points for three positive years, a third for each year of growth.
fn trend(figures: &YearlyFigures) -> (f64, String) {
    let share = TREND_MAX_POINTS / 3.0;
    let years = [figures.year1, figures.year2, figures.year3];
    let usable = |value: Option<f64>| value.filter(|value| value.is_finite());

    let mut points = 0.0;
    let mut notes = Vec::new();

    if years.iter().all(|year| usable(*year).is_some_and(|value| value > 0.0)) {
        points += share;
        notes.push("positive in all three years".to_string());
    } else {
        notes.push("not positive in every year".to_string());
    }

    let mut growth_years = 0;
    for pair in years.windows(2) {
        if let (Some(previous), Some(current)) = (usable(pair[0]), usable(pair[1])) {
            if current > previous {
                points += share;
                growth_years += 1;
            }
        }
    }
    notes.push(format!("{growth_years}/2 years of growth"));

    (points, notes.join(", "))
}
