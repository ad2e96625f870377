use crate::infra::build_service;
use clap::Args;
use ipo_readiness::assessment::{
    spawn_autosave, Actor, AnswerRecord, AnswerScore, AnswerSection, Assessment,
    AutoSaveConfig, DraftEdit, DraftState, FixedAnswers, GovernanceFlags, LeadId, QuestionType,
    RecordingLeadHook, RecordingNotifier, ReviewCommand, ScoreCard, ServiceDraftSaver,
    SubmitCommand, TeamFlags, TemplateRegistry, YearlyFigures,
};
use ipo_readiness::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Change the template bank after the assessment starts to show the confirmation gate.
    #[arg(long)]
    pub(crate) outdated: bool,
    /// Have the reviewer send the first submission back before approving.
    #[arg(long)]
    pub(crate) reject_first: bool,
    /// Print the final assessment record as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let templates = Arc::new(TemplateRegistry::standard());
    let notifier = RecordingNotifier::default();
    let leads = RecordingLeadHook::default();
    let service = Arc::new(build_service(
        templates.clone(),
        Arc::new(notifier.clone()),
        Arc::new(leads.clone()),
    ));
    let assessor = Actor::assessor("asr-demo", "Demo Assessor");
    let reviewer = Actor::reviewer("rev-demo", "Demo Reviewer");

    println!("IPO readiness assessment demo");
    let started = service.start(&assessor, LeadId("lead-demo".to_string()))?;
    println!(
        "  Started {} for {} with {} questions (template version {})",
        started.id,
        started.lead_id,
        started.snapshot.len(),
        started.snapshot.version()
    );

    let revision = fill_in_draft(&service, &assessor, &started).await?;
    println!("  Draft auto-saved at revision {revision}");

    if args.outdated {
        templates
            .add(
                QuestionType::Sector,
                "Is the sector exposed to commodity price swings?",
                None,
            )?;
        match service.submit(&assessor, &started.id, SubmitCommand::default()) {
            Err(err) if err.is_confirmation_gate() => {
                println!("  Submit paused: {err}");
                println!("  Assessor confirms the existing questions");
            }
            Err(err) => return Err(err.into()),
            Ok(_) => println!("  Template change was not detected"),
        }
    }

    let confirm = SubmitCommand {
        confirm_old_questions: args.outdated,
        ..SubmitCommand::default()
    };
    let submitted = service.submit(&assessor, &started.id, confirm.clone())?;
    if let Some(card) = &submitted.score {
        render_score(card);
    }

    if args.reject_first {
        let rejected = service.reject(
            &reviewer,
            &started.id,
            ReviewCommand {
                comments: Some("Please attach the audited statements for year 3".to_string()),
                ..ReviewCommand::default()
            },
        )?;
        println!("\n  Reviewer rejected the submission ({})", rejected.status);
        service.submit(&assessor, &started.id, confirm.clone())?;
        println!("  Assessor resubmitted");
    }

    let approved = service.approve(
        &reviewer,
        &started.id,
        ReviewCommand {
            comments: Some("Ready for banker introductions".to_string()),
            confirm_old_questions: args.outdated,
            ..ReviewCommand::default()
        },
    )?;
    println!("\n  Final status: {}", approved.status);

    println!("  Review history:");
    for entry in approved.review_history.entries() {
        println!(
            "    - {} by {} at {}: {}",
            entry.action,
            entry.reviewer_name,
            entry.reviewed_at.format("%Y-%m-%d %H:%M:%S"),
            if entry.comments.is_empty() {
                "(no comments)"
            } else {
                entry.comments.as_str()
            }
        );
    }

    let events: Vec<_> = notifier
        .events()
        .iter()
        .map(|event| event.kind.name())
        .collect();
    println!("  Notifications: {}", events.join(", "));
    println!("  Leads approved: {}", leads.approved_leads().len());

    if args.json {
        let rendered = serde_json::to_string_pretty(&approved)?;
        println!("{rendered}");
    }

    Ok(())
}

async fn fill_in_draft(
    service: &Arc<crate::infra::ApiAssessmentService>,
    assessor: &Actor,
    assessment: &Assessment,
) -> Result<u64, AppError> {
    let saver = Arc::new(ServiceDraftSaver::new(
        service.clone(),
        assessor.clone(),
        assessment.id.clone(),
    ));
    let handle = spawn_autosave(
        saver,
        AutoSaveConfig::default(),
        DraftState::from_assessment(assessment),
        assessment.revision,
    );

    let positive = AnswerRecord::scored(AnswerScore::POSITIVE);
    for section in AnswerSection::ALL {
        if let Some(question) = assessment.snapshot.questions(section.question_type()).first() {
            handle.edit(DraftEdit::SetAnswer {
                section,
                question_id: question.id.clone(),
                answer: positive.clone(),
            });
        }
    }
    handle.edit(DraftEdit::SetFixed {
        fixed: example_fixed(),
    });
    handle.edit(DraftEdit::SetStep { step: 3 });

    let status = handle.shutdown().await;
    println!("  Auto-save status: {status:?}");
    Ok(service.get(&assessment.id)?.revision)
}

fn render_score(card: &ScoreCard) {
    println!("\n  Score breakdown:");
    for (criterion, component) in &card.breakdown {
        println!(
            "    {:<30} {:>6.3} / {:<5} {}",
            criterion.label(),
            component.points,
            component.max_points,
            component.notes
        );
    }
    println!(
        "  Total {:.3} of {} ({:.1}%) => {}",
        card.total_score, card.max_score, card.percentage, card.rating
    );
    for (section, tally) in &card.section_tallies {
        println!(
            "    {} answers: {}/{} answered, net {}",
            section.label(),
            tally.answered,
            tally.questions,
            tally.points
        );
    }
}

fn example_fixed() -> FixedAnswers {
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
