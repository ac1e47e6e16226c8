//! End-to-end workflow scenarios through the engine facade

use qrw_engine::project::NewProject;
use qrw_engine::{AnswerPatch, CloneOutcome, EngineConfig, ReviewEngine};
use qrw_model::{
    ActorId, AnswerValue, ApprovalStatus, PhaseKey, ProjectId, ProjectStatus, Role, StageStatus,
};
use std::collections::BTreeMap;

fn patch(answer: &str) -> AnswerPatch {
    AnswerPatch {
        answer: Some(answer.to_string()),
        ..AnswerPatch::default()
    }
}

fn one_answer(question: &str, answer: &str) -> BTreeMap<String, AnswerPatch> {
    let mut map = BTreeMap::new();
    map.insert(question.to_string(), patch(answer));
    map
}

/// Engine with a one-phase template ("Safety" group, one question) and a
/// started project
async fn engine_with_started_project() -> (ReviewEngine, ProjectId) {
    let engine = ReviewEngine::new(EngineConfig::new());
    let stage1: PhaseKey = "stage1".parse().unwrap();

    engine.templates().ensure_template(None, None);
    engine.templates().add_phase("stage1", None, None).unwrap();
    let group = engine.templates().add_group(stage1, "Safety", None).unwrap();
    engine
        .templates()
        .add_checkpoint(stage1, group.id, None, "Is area clear?", None, None)
        .unwrap();

    let project = engine
        .projects()
        .create_project(
            NewProject {
                project_no: "P-100".to_string(),
                name: "Line upgrade".to_string(),
                description: None,
            },
            None,
        )
        .unwrap();
    let member = ActorId::new();
    engine.projects().add_member(project.id, member).unwrap();
    engine
        .projects()
        .start_project(project.id, Some(member))
        .await
        .unwrap();

    (engine, project.id)
}

#[tokio::test]
async fn clone_materializes_the_template_snapshot() {
    let (engine, project_id) = engine_with_started_project().await;

    let stages = engine.projects().stages_for_project(project_id).unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].stage_key, "stage1".parse().unwrap());

    let checklists = engine.checklists().list_for_stage(stages[0].id).unwrap();
    assert_eq!(checklists.len(), 1);
    assert_eq!(checklists[0].checklist_name, "Safety");

    let checkpoints = engine.store().checkpoints_for_checklist(checklists[0].id);
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0].question, "Is area clear?");

    // Template edits after cloning never reach the project
    engine
        .templates()
        .add_group("stage1".parse().unwrap(), "Late addition", None)
        .unwrap();
    let checklists = engine.checklists().list_for_stage(stages[0].id).unwrap();
    assert_eq!(checklists.len(), 1);
}

#[tokio::test]
async fn answer_divergence_becomes_a_tracked_defect() {
    let (engine, project_id) = engine_with_started_project().await;

    engine
        .answers()
        .save_answers(project_id, 1, Role::Executor, &one_answer("Is area clear?", "Yes"), None)
        .unwrap();
    let report = engine
        .answers()
        .save_answers(project_id, 1, Role::Reviewer, &one_answer("Is area clear?", "No"), None)
        .unwrap();
    assert_eq!(report.reconciliation.defects_detected, 1);

    let checkpoint = &engine.store().checkpoints_for_phase(project_id, 1)[0];
    assert!(checkpoint.defect.is_detected);
    assert_eq!(checkpoint.defect.history_count, 1);

    // Reviewer agrees on a later pass: defect clears, history survives
    engine
        .answers()
        .save_answers(project_id, 1, Role::Reviewer, &one_answer("Is area clear?", "Yes"), None)
        .unwrap();
    let checkpoint = &engine.store().checkpoints_for_phase(project_id, 1)[0];
    assert!(!checkpoint.defect.is_detected);
    assert_eq!(checkpoint.defect.category_id, None);
    assert_eq!(checkpoint.defect.history_count, 1);
}

#[tokio::test]
async fn approving_the_last_phase_completes_the_project() {
    let (engine, project_id) = engine_with_started_project().await;

    engine.approvals().request_approval(project_id, 1, None).unwrap();
    let outcome = engine.approvals().approve(project_id, 1, None).unwrap();
    assert!(outcome.project_completed);

    let project = engine.projects().get_project(project_id).unwrap();
    assert_eq!(project.status, ProjectStatus::Completed);
}

#[tokio::test]
async fn approving_a_middle_phase_activates_the_next_stage() {
    let engine = ReviewEngine::default();
    engine.templates().seed_sample(None).unwrap();

    let project = engine
        .projects()
        .create_project(
            NewProject {
                project_no: "P-200".to_string(),
                name: "Retrofit".to_string(),
                description: Some("three-phase sample".to_string()),
            },
            None,
        )
        .unwrap();
    let member = ActorId::new();
    engine.projects().add_member(project.id, member).unwrap();
    let (_, outcome) = engine
        .projects()
        .start_project(project.id, Some(member))
        .await
        .unwrap();
    assert!(matches!(outcome, CloneOutcome::Cloned { stages: 3, .. }));

    let outcome = engine.approvals().approve(project.id, 1, Some(member)).unwrap();
    assert!(!outcome.project_completed);
    let next = outcome.activated_stage.unwrap();
    assert_eq!(next.stage_key, "stage2".parse().unwrap());
    assert_eq!(next.status, StageStatus::InProgress);

    let stages = engine.projects().stages_for_project(project.id).unwrap();
    assert_eq!(stages[0].status, StageStatus::Completed);
    // Project still running until the final phase
    assert_ne!(
        engine.projects().get_project(project.id).unwrap().status,
        ProjectStatus::Completed
    );

    // Walk the remaining phases to completion
    engine.approvals().approve(project.id, 2, Some(member)).unwrap();
    let last = engine.approvals().approve(project.id, 3, Some(member)).unwrap();
    assert!(last.project_completed);
    assert_eq!(
        engine.projects().get_project(project.id).unwrap().status,
        ProjectStatus::Completed
    );
}

#[tokio::test]
async fn revert_to_executor_spares_the_reviewer() {
    let (engine, project_id) = engine_with_started_project().await;

    for role in [Role::Executor, Role::Reviewer] {
        engine
            .answers()
            .save_answers(project_id, 1, role, &one_answer("Is area clear?", "Yes"), None)
            .unwrap();
        engine.answers().submit(project_id, 1, role).unwrap();
    }

    let record = engine
        .approvals()
        .revert_to_executor(project_id, 1, Some("executor evidence missing"), None)
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::RevertedToExecutor);

    let executor = engine
        .answers()
        .submission_status(project_id, 1, Role::Executor)
        .unwrap();
    assert!(!executor.is_submitted);
    assert!(executor.submitted_at.is_none());

    let reviewer = engine
        .answers()
        .submission_status(project_id, 1, Role::Reviewer)
        .unwrap();
    assert!(reviewer.is_submitted);

    let stages = engine.projects().stages_for_project(project_id).unwrap();
    assert_eq!(stages[0].conflict_count, 1);
    assert_eq!(stages[0].loopback_count, 0);
}

#[tokio::test]
async fn revert_reopens_both_roles() {
    let (engine, project_id) = engine_with_started_project().await;

    for role in [Role::Executor, Role::Reviewer] {
        engine
            .answers()
            .save_answers(project_id, 1, role, &one_answer("Is area clear?", "Yes"), None)
            .unwrap();
        engine.answers().submit(project_id, 1, role).unwrap();
    }

    engine
        .approvals()
        .revert(project_id, 1, Some("needs rework"), None)
        .unwrap();

    for role in [Role::Executor, Role::Reviewer] {
        let status = engine.answers().submission_status(project_id, 1, role).unwrap();
        assert!(!status.is_submitted);
    }
    let stages = engine.projects().stages_for_project(project_id).unwrap();
    assert_eq!(stages[0].loopback_count, 1);
}

#[tokio::test]
async fn category_suggestion_reads_template_keywords() {
    let (engine, _) = engine_with_started_project().await;

    let wiring = qrw_model::DefectCategory::new("Wiring").with_keywords(vec![
        "cable".to_string(),
        "loose".to_string(),
        "terminal".to_string(),
    ]);
    let wiring_id = wiring.id;
    engine
        .templates()
        .set_defect_categories(vec![wiring], None)
        .unwrap();

    let suggestion = engine
        .reconciler()
        .suggest_category("loose cable at the rear terminal block");
    assert_eq!(suggestion.suggested_category_id, Some(wiring_id));
    assert!(suggestion.auto_fill);

    let empty = engine.reconciler().suggest_category("   ");
    assert_eq!(empty.suggested_category_id, None);
    assert!(!empty.auto_fill);
}

#[tokio::test]
async fn comparison_report_tracks_agreement() {
    let (engine, project_id) = engine_with_started_project().await;

    engine
        .answers()
        .save_answers(project_id, 1, Role::Executor, &one_answer("Is area clear?", "Yes"), None)
        .unwrap();
    assert!(!engine.reconciler().compare_answers(project_id, 1).matched);

    engine
        .answers()
        .save_answers(project_id, 1, Role::Reviewer, &one_answer("Is area clear?", "Yes"), None)
        .unwrap();
    let report = engine.reconciler().compare_answers(project_id, 1);
    assert!(report.matched);
    assert_eq!(report.executor_count, 1);
    assert_eq!(report.reviewer_count, 1);
}

#[tokio::test]
async fn defect_stats_survive_resolution() {
    let (engine, project_id) = engine_with_started_project().await;

    engine
        .answers()
        .save_answers(project_id, 1, Role::Executor, &one_answer("Is area clear?", "Yes"), None)
        .unwrap();
    engine
        .answers()
        .save_answers(project_id, 1, Role::Reviewer, &one_answer("Is area clear?", "No"), None)
        .unwrap();
    engine
        .answers()
        .save_answers(project_id, 1, Role::Reviewer, &one_answer("Is area clear?", "Yes"), None)
        .unwrap();

    let stages = engine.projects().stages_for_project(project_id).unwrap();
    let checklist = engine.checklists().list_for_stage(stages[0].id).unwrap()[0].clone();
    let stats = engine.reconciler().defect_stats(checklist.id).unwrap();
    assert_eq!(stats.defects_in_history, 1);
    assert_eq!(stats.current_defects, 0);
    assert!((stats.defect_rate - 100.0).abs() < f64::EPSILON);

    let executor = engine.answers().get_answers(project_id, 1, Role::Executor).unwrap();
    assert_eq!(executor["Is area clear?"].answer, Some(AnswerValue::Yes));
}
