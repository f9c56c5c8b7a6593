use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::origination::domain::{ApplicationId, ApplicationStatus};
use crate::workflows::origination::navigation::NavigationTarget;
use crate::workflows::origination::simulator::{
    DecisionPolicy, ScoringOutcome, ScoringSimulator, SimulatorError, WeightedRandomPolicy,
};
use crate::workflows::origination::storage::MemoryStorage;
use crate::workflows::origination::store::{ApplicationStore, StatusUpdate};

type TestSimulator = ScoringSimulator<MemoryStorage, RecordingNavigator>;

fn simulator_with(
    policy: Arc<dyn DecisionPolicy>,
) -> (
    TestSimulator,
    Arc<ApplicationStore<MemoryStorage>>,
    Arc<RecordingNavigator>,
) {
    let (store, _) = memory_store();
    let navigator = Arc::new(RecordingNavigator::default());
    let simulator = ScoringSimulator::new(store.clone(), navigator.clone(), policy, SCORING_DELAY);
    (simulator, store, navigator)
}

fn status_of(store: &ApplicationStore<MemoryStorage>, id: &ApplicationId) -> ApplicationStatus {
    store
        .get(id)
        .expect("store readable")
        .expect("record present")
        .status
}

#[tokio::test(start_paused = true)]
async fn decision_lands_only_after_the_delay() {
    let (simulator, store, navigator) = simulator_with(always(ScoringOutcome::Approved));
    let record = scoring_record("s1");
    store.add(record.clone()).expect("record stored");

    simulator.schedule(record.id.clone()).expect("scheduled");
    assert!(simulator.is_pending(&record.id));

    tokio::time::sleep(SCORING_DELAY - Duration::from_millis(100)).await;
    assert_eq!(status_of(&store, &record.id), ApplicationStatus::Scoring);
    assert!(navigator.targets().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(status_of(&store, &record.id), ApplicationStatus::Approved);
    assert!(!simulator.is_pending(&record.id));
    assert_eq!(
        navigator.targets(),
        vec![NavigationTarget::Decision {
            id: record.id.clone(),
            status: ApplicationStatus::Approved,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn every_scored_record_ends_approved_or_rejected() {
    let policy = Arc::new(WeightedRandomPolicy::seeded(0.5, 11));
    let (simulator, store, _) = simulator_with(policy);
    let ids: Vec<ApplicationId> = (0..25)
        .map(|n| {
            let record = scoring_record(&format!("batch-{n}"));
            store.add(record.clone()).expect("record stored");
            record.id
        })
        .collect();

    for id in &ids {
        simulator.schedule(id.clone()).expect("scheduled");
    }
    assert_eq!(simulator.pending_count(), ids.len());

    tokio::time::sleep(SCORING_DELAY * 2).await;

    for id in &ids {
        let status = status_of(&store, id);
        assert!(
            matches!(status, ApplicationStatus::Approved | ApplicationStatus::Rejected),
            "{id} ended in {status}"
        );
    }
    assert_eq!(simulator.pending_count(), 0);
}

#[test]
fn weighted_policy_honours_the_approval_rate() {
    let record = scoring_record("w1");

    let always_yes = WeightedRandomPolicy::seeded(1.0, 1);
    let always_no = WeightedRandomPolicy::seeded(0.0, 1);
    for _ in 0..50 {
        assert_eq!(always_yes.decide(&record), ScoringOutcome::Approved);
        assert_eq!(always_no.decide(&record), ScoringOutcome::Rejected);
    }

    let default_rate = WeightedRandomPolicy::seeded(WeightedRandomPolicy::DEFAULT_APPROVAL_RATE, 42);
    let approvals = (0..1_000)
        .filter(|_| default_rate.decide(&record) == ScoringOutcome::Approved)
        .count();
    assert!((700..=900).contains(&approvals), "approvals: {approvals}");
}

#[test]
fn out_of_range_rates_are_clamped() {
    assert_eq!(WeightedRandomPolicy::new(1.7).approval_rate(), 1.0);
    assert_eq!(WeightedRandomPolicy::new(-0.2).approval_rate(), 0.0);
    assert_eq!(
        WeightedRandomPolicy::from_config(&simulation_config()).approval_rate(),
        0.8
    );
}

#[test]
fn non_finite_rates_use_the_default() {
    for rate in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let policy = WeightedRandomPolicy::seeded(rate, 9);
        assert_eq!(
            policy.approval_rate(),
            WeightedRandomPolicy::DEFAULT_APPROVAL_RATE
        );
        let record = scoring_record("n1");
        let outcome = policy.decide(&record);
        assert!(matches!(
            outcome,
            ScoringOutcome::Approved | ScoringOutcome::Rejected
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn cancelled_scoring_never_fires() {
    let (simulator, store, navigator) = simulator_with(always(ScoringOutcome::Rejected));
    let record = scoring_record("c1");
    store.add(record.clone()).expect("record stored");
    simulator.schedule(record.id.clone()).expect("scheduled");

    assert!(simulator.cancel(&record.id));
    assert!(!simulator.cancel(&record.id));
    store
        .update_status(&record.id, ApplicationStatus::Underwriting)
        .expect("scoring can move to review");

    tokio::time::sleep(SCORING_DELAY * 2).await;

    assert_eq!(status_of(&store, &record.id), ApplicationStatus::Underwriting);
    assert!(navigator.targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn decision_skips_records_that_left_scoring() {
    let (simulator, store, navigator) = simulator_with(always(ScoringOutcome::Approved));
    let record = scoring_record("m1");
    store.add(record.clone()).expect("record stored");
    simulator.schedule(record.id.clone()).expect("scheduled");

    // Moved without cancelling the timer.
    store
        .update_status(&record.id, ApplicationStatus::Underwriting)
        .expect("scoring can move to review");

    tokio::time::sleep(SCORING_DELAY * 2).await;

    assert_eq!(status_of(&store, &record.id), ApplicationStatus::Underwriting);
    assert!(navigator.targets().is_empty());
}

#[test]
fn scheduling_outside_a_runtime_fails() {
    let (simulator, store, _) = simulator_with(always(ScoringOutcome::Approved));
    let record = scoring_record("n1");
    store.add(record.clone()).expect("record stored");

    let err = simulator.schedule(record.id.clone()).expect_err("no runtime");

    assert!(matches!(err, SimulatorError::NoRuntime));
    assert_eq!(simulator.pending_count(), 0);
}

#[test]
fn settle_now_decides_immediately() {
    let (simulator, store, navigator) = simulator_with(always(ScoringOutcome::Rejected));
    let record = scoring_record("i1");
    store.add(record.clone()).expect("record stored");

    let update = simulator.settle_now(&record.id).expect("store writable");

    assert_eq!(
        update.record().map(|record| record.status),
        Some(ApplicationStatus::Rejected)
    );
    assert_eq!(navigator.targets().len(), 1);

    let again = simulator.settle_now(&record.id).expect("store writable");
    assert_eq!(
        again,
        StatusUpdate::Stale {
            current: ApplicationStatus::Rejected
        }
    );
    assert_eq!(
        simulator
            .settle_now(&ApplicationId("missing".to_string()))
            .expect("store readable"),
        StatusUpdate::NotFound
    );
}
