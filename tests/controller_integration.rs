//! End-to-end controller flows against an in-memory store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use sendtune::alerts::model::{AlertSeverity, AlertType, DecisionType};
use sendtune::campaign::{CampaignCounters, CampaignStatus};
use sendtune::config::ControllerConfig;
use sendtune::controller::AdaptiveSendController;
use sendtune::error::{Error, ThrottleError, ValidationError};
use sendtune::events::{EventType, TrackingEvent};
use sendtune::sendtime::model::{DomainSendTime, SendTimeSource};
use sendtune::settings::SettingsUpdate;
use sendtune::store::{LibSqlStore, Store};
use sendtune::throttle::ThrottleAction;

async fn controller() -> AdaptiveSendController {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();

    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    AdaptiveSendController::new(store, ControllerConfig::default())
}

async fn seed_counters(ctl: &AdaptiveSendController, campaign_id: Uuid, c: CampaignCounters) {
    ctl.store()
        .upsert_campaign_counters(campaign_id, &c)
        .await
        .unwrap();
}

fn counters(sent: i64, opened: i64, bounced: i64, complained: i64) -> CampaignCounters {
    CampaignCounters {
        sent,
        delivered: sent - bounced,
        opened,
        clicked: 0,
        bounced,
        complained,
        unsubscribed: 0,
    }
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn settings_read_never_fails_with_not_found() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();

    let settings = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(settings.campaign_id, campaign_id);
    assert_eq!(settings.current_throttle_rate, 10_000);
    assert!(settings.throttle_optimization_enabled);
}

#[tokio::test]
async fn settings_save_merges_and_invalidates_cache() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();

    // Prime the cache
    let before = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(before.complaint_rate_threshold, 0.001);

    ctl.save_ai_settings(
        campaign_id,
        &SettingsUpdate {
            complaint_rate_threshold: Some(0.003),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // A cached stale value would still read 0.001
    let after = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(after.complaint_rate_threshold, 0.003);
    assert_eq!(after.bounce_rate_threshold, before.bounce_rate_threshold);
}

// ── Metrics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn record_snapshot_then_realtime_metrics() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 150, 10, 0)).await;

    assert!(ctl.realtime_metrics(campaign_id).await.unwrap().is_none());

    let snap = ctl.record_snapshot(campaign_id).await.unwrap();
    assert_eq!(snap.sent, 1_000);
    assert_eq!(snap.open_rate, 0.15);

    let latest = ctl.realtime_metrics(campaign_id).await.unwrap().unwrap();
    assert_eq!(latest.id, snap.id);
}

// ── Throttle optimization ───────────────────────────────────────────

#[tokio::test]
async fn optimize_rejected_when_disabled() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    ctl.save_ai_settings(
        campaign_id,
        &SettingsUpdate {
            throttle_optimization_enabled: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = ctl.optimize_throttle(campaign_id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Throttle(ThrottleError::OptimizationDisabled { .. })
    ));
}

#[tokio::test]
async fn optimize_rejected_without_snapshots() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();

    let err = ctl.optimize_throttle(campaign_id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Throttle(ThrottleError::InsufficientData { .. })
    ));
}

#[tokio::test]
async fn healthy_campaign_rate_increases_and_persists() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 150, 10, 0)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let rec = ctl.optimize_throttle(campaign_id).await.unwrap();
    assert_eq!(rec.action, ThrottleAction::Increase);
    assert_eq!(rec.new_rate, 12_500);

    let settings = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(settings.current_throttle_rate, 12_500);

    let decisions = ctl.decisions(campaign_id, 10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type, DecisionType::ThrottleIncrease);
    assert_eq!(decisions[0].old_value, 10_000);
    assert_eq!(decisions[0].new_value, 12_500);
    assert!(decisions[0].applied);
}

#[tokio::test]
async fn increase_clamps_to_max_rate() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    ctl.save_ai_settings(
        campaign_id,
        &SettingsUpdate {
            max_throttle_rate: Some(12_000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    seed_counters(&ctl, campaign_id, counters(1_000, 150, 10, 0)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let rec = ctl.optimize_throttle(campaign_id).await.unwrap();
    assert_eq!(rec.action, ThrottleAction::Increase);
    assert_eq!(rec.new_rate, 12_000);

    let settings = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(settings.current_throttle_rate, 12_000);
    assert!(settings.current_throttle_rate <= settings.max_throttle_rate);
}

#[tokio::test]
async fn high_bounce_decreases_rate_by_30_percent() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 100, 100, 0)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let rec = ctl.optimize_throttle(campaign_id).await.unwrap();
    assert_eq!(rec.action, ThrottleAction::Decrease);
    assert_eq!(rec.new_rate, 7_000);

    let settings = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(settings.current_throttle_rate, 7_000);
}

#[tokio::test]
async fn complaints_above_threshold_halve_rate() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 100, 0, 2)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let rec = ctl.optimize_throttle(campaign_id).await.unwrap();
    assert_eq!(rec.action, ThrottleAction::Decrease);
    assert_eq!(rec.new_rate, 5_000);
}

#[tokio::test]
async fn complaint_spike_pauses_campaign_and_raises_critical_alert() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 100, 0, 5)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let rec = ctl.optimize_throttle(campaign_id).await.unwrap();
    assert_eq!(rec.action, ThrottleAction::Pause);
    assert_eq!(rec.new_rate, 0);

    assert_eq!(
        ctl.store().campaign_status(campaign_id).await.unwrap(),
        CampaignStatus::Paused
    );

    let alerts = ctl.alerts(campaign_id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[0].alert_type, AlertType::CampaignPaused);

    // Pause leaves the stored rate untouched — the invariant survives.
    let settings = ctl.get_ai_settings(campaign_id).await.unwrap();
    assert_eq!(settings.current_throttle_rate, 10_000);

    let decisions = ctl.decisions(campaign_id, 10).await.unwrap();
    assert_eq!(decisions[0].decision_type, DecisionType::CampaignPause);
}

#[tokio::test]
async fn maintain_is_still_logged() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    // open rate 5%: nothing to act on
    seed_counters(&ctl, campaign_id, counters(1_000, 50, 10, 0)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let rec = ctl.optimize_throttle(campaign_id).await.unwrap();
    assert_eq!(rec.action, ThrottleAction::Maintain);

    let decisions = ctl.decisions(campaign_id, 10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type, DecisionType::ThrottleMaintain);
}

#[tokio::test]
async fn rate_invariant_holds_across_repeated_cycles() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 150, 10, 0)).await;

    for round in 1..=6i64 {
        // Counters keep growing healthily; rate should climb and stop at max.
        seed_counters(
            &ctl,
            campaign_id,
            counters(1_000 * (round + 1), 150 * (round + 1), 10, 0),
        )
        .await;
        ctl.record_snapshot(campaign_id).await.unwrap();
        ctl.optimize_throttle(campaign_id).await.unwrap();

        let s = ctl.get_ai_settings(campaign_id).await.unwrap();
        assert!(s.min_throttle_rate <= s.current_throttle_rate);
        assert!(s.current_throttle_rate <= s.max_throttle_rate);
    }
}

// ── Anomaly monitor ─────────────────────────────────────────────────

#[tokio::test]
async fn anomaly_check_pauses_on_complaint_spike() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 100, 0, 5)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    ctl.anomaly().check_now(campaign_id).await.unwrap();

    assert_eq!(
        ctl.store().campaign_status(campaign_id).await.unwrap(),
        CampaignStatus::Paused
    );
    let alerts = ctl.alerts(campaign_id).await.unwrap();
    assert_eq!(alerts[0].alert_type, AlertType::HighComplaintRate);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
}

#[tokio::test]
async fn anomaly_check_respects_pause_flag() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    ctl.save_ai_settings(
        campaign_id,
        &SettingsUpdate {
            pause_on_high_complaints: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    seed_counters(&ctl, campaign_id, counters(1_000, 100, 0, 5)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    ctl.anomaly().check_now(campaign_id).await.unwrap();

    assert_eq!(
        ctl.store().campaign_status(campaign_id).await.unwrap(),
        CampaignStatus::Active
    );
    assert!(ctl.alerts(campaign_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn anomaly_check_ignores_clean_campaigns() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 150, 10, 0)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    ctl.anomaly().check_now(campaign_id).await.unwrap();

    assert_eq!(
        ctl.store().campaign_status(campaign_id).await.unwrap(),
        CampaignStatus::Active
    );
}

// ── Alerts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn acknowledge_alert_is_idempotent() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 100, 0, 5)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();
    ctl.optimize_throttle(campaign_id).await.unwrap();

    let alerts = ctl.alerts(campaign_id).await.unwrap();
    let alert_id = alerts[0].id;

    ctl.acknowledge_alert(alert_id, "ops@acme.io").await.unwrap();
    let first = ctl.alerts(campaign_id).await.unwrap()[0].clone();
    assert!(first.acknowledged);

    // Second acknowledgment by someone else changes nothing
    ctl.acknowledge_alert(alert_id, "someone-else@acme.io")
        .await
        .unwrap();
    let second = ctl.alerts(campaign_id).await.unwrap()[0].clone();
    assert_eq!(second.acknowledged_by, first.acknowledged_by);
    assert_eq!(second.acknowledged_at, first.acknowledged_at);
}

#[tokio::test]
async fn acknowledging_unknown_alert_is_not_found() {
    let ctl = controller().await;
    let err = ctl
        .acknowledge_alert(Uuid::new_v4(), "ops@acme.io")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Database(_)));
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_score_without_snapshots_is_all_hundreds() {
    let ctl = controller().await;
    let score = ctl.health_score(Uuid::new_v4()).await.unwrap();
    assert_eq!(score.overall, 100.0);
    assert_eq!(score.reputation, 100.0);
}

#[tokio::test]
async fn health_score_from_latest_snapshot() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(1_000, 200, 50, 1)).await;
    ctl.record_snapshot(campaign_id).await.unwrap();

    let score = ctl.health_score(campaign_id).await.unwrap();
    assert_eq!(score.deliverability, 50.0);
    assert_eq!(score.engagement, 100.0);
    assert_eq!(score.reputation, 90.0);
    assert!((score.overall - 81.0).abs() < 1e-9);
    assert!(!score.issues.is_empty());
}

// ── Send-time optimization ──────────────────────────────────────────

#[tokio::test]
async fn profile_tier_requires_five_opens() {
    let ctl = controller().await;
    let recipient = "alice@example.com";
    let opened_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 5, 0).unwrap();

    ctl.store()
        .upsert_domain_send_time(&DomainSendTime {
            domain: "example.com".into(),
            optimal_hours: vec![9],
            sample_size: 5_000,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    // Four opens: profile exists but is not yet trusted
    for _ in 0..4 {
        ctl.update_inbox_profile(recipient, EventType::Open, opened_at)
            .await
            .unwrap();
    }
    let rec = ctl.optimal_send_time(recipient).await.unwrap();
    assert_eq!(rec.source, SendTimeSource::Domain);
    assert_eq!(rec.hour, 9);
    assert_eq!(rec.confidence, 0.7);

    // Fifth open crosses the minimum; the profile takes over
    ctl.update_inbox_profile(recipient, EventType::Open, opened_at)
        .await
        .unwrap();
    let rec = ctl.optimal_send_time(recipient).await.unwrap();
    assert_eq!(rec.source, SendTimeSource::Profile);
    assert_eq!(rec.hour, 14);
    assert_eq!(rec.confidence, 1.0);
}

#[tokio::test]
async fn unknown_recipient_falls_to_global_default() {
    let ctl = controller().await;
    let rec = ctl.optimal_send_time("stranger@nowhere.org").await.unwrap();
    assert_eq!(rec.source, SendTimeSource::Default);
    assert_eq!(rec.hour, 10);
    assert_eq!(rec.confidence, 0.5);
}

#[tokio::test]
async fn batch_resolution_preserves_order() {
    let ctl = controller().await;
    ctl.store()
        .upsert_domain_send_time(&DomainSendTime {
            domain: "b.example".into(),
            optimal_hours: vec![8],
            sample_size: 100,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    let recipients = vec![
        "one@a.example".to_string(),
        "two@b.example".to_string(),
        "three@c.example".to_string(),
    ];
    let recs = ctl.optimal_send_times(&recipients).await.unwrap();
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].source, SendTimeSource::Default);
    assert_eq!(recs[1].source, SendTimeSource::Domain);
    assert_eq!(recs[1].hour, 8);
    assert_eq!(recs[2].source, SendTimeSource::Default);
}

#[tokio::test]
async fn malformed_recipient_rejected_before_any_write() {
    let ctl = controller().await;
    let err = ctl
        .update_inbox_profile("not-an-address", EventType::Open, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::MalformedRecipient(_))
    ));

    let err = ctl.optimal_send_time("").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::EmptyRecipient)
    ));
}

#[tokio::test]
async fn next_occurrence_is_always_in_the_future() {
    let ctl = controller().await;
    let now = Utc::now();
    for hour in [0u8, 6, 12, 23] {
        let at = ctl.next_occurrence(hour).unwrap();
        assert!(at > now);
    }
}

// ── Event ingestion ─────────────────────────────────────────────────

#[tokio::test]
async fn observe_event_updates_profile_and_returns_fast() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    seed_counters(&ctl, campaign_id, counters(100, 10, 0, 0)).await;

    let event = TrackingEvent {
        campaign_id,
        event_type: EventType::Open,
        recipient: "bob@example.com".to_string(),
        occurred_at: Utc::now(),
    };
    ctl.observe_event(&event).await.unwrap();

    // The profile was updated synchronously
    let rec = ctl.optimal_send_time("bob@example.com").await.unwrap();
    // One open is far below the trust minimum, so resolution falls through,
    // but the stored profile must exist with the open counted.
    assert_eq!(rec.source, SendTimeSource::Default);
}

#[tokio::test]
async fn bounce_event_routes_to_anomaly_path_without_failing_caller() {
    let ctl = controller().await;
    let campaign_id = Uuid::new_v4();
    // No campaign row at all: the detached check will fail internally, but
    // the ingestion call itself must succeed.
    let event = TrackingEvent {
        campaign_id,
        event_type: EventType::Bounce,
        recipient: "carol@example.com".to_string(),
        occurred_at: Utc::now(),
    };
    ctl.observe_event(&event).await.unwrap();
}
