// ==========================================
// 配置覆写集成测试
// ==========================================
// 测试目标: config_kv 中的覆写经 EngineState::open 生效
// ==========================================

mod test_helpers;

use chrono::Duration;
use specialist_scheduling::config::{config_keys, ConfigManager};
use specialist_scheduling::domain::{Order, OrderAssignment, OrderStatus, Specialist};
use specialist_scheduling::engine::ManualClock;
use specialist_scheduling::EngineState;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, date, utc, RecordingDispatcher};

fn write_overrides(db_path: &str, overrides: &[(&str, &str)]) {
    let conn = specialist_scheduling::db::open_sqlite_connection(db_path).unwrap();
    let mgr = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
    for (key, value) in overrides {
        mgr.set_global_config_value(key, value).unwrap();
    }
}

#[test]
fn test_open_applies_config_overrides() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    write_overrides(
        &db_path,
        &[
            (config_keys::READINESS_LEAD_MINUTES, "30"),
            (config_keys::DEFAULT_SNOOZE_MINUTES, "10"),
        ],
    );

    let clock = Arc::new(ManualClock::new(utc(2026, 3, 10, 8, 29)));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let state = EngineState::open(db_path.clone(), clock.clone(), dispatcher.clone())
        .expect("Failed to open engine state");

    assert_eq!(state.config.readiness_lead_minutes, 30);
    assert_eq!(state.config.default_snooze_minutes, 10);

    state
        .specialist_repo
        .upsert(&Specialist {
            id: "S1".to_string(),
            name: "专员 S1".to_string(),
            is_active: true,
        })
        .unwrap();
    state
        .order_repo
        .upsert(
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 2.0),
        )
        .unwrap();
    state
        .order_repo
        .upsert_assignment(&OrderAssignment {
            order_id: "O1".to_string(),
            specialist_id: "S1".to_string(),
            is_accepted: true,
            quoted_price: Some(100.0),
        })
        .unwrap();

    // 预约 09:00, 提前量 30 分钟
    assert!(state.readiness.tick().unwrap().checks_sent.is_empty());
    clock.advance(Duration::minutes(1));
    assert_eq!(state.readiness.tick().unwrap().checks_sent, vec!["O1".to_string()]);

    let until = state.overdue.snooze("O1", None).unwrap();
    assert_eq!(until, utc(2026, 3, 10, 8, 40));
}

#[test]
fn test_open_rejects_invalid_override() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    write_overrides(&db_path, &[(config_keys::DEFAULT_SNOOZE_MINUTES, "0")]);

    let clock = Arc::new(ManualClock::new(utc(2026, 3, 10, 8, 0)));
    let result = EngineState::open(db_path, clock, Arc::new(RecordingDispatcher::new()));
    assert!(result.is_err());
}
