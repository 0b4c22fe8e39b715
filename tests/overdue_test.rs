// ==========================================
// 逾期升级监控测试
// ==========================================
// 职责: 验证逾期判定、告警节奏、静默与自动清除
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod overdue_test {
    use chrono::Duration;
    use specialist_scheduling::config::EngineConfig;
    use specialist_scheduling::domain::{NotificationKind, Order, OrderStatus};
    use specialist_scheduling::engine::EngineError;

    use crate::test_helpers::*;

    /// 现在: 2026-03-11 10:00 UTC; O1 预约日为昨天, S1 已接单
    fn setup_yesterday_booking() -> TestEnv {
        let env = setup_env(utc(2026, 3, 11, 10, 0));
        seed_specialist(&env, "S1", true);
        seed_order(
            &env,
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 2.0),
        );
        accept(&env, "O1", "S1");
        env
    }

    #[test]
    fn test_yesterday_booking_is_overdue_and_alerted() {
        let env = setup_yesterday_booking();
        let report = env.state.overdue.scan().unwrap();

        assert!(report.contains("O1"));
        assert_eq!(report.alerted, vec!["O1".to_string()]);
        let overdue = &report.overdue[0];
        assert_eq!(overdue.booking_date, date(2026, 3, 10));
        assert_eq!(overdue.overdue_since, utc(2026, 3, 11, 0, 0));
        assert_eq!(overdue.accepted_specialist_ids, vec!["S1".to_string()]);

        let alerts = env.dispatcher.sent_of(NotificationKind::OverdueAlert);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].recipient_specialist_ids, vec!["S1".to_string()]);
        assert_eq!(alerts[0].order_id(), Some("O1"));
    }

    #[test]
    fn test_snooze_hides_order_for_three_minutes() {
        let env = setup_yesterday_booking();
        let monitor = &env.state.overdue;
        monitor.scan().unwrap();

        let until = monitor.snooze("O1", Some(Duration::minutes(3))).unwrap();
        assert_eq!(until, utc(2026, 3, 11, 10, 3));

        let report = monitor.scan().unwrap();
        assert!(!report.contains("O1"));
        assert_eq!(report.snoozed, vec!["O1".to_string()]);

        env.clock.advance(Duration::minutes(2) + Duration::seconds(59));
        assert!(!monitor.scan().unwrap().contains("O1"));

        env.clock.advance(Duration::seconds(1));
        let report = monitor.scan().unwrap();
        assert!(report.contains("O1"));
        assert_eq!(report.alerted, vec!["O1".to_string()]);

        // 静默不修改订单数据
        let order = env.state.order_repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Upcoming);
    }

    #[test]
    fn test_default_snooze_and_invalid_duration() {
        let env = setup_yesterday_booking();
        let monitor = &env.state.overdue;

        let until = monitor.snooze("O1", None).unwrap();
        assert_eq!(until, utc(2026, 3, 11, 10, 3));
        assert!(monitor.unsnooze("O1"));
        assert!(monitor.scan().unwrap().contains("O1"));

        let err = monitor.snooze("O1", Some(Duration::zero())).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWindow(_)));
    }

    #[test]
    fn test_realert_cadence_respects_spacing_floor() {
        let config = EngineConfig {
            overdue_realert_interval_secs: 5,
            overdue_min_alert_spacing_secs: 15,
            ..EngineConfig::default()
        };
        let env = setup_env_with_config(utc(2026, 3, 11, 10, 0), config);
        seed_specialist(&env, "S1", true);
        seed_order(
            &env,
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 2.0),
        );
        accept(&env, "O1", "S1");
        let monitor = &env.state.overdue;

        assert_eq!(monitor.scan().unwrap().alerted.len(), 1);

        env.clock.advance(Duration::seconds(10));
        let report = monitor.scan().unwrap();
        assert!(report.contains("O1"));
        assert!(report.alerted.is_empty());

        env.clock.advance(Duration::seconds(5));
        assert_eq!(monitor.scan().unwrap().alerted.len(), 1);
        assert_eq!(env.dispatcher.sent_of(NotificationKind::OverdueAlert).len(), 2);
    }

    #[test]
    fn test_resolved_order_stops_alerting_on_next_scan() {
        let env = setup_yesterday_booking();
        let monitor = &env.state.overdue;
        monitor.scan().unwrap();

        env.state.order_repo.update_status("O1", OrderStatus::Completed).unwrap();
        env.clock.advance(Duration::seconds(30));
        let report = monitor.scan().unwrap();
        assert!(!report.contains("O1"));
        assert!(report.alerted.is_empty());

        // 改约到未来: 同样离开逾期集合
        env.state.order_repo.update_status("O1", OrderStatus::Upcoming).unwrap();
        env.state
            .order_repo
            .update_booking("O1", date(2026, 3, 12), "morning", 2.0)
            .unwrap();
        assert!(!monitor.scan().unwrap().contains("O1"));

        // 再次逾期按首次发现处理, 立即告警
        env.state
            .order_repo
            .update_booking("O1", date(2026, 3, 10), "morning", 2.0)
            .unwrap();
        let report = monitor.scan().unwrap();
        assert_eq!(report.alerted, vec!["O1".to_string()]);
    }

    #[test]
    fn test_booking_day_boundary() {
        let env = setup_env(utc(2026, 3, 10, 23, 59));
        seed_specialist(&env, "S1", true);
        seed_order(
            &env,
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "evening", 2.0),
        );
        let monitor = &env.state.overdue;

        env.clock.set(utc(2026, 3, 10, 23, 59) + Duration::seconds(59));
        assert!(!monitor.scan().unwrap().contains("O1"));

        env.clock.set(utc(2026, 3, 11, 0, 0));
        assert!(monitor.scan().unwrap().contains("O1"));
    }

    #[test]
    fn test_booking_day_uses_local_offset() {
        let config = EngineConfig {
            utc_offset_minutes: 180,
            ..EngineConfig::default()
        };
        let env = setup_env_with_config(utc(2026, 3, 10, 20, 59), config);
        seed_order(
            &env,
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 2.0),
        );
        let monitor = &env.state.overdue;

        assert!(!monitor.scan().unwrap().contains("O1"));
        env.clock.set(utc(2026, 3, 10, 21, 0));
        assert!(monitor.scan().unwrap().contains("O1"));
    }

    #[test]
    fn test_confirmation_rules() {
        let env = setup_env(utc(2026, 3, 11, 10, 0));
        seed_specialist(&env, "S1", true);
        let yesterday = date(2026, 3, 10);

        // 已接单但仍在收集报价: 逾期
        seed_order(
            &env,
            &Order::new("ACCEPTED", "NO-A", OrderStatus::WaitingQuotes)
                .with_booking(yesterday, "morning", 1.0),
        );
        accept(&env, "ACCEPTED", "S1");
        // 未确认: 不逾期
        seed_order(
            &env,
            &Order::new("OPEN", "NO-B", OrderStatus::Pending)
                .with_booking(yesterday, "morning", 1.0),
        );
        invite(&env, "OPEN", "S1");
        // 已开始: 不逾期
        seed_order(
            &env,
            &Order::new("STARTED", "NO-C", OrderStatus::InProgress)
                .with_booking(yesterday, "morning", 1.0),
        );
        accept(&env, "STARTED", "S1");

        let report = env.state.overdue.scan().unwrap();
        let ids: Vec<&str> = report.overdue.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["ACCEPTED"]);
    }

    #[test]
    fn test_failed_alert_is_retried_on_next_scan() {
        let env = setup_yesterday_booking();
        let monitor = &env.state.overdue;

        env.dispatcher.set_failing(true);
        let report = monitor.scan().unwrap();
        assert!(report.contains("O1"));
        assert!(report.alerted.is_empty());
        assert_eq!(report.failures.len(), 1);

        env.dispatcher.set_failing(false);
        env.clock.advance(Duration::seconds(1));
        let report = monitor.scan().unwrap();
        assert_eq!(report.alerted, vec!["O1".to_string()]);
    }

    #[test]
    fn test_unknown_status_row_is_reported_and_skipped() {
        let env = setup_yesterday_booking();
        insert_raw_order(
            &env,
            &[
                ("id", "O2"),
                ("order_number", "NO-2"),
                ("status", "on_hold"),
                ("booking_date", "2026-03-10"),
                ("booking_time", "morning"),
            ],
        );
        accept(&env, "O2", "S1");

        let report = env.state.overdue.scan().unwrap();
        assert!(report.contains("O1"));
        assert_eq!(report.alerted, vec!["O1".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].order_id, "O2");
        assert!(report.failures[0].message.contains("status"));
    }
}
