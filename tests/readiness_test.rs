// ==========================================
// 就绪确认编排测试
// ==========================================
// 职责: 验证 none → pending → ready/not_ready 状态机、催办、滞留汇总、失败隔离
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod readiness_test {
    use chrono::Duration;
    use specialist_scheduling::config::EngineConfig;
    use specialist_scheduling::domain::{
        NotificationKind, Order, OrderStatus, ReadinessOutcome, ReadinessStatus,
    };
    use specialist_scheduling::engine::{Clock, EngineError, ResponseOutcome};

    use crate::test_helpers::*;

    /// O1: 2026-03-10 上午 (09:00 UTC) 2 小时, S1 已接单
    fn setup_morning_booking(now_h: u32, now_m: u32) -> TestEnv {
        let env = setup_env(utc(2026, 3, 10, now_h, now_m));
        seed_specialist(&env, "S1", true);
        seed_order(
            &env,
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 2.0),
        );
        accept(&env, "O1", "S1");
        env
    }

    fn readiness_of(env: &TestEnv, order_id: &str) -> ReadinessStatus {
        env.state
            .order_repo
            .find_by_id(order_id)
            .unwrap()
            .unwrap()
            .readiness_status
    }

    // ==========================================
    // none → pending
    // ==========================================

    #[test]
    fn test_check_fires_only_inside_lead_window() {
        let env = setup_morning_booking(7, 59);
        let orchestrator = &env.state.readiness;

        let report = orchestrator.tick().unwrap();
        assert!(report.checks_sent.is_empty());
        assert_eq!(readiness_of(&env, "O1"), ReadinessStatus::None);

        env.clock.set(utc(2026, 3, 10, 8, 0));
        let report = orchestrator.tick().unwrap();
        assert_eq!(report.checks_sent, vec!["O1".to_string()]);

        let order = env.state.order_repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(order.readiness_status, ReadinessStatus::Pending);
        assert_eq!(order.readiness_check_sent_at, Some(utc(2026, 3, 10, 8, 0)));

        let sent = env.dispatcher.sent_of(NotificationKind::ReadinessCheck);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_specialist_ids, vec!["S1".to_string()]);
        assert_eq!(sent[0].order_id(), Some("O1"));
        assert_eq!(sent[0].payload["order_number"], "NO-1");

        // 不重复发起
        env.clock.advance(Duration::minutes(1));
        let report = orchestrator.tick().unwrap();
        assert!(report.checks_sent.is_empty());
        assert_eq!(env.dispatcher.sent_of(NotificationKind::ReadinessCheck).len(), 1);
    }

    #[test]
    fn test_check_not_sent_after_booking_start_or_without_acceptance() {
        let env = setup_env(utc(2026, 3, 10, 9, 30));
        seed_specialist(&env, "S1", true);
        seed_order(
            &env,
            &Order::new("LATE", "NO-L", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 2.0),
        );
        accept(&env, "LATE", "S1");
        seed_order(
            &env,
            &Order::new("LONELY", "NO-X", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "evening", 2.0),
        );
        invite(&env, "LONELY", "S1");

        env.clock.set(utc(2026, 3, 10, 19, 30));
        let report = env.state.readiness.tick().unwrap();
        assert!(report.checks_sent.is_empty());
        assert_eq!(readiness_of(&env, "LATE"), ReadinessStatus::None);
        assert_eq!(readiness_of(&env, "LONELY"), ReadinessStatus::None);
        assert!(env.dispatcher.sent().is_empty());
    }

    #[test]
    fn test_lead_window_uses_local_offset() {
        let config = EngineConfig {
            utc_offset_minutes: 180,
            ..EngineConfig::default()
        };
        // 本地 09:00 = UTC 06:00
        let env = setup_env_with_config(utc(2026, 3, 10, 5, 0), config);
        seed_specialist(&env, "S1", true);
        seed_order(
            &env,
            &Order::new("O1", "NO-1", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 1.0),
        );
        accept(&env, "O1", "S1");

        let report = env.state.readiness.tick().unwrap();
        assert_eq!(report.checks_sent, vec!["O1".to_string()]);
    }

    // ==========================================
    // 专员答复
    // ==========================================

    #[test]
    fn test_response_before_check_has_no_effect() {
        let env = setup_morning_booking(7, 0);
        let outcome = env
            .state
            .readiness
            .respond_readiness("O1", ReadinessOutcome::Ready, None)
            .unwrap();
        assert_eq!(outcome, ResponseOutcome::NotPending);
        assert_eq!(readiness_of(&env, "O1"), ReadinessStatus::None);
    }

    #[test]
    fn test_last_response_wins() {
        let env = setup_morning_booking(8, 10);
        let orchestrator = &env.state.readiness;
        orchestrator.tick().unwrap();

        assert_eq!(
            orchestrator.respond_readiness("O1", ReadinessOutcome::Ready, None).unwrap(),
            ResponseOutcome::Recorded
        );
        assert_eq!(readiness_of(&env, "O1"), ReadinessStatus::Ready);

        // 重复答复无变化
        assert_eq!(
            orchestrator.respond_readiness("O1", ReadinessOutcome::Ready, None).unwrap(),
            ResponseOutcome::Unchanged
        );

        env.clock.advance(Duration::minutes(2));
        assert_eq!(
            orchestrator
                .respond_readiness("O1", ReadinessOutcome::NotReady, Some("  车辆故障 "))
                .unwrap(),
            ResponseOutcome::Recorded
        );
        let order = env.state.order_repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(order.readiness_status, ReadinessStatus::NotReady);
        assert_eq!(order.not_ready_reason.as_deref(), Some("车辆故障"));
        assert_eq!(order.readiness_response_at, Some(env.clock.now()));

        // 改回 ready 时清除原因
        orchestrator.respond_readiness("O1", ReadinessOutcome::Ready, Some("忽略")).unwrap();
        let order = env.state.order_repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(order.readiness_status, ReadinessStatus::Ready);
        assert_eq!(order.not_ready_reason, None);
    }

    #[test]
    fn test_response_for_unknown_order() {
        let env = setup_morning_booking(8, 0);
        let err = env
            .state
            .readiness
            .respond_readiness("MISSING", ReadinessOutcome::Ready, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::OrderNotFound(_)));
    }

    // ==========================================
    // 催办与滞留
    // ==========================================

    #[test]
    fn test_reminders_are_capped_and_never_change_status() {
        let env = setup_morning_booking(8, 0);
        let orchestrator = &env.state.readiness;
        orchestrator.tick().unwrap();

        env.clock.advance(Duration::minutes(4));
        assert!(orchestrator.tick().unwrap().reminders_sent.is_empty());

        for expected in 1..=3u32 {
            env.clock.advance(Duration::minutes(5));
            let report = orchestrator.tick().unwrap();
            assert_eq!(report.reminders_sent, vec!["O1".to_string()]);
            let order = env.state.order_repo.find_by_id("O1").unwrap().unwrap();
            assert_eq!(order.readiness_reminder_count, expected);
        }

        env.clock.advance(Duration::minutes(5));
        assert!(orchestrator.tick().unwrap().reminders_sent.is_empty());
        assert_eq!(readiness_of(&env, "O1"), ReadinessStatus::Pending);

        let reminders = env.dispatcher.sent_of(NotificationKind::ReadinessReminder);
        assert_eq!(reminders.len(), 3);
        assert_eq!(reminders[2].payload["reminder_count"], 3);
    }

    #[test]
    fn test_answered_order_gets_no_reminder() {
        let env = setup_morning_booking(8, 0);
        let orchestrator = &env.state.readiness;
        orchestrator.tick().unwrap();
        orchestrator.respond_readiness("O1", ReadinessOutcome::Ready, None).unwrap();

        env.clock.advance(Duration::minutes(10));
        let report = orchestrator.tick().unwrap();
        assert!(report.reminders_sent.is_empty());
        assert!(env.dispatcher.sent_of(NotificationKind::ReadinessReminder).is_empty());
    }

    #[test]
    fn test_pending_past_start_is_reported_stale() {
        let env = setup_morning_booking(8, 30);
        let orchestrator = &env.state.readiness;
        orchestrator.tick().unwrap();

        env.clock.set(utc(2026, 3, 10, 8, 59));
        assert!(orchestrator.tick().unwrap().stale_pending.is_empty());

        env.clock.set(utc(2026, 3, 10, 9, 0));
        let report = orchestrator.tick().unwrap();
        assert_eq!(report.stale_pending, vec!["O1".to_string()]);
        assert_eq!(readiness_of(&env, "O1"), ReadinessStatus::Pending);
    }

    // ==========================================
    // 失败隔离 / 重置
    // ==========================================

    #[test]
    fn test_failure_on_one_order_does_not_abort_batch() {
        let env = setup_morning_booking(8, 15);
        seed_order(
            &env,
            &Order::new("O2", "NO-2", OrderStatus::Upcoming)
                .with_booking(date(2026, 3, 10), "morning", 1.0),
        );
        accept(&env, "O2", "S1");
        env.dispatcher.fail_for_order("O1");

        let report = env.state.readiness.tick().unwrap();
        assert_eq!(report.checks_sent, vec!["O2".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].order_id, "O1");
        assert_eq!(env.dispatcher.sent_of(NotificationKind::ReadinessCheck).len(), 1);
    }

    #[test]
    fn test_reset_for_rebooking_allows_a_new_check() {
        let env = setup_morning_booking(8, 0);
        let orchestrator = &env.state.readiness;
        orchestrator.tick().unwrap();
        orchestrator
            .respond_readiness("O1", ReadinessOutcome::NotReady, Some("生病"))
            .unwrap();

        orchestrator.reset_for_rebooking("O1").unwrap();
        let order = env.state.order_repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(order.readiness_status, ReadinessStatus::None);
        assert_eq!(order.readiness_check_sent_at, None);
        assert_eq!(order.not_ready_reason, None);
        assert_eq!(order.readiness_reminder_count, 0);

        env.state
            .order_repo
            .update_booking("O1", date(2026, 3, 10), "afternoon", 2.0)
            .unwrap();
        env.clock.set(utc(2026, 3, 10, 14, 30));
        let report = orchestrator.tick().unwrap();
        assert_eq!(report.checks_sent, vec!["O1".to_string()]);

        let err = orchestrator.reset_for_rebooking("MISSING").unwrap_err();
        assert!(matches!(err, EngineError::OrderNotFound(_)));
    }

    // ==========================================
    // 无法解析的订单行
    // ==========================================

    #[test]
    fn test_malformed_rows_do_not_block_healthy_orders() {
        let env = setup_morning_booking(8, 0);
        insert_raw_order(
            &env,
            &[
                ("id", "O0"),
                ("order_number", "NO-0"),
                ("status", "upcoming"),
                ("booking_date", "10/03/2026"),
                ("booking_time", "morning"),
            ],
        );
        insert_raw_order(
            &env,
            &[
                ("id", "O9"),
                ("order_number", "NO-9"),
                ("status", "upcoming"),
                ("booking_date", "2026-03-10"),
                ("booking_time", "morning"),
                ("specialist_readiness_status", "pending"),
                ("readiness_check_sent_at", "a while ago"),
            ],
        );

        let report = env.state.readiness.tick().unwrap();
        assert_eq!(report.checks_sent, vec!["O1".to_string()]);
        assert_eq!(readiness_of(&env, "O1"), ReadinessStatus::Pending);

        let failed: Vec<&str> = report.failures.iter().map(|f| f.order_id.as_str()).collect();
        assert_eq!(failed, vec!["O0", "O9"]);
        assert!(report.failures[0].message.contains("booking_date"));
        assert!(report.failures[1].message.contains("readiness_check_sent_at"));

        // 后续 tick 照常催办
        env.clock.advance(Duration::minutes(5));
        let report = env.state.readiness.tick().unwrap();
        assert_eq!(report.reminders_sent, vec!["O1".to_string()]);
    }
}
