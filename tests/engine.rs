mod common;

#[cfg(test)]
mod tests {
    use crate::common::{at, day, EngineContext, RecordingExporter, CHROME, CODE, SLACK};
    use chrono::{NaiveDate, TimeDelta};
    use test_context::test_context;
    use timereporter::libs::block::BREAK_APP_NAME;
    use timereporter::libs::config::{IDLE_DECISION_TIMEOUT_KEY, IDLE_THRESHOLD_KEY, MERGE_SHORT_BROWSING_KEY};
    use timereporter::libs::engine::{IdleDecision, IdleWindow, TrackingState};

    /// Ticks every 10 seconds from `from` to `to`, both inclusive.
    fn tick_every_10s(ctx: &EngineContext, from: chrono::NaiveDateTime, to: chrono::NaiveDateTime) {
        let mut now = from;
        while now <= to {
            ctx.tick_at(now);
            now += TimeDelta::seconds(10);
        }
    }

    /// Goes idle at 14:10:00 and comes back at 14:20:00 with `code.exe` focused.
    fn idle_from_1410_to_1420(ctx: &EngineContext) {
        ctx.engine.bootstrap().unwrap();
        ctx.tick_at(at(14, 10, 0));

        ctx.idle.set(300.0);
        ctx.tick_at(at(14, 15, 0));
        assert_eq!(ctx.engine.state(), TrackingState::Idle { started_at: at(14, 10, 0) });

        ctx.idle.set(600.0);
        ctx.tick_at(at(14, 20, 0) - TimeDelta::seconds(10));

        ctx.idle.set(0.0);
        ctx.tick_at(at(14, 20, 0));
        assert_eq!(ctx.engine.state(), TrackingState::Active);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_bootstrap_opens_block_for_focused_window(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].app_name, CODE);
        assert_eq!(blocks[0].window_title, "main.rs - timereporter");
        assert_eq!(blocks[0].start_time, at(14, 0, 0));
        assert_eq!(blocks[0].duration_minutes, 1);
        assert_eq!(ctx.engine.open_block_id(), Some(blocks[0].id));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_bootstrap_never_extends_previous_run(ctx: &mut EngineContext) {
        let old = ctx.store.blocks.create_block(CODE, "yesterday.rs", at(9, 0, 0)).unwrap();
        ctx.store.blocks.update_last_block(old, 30, at(9, 30, 0)).unwrap();

        ctx.engine.bootstrap().unwrap();
        ctx.tick_at(at(14, 1, 0));

        let old_block = ctx.store.blocks.get_block(old).unwrap().unwrap();
        assert_eq!(old_block.end_time, at(9, 30, 0));
        assert_eq!(old_block.duration_minutes, 30);
        assert_ne!(ctx.engine.open_block_id(), Some(old));
        assert_eq!(ctx.blocks().len(), 2);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_scenario_six_minutes_then_new_app(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();
        tick_every_10s(ctx, at(14, 0, 10), at(14, 5, 20));

        ctx.switch_at(at(14, 5, 30), SLACK, "general");

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].app_name, CODE);
        assert_eq!(blocks[0].end_time, at(14, 5, 30));
        assert_eq!(blocks[0].duration_minutes, 6);
        assert_eq!(blocks[1].app_name, SLACK);
        assert_eq!(blocks[1].start_time, at(14, 5, 30));
        assert_eq!(blocks[1].duration_minutes, 1);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_open_block_follows_latest_app(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();

        ctx.switch_at(at(14, 1, 0), CHROME, "docs");
        ctx.switch_at(at(14, 1, 30), CHROME, "other tab");
        ctx.switch_at(at(14, 2, 0), SLACK, "general");

        let blocks = ctx.blocks();
        let apps: Vec<&str> = blocks.iter().map(|b| b.app_name.as_str()).collect();
        assert_eq!(apps, vec![CODE, CHROME, SLACK]);
        assert_eq!(ctx.engine.open_block_id(), Some(blocks[2].id));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_heartbeat_is_idempotent(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();

        ctx.tick_at(at(14, 3, 0));
        let first = ctx.blocks();
        ctx.tick_at(at(14, 3, 0));
        let second = ctx.blocks();

        assert_eq!(first, second);
        assert_eq!(second[0].duration_minutes, 3);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_heartbeat_picks_up_missed_change(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();

        ctx.observer.focus(CHROME, "news");
        ctx.tick_at(at(14, 2, 0));

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].end_time, at(14, 2, 0));
        assert_eq!(blocks[1].app_name, CHROME);
        assert_eq!(blocks[1].start_time, at(14, 2, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_tick_without_window_info_is_skipped(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();
        ctx.observer.clear();

        ctx.tick_at(at(14, 5, 0));

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].end_time, at(14, 0, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_idle_return_publishes_window_once(ctx: &mut EngineContext) {
        let mut returns = ctx.engine.subscribe_idle_returns();
        idle_from_1410_to_1420(ctx);

        let expected = IdleWindow {
            idle_start: at(14, 10, 0),
            idle_end: at(14, 20, 0),
        };
        assert_eq!(returns.try_recv().unwrap(), expected);
        assert_eq!(ctx.engine.pending_idle_decision().unwrap().window, expected);

        ctx.tick_at(at(14, 20, 10));
        assert!(returns.try_recv().is_err());
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_idle_break_truncates_pre_idle_block(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);
        let pre_idle = ctx.engine.pending_idle_decision().unwrap().pre_idle_block.unwrap();

        ctx.engine
            .handle_idle_decision(IdleDecision::Break, at(14, 10, 0), at(14, 20, 0))
            .unwrap();

        let block = ctx.store.blocks.get_block(pre_idle).unwrap().unwrap();
        assert_eq!(block.end_time, at(14, 10, 0));
        assert_eq!(block.duration_minutes, 10);

        let last = ctx.store.blocks.get_last_block().unwrap().unwrap();
        assert_ne!(last.id, pre_idle);
        assert_eq!(last.app_name, CODE);
        assert!(last.start_time >= at(14, 20, 0));
        assert!(ctx.engine.pending_idle_decision().is_none());
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_idle_break_after_next_tick_keeps_single_new_block(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);
        ctx.tick_at(at(14, 20, 10));

        ctx.engine
            .handle_idle_decision(IdleDecision::Break, at(14, 10, 0), at(14, 20, 0))
            .unwrap();

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].end_time, at(14, 10, 0));
        assert_eq!(blocks[1].start_time, at(14, 20, 10));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_idle_work_extends_pre_idle_block(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);

        ctx.engine
            .handle_idle_decision(IdleDecision::Work, at(14, 10, 0), at(14, 20, 0))
            .unwrap();

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].end_time, at(14, 20, 0));
        assert_eq!(blocks[0].duration_minutes, 20);

        ctx.tick_at(at(14, 21, 0));
        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].duration_minutes, 21);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_idle_work_after_next_tick_keeps_single_block(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);
        ctx.tick_at(at(14, 20, 10));
        assert_eq!(ctx.blocks().len(), 2);

        ctx.engine
            .handle_idle_decision(IdleDecision::Work, at(14, 10, 0), at(14, 20, 0))
            .unwrap();
        ctx.tick_at(at(14, 21, 0));

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].app_name, CODE);
        assert_eq!(blocks[0].start_time, at(14, 0, 0));
        assert_eq!(blocks[0].end_time, at(14, 21, 0));
        assert_eq!(blocks[0].duration_minutes, 21);
        assert_eq!(ctx.engine.open_block_id(), Some(blocks[0].id));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_idle_work_keeps_block_of_other_app(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);
        ctx.switch_at(at(14, 20, 10), SLACK, "general");

        ctx.engine
            .handle_idle_decision(IdleDecision::Work, at(14, 10, 0), at(14, 20, 0))
            .unwrap();

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].end_time, at(14, 20, 0));
        assert_eq!(blocks[1].app_name, SLACK);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_pre_idle_block_frozen_while_decision_pending(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);
        let pre_idle = ctx.engine.pending_idle_decision().unwrap().pre_idle_block.unwrap();

        ctx.tick_at(at(14, 21, 0));

        let block = ctx.store.blocks.get_block(pre_idle).unwrap().unwrap();
        assert_eq!(block.end_time, at(14, 10, 0));
        assert_ne!(ctx.engine.open_block_id(), Some(pre_idle));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_stale_decision_is_ignored(ctx: &mut EngineContext) {
        idle_from_1410_to_1420(ctx);

        ctx.engine
            .handle_idle_decision(IdleDecision::Break, at(13, 0, 0), at(13, 30, 0))
            .unwrap();

        assert!(ctx.engine.pending_idle_decision().is_some());
        assert_eq!(ctx.blocks()[0].end_time, at(14, 10, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_pending_decision_times_out_as_work(ctx: &mut EngineContext) {
        ctx.set_setting(IDLE_DECISION_TIMEOUT_KEY, "60");
        idle_from_1410_to_1420(ctx);

        ctx.tick_at(at(14, 20, 30));
        assert!(ctx.engine.pending_idle_decision().is_some());

        ctx.tick_at(at(14, 21, 0));
        assert!(ctx.engine.pending_idle_decision().is_none());

        let first = &ctx.blocks()[0];
        assert!(first.end_time >= at(14, 20, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_window_change_ignored_while_idle(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();
        ctx.idle.set(400.0);
        ctx.tick_at(at(14, 10, 0));

        ctx.switch_at(at(14, 11, 0), CHROME, "video");

        assert_eq!(ctx.blocks().len(), 1);
        assert!(matches!(ctx.engine.state(), TrackingState::Idle { .. }));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_window_change_ends_idle(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();
        ctx.idle.set(300.0);
        ctx.tick_at(at(14, 10, 0));

        ctx.idle.set(0.0);
        ctx.switch_at(at(14, 12, 0), CHROME, "mail");

        assert_eq!(ctx.engine.state(), TrackingState::Active);
        let pending = ctx.engine.pending_idle_decision().unwrap();
        assert_eq!(pending.window.idle_start, at(14, 5, 0));
        assert_eq!(pending.window.idle_end, at(14, 12, 0));

        let last = ctx.store.blocks.get_last_block().unwrap().unwrap();
        assert_eq!(last.app_name, CHROME);
        assert_eq!(last.start_time, at(14, 12, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_manual_break_round_trip(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();

        ctx.clock.set(at(14, 30, 0));
        assert!(ctx.engine.toggle_manual_break().unwrap());
        assert_eq!(ctx.engine.state(), TrackingState::ManualBreak { started_at: at(14, 30, 0) });

        // Ignored during the break.
        ctx.switch_at(at(14, 35, 0), SLACK, "random");
        ctx.tick_at(at(14, 40, 0));

        ctx.clock.set(at(14, 45, 0));
        assert!(!ctx.engine.toggle_manual_break().unwrap());
        assert_eq!(ctx.engine.state(), TrackingState::Active);

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].app_name, CODE);
        assert_eq!(blocks[0].duration_minutes, 30);
        assert_eq!(blocks[1].app_name, BREAK_APP_NAME);
        assert_eq!(blocks[1].start_time, at(14, 30, 0));
        assert_eq!(blocks[1].end_time, at(14, 45, 0));
        assert_eq!(blocks[1].duration_minutes, 15);
        assert_eq!(blocks[2].app_name, SLACK);
        assert_eq!(blocks[2].start_time, at(14, 45, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_midnight_splits_block_and_exports_old_day(ctx: &mut EngineContext) {
        ctx.clock.set(at(23, 58, 0));
        ctx.engine.bootstrap().unwrap();
        ctx.tick_at(at(23, 59, 30));

        let next_day = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        ctx.tick_at(next_day.and_hms_opt(0, 0, 10).unwrap());

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].end_time, at(23, 59, 59));
        assert_eq!(blocks[0].duration_minutes, 2);
        assert_eq!(blocks[1].app_name, CODE);
        assert_eq!(blocks[1].window_title, blocks[0].window_title);
        assert_eq!(blocks[1].start_time, next_day.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(*ctx.exporter.days.lock(), vec![day()]);

        // The next tick extends the new day's block.
        ctx.tick_at(next_day.and_hms_opt(0, 1, 0).unwrap());
        assert_eq!(ctx.blocks().len(), 2);
        assert_eq!(ctx.blocks()[1].duration_minutes, 1);
    }

    #[test]
    fn test_midnight_survives_export_failure() {
        let ctx = EngineContext::with_exporter(RecordingExporter {
            fail: true,
            ..Default::default()
        });
        ctx.clock.set(at(23, 59, 0));
        ctx.engine.bootstrap().unwrap();

        let next_day = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        ctx.tick_at(next_day.and_hms_opt(0, 0, 5).unwrap());

        assert_eq!(ctx.blocks().len(), 2);
        assert_eq!(ctx.exporter.days.lock().len(), 1);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_midnight_during_manual_break(ctx: &mut EngineContext) {
        ctx.clock.set(at(23, 50, 0));
        ctx.engine.bootstrap().unwrap();
        assert!(ctx.engine.toggle_manual_break().unwrap());

        let next_day = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        ctx.tick_at(next_day.and_hms_opt(0, 0, 10).unwrap());

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].app_name, BREAK_APP_NAME);
        assert_eq!(blocks[1].end_time, at(23, 59, 59));
        assert_eq!(blocks[2].app_name, BREAK_APP_NAME);
        assert_eq!(blocks[2].start_time, next_day.and_hms_opt(0, 0, 0).unwrap());
        assert!(matches!(ctx.engine.state(), TrackingState::ManualBreak { .. }));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_short_browsing_merged_into_development(ctx: &mut EngineContext) {
        ctx.set_setting(MERGE_SHORT_BROWSING_KEY, "true");
        ctx.engine.bootstrap().unwrap();

        ctx.switch_at(at(14, 10, 0), CHROME, "stackoverflow");
        ctx.switch_at(at(14, 13, 0), CODE, "main.rs - timereporter");

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].app_name, CODE);
        assert_eq!(blocks[0].end_time, at(14, 13, 0));
        assert_eq!(blocks[0].duration_minutes, 13);
        assert_eq!(ctx.engine.open_block_id(), Some(blocks[0].id));

        ctx.tick_at(at(14, 15, 0));
        assert_eq!(ctx.blocks()[0].duration_minutes, 15);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_long_browsing_not_merged(ctx: &mut EngineContext) {
        ctx.set_setting(MERGE_SHORT_BROWSING_KEY, "true");
        ctx.engine.bootstrap().unwrap();

        ctx.switch_at(at(14, 10, 0), CHROME, "stackoverflow");
        ctx.switch_at(at(14, 16, 0), CODE, "main.rs - timereporter");

        assert_eq!(ctx.blocks().len(), 3);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_short_browsing_not_merged_across_declared_break(ctx: &mut EngineContext) {
        ctx.set_setting(MERGE_SHORT_BROWSING_KEY, "true");
        idle_from_1410_to_1420(ctx);
        ctx.switch_at(at(14, 20, 0), CHROME, "news");

        ctx.engine
            .handle_idle_decision(IdleDecision::Break, at(14, 10, 0), at(14, 20, 0))
            .unwrap();
        ctx.switch_at(at(14, 22, 0), CODE, "main.rs - timereporter");

        let blocks = ctx.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].end_time, at(14, 10, 0));
        assert_eq!(blocks[1].app_name, CHROME);
        assert_eq!(blocks[1].start_time, at(14, 20, 0));
        assert_eq!(blocks[2].start_time, at(14, 22, 0));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_merge_disabled_by_default(ctx: &mut EngineContext) {
        ctx.engine.bootstrap().unwrap();

        ctx.switch_at(at(14, 10, 0), CHROME, "stackoverflow");
        ctx.switch_at(at(14, 11, 0), CODE, "main.rs - timereporter");

        assert_eq!(ctx.blocks().len(), 3);
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_reload_settings_swaps_snapshot(ctx: &mut EngineContext) {
        let before = ctx.engine.config();
        assert_eq!(before.idle_threshold, 300);

        ctx.set_setting(IDLE_THRESHOLD_KEY, "60");

        assert_eq!(ctx.engine.config().idle_threshold, 60);
        assert_eq!(before.idle_threshold, 300);

        ctx.engine.bootstrap().unwrap();
        ctx.idle.set(61.0);
        ctx.tick_at(at(14, 2, 0));
        assert!(matches!(ctx.engine.state(), TrackingState::Idle { .. }));
    }

    #[test_context(EngineContext)]
    #[test]
    fn test_cleanup_removes_old_blocks(ctx: &mut EngineContext) {
        let old = at(14, 0, 0) - TimeDelta::days(45);
        ctx.store.blocks.create_block(CODE, "old", old).unwrap();
        ctx.store.blocks.create_block(CODE, "recent", at(9, 0, 0)).unwrap();

        assert_eq!(ctx.engine.run_cleanup().unwrap(), 1);
        assert_eq!(ctx.blocks().len(), 1);
    }
}
