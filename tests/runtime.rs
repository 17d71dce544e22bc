mod common;

#[cfg(test)]
mod tests {
    use crate::common::{at, day, EngineContext, PollOnlyObserver, RecordingExporter, ScriptedIdle, ScriptedObserver, CHROME, CODE, SLACK};
    use std::sync::Arc;
    use std::time::Duration;
    use timereporter::libs::clock::ManualClock;
    use timereporter::libs::engine::Engine;
    use timereporter::libs::runtime::RuntimeOptions;

    fn options(export_on_exit: bool) -> RuntimeOptions {
        RuntimeOptions {
            heartbeat_interval: Duration::from_millis(20),
            export_on_exit,
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..150 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        condition()
    }

    fn last_app(ctx: &EngineContext) -> Option<String> {
        ctx.store.blocks.get_last_block().unwrap().map(|block| block.app_name)
    }

    #[tokio::test]
    async fn test_start_bootstraps_and_consumes_events() {
        let ctx = EngineContext::with_exporter(RecordingExporter::default());
        ctx.engine.start(options(false)).unwrap();

        assert!(ctx.engine.is_running());
        assert!(ctx.observer.is_subscribed());
        assert_eq!(last_app(&ctx).as_deref(), Some(CODE));

        ctx.clock.set(at(14, 1, 0));
        assert!(ctx.observer.push(SLACK, "general"));

        assert!(wait_for(|| last_app(&ctx).as_deref() == Some(SLACK)).await);
        ctx.engine.stop().await.unwrap();
        assert!(!ctx.engine.is_running());
    }

    #[tokio::test]
    async fn test_heartbeat_extends_and_corrects() {
        let ctx = EngineContext::with_exporter(RecordingExporter::default());
        ctx.engine.start(options(false)).unwrap();

        ctx.clock.set(at(14, 3, 0));
        assert!(wait_for(|| ctx.store.blocks.get_last_block().unwrap().unwrap().duration_minutes == 3).await);

        // A change the push listener missed.
        ctx.observer.focus(CHROME, "docs");
        assert!(wait_for(|| last_app(&ctx).as_deref() == Some(CHROME)).await);

        ctx.engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let ctx = EngineContext::with_exporter(RecordingExporter::default());
        ctx.engine.start(options(false)).unwrap();

        assert!(ctx.engine.start(options(false)).is_err());

        ctx.engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_exports_today_once() {
        let ctx = EngineContext::with_exporter(RecordingExporter::default());
        ctx.engine.start(options(true)).unwrap();

        ctx.engine.stop().await.unwrap();
        ctx.engine.stop().await.unwrap();

        assert_eq!(*ctx.exporter.days.lock(), vec![day()]);
    }

    #[tokio::test]
    async fn test_stop_extends_open_block_to_now() {
        let ctx = EngineContext::with_exporter(RecordingExporter::default());
        ctx.engine
            .start(RuntimeOptions {
                heartbeat_interval: Duration::from_secs(3600),
                export_on_exit: false,
            })
            .unwrap();

        ctx.clock.set(at(14, 3, 0));
        ctx.engine.stop().await.unwrap();

        let block = ctx.store.blocks.get_last_block().unwrap().unwrap();
        assert_eq!(block.app_name, CODE);
        assert_eq!(block.end_time, at(14, 3, 0));
        assert_eq!(block.duration_minutes, 3);
    }

    #[tokio::test]
    async fn test_stop_without_export() {
        let ctx = EngineContext::with_exporter(RecordingExporter::default());
        ctx.engine.start(options(false)).unwrap();
        ctx.engine.stop().await.unwrap();

        assert!(ctx.exporter.days.lock().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_failure_falls_back_to_heartbeat() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = timereporter::db::store::Store::open(&temp_dir.path().join("timereporter.db")).unwrap();
        let observer = Arc::new(PollOnlyObserver(ScriptedObserver::default()));
        observer.0.focus(CODE, "main.rs");
        let clock = Arc::new(ManualClock::new(at(14, 0, 0)));
        let engine = Arc::new(Engine::new(store.clone(), observer.clone(), Arc::new(ScriptedIdle::default()), clock.clone()));

        engine.start(options(false)).unwrap();
        assert!(engine.is_running());

        clock.set(at(14, 2, 0));
        observer.0.focus(SLACK, "general");
        assert!(wait_for(|| store.blocks.get_last_block().unwrap().map(|b| b.app_name).as_deref() == Some(SLACK)).await);

        engine.stop().await.unwrap();
    }
}
