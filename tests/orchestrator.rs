mod common;

#[cfg(test)]
mod tests {
    use crate::common::{advance, context, Call, FakeMessenger, TokioClock, T0};
    use pomogroup::db::sessions::Sessions;
    use pomogroup::db::timers::{TimerDefinition, Timers};
    use pomogroup::libs::config::EngineConfig;
    use pomogroup::libs::engine::{ChannelId, EngineContext, GroupId, LabelId, TimerId};
    use pomogroup::libs::error::EngineError;
    use pomogroup::libs::messenger::{JOIN_MARKER, LEAVE_MARKER};
    use pomogroup::libs::orchestrator::Orchestrator;
    use pomogroup::libs::snapshot::{SnapshotStore, SNAPSHOT_FILE_NAME};
    use pomogroup::libs::timer::{Timer, TimerState};
    use std::sync::Arc;
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    struct OrchestratorTestContext {
        messenger: Arc<FakeMessenger>,
        orchestrator: Arc<Orchestrator>,
        dir: TempDir,
    }

    impl AsyncTestContext for OrchestratorTestContext {
        async fn setup() -> Self {
            let messenger = FakeMessenger::new();
            let ctx = context(Arc::clone(&messenger), TokioClock::new(T0), EngineConfig::default());
            let dir = TempDir::new().unwrap();
            let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE_NAME));
            OrchestratorTestContext {
                messenger,
                orchestrator: Orchestrator::new(ctx, store),
                dir,
            }
        }
    }

    impl OrchestratorTestContext {
        async fn create(&self, id: TimerId, group: GroupId, channel: ChannelId, label: Option<LabelId>) -> Arc<Timer> {
            let mut definition = TimerDefinition::new(id, group, channel, &format!("Timer {}", id));
            definition.label_target = label;
            self.orchestrator.create_timer(definition).await.unwrap()
        }

        async fn running(&self, id: TimerId, group: GroupId, channel: ChannelId, label: Option<LabelId>) -> Arc<Timer> {
            let timer = self.create(id, group, channel, label).await;
            let pattern = self.orchestrator.context().patterns.parse("25/5", None, None).unwrap();
            timer.setup(Some(pattern), None).unwrap();
            timer.start().await.unwrap();
            timer
        }

        fn restart_context(&self) -> EngineContext {
            let ctx = self.orchestrator.context();
            EngineContext::new(
                self.messenger.clone(),
                Arc::clone(&ctx.clock),
                ctx.db.clone(),
                EngineConfig::default(),
            )
        }
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_create_timer_posts_status(ctx: &mut OrchestratorTestContext) {
        let timer = ctx.create(1, 10, 100, None).await;

        let posts = ctx.messenger.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].1.contains("**Timer 1**: *Timer not set up.*"));
        assert!(ctx.messenger.calls().contains(&Call::Pin {
            channel: 100,
            message: posts[0].0,
        }));
        assert_eq!(timer.state(), TimerState::Unset);
        assert!(Timers::new(&ctx.orchestrator.context().db).fetch(1).unwrap().is_some());

        // Same id replaces the timer.
        ctx.orchestrator
            .create_timer(TimerDefinition::new(1, 10, 100, "Renamed"))
            .await
            .unwrap();
        assert_eq!(ctx.orchestrator.timers().len(), 1);
        assert_eq!(ctx.orchestrator.fetch_timer(1).unwrap().name(), "Renamed");
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_lookup_by_group_and_channel(ctx: &mut OrchestratorTestContext) {
        ctx.create(1, 10, 100, None).await;
        ctx.create(2, 10, 101, None).await;
        ctx.create(3, 20, 200, None).await;

        assert_eq!(ctx.orchestrator.get_timers_in(10, None).len(), 2);
        let in_channel = ctx.orchestrator.get_timers_in(10, Some(101));
        assert_eq!(in_channel.len(), 1);
        assert_eq!(in_channel[0].id(), 2);
        assert!(ctx.orchestrator.get_timers_in(30, None).is_empty());
        assert_eq!(ctx.orchestrator.channels().len(), 3);
        assert!(ctx.orchestrator.get_channel(20, 200).is_some());
        assert!(ctx.orchestrator.get_channel(10, 200).is_none());
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_one_subscription_per_group(ctx: &mut OrchestratorTestContext) {
        let first = ctx.create(1, 10, 100, None).await;
        let second = ctx.create(2, 10, 101, None).await;
        let elsewhere = ctx.create(3, 20, 200, None).await;

        ctx.orchestrator.subscribe(7, "alice", 1, false).await.unwrap();
        ctx.orchestrator.subscribe(7, "alice", 3, false).await.unwrap();
        ctx.orchestrator.subscribe(7, "alice", 2, false).await.unwrap();

        assert!(!first.is_subscribed(7));
        assert!(second.is_subscribed(7));
        assert!(elsewhere.is_subscribed(7));
        let (timer, subscriber) = ctx.orchestrator.get_subscriber(7, 10).unwrap();
        assert_eq!(timer.id(), 2);
        assert_eq!(subscriber.name, "alice");

        ctx.orchestrator.unsubscribe(7, 10, false).await.unwrap();
        assert!(ctx.orchestrator.get_subscriber(7, 10).is_none());
        assert!(matches!(
            ctx.orchestrator.unsubscribe(7, 10, false).await,
            Err(EngineError::NotSubscribed(7))
        ));
        assert!(matches!(
            ctx.orchestrator.subscribe(7, "alice", 99, false).await,
            Err(EngineError::UnknownTimer(99))
        ));
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_reactions_on_announcements(ctx: &mut OrchestratorTestContext) {
        let timer = ctx.create(1, 10, 100, None).await;
        let other = ctx.create(2, 10, 101, None).await;
        let pattern = ctx.orchestrator.context().patterns.parse("25/5", None, None).unwrap();
        timer.setup(Some(pattern), None).unwrap();
        ctx.orchestrator.subscribe(8, "bob", 1, false).await.unwrap();
        timer.start().await.unwrap();
        let announcement = timer.message_ids()[0];
        assert!(ctx.messenger.calls().contains(&Call::Markers {
            message: announcement,
            markers: vec![JOIN_MARKER.to_string(), LEAVE_MARKER.to_string()],
        }));

        ctx.orchestrator
            .on_reaction(10, 100, announcement, 7, "alice", JOIN_MARKER)
            .await
            .unwrap();
        assert!(timer.is_subscribed(7));

        // Untracked messages are ignored.
        ctx.orchestrator.on_reaction(10, 100, 1, 9, "carol", JOIN_MARKER).await.unwrap();
        assert!(!timer.is_subscribed(9));

        // Already subscribed elsewhere in the group.
        ctx.orchestrator.subscribe(9, "carol", 2, false).await.unwrap();
        ctx.orchestrator
            .on_reaction(10, 100, announcement, 9, "carol", JOIN_MARKER)
            .await
            .unwrap();
        assert!(!timer.is_subscribed(9));
        assert!(other.is_subscribed(9));

        ctx.orchestrator
            .on_reaction(10, 100, announcement, 7, "alice", LEAVE_MARKER)
            .await
            .unwrap();
        assert!(!timer.is_subscribed(7));
        assert!(ctx.messenger.posts().last().unwrap().1.contains("<@7>"));
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_activity_only_counts_in_timer_channel(ctx: &mut OrchestratorTestContext) {
        let timer = ctx.create(1, 10, 100, None).await;
        ctx.orchestrator.subscribe(7, "alice", 1, false).await.unwrap();

        advance(50).await;
        ctx.orchestrator.on_message(10, 999, 7);
        assert_eq!(timer.subscriber(7).unwrap().last_seen, T0);

        ctx.orchestrator.on_message(10, 100, 7);
        assert_eq!(timer.subscriber(7).unwrap().last_seen, T0 + 50);

        advance(50).await;
        ctx.orchestrator.on_reaction(10, 100, 12345, 7, "alice", "👍").await.unwrap();
        assert_eq!(timer.subscriber(7).unwrap().last_seen, T0 + 100);
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_voice_moves_carry_clocked_time(ctx: &mut OrchestratorTestContext) {
        let first = ctx.running(1, 10, 100, Some(500)).await;
        let second = ctx.create(2, 10, 101, Some(501)).await;

        ctx.orchestrator.on_voice_join(10, 7, "alice", 500).await.unwrap();
        assert!(first.is_subscribed(7));

        advance(600).await;
        ctx.orchestrator
            .on_voice_update(10, 7, "alice", Some(500), Some(501))
            .await
            .unwrap();
        assert!(!first.is_subscribed(7));
        assert_eq!(second.subscriber(7).unwrap().clocked_time, 600);

        let sessions = Sessions::new(&ctx.orchestrator.context().db)
            .fetch(Some(7), Some(10), 10)
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration, 600);

        ctx.orchestrator.on_voice_leave(10, 7, 501).await.unwrap();
        assert!(ctx.orchestrator.get_subscriber(7, 10).is_none());
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_voice_tracking_flags(ctx: &mut OrchestratorTestContext) {
        let mut definition = TimerDefinition::new(1, 10, 100, "Quiet");
        definition.label_target = Some(500);
        definition.track_voice_join = false;
        definition.track_voice_leave = false;
        let timer = ctx.orchestrator.create_timer(definition).await.unwrap();

        ctx.orchestrator.on_voice_join(10, 7, "alice", 500).await.unwrap();
        assert!(!timer.is_subscribed(7));

        ctx.orchestrator.subscribe(7, "alice", 1, false).await.unwrap();
        ctx.orchestrator.on_voice_leave(10, 7, 500).await.unwrap();
        assert!(timer.is_subscribed(7));
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_destroy_timer(ctx: &mut OrchestratorTestContext) {
        ctx.create(1, 10, 100, None).await;
        ctx.orchestrator.subscribe(7, "alice", 1, false).await.unwrap();

        ctx.orchestrator.destroy_timer(1).await.unwrap();

        assert!(ctx.orchestrator.fetch_timer(1).is_none());
        assert!(ctx.orchestrator.get_channel(10, 100).is_none());
        assert!(Timers::new(&ctx.orchestrator.context().db).fetch(1).unwrap().is_none());
        assert!(ctx.messenger.calls().contains(&Call::Revoke { member: 7, tag: 1 }));
        assert!(matches!(
            ctx.orchestrator.destroy_timer(1).await,
            Err(EngineError::UnknownTimer(1))
        ));
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_move_timer(ctx: &mut OrchestratorTestContext) {
        let timer = ctx.create(1, 10, 100, None).await;
        ctx.create(2, 10, 100, None).await;

        ctx.orchestrator.move_timer(1, 101).await.unwrap();
        assert_eq!(timer.channel(), 101);
        assert!(ctx.orchestrator.get_channel(10, 101).unwrap().timer(1).is_some());
        assert!(ctx.orchestrator.get_channel(10, 100).unwrap().timer(1).is_none());
        assert_eq!(
            Timers::new(&ctx.orchestrator.context().db).fetch(1).unwrap().unwrap().channel,
            101
        );

        ctx.orchestrator.move_timer(2, 101).await.unwrap();
        assert!(ctx.orchestrator.get_channel(10, 100).is_none());
        assert_eq!(ctx.orchestrator.get_timers_in(10, Some(101)).len(), 2);
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_unload_group(ctx: &mut OrchestratorTestContext) {
        let first = ctx.running(1, 10, 100, None).await;
        let second = ctx.running(2, 10, 101, None).await;
        let elsewhere = ctx.running(3, 20, 200, None).await;

        assert_eq!(ctx.orchestrator.unload_group(10), 2);

        assert!(ctx.orchestrator.get_timers_in(10, None).is_empty());
        assert_eq!(first.state(), TimerState::Stopped);
        assert_eq!(second.state(), TimerState::Stopped);
        assert_eq!(elsewhere.state(), TimerState::Running);
        assert_eq!(Timers::new(&ctx.orchestrator.context().db).fetch_group(10).unwrap().len(), 2);
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_start_all(ctx: &mut OrchestratorTestContext) {
        ctx.create(1, 10, 100, None).await;
        ctx.create(2, 20, 200, None).await;

        assert_eq!(ctx.orchestrator.start_all().await, 2);
        for timer in ctx.orchestrator.timers() {
            assert_eq!(timer.state(), TimerState::Running);
            assert_eq!(timer.pattern().unwrap().display(None, None), "50/10");
        }
        assert_eq!(ctx.orchestrator.start_all().await, 0);
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_save_and_restore(ctx: &mut OrchestratorTestContext) {
        let timer = ctx.running(1, 10, 100, None).await;
        ctx.orchestrator.subscribe(7, "alice", 1, false).await.unwrap();
        ctx.create(2, 10, 100, None).await;
        advance(100).await;
        ctx.orchestrator.save(None).unwrap();

        let store = SnapshotStore::new(ctx.dir.path().join(SNAPSHOT_FILE_NAME));
        let restarted = Orchestrator::new(ctx.restart_context(), store.clone());
        assert_eq!(restarted.load_timers().unwrap(), 2);
        assert_eq!(restarted.restore().unwrap(), 2);

        let restored = restarted.fetch_timer(1).unwrap();
        assert_eq!(restored.state(), TimerState::Running);
        assert_eq!(restored.stage_start(), timer.stage_start());
        assert_eq!(restored.remaining(), 1400);
        assert!(restored.subscriber(7).unwrap().session.is_some());
        assert_eq!(
            restarted.get_channel(10, 100).unwrap().pinned_message(),
            ctx.orchestrator.get_channel(10, 100).unwrap().pinned_message()
        );
        assert_eq!(restarted.fetch_timer(2).unwrap().state(), TimerState::Unset);

        restarted.shutdown().unwrap();
        assert!(store.sibling("shutdown").exists());
        assert!(store.sibling("old").exists());
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_restore_without_snapshot(ctx: &mut OrchestratorTestContext) {
        ctx.create(1, 10, 100, None).await;
        assert_eq!(ctx.orchestrator.restore().unwrap(), 0);
        assert_eq!(ctx.orchestrator.fetch_timer(1).unwrap().state(), TimerState::Unset);
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_background_loops(ctx: &mut OrchestratorTestContext) {
        ctx.running(1, 10, 100, None).await;
        ctx.orchestrator.launch();

        advance(1).await;
        assert!(!ctx.messenger.edits().is_empty());

        let store = SnapshotStore::new(ctx.dir.path().join(SNAPSHOT_FILE_NAME));
        assert!(!store.path().exists());
        advance(60).await;
        assert!(store.read().unwrap().unwrap().contains_key(&10));

        ctx.orchestrator.shutdown().unwrap();
        assert!(store.sibling("shutdown").exists());
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_overlapping_joins_keep_one_subscription(ctx: &mut OrchestratorTestContext) {
        let first = ctx.create(1, 10, 100, None).await;
        let second = ctx.create(2, 10, 101, None).await;
        ctx.messenger.yield_on("grant");

        let (a, b) = tokio::join!(
            ctx.orchestrator.subscribe(7, "alice", 1, false),
            ctx.orchestrator.subscribe(7, "alice", 2, false)
        );
        a.unwrap();
        b.unwrap();

        let subscribed: Vec<TimerId> = ctx
            .orchestrator
            .get_timers_in(10, None)
            .iter()
            .filter(|t| t.is_subscribed(7))
            .map(|t| t.id())
            .collect();
        assert_eq!(subscribed, vec![2]);
        assert!(!first.is_subscribed(7));
        assert!(second.is_subscribed(7));
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_overlapping_join_reactions(ctx: &mut OrchestratorTestContext) {
        let pattern = ctx.orchestrator.context().patterns.parse("25/5", None, None).unwrap();
        let first = ctx.create(1, 10, 100, None).await;
        let second = ctx.create(2, 10, 101, None).await;
        for (timer, member) in [(&first, 8), (&second, 9)] {
            timer.setup(Some(Arc::clone(&pattern)), None).unwrap();
            ctx.orchestrator.subscribe(member, "regular", timer.id(), false).await.unwrap();
            timer.start().await.unwrap();
        }
        let (on_first, on_second) = (first.message_ids()[0], second.message_ids()[0]);
        ctx.messenger.yield_on("grant");

        let (a, b) = tokio::join!(
            ctx.orchestrator.on_reaction(10, 100, on_first, 7, "alice", JOIN_MARKER),
            ctx.orchestrator.on_reaction(10, 101, on_second, 7, "alice", JOIN_MARKER)
        );
        a.unwrap();
        b.unwrap();

        assert!(first.is_subscribed(7));
        assert!(!second.is_subscribed(7));
    }

    #[test_context(OrchestratorTestContext)]
    #[tokio::test(start_paused = true)]
    async fn test_restore_mid_break_with_two_subscribers(ctx: &mut OrchestratorTestContext) {
        let timer = ctx.running(1, 10, 100, None).await;
        ctx.orchestrator.subscribe(7, "alice", 1, false).await.unwrap();
        advance(200).await;
        ctx.orchestrator.subscribe(8, "bob", 1, false).await.unwrap();
        advance(1301).await;
        assert_eq!(timer.stage_index(), 1);
        timer.shift(Some(70)).unwrap();
        assert_eq!(timer.stage_start(), T0 + 1430);

        let before = timer.subscribers();
        assert_eq!(before.len(), 2);
        let alice = before[0].session.as_ref().unwrap();
        assert_eq!(alice.tallies[0].completions, 1);
        assert_eq!(alice.tallies[1].extra, -70);
        let bob = before[1].session.as_ref().unwrap();
        assert_eq!(bob.tallies[0].extra, -200);
        ctx.orchestrator.save(None).unwrap();

        let store = SnapshotStore::new(ctx.dir.path().join(SNAPSHOT_FILE_NAME));
        let restarted = Orchestrator::new(ctx.restart_context(), store);
        restarted.load_timers().unwrap();
        assert_eq!(restarted.restore().unwrap(), 1);

        let restored = restarted.fetch_timer(1).unwrap();
        assert_eq!(restored.state(), TimerState::Running);
        assert_eq!(restored.stage_index(), 1);
        assert_eq!(restored.stage_start(), timer.stage_start());
        assert_eq!(restored.remaining(), timer.remaining());
        assert_eq!(restored.subscribers(), before);
    }
}
