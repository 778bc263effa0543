#[cfg(test)]
mod tests {
    use pomogroup::libs::snapshot::{ChannelSnapshot, Snapshot, SnapshotStore, SubscriberSnapshot, TimerSnapshot};
    use pomogroup::libs::subscriber::{NotifyLevel, Session, StageTally};
    use pomogroup::libs::timer::TimerState;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct SnapshotTestContext {
        _temp_dir: TempDir,
        store: SnapshotStore,
    }

    impl TestContext for SnapshotTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let store = SnapshotStore::new(temp_dir.path().join("timerstatus.json"));
            SnapshotTestContext {
                _temp_dir: temp_dir,
                store,
            }
        }
    }

    fn sample() -> Snapshot {
        let timer = TimerSnapshot {
            id: 1,
            state: TimerState::Running,
            pattern_id: Some("abc".to_string()),
            stage_index: 1,
            stage_start: 1_700_000_000,
            message_ids: vec![1001, 1002],
            last_label_update: 1_700_000_000,
            subscribers: vec![SubscriberSnapshot {
                member: 7,
                name: "alice".to_string(),
                last_seen: 1_699_999_000,
                warnings: 1,
                clocked_time: 4200,
                notify_level: NotifyLevel::Final,
                session: Some(Session {
                    started: 1_699_998_000,
                    tallies: vec![StageTally { completions: 1, extra: -60 }, StageTally::default()],
                }),
            }],
        };
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            10,
            vec![ChannelSnapshot {
                channel: 100,
                pinned_message: Some(999),
                timers: vec![timer],
            }],
        );
        snapshot
    }

    #[test_context(SnapshotTestContext)]
    #[test]
    fn test_missing_snapshot(ctx: &mut SnapshotTestContext) {
        assert!(ctx.store.read().unwrap().is_none());
    }

    #[test_context(SnapshotTestContext)]
    #[test]
    fn test_write_and_read(ctx: &mut SnapshotTestContext) {
        let snapshot = sample();
        ctx.store.write(&snapshot, None).unwrap();

        assert_eq!(ctx.store.read().unwrap(), Some(snapshot));
        assert!(!ctx.store.sibling("tmp").exists());
        assert!(!ctx.store.sibling("old").exists());
    }

    #[test_context(SnapshotTestContext)]
    #[test]
    fn test_previous_snapshot_is_kept(ctx: &mut SnapshotTestContext) {
        let first = sample();
        ctx.store.write(&first, None).unwrap();
        ctx.store.write(&Snapshot::new(), Some("shutdown")).unwrap();

        let old: Snapshot = serde_json::from_str(&fs::read_to_string(ctx.store.sibling("old")).unwrap()).unwrap();
        assert_eq!(old, first);
        assert_eq!(
            fs::read_to_string(ctx.store.sibling("shutdown")).unwrap(),
            fs::read_to_string(ctx.store.path()).unwrap()
        );
        assert_eq!(ctx.store.read().unwrap(), Some(Snapshot::new()));
    }

    #[test_context(SnapshotTestContext)]
    #[test]
    fn test_corrupt_snapshot_is_set_aside(ctx: &mut SnapshotTestContext) {
        fs::write(ctx.store.path(), "{ not json").unwrap();

        assert!(ctx.store.read().unwrap().is_none());
        assert!(!ctx.store.path().exists());
        assert_eq!(fs::read_to_string(ctx.store.sibling("corrupt")).unwrap(), "{ not json");
    }

    #[test]
    fn test_sibling_appends_suffix() {
        let store = SnapshotStore::new("/data/timerstatus.json");
        assert_eq!(store.sibling("old").to_str(), Some("/data/timerstatus.json.old"));
    }
}
