#[cfg(test)]
mod tests {
    use pomogroup::db::db::Db;
    use pomogroup::db::patterns::Patterns;
    use pomogroup::db::presets::{PresetScope, Presets};
    use pomogroup::libs::error::{EngineError, InvalidPattern};
    use pomogroup::libs::lfu::LfuCache;
    use pomogroup::libs::messages::Message;
    use pomogroup::libs::pattern::{Pattern, PatternRegistry};
    use std::sync::Arc;

    #[test]
    fn test_short_form_alternates_work_and_break() {
        let pattern = Pattern::parse("25/5/25/15").unwrap();

        let names: Vec<&str> = pattern.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Work", "Break", "Work", "Break"]);
        let durations: Vec<u32> = pattern.stages.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![25, 5, 25, 15]);
        let focus: Vec<bool> = pattern.stages.iter().map(|s| s.focus).collect();
        assert_eq!(focus, vec![true, false, true, false]);

        assert!(pattern.short_repr);
        assert_eq!(pattern.display(None, None), "25/5/25/15");
        assert_eq!(pattern.stages[0].seconds(), 1500);
    }

    #[test]
    fn test_short_form_focus_markers() {
        let pattern = Pattern::parse("25*/5/50/10*").unwrap();

        let focus: Vec<bool> = pattern.stages.iter().map(|s| s.focus).collect();
        assert_eq!(focus, vec![true, false, false, true]);
        assert_eq!(pattern.stages[3].duration, 10);
    }

    #[test]
    fn test_long_form() {
        let pattern = Pattern::parse("Study, 50*, Good luck, everyone!; Rest, 10").unwrap();

        assert_eq!(pattern.stages.len(), 2);
        assert_eq!(pattern.stages[0].name, "Study");
        assert_eq!(pattern.stages[0].duration, 50);
        assert!(pattern.stages[0].focus);
        assert_eq!(pattern.stages[0].message, "Good luck, everyone!");
        assert_eq!(pattern.stages[1].name, "Rest");
        assert!(!pattern.stages[1].focus);
        assert_eq!(pattern.stages[1].message, "");

        assert!(!pattern.short_repr);
        assert_eq!(
            pattern.display(None, None),
            "Study, 50*, Good luck, everyone!;\nRest, 10, "
        );
        assert_eq!(pattern.display(Some(true), None), "50/10");
    }

    #[test]
    fn test_parse_errors_name_the_problem() {
        assert_eq!(Pattern::parse("   ").unwrap_err(), InvalidPattern::new(Message::NoPatternProvided));
        assert_eq!(Pattern::parse("25").unwrap_err(), InvalidPattern::new(Message::PatternSingleStage));
        assert_eq!(
            Pattern::parse("25/0").unwrap_err(),
            InvalidPattern::new(Message::PatternBadDuration("0".to_string()))
        );
        assert_eq!(
            Pattern::parse("25/five").unwrap_err(),
            InvalidPattern::new(Message::PatternBadDuration("five".to_string()))
        );
        assert_eq!(
            Pattern::parse("Study; Rest, 10").unwrap_err(),
            InvalidPattern::new(Message::PatternBadBlock("Study".to_string()))
        );
        assert_eq!(
            Pattern::parse("Study, -3; Rest, 10").unwrap_err(),
            InvalidPattern::new(Message::PatternBadDurationInBlock {
                token: "-3".to_string(),
                block: "Study, -3".to_string(),
            })
        );
    }

    #[test]
    fn test_identity_is_content_addressed() {
        let first = Pattern::parse("25/5").unwrap();
        let second = Pattern::parse(" 25/5 ").unwrap();
        let other = Pattern::parse("25/10").unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert_eq!(first.id.len(), 64);
        assert!(first.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_brief_display_truncates() {
        let pattern = Pattern::parse("1/2/3/4/5/6/7/8").unwrap();
        assert_eq!(pattern.display(Some(true), Some(6)), "1/2/3/4/5/6/...");
        assert_eq!(pattern.display(Some(true), Some(8)), "1/2/3/4/5/6/7/8");
    }

    #[test]
    fn test_encode_decode() {
        let pattern = Pattern::parse("Study, 50*, Go; Rest, 10, Relax").unwrap();
        let decoded = Pattern::decode(&Pattern::encode(&pattern.stages)).unwrap();
        assert_eq!(decoded, pattern.stages);
        assert!(Pattern::decode("[]").is_err());
    }

    #[test]
    fn test_registry_shares_instances() {
        let db = Db::in_memory().unwrap();
        let registry = PatternRegistry::new(&db, 10);

        let first = registry.parse("50/10", None, None).unwrap();
        let second = registry.parse("50/10", None, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached(), 1);

        // A fresh registry loads the stored row.
        let fresh = PatternRegistry::new(&db, 10);
        let loaded = fresh.get(&first.id).unwrap();
        assert_eq!(loaded.stages, first.stages);
        assert!(loaded.short_repr);
    }

    #[test]
    fn test_registry_keeps_first_display_preference() {
        let db = Db::in_memory().unwrap();
        let registry = PatternRegistry::new(&db, 10);

        let short = registry.parse("25/5", None, None).unwrap();
        let long = PatternRegistry::new(&db, 10)
            .parse("Work, 25*, Good luck!; Break, 5, Have a rest!", None, None)
            .unwrap();

        assert_eq!(short.id, long.id);
        assert!(long.short_repr);
        assert_eq!(long.display(None, None), "25/5");
    }

    #[test]
    fn test_registry_unknown_id() {
        let db = Db::in_memory().unwrap();
        let registry = PatternRegistry::new(&db, 10);
        assert!(registry.get("deadbeef").is_err());
    }

    #[test]
    fn test_presets_member_before_group() {
        let db = Db::in_memory().unwrap();
        let registry = PatternRegistry::new(&db, 10);
        let presets = Presets::new(&db);

        let member_pattern = registry.parse("45/15", None, None).unwrap();
        let group_pattern = registry.parse("25/5", None, None).unwrap();
        presets.save(PresetScope::Member(7), "focus", &member_pattern.id).unwrap();
        presets.save(PresetScope::Group(10), "focus", &group_pattern.id).unwrap();

        let resolved = registry.parse("focus", Some(7), Some(10)).unwrap();
        assert_eq!(resolved.id, member_pattern.id);

        let resolved = registry.parse("focus", Some(8), Some(10)).unwrap();
        assert_eq!(resolved.id, group_pattern.id);

        match registry.parse("focus", Some(8), None) {
            Err(EngineError::InvalidPattern(e)) => assert_eq!(e, InvalidPattern::new(Message::PatternSingleStage)),
            other => panic!("unexpected result: {:?}", other.map(|p| p.id.clone())),
        }
    }

    #[test]
    fn test_preload_caches_patterns_in_use() {
        let db = Db::in_memory().unwrap();
        let pattern = PatternRegistry::new(&db, 10).parse("25/5", None, None).unwrap();
        PatternRegistry::new(&db, 10).parse("30/30", None, None).unwrap();
        Patterns::new(&db).record_change(1, &pattern.id, None, 100).unwrap();

        let registry = PatternRegistry::new(&db, 10);
        assert_eq!(registry.preload().unwrap(), 1);
        assert_eq!(registry.cached(), 1);
    }

    #[test]
    fn test_lfu_evicts_least_used() {
        let mut cache = LfuCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));

        cache.insert("c", 3);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lfu_replaces_existing_key() {
        let mut cache = LfuCache::new(1);
        assert!(cache.is_empty());
        cache.insert("a", 1);
        cache.insert("a", 2);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
