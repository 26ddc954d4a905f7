#[cfg(test)]
mod tests {
    use pearl_core::{CaseKind, PearlError, Priority};
    use pearl_llm::{EmbeddingProvider, MockEmbedding};
    use pearl_memory::entry::{MemoryEntry, rule_metadata};
    use pearl_memory::rules::{
        GUIDELINES_HEADER, NO_RECORDS, OVERRIDES_HEADER, PRECEDENT_HEADER, RETRIEVAL_FAILED,
    };
    use pearl_memory::seed::{TRIAGE_RULES, VISION_RULES, seed_triage_rules, seed_vision_rules};
    use pearl_memory::visual::{NO_VISUAL_ERRORS, VISUAL_MEMORY_UNAVAILABLE};
    use pearl_memory::*;
    use std::sync::Arc;

    fn backends() -> Vec<Arc<dyn VectorStore>> {
        let db = SqliteMemory::open_in_memory().unwrap();
        vec![
            Arc::new(InMemoryCollection::new("triage_pearls")),
            Arc::new(db.collection("triage_pearls")),
        ]
    }

    fn rule(id: &str, text: &str, vector: Vec<f32>, priority: Priority, conf: f64) -> MemoryEntry {
        MemoryEntry::new(id, text, vector).with_metadata(rule_metadata(priority, conf, "test"))
    }

    // ── Vector store ───────────────────────────────────────────

    #[test]
    fn test_query_empty_collection_returns_nothing() {
        for store in backends() {
            assert!(store.query(&[1.0, 0.0], 5).unwrap().is_empty());
            assert_eq!(store.count().unwrap(), 0);
            assert_eq!(store.dimension().unwrap(), None);
        }
    }

    #[test]
    fn test_exact_vector_round_trip() {
        for store in backends() {
            let v = vec![0.3, -0.2, 0.9];
            store
                .add(vec![MemoryEntry::new("a", "alpha", v.clone()).with_meta("author", "x")])
                .unwrap();
            let hits = store.query(&v, 1).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].entry.id, "a");
            assert_eq!(hits[0].entry.text, "alpha");
            assert_eq!(hits[0].entry.metadata["author"].as_str(), Some("x"));
            assert!(hits[0].distance.abs() < 1e-5, "{}", store.name());
        }
    }

    #[test]
    fn test_query_orders_by_distance_and_caps_k() {
        for store in backends() {
            store
                .add(vec![
                    MemoryEntry::new("far", "far", vec![-1.0, 0.0]),
                    MemoryEntry::new("near", "near", vec![1.0, 0.1]),
                    MemoryEntry::new("mid", "mid", vec![0.0, 1.0]),
                ])
                .unwrap();
            let hits = store.query(&[1.0, 0.0], 2).unwrap();
            let ids: Vec<_> = hits.iter().map(|h| h.entry.id.as_str()).collect();
            assert_eq!(ids, ["near", "mid"]);
            assert!(hits[0].distance <= hits[1].distance);
            assert!(store.query(&[1.0, 0.0], 0).unwrap().is_empty());
            assert_eq!(store.query(&[1.0, 0.0], 10).unwrap().len(), 3);
        }
    }

    #[test]
    fn test_duplicate_id_rejects_whole_batch() {
        for store in backends() {
            store.add(vec![MemoryEntry::new("a", "a", vec![1.0, 0.0])]).unwrap();
            let err = store
                .add(vec![
                    MemoryEntry::new("b", "b", vec![0.0, 1.0]),
                    MemoryEntry::new("a", "again", vec![0.0, 1.0]),
                ])
                .unwrap_err();
            assert!(matches!(err, PearlError::DuplicateId { ref id, .. } if id == "a"));
            assert_eq!(store.count().unwrap(), 1);
            assert!(store.get("b").unwrap().is_none());

            let err = store
                .add(vec![
                    MemoryEntry::new("c", "c", vec![0.0, 1.0]),
                    MemoryEntry::new("c", "c", vec![0.0, 1.0]),
                ])
                .unwrap_err();
            assert!(matches!(err, PearlError::DuplicateId { .. }));
            assert_eq!(store.count().unwrap(), 1);
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        for store in backends() {
            store.add(vec![MemoryEntry::new("a", "a", vec![1.0, 0.0])]).unwrap();
            let err = store
                .add(vec![MemoryEntry::new("b", "b", vec![1.0, 0.0, 0.0])])
                .unwrap_err();
            assert!(matches!(
                err,
                PearlError::DimensionMismatch { expected: 2, actual: 3, .. }
            ));
            assert_eq!(store.count().unwrap(), 1);
        }
    }

    #[test]
    fn test_query_with_wrong_dimension_is_an_error() {
        for store in backends() {
            store
                .add(vec![
                    MemoryEntry::new("first", "Red Flag: Bilateral Sciatica -> MRI", vec![1.0, 0.0, 0.0, 0.0]),
                    MemoryEntry::new("second", "Night pain -> MRI", vec![0.0, 1.0, 0.0, 0.0]),
                ])
                .unwrap();
            let err = store.query(&[1.0, 0.0, 0.0], 1).unwrap_err();
            assert!(
                matches!(err, PearlError::DimensionMismatch { expected: 4, actual: 3, .. }),
                "{}: {err}",
                store.name()
            );
            assert_eq!(store.query(&[1.0, 0.0, 0.0, 0.0], 1).unwrap()[0].entry.id, "first");
        }
    }

    #[test]
    fn test_update_metadata_missing_id_is_not_found() {
        for store in backends() {
            let err = store.update_metadata("ghost", Metadata::new()).unwrap_err();
            assert!(matches!(err, PearlError::NotFound { .. }));
            let err = store.update_metadata_with("ghost", &mut |_| {}).unwrap_err();
            assert!(matches!(err, PearlError::NotFound { .. }));
        }
    }

    #[test]
    fn test_update_metadata_replaces_wholesale() {
        for store in backends() {
            store
                .add(vec![rule("r", "rule", vec![1.0], Priority::Standard, 1.0)])
                .unwrap();
            let mut meta = Metadata::new();
            meta.insert("confidence".into(), 2.5.into());
            store.update_metadata("r", meta).unwrap();
            let entry = store.get("r").unwrap().unwrap();
            assert_eq!(entry.confidence(), 2.5);
            assert!(!entry.metadata.contains_key("author"));
        }
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        for store in backends() {
            store
                .add(vec![rule("r", "rule", vec![1.0, 0.0], Priority::Standard, 1.0)])
                .unwrap();
            std::thread::scope(|s| {
                for _ in 0..8 {
                    let store = store.clone();
                    s.spawn(move || {
                        for _ in 0..10 {
                            store
                                .update_metadata_with("r", &mut |meta| {
                                    let c = pearl_memory::entry::confidence_of(meta);
                                    meta.insert("confidence".into(), (c + 0.1).into());
                                })
                                .unwrap();
                        }
                    });
                }
            });
            let entry = store.get("r").unwrap().unwrap();
            assert!((entry.confidence() - 9.0).abs() < 1e-6, "{}", entry.confidence());
            assert_eq!(entry.metadata["author"].as_str(), Some("test"));
        }
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pearl.db");
        {
            let bank = MemoryBank::sqlite(&path).unwrap();
            bank.rules
                .add(vec![rule("r1", "persisted rule", vec![0.5, 0.5], Priority::CriticalOverride, 5.0)])
                .unwrap();
        }
        let bank = MemoryBank::sqlite(&path).unwrap();
        let entry = bank.rules.get("r1").unwrap().unwrap();
        assert_eq!(entry.text, "persisted rule");
        assert_eq!(entry.priority(), Priority::CriticalOverride);
        assert_eq!(entry.vector, vec![0.5, 0.5]);
        let stats = bank.stats("sqlite").unwrap();
        assert_eq!(stats.triage_pearls, 1);
        assert_eq!(stats.gold_standard_cases, 0);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = MemoryBank::open("chroma", std::path::Path::new("x.db")).err().unwrap();
        assert!(matches!(err, PearlError::Config(_)));
    }

    // ── Rule memory ────────────────────────────────────────────

    fn rule_memory(bank: &MemoryBank, embedder: Arc<dyn EmbeddingProvider>) -> RuleMemory {
        RuleMemory::new(bank.rules.clone(), bank.cases.clone(), embedder)
    }

    #[tokio::test]
    async fn test_recall_on_empty_store_yields_no_records_marker() {
        let bank = MemoryBank::in_memory();
        let memory = rule_memory(&bank, Arc::new(MockEmbedding::new(32)));
        let recall = memory.recall("back pain").await;
        assert!(matches!(recall, Recall::NoRecords));
        assert_eq!(recall.render(), NO_RECORDS);
    }

    #[tokio::test]
    async fn test_recall_embedding_failure_yields_failed_marker() {
        let bank = MemoryBank::in_memory();
        let memory = rule_memory(&bank, Arc::new(MockEmbedding::new(32).failing_always()));
        let recall = memory.recall("back pain").await;
        assert!(recall.is_failed());
        assert_eq!(recall.render(), RETRIEVAL_FAILED);
    }

    /// Rule store whose lookups always fail, as a dropped database would.
    struct UnreachableStore;

    impl VectorStore for UnreachableStore {
        fn name(&self) -> &str {
            "triage_pearls"
        }
        fn add(&self, _entries: Vec<MemoryEntry>) -> pearl_core::Result<()> {
            Err(PearlError::StoreUnavailable("connection lost".into()))
        }
        fn query(&self, _vector: &[f32], _k: usize) -> pearl_core::Result<Vec<ScoredEntry>> {
            Err(PearlError::StoreUnavailable("connection lost".into()))
        }
        fn update_metadata(&self, _id: &str, _metadata: Metadata) -> pearl_core::Result<()> {
            Err(PearlError::StoreUnavailable("connection lost".into()))
        }
        fn update_metadata_with(
            &self,
            _id: &str,
            _apply: &mut dyn FnMut(&mut Metadata),
        ) -> pearl_core::Result<Metadata> {
            Err(PearlError::StoreUnavailable("connection lost".into()))
        }
        fn get(&self, _id: &str) -> pearl_core::Result<Option<MemoryEntry>> {
            Ok(None)
        }
        fn count(&self) -> pearl_core::Result<usize> {
            Ok(0)
        }
        fn dimension(&self) -> pearl_core::Result<Option<usize>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_recall_store_failure_yields_failed_marker() {
        let bank = MemoryBank::in_memory();
        let memory = RuleMemory::new(
            Arc::new(UnreachableStore),
            bank.cases.clone(),
            Arc::new(MockEmbedding::new(32)),
        );
        let recall = memory.recall("back pain").await;
        assert!(recall.is_failed());
        assert_eq!(recall.render(), RETRIEVAL_FAILED);
    }

    #[tokio::test]
    async fn test_recall_after_embedder_switch_yields_failed_marker() {
        let bank = MemoryBank::in_memory();
        let old = MockEmbedding::new(4);
        for (id, text) in [("first", "Red Flag: Bilateral Sciatica -> MRI"), ("second", "Night pain -> MRI")] {
            bank.rules
                .add(vec![rule(id, text, old.vector_for(text), Priority::Standard, 1.0)])
                .unwrap();
        }
        let memory = rule_memory(&bank, Arc::new(MockEmbedding::new(64)));
        let recall = memory.recall("Night pain -> MRI").await;
        assert_eq!(recall.render(), RETRIEVAL_FAILED);
    }

    #[tokio::test]
    async fn test_overrides_render_before_closer_standard_rules() {
        let bank = MemoryBank::in_memory();
        // standard rule is an exact match, override is further away
        bank.rules
            .add(vec![
                rule("s", "Sciatica is routine", vec![1.0, 0.0], Priority::Standard, 1.3),
                rule("o", "Night pain needs MRI", vec![0.6, 0.8], Priority::CriticalOverride, 5.0),
            ])
            .unwrap();
        bank.cases
            .add(vec![MemoryEntry::new("c", "Case: Jane Doe. Dx: Disc", vec![1.0, 0.0])])
            .unwrap();
        let memory = rule_memory(&bank, Arc::new(MockEmbedding::new(2)));

        let retrieval = memory.retrieve(&[1.0, 0.0]).unwrap();
        assert_eq!(retrieval.overrides.len(), 1);
        assert_eq!(retrieval.standard.len(), 1);
        assert_eq!(retrieval.precedent.as_ref().unwrap().entry.id, "c");

        let text = retrieval.render();
        let o = text.find(OVERRIDES_HEADER).unwrap();
        let g = text.find(GUIDELINES_HEADER).unwrap();
        let p = text.find(PRECEDENT_HEADER).unwrap();
        assert!(o < g && g < p);
        assert!(text.contains("- Sciatica is routine (Conf: 1.3)"));
    }

    #[tokio::test]
    async fn test_retrieve_caps_rules_at_limit() {
        let bank = MemoryBank::in_memory();
        let entries = (0..8)
            .map(|i| rule(&format!("r{i}"), "r", vec![1.0, i as f32], Priority::Standard, 1.0))
            .collect();
        bank.rules.add(entries).unwrap();
        let memory = rule_memory(&bank, Arc::new(MockEmbedding::new(2)));
        let retrieval = memory.retrieve(&[1.0, 0.0]).unwrap();
        assert_eq!(retrieval.standard.len(), 5);
        assert!(retrieval.precedent.is_none());

        let narrow = memory.clone().with_limits(2, 1).retrieve(&[1.0, 0.0]).unwrap();
        assert_eq!(narrow.standard.len(), 2);
    }

    #[tokio::test]
    async fn test_uppercase_priority_reads_as_override() {
        let bank = MemoryBank::in_memory();
        bank.rules
            .add(vec![
                MemoryEntry::new("legacy", "legacy override", vec![1.0, 0.0])
                    .with_meta("priority", "CRITICAL_OVERRIDE"),
            ])
            .unwrap();
        let memory = rule_memory(&bank, Arc::new(MockEmbedding::new(2)));
        let retrieval = memory.retrieve(&[1.0, 0.0]).unwrap();
        assert_eq!(retrieval.overrides.len(), 1);
    }

    // ── Cases and visual memory ────────────────────────────────

    #[tokio::test]
    async fn test_archive_textual_case() {
        let bank = MemoryBank::in_memory();
        let cases = CaseMemory::new(bank.cases.clone(), Arc::new(MockEmbedding::new(32)));
        let id = cases
            .archive(&GoldCase::textual("Case: John. Dx: Cauda Equina", "dr_lee"))
            .await
            .unwrap();
        assert!(id.starts_with("gold_case_"));
        let entry = bank.cases.get(&id).unwrap().unwrap();
        assert_eq!(entry.metadata["type"].as_str(), Some(CaseKind::TextualPrecedent.as_str()));
        assert_eq!(entry.metadata["validated_by"].as_str(), Some("dr_lee"));
        assert!(entry.metadata.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_archive_fails_closed_on_embedding_error() {
        let bank = MemoryBank::in_memory();
        let cases = CaseMemory::new(bank.cases.clone(), Arc::new(MockEmbedding::new(8).failing_always()));
        let err = cases.archive(&GoldCase::textual("x", "dr")).await.unwrap_err();
        assert!(matches!(err, PearlError::Embedding(_)));
        assert_eq!(bank.cases.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_visual_memory_markers_and_learning() {
        let bank = MemoryBank::in_memory();
        let embedder = Arc::new(MockEmbedding::new(32));
        let visual = VisualMemory::new(bank.visual.clone(), embedder.clone());
        assert_eq!(visual.recall().await, NO_VISUAL_ERRORS);

        let id = visual.learn_rule("Check the far lateral zone", "dr_kim").await.unwrap();
        assert!(id.starts_with("visual_rule_"));
        let entry = bank.visual.get(&id).unwrap().unwrap();
        assert_eq!(entry.text, "CRITICAL VISUAL RULE: Check the far lateral zone");
        assert_eq!(entry.metadata["type"].as_str(), Some("visual_correction"));
        assert_eq!(entry.metadata["author"].as_str(), Some("dr_kim"));
        assert_eq!(visual.recall().await, entry.text);

        let broken = VisualMemory::new(bank.visual.clone(), Arc::new(MockEmbedding::new(32).failing_always()));
        assert_eq!(broken.recall().await, VISUAL_MEMORY_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_visual_recall_is_capped_and_newline_joined() {
        let bank = MemoryBank::in_memory();
        let visual = VisualMemory::new(bank.visual.clone(), Arc::new(MockEmbedding::new(32)));
        for i in 0..5 {
            visual.learn_rule(&format!("correction {i}"), "dr").await.unwrap();
        }
        assert_eq!(visual.recall().await.lines().count(), 3);
    }

    // ── Seeding ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let bank = MemoryBank::in_memory();
        let embedder = MockEmbedding::new(64);

        let first = seed_triage_rules(bank.rules.as_ref(), &embedder).await.unwrap();
        assert_eq!(first.added, TRIAGE_RULES.len());
        assert_eq!(first.skipped, 0);

        let again = seed_triage_rules(bank.rules.as_ref(), &embedder).await.unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.skipped, TRIAGE_RULES.len());
        assert_eq!(bank.rules.count().unwrap(), TRIAGE_RULES.len());

        let first = bank.rules.get("senior_rule_001").unwrap().unwrap();
        assert_eq!(first.confidence(), 1.0);
        assert_eq!(first.priority(), Priority::Standard);
        assert_eq!(first.metadata["usage_count"], MetaValue::Int(0));

        let vision = seed_vision_rules(bank.visual.as_ref(), &embedder).await.unwrap();
        assert_eq!(vision.added, VISION_RULES.len());
        assert!(bank.visual.get("gold_vision_rule_001").unwrap().is_some());
    }
}
