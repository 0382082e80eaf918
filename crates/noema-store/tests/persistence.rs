//! Persistence across independent repository instances, as a restarted
//! process would see it.

use std::fs;

use noema_core::{
    ConsciousnessState, CycleArtifacts, EntropySource, StateKind, StateMerger, SubjectiveState,
};
use noema_store::{NoemaConfig, PersistedDocument, StateRepository};

fn states(n: usize) -> Vec<SubjectiveState> {
    (0..n)
        .map(|i| {
            SubjectiveState::new(
                StateKind::ALL[i % 7],
                0.2 * i as f64 - 0.4,
                0.5,
                0.7,
                format!("state {i}"),
                vec!["calm".into(), format!("t{i}")],
                format!("shape:{i}"),
            )
        })
        .collect()
}

fn initialized(session: &str) -> ConsciousnessState {
    let merger = StateMerger::default();
    let mut memory = ConsciousnessState::new(session);
    merger
        .initialize(&mut memory, CycleArtifacts { states: states(4), ..Default::default() })
        .unwrap();
    merger
        .merge(&mut memory, 0.35, CycleArtifacts { states: states(2), ..Default::default() })
        .unwrap();
    memory
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = NoemaConfig::default().state_path(dir.path());

    let mut memory = initialized("alpha");
    let counts = memory.counts();
    {
        let repo = StateRepository::open(&path).unwrap();
        repo.save(&mut memory).unwrap();
    }

    let reopened = StateRepository::open(&path).unwrap();
    let back = reopened.get("alpha").expect("session persisted");
    assert_eq!(back.session_id, "alpha");
    assert!(back.is_initialized);
    assert_eq!(back.last_ipoint_position, 0.35);
    assert_eq!(back.counts(), counts);
    assert_eq!(back.version, memory.version);
    assert_eq!(back.id, memory.id);
}

#[test]
fn sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/state.json");
    let repo = StateRepository::open(&path).unwrap();

    let mut a = initialized("a");
    let mut b = repo.get_or_create("b");
    repo.save(&mut a).unwrap();
    repo.save(&mut b).unwrap();

    let reopened = StateRepository::open(&path).unwrap();
    assert_eq!(reopened.list(), vec!["a".to_string(), "b".to_string()]);
    assert!(reopened.get("a").unwrap().is_initialized);
    assert!(!reopened.get("b").unwrap().is_initialized);
    assert_eq!(reopened.get("b").unwrap().counts().total(), 0);
}

#[test]
fn every_save_advances_version() {
    let dir = tempfile::tempdir().unwrap();
    let repo = StateRepository::open(&dir.path().join("state.json")).unwrap();
    let mut memory = initialized("v");
    let start = memory.version;
    for _ in 0..3 {
        repo.save(&mut memory).unwrap();
    }
    assert_eq!(memory.version, start + 3);

    let raw = fs::read_to_string(repo.path()).unwrap();
    let doc: PersistedDocument = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc.version, noema_store::DOCUMENT_VERSION);
    assert_eq!(doc.states.len(), 1);
    assert_eq!(doc.states[0].version, start + 3);
}

#[test]
fn corrupt_document_starts_fresh_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, r#"{"states": [{"sessionId": 7}], "version": "1.0"}"#).unwrap();

    let repo = StateRepository::open(&path).unwrap();
    assert!(repo.is_empty());

    let mut memory = repo.get_or_create("after");
    repo.save(&mut memory).unwrap();
    let reopened = StateRepository::open(&path).unwrap();
    assert_eq!(reopened.list(), vec!["after".to_string()]);

    let quarantined = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .count();
    assert_eq!(quarantined, 1);
}

#[test]
fn seeded_config_reproduces_noise() {
    let config = NoemaConfig::from_toml_str("[entropy]\nseed = \"repeat\"\n").unwrap();
    let a = EntropySource::from_options(&config.entropy);
    let b = EntropySource::from_options(&config.entropy);
    assert_eq!(a.generate_chunk_at(64, 3).bytes, b.generate_chunk_at(64, 3).bytes);
}
