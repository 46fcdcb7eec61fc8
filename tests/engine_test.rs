//! End-to-end engine tests with a deterministic in-process embedding
//! provider.

use std::sync::Arc;

use scenegraph::engine::ProjectEngine;
use scenegraph::types::{file_address, stable_node_id};
use scenegraph::{
    EmbeddingProvider, EngineConfig, FileInput, FileOutcome, Result, SearchOptions, Tenant,
};

/// Deterministic bag-of-bytes embedding. The `File: name\n\n` framing
/// prefix is stripped so a chunk and a query with the same literal text
/// embed identically.
struct HashingProvider;

impl EmbeddingProvider for HashingProvider {
    fn embed(&self, texts: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let body = t
                    .split_once("\n\n")
                    .map(|(_, body)| body)
                    .unwrap_or(t.as_str());
                let mut v = [0.0f32; 16];
                for (i, b) in body.bytes().enumerate() {
                    v[(b as usize + i) % 16] += 1.0;
                }
                v.to_vec()
            })
            .collect())
    }
}

fn engine() -> ProjectEngine {
    ProjectEngine::in_memory(Arc::new(HashingProvider), EngineConfig::default()).unwrap()
}

fn tenant() -> Tenant {
    Tenant::new("alice", "platformer")
}

const MAIN_SCENE: &str = r#"[gd_scene load_steps=3 format=3]

[ext_resource type="Script" path="res://scripts/player.gd" id="1_p"]
[ext_resource type="PackedScene" path="res://ui.tscn" id="2_u"]

[node name="Root" type="Node2D"]

[node name="Player" type="CharacterBody2D" parent="."]
script = ExtResource("1_p")

[node name="Hud" parent="." instance=ExtResource("2_u")]
"#;

const PLAYER_SCRIPT: &str = r#"extends CharacterBody2D

func _physics_process(delta):
	velocity.y += delta * 980.0
	move_and_slide()

func jump():
	velocity.y = -400.0
"#;

// ---------------------------------------------------------------------------
// Example scenario: scene + script + dangling instantiation target
// ---------------------------------------------------------------------------

#[test]
fn scene_and_script_build_the_expected_graph() {
    let engine = engine();
    let t = tenant();

    engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap();
    engine
        .index_file(&t, "scripts/player.gd", PLAYER_SCRIPT, None)
        .unwrap();

    let summary = engine.graph_summary(&t).unwrap();
    assert_eq!(summary.node_kinds.get("file"), Some(&2), "one File node each");
    assert!(summary.edge_kinds.contains_key("attaches_script"));
    assert!(
        summary.edge_kinds.contains_key("instantiates_scene"),
        "dangling target still produces the edge"
    );

    // The attach edge links the Player node to the script file's address.
    let connections = engine.get_connections(&t, "main.tscn", 2).unwrap();
    let uses_script = connections
        .get("uses_attaches_script")
        .expect("script attachment visible in connections");
    assert!(uses_script.contains(&"scripts/player.gd".to_string()));

    // ui.tscn was never indexed: the instantiation edge dangles and the
    // traversal reports nothing for it, but the edge row exists.
    assert!(connections
        .get("uses_instantiates_scene")
        .map_or(true, |targets| !targets.contains(&"ui.tscn".to_string())));
}

#[test]
fn dangling_edge_resolves_once_target_is_indexed() {
    let engine = engine();
    let t = tenant();

    engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap();

    // Before: instantiation target has no node row.
    let before = engine.get_connections(&t, "main.tscn", 2).unwrap();
    assert!(before.get("uses_instantiates_scene").is_none());

    // Index the target; the pre-existing edge now resolves by address.
    engine
        .index_file(&t, "ui.tscn", "[gd_scene format=3]\n\n[node name=\"Ui\" type=\"Control\"]\n", None)
        .unwrap();

    let after = engine.get_connections(&t, "main.tscn", 2).unwrap();
    assert_eq!(
        after.get("uses_instantiates_scene"),
        Some(&vec!["ui.tscn".to_string()])
    );
}

#[test]
fn referenced_files_outrank_an_isolated_file() {
    let engine = engine();
    let t = tenant();

    engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap();
    engine
        .index_file(&t, "scripts/player.gd", PLAYER_SCRIPT, None)
        .unwrap();
    engine
        .index_file(&t, "orphan.md", "notes nobody references\n", None)
        .unwrap();

    let central = engine.get_central_files(&t, 3).unwrap();
    assert_eq!(central.len(), 3);
    assert_ne!(
        central[0].file_path, "orphan.md",
        "an unreferenced file cannot be the most central"
    );
    assert!(
        central[0].file_path == "scripts/player.gd" || central[0].file_path == "main.tscn",
        "a connected file ranks first, got {}",
        central[0].file_path
    );
}

// ---------------------------------------------------------------------------
// Idempotence and hash gating
// ---------------------------------------------------------------------------

#[test]
fn reindexing_identical_content_is_a_noop() {
    let engine = engine();
    let t = tenant();

    assert_eq!(
        engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap(),
        FileOutcome::Indexed
    );
    let chunks_before = engine.get_stats(&t).unwrap().total_chunks;

    assert_eq!(
        engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap(),
        FileOutcome::Unchanged
    );
    assert_eq!(engine.get_stats(&t).unwrap().total_chunks, chunks_before);
}

#[test]
fn single_byte_change_replaces_all_chunks() {
    let engine = engine();
    let t = tenant();

    engine
        .index_file(&t, "scripts/player.gd", PLAYER_SCRIPT, None)
        .unwrap();
    let before = engine.get_stats(&t).unwrap();

    let mutated = PLAYER_SCRIPT.replace("-400.0", "-401.0");
    let outcome = engine
        .index_file(&t, "scripts/player.gd", &mutated, None)
        .unwrap();

    assert_eq!(outcome, FileOutcome::Indexed, "hash change forces re-index");
    let after = engine.get_stats(&t).unwrap();
    assert_eq!(after.files_indexed, before.files_indexed);
    assert_eq!(
        after.total_chunks, before.total_chunks,
        "replaced, not appended"
    );
}

// ---------------------------------------------------------------------------
// Search behavior
// ---------------------------------------------------------------------------

#[test]
fn literal_chunk_content_is_a_near_perfect_self_match() {
    let engine = engine();
    let t = tenant();

    let content = "the quick brown fox guards the castle gate\n";
    engine.index_file(&t, "lore.md", content, None).unwrap();
    engine
        .index_file(&t, "other.md", "completely unrelated shader math notes\n", None)
        .unwrap();

    let response = engine
        .search(&t, content, &SearchOptions::default())
        .unwrap();

    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].file_path, "lore.md");
    assert!(
        response.results[0].similarity > 0.999,
        "self-match similarity should be at the maximum, got {}",
        response.results[0].similarity
    );
    if response.results.len() > 1 {
        assert!(response.results[0].similarity > response.results[1].similarity);
    }
}

#[test]
fn removed_file_disappears_from_search() {
    let engine = engine();
    let t = tenant();

    let content = "unique searchable marker phrase\n";
    engine.index_file(&t, "doomed.md", content, None).unwrap();
    engine.remove_file(&t, "doomed.md").unwrap();

    let response = engine
        .search(&t, content, &SearchOptions::default())
        .unwrap();
    assert!(
        response.results.iter().all(|h| h.file_path != "doomed.md"),
        "removed file must not appear in results"
    );
}

#[test]
fn graph_augmented_search_returns_context() {
    let engine = engine();
    let t = tenant();

    engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap();
    engine
        .index_file(&t, "scripts/player.gd", PLAYER_SCRIPT, None)
        .unwrap();

    let options = SearchOptions {
        k: 5,
        with_graph: true,
        category: None,
    };
    let response = engine.search(&t, "player physics jump", &options).unwrap();

    let connected = response.connected_files.expect("connections attached");
    assert_eq!(connected.len(), {
        let mut paths: Vec<_> = response.results.iter().map(|r| &r.file_path).collect();
        paths.dedup();
        paths.len()
    });
    assert!(response.central_files.is_some());
}

// ---------------------------------------------------------------------------
// Cycle safety
// ---------------------------------------------------------------------------

#[test]
fn mutual_instantiation_does_not_hang_traversal() {
    let engine = engine();
    let t = tenant();

    let scene_a = "[gd_scene format=3]\n\n[ext_resource type=\"PackedScene\" path=\"res://b.tscn\" id=\"1\"]\n\n[node name=\"A\" type=\"Node2D\"]\n\n[node name=\"ChildB\" parent=\".\" instance=ExtResource(\"1\")]\n";
    let scene_b = "[gd_scene format=3]\n\n[ext_resource type=\"PackedScene\" path=\"res://a.tscn\" id=\"1\"]\n\n[node name=\"B\" type=\"Node2D\"]\n\n[node name=\"ChildA\" parent=\".\" instance=ExtResource(\"1\")]\n";

    engine.index_file(&t, "a.tscn", scene_a, None).unwrap();
    engine.index_file(&t, "b.tscn", scene_b, None).unwrap();

    // A instantiates B and vice versa; the visited set must terminate
    // the walk well before this generous depth.
    let connections = engine.get_connections(&t, "a.tscn", 10).unwrap();
    assert!(connections
        .get("uses_instantiates_scene")
        .is_some_and(|targets| targets.contains(&"b.tscn".to_string())));
}

// ---------------------------------------------------------------------------
// Centrality determinism
// ---------------------------------------------------------------------------

#[test]
fn central_files_are_deterministic() {
    let engine = engine();
    let t = tenant();

    engine.index_file(&t, "main.tscn", MAIN_SCENE, None).unwrap();
    engine
        .index_file(&t, "scripts/player.gd", PLAYER_SCRIPT, None)
        .unwrap();
    engine.index_file(&t, "ui.tscn", "[gd_scene format=3]\n\n[node name=\"Ui\" type=\"Control\"]\n", None).unwrap();

    let first = engine.get_central_files(&t, 10).unwrap();
    let second = engine.get_central_files(&t, 10).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.file_path, b.file_path);
        assert_eq!(a.score, b.score);
    }
}

// ---------------------------------------------------------------------------
// Batch indexing and tenant isolation
// ---------------------------------------------------------------------------

#[test]
fn batch_indexing_aggregates_stats() {
    let engine = engine();
    let t = tenant();

    let files = vec![
        FileInput {
            path: "main.tscn".to_string(),
            content: MAIN_SCENE.to_string(),
            hash: None,
        },
        FileInput {
            path: "scripts/player.gd".to_string(),
            content: PLAYER_SCRIPT.to_string(),
            hash: None,
        },
        FileInput {
            path: "texture.png".to_string(),
            content: "not really indexable".to_string(),
            hash: None,
        },
    ];

    let stats = engine.index_batch(&t, &files).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.indexed, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
}

#[test]
fn tenants_are_fully_isolated() {
    let engine = engine();
    let alice = Tenant::new("alice", "platformer");
    let bob = Tenant::new("bob", "platformer");

    engine
        .index_file(&alice, "secret.md", "alice private design notes\n", None)
        .unwrap();

    let bob_view = engine
        .search(&bob, "alice private design notes", &SearchOptions::default())
        .unwrap();
    assert!(bob_view.results.is_empty());

    engine.clear(&bob).unwrap();
    assert_eq!(engine.get_stats(&alice).unwrap().files_indexed, 1);
}

// ---------------------------------------------------------------------------
// Stable addressing
// ---------------------------------------------------------------------------

#[test]
fn addresses_hash_deterministically_and_per_tenant() {
    let t = tenant();
    let other = Tenant::new("bob", "platformer");

    // Same address, same tenant: one id, however many times it is hashed.
    let a = stable_node_id(&t, &file_address("ui.tscn"));
    let b = stable_node_id(&t, &file_address("ui.tscn"));
    assert_eq!(a, b);

    // Same address, different tenant: different graph entirely.
    assert_ne!(a, stable_node_id(&other, &file_address("ui.tscn")));
}
