//! Structural graph extraction.
//!
//! A tolerant line scanner over declarative scene/resource text, plus
//! regex relationship patterns over procedural script text. The scanner is
//! deliberately not a grammar: a malformed header or missing attribute
//! drops that line's contribution and nothing else.
//!
//! Every indexed file gets a File node regardless of parse outcome, so
//! even an empty or unparseable file is centrality-eligible.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{
    file_address, now_epoch, scene_node_address, stable_node_id, EdgeKind, FileCategory,
    GraphEdge, GraphNode, NodeKind, Tenant,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Nodes and edges extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct ExtractedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Extract the typed graph contribution of one file.
pub fn extract(tenant: &Tenant, file_path: &str, content: &str) -> ExtractedGraph {
    let mut graph = ExtractedGraph::default();
    let updated_at = now_epoch();
    let category = FileCategory::from_path(file_path);

    let file_node_id = stable_node_id(tenant, &file_address(file_path));
    graph.nodes.push(GraphNode {
        id: file_node_id.clone(),
        tenant: tenant.clone(),
        file_path: file_path.to_string(),
        kind: NodeKind::File,
        name: basename(file_path).to_string(),
        node_type: category.map(|c| c.as_str().to_string()),
        node_path: None,
        start_line: None,
        end_line: None,
        updated_at,
    });

    match category {
        Some(FileCategory::Scene) | Some(FileCategory::Resource) => {
            scan_sections(tenant, file_path, content, &file_node_id, updated_at, &mut graph);
        }
        Some(FileCategory::Script) => {
            scan_script(tenant, file_path, content, &file_node_id, updated_at, &mut graph);
        }
        _ => {}
    }

    graph
}

// ---------------------------------------------------------------------------
// Section headers
// ---------------------------------------------------------------------------

/// A parsed `[name key=value ...]` header.
struct SectionHeader {
    name: String,
    attrs: HashMap<String, String>,
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*("[^"]*"|[^\s\]]+)"#).unwrap())
}

fn ext_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"ExtResource\(\s*"?([^")]+?)"?\s*\)"#).unwrap())
}

fn prop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_/]*)\s*=\s*(.+)$").unwrap())
}

/// Parse a bracketed header line. Returns `None` for anything that is not
/// shaped like `[name ...]`.
fn parse_header(trimmed: &str) -> Option<SectionHeader> {
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let name = inner.split_whitespace().next()?.to_string();
    let rest = &inner[name.len()..];

    let mut attrs = HashMap::new();
    for cap in attr_re().captures_iter(rest) {
        let key = cap[1].to_string();
        let value = cap[2].trim_matches('"').to_string();
        attrs.insert(key, value);
    }
    Some(SectionHeader { name, attrs })
}

/// Pull the resource id out of an `ExtResource("id")` expression.
fn ext_resource_id(value: &str) -> Option<&str> {
    ext_ref_re()
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Strip the engine's virtual-path scheme, yielding a project-relative
/// path.
fn strip_res_scheme(path: &str) -> &str {
    path.strip_prefix("res://").unwrap_or(path)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Scene/resource scanner
// ---------------------------------------------------------------------------

/// Which graph node owns property lines in the current section.
#[derive(Clone, Copy)]
enum SectionContext {
    /// Properties attach to the scene node at this index in `graph.nodes`.
    Node(usize),
    /// Properties attach to the File node (e.g. `[resource]` sections).
    File,
}

fn scan_sections(
    tenant: &Tenant,
    file_path: &str,
    content: &str,
    file_node_id: &str,
    updated_at: f64,
    graph: &mut ExtractedGraph,
) {
    // External reference table: id -> (project-relative path, declared kind).
    let mut refs: HashMap<String, (String, String)> = HashMap::new();
    for line in content.split('\n') {
        let trimmed = line.trim();
        if !trimmed.starts_with("[ext_resource") {
            continue;
        }
        if let Some(header) = parse_header(trimmed) {
            if let (Some(path), Some(id)) = (header.attrs.get("path"), header.attrs.get("id")) {
                let kind = header.attrs.get("type").cloned().unwrap_or_default();
                refs.insert(id.clone(), (strip_res_scheme(path).to_string(), kind));
            }
        }
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let total_lines = lines.len() as u32;
    let mut context = SectionContext::File;
    let mut root_path: Option<String> = None;

    let push_edge = |graph: &mut ExtractedGraph,
                     source_id: String,
                     target_id: String,
                     kind: EdgeKind,
                     line_no: u32| {
        let strength = kind.strength();
        graph.edges.push(GraphEdge {
            tenant: tenant.clone(),
            source_id,
            target_id,
            kind,
            file_path: file_path.to_string(),
            start_line: Some(line_no),
            end_line: None,
            strength,
            updated_at,
        });
    };

    for (i, line) in lines.iter().enumerate() {
        let line_no = i as u32 + 1;
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            // Close the node section that just ended.
            if let SectionContext::Node(idx) = context {
                graph.nodes[idx].end_line = Some(line_no - 1);
            }
            context = SectionContext::File;

            let Some(header) = parse_header(trimmed) else {
                continue;
            };

            match header.name.as_str() {
                "node" => {
                    let Some(name) = header.attrs.get("name").cloned() else {
                        continue; // malformed node header, skip
                    };
                    let parent = header.attrs.get("parent").cloned();
                    let node_path = if let Some(explicit) = header.attrs.get("node") {
                        explicit.clone()
                    } else {
                        match parent.as_deref() {
                            Some(p) if p != "." => format!("{p}/{name}"),
                            _ => name.clone(),
                        }
                    };
                    if parent.is_none() && root_path.is_none() {
                        root_path = Some(node_path.clone());
                    }

                    let node_id =
                        stable_node_id(tenant, &scene_node_address(file_path, &node_path));
                    graph.nodes.push(GraphNode {
                        id: node_id.clone(),
                        tenant: tenant.clone(),
                        file_path: file_path.to_string(),
                        kind: NodeKind::SceneNode,
                        name,
                        node_type: header.attrs.get("type").cloned(),
                        node_path: Some(node_path),
                        start_line: Some(line_no),
                        end_line: None,
                        updated_at,
                    });
                    context = SectionContext::Node(graph.nodes.len() - 1);

                    // Parent -> child containment, except for the scene root.
                    if let Some(p) = parent {
                        let parent_path = if p == "." {
                            root_path.clone().unwrap_or(p)
                        } else {
                            p
                        };
                        let parent_id =
                            stable_node_id(tenant, &scene_node_address(file_path, &parent_path));
                        push_edge(graph, parent_id, node_id.clone(), EdgeKind::ChildOf, line_no);
                    }

                    // instance=ExtResource("id") resolving to a scene.
                    if let Some(instance_val) = header.attrs.get("instance") {
                        if let Some(rid) = ext_resource_id(instance_val) {
                            if let Some((path, kind)) = refs.get(rid) {
                                if kind.contains("Scene") {
                                    let target_id =
                                        stable_node_id(tenant, &file_address(path));
                                    push_edge(
                                        graph,
                                        node_id,
                                        target_id,
                                        EdgeKind::InstantiatesScene,
                                        line_no,
                                    );
                                }
                            }
                        }
                    }
                }
                "connection" => {
                    let signal = header.attrs.get("signal");
                    let from = header.attrs.get("from");
                    let to = header.attrs.get("to");
                    let method = header.attrs.get("method");
                    if let (Some(signal), Some(from), Some(to), Some(method)) =
                        (signal, from, to, method)
                    {
                        let resolve = |p: &str| -> String {
                            let path = if p == "." {
                                root_path.clone().unwrap_or_else(|| p.to_string())
                            } else {
                                p.to_string()
                            };
                            stable_node_id(tenant, &scene_node_address(file_path, &path))
                        };
                        push_edge(
                            graph,
                            resolve(from),
                            resolve(to),
                            EdgeKind::ConnectsSignal {
                                signal: signal.clone(),
                                method: method.clone(),
                            },
                            line_no,
                        );
                    }
                }
                "ext_resource" => {
                    // Every external reference links the file to its target.
                    if let (Some(path), Some(_)) =
                        (header.attrs.get("path"), header.attrs.get("id"))
                    {
                        let target_id =
                            stable_node_id(tenant, &file_address(strip_res_scheme(path)));
                        push_edge(
                            graph,
                            file_node_id.to_string(),
                            target_id,
                            EdgeKind::UsesResource,
                            line_no,
                        );
                    }
                }
                _ => {}
            }
            continue;
        }

        // Property line inside a section.
        let Some(cap) = prop_re().captures(trimmed) else {
            continue;
        };
        let prop = &cap[1];
        let value = &cap[2];

        let target_path = if let Some(rid) = ext_resource_id(value) {
            refs.get(rid).map(|(path, _)| path.clone())
        } else if value.starts_with("\"res://") {
            Some(strip_res_scheme(value.trim_matches('"')).to_string())
        } else {
            None
        };
        let Some(target_path) = target_path else {
            continue;
        };

        let source_id = match context {
            SectionContext::Node(idx) => graph.nodes[idx].id.clone(),
            SectionContext::File => file_node_id.to_string(),
        };
        let target_id = stable_node_id(tenant, &file_address(&target_path));
        let kind = if prop == "script" {
            EdgeKind::AttachesScript
        } else {
            EdgeKind::UsesResource
        };
        push_edge(graph, source_id, target_id, kind, line_no);
    }

    if let SectionContext::Node(idx) = context {
        graph.nodes[idx].end_line = Some(total_lines);
    }
}

// ---------------------------------------------------------------------------
// Script scanner
// ---------------------------------------------------------------------------

struct ScriptPatterns {
    extends_path: Regex,
    preload: Regex,
    load: Regex,
    get_node: Regex,
    change_scene: Regex,
    connect: Regex,
}

fn script_patterns() -> &'static ScriptPatterns {
    static PATTERNS: OnceLock<ScriptPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ScriptPatterns {
        extends_path: Regex::new(r#"^extends\s+"([^"]+)""#).unwrap(),
        preload: Regex::new(r#"preload\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
        // The leading char class keeps this from matching the tail of
        // `preload(`.
        load: Regex::new(r#"(?:^|[^A-Za-z_])load\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
        get_node: Regex::new(r#"get_node\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
        change_scene: Regex::new(r#"change_scene\w*\s*\(\s*["']([^"']+)["']"#).unwrap(),
        connect: Regex::new(r#"\bconnect\(\s*["']([^"']+)["']\s*,\s*([A-Za-z0-9_\.]+)"#).unwrap(),
    })
}

fn scan_script(
    tenant: &Tenant,
    file_path: &str,
    content: &str,
    file_node_id: &str,
    updated_at: f64,
    graph: &mut ExtractedGraph,
) {
    let patterns = script_patterns();

    let push_edge = |graph: &mut ExtractedGraph,
                     target_id: String,
                     kind: EdgeKind,
                     line_no: u32| {
        let strength = kind.strength();
        graph.edges.push(GraphEdge {
            tenant: tenant.clone(),
            source_id: file_node_id.to_string(),
            target_id,
            kind,
            file_path: file_path.to_string(),
            start_line: Some(line_no),
            end_line: None,
            strength,
            updated_at,
        });
    };

    for (i, line) in content.split('\n').enumerate() {
        let line_no = i as u32 + 1;
        let trimmed = line.trim();

        if let Some(cap) = patterns.extends_path.captures(trimmed) {
            let target = stable_node_id(tenant, &file_address(strip_res_scheme(&cap[1])));
            push_edge(graph, target, EdgeKind::Extends, line_no);
        }
        for cap in patterns.preload.captures_iter(trimmed) {
            let target = stable_node_id(tenant, &file_address(strip_res_scheme(&cap[1])));
            push_edge(graph, target, EdgeKind::PreloadsResource, line_no);
        }
        for cap in patterns.load.captures_iter(trimmed) {
            let target = stable_node_id(tenant, &file_address(strip_res_scheme(&cap[1])));
            push_edge(graph, target, EdgeKind::LoadsResource, line_no);
        }
        for cap in patterns.get_node.captures_iter(trimmed) {
            // A lookup path is relative to the script's owner, which is
            // unknown statically; address it by the raw path so repeated
            // lookups converge on one dangling id.
            let target = stable_node_id(tenant, &format!("nodepath:{}", &cap[1]));
            push_edge(graph, target, EdgeKind::LooksUpNode, line_no);
        }
        for cap in patterns.change_scene.captures_iter(trimmed) {
            let target = stable_node_id(tenant, &file_address(strip_res_scheme(&cap[1])));
            push_edge(graph, target, EdgeKind::ChangesScene, line_no);
        }
        for cap in patterns.connect.captures_iter(trimmed) {
            let signal = cap[1].to_string();
            let method = cap[2].trim_start_matches("self.").to_string();
            let target = stable_node_id(tenant, &format!("callable:{method}"));
            push_edge(
                graph,
                target,
                EdgeKind::ConnectsSignal { signal, method },
                line_no,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
