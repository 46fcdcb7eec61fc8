//! Content chunking.
//!
//! Splits raw file content into semantically bounded chunks by file
//! category:
//!
//! - small files (≤ max_lines) become a single whole-file chunk;
//! - declarative scene/resource files split at `[section]` headers;
//! - script files split at definition boundaries (function/class/signal
//!   declarations), with a minimum chunk size and a hard cap;
//! - everything else falls back to a fixed sliding window with overlap.
//!
//! Line numbers are 1-indexed and inclusive, and the chunks of one file
//! always cover `[1, total_lines]` with no gaps.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::ChunkingConfig;
use crate::types::{FileCategory, TextChunk};

/// Definition-start pattern for GDScript-style sources.
fn gd_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(func\s+\w+|class\s+\w+|signal\s+\w+|extends\s+)").unwrap())
}

/// Definition-start pattern for C-family sources.
fn c_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(class\s+\w+|struct\s+\w+|\w+\s+\w+\s*\(|public\s+|private\s+|protected\s+)")
            .unwrap()
    })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Split `content` into chunks using the strategy for `path`'s category.
pub fn chunk(content: &str, path: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let lines: Vec<&str> = content.split('\n').collect();

    if lines.len() <= config.max_lines {
        return vec![TextChunk {
            file_path: path.to_string(),
            chunk_index: 0,
            content: content.to_string(),
            start_line: 1,
            end_line: lines.len() as u32,
        }];
    }

    match FileCategory::from_path(path) {
        Some(FileCategory::Scene) | Some(FileCategory::Resource) => chunk_sections(&lines, path),
        Some(FileCategory::Script) => chunk_definitions(&lines, path, config),
        _ => chunk_windows(&lines, path, config),
    }
}

// ---------------------------------------------------------------------------
// Strategy: section headers
// ---------------------------------------------------------------------------

/// One chunk per `[section]`: header line through the line before the next
/// header (or EOF). Content before the first header joins the first section.
fn chunk_sections(lines: &[&str], path: &str) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_start = 1u32;

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with('[') && !current.is_empty() {
            chunks.push(make_chunk(path, chunks.len(), &current, current_start, i as u32));
            current = vec![line];
            current_start = i as u32 + 1;
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        chunks.push(make_chunk(
            path,
            chunks.len(),
            &current,
            current_start,
            lines.len() as u32,
        ));
    }

    chunks
}

// ---------------------------------------------------------------------------
// Strategy: definition boundaries
// ---------------------------------------------------------------------------

/// Split at definition starts, but only close a chunk once it holds more
/// than `min_definition_lines` lines, and force-close at `max_lines`.
fn chunk_definitions(lines: &[&str], path: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let def_re = if path.ends_with(".gd") {
        gd_def_re()
    } else {
        c_def_re()
    };

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_start = 1u32;

    for (i, line) in lines.iter().enumerate() {
        if def_re.is_match(line.trim())
            && !current.is_empty()
            && current.len() > config.min_definition_lines
        {
            chunks.push(make_chunk(path, chunks.len(), &current, current_start, i as u32));
            current = vec![line];
            current_start = i as u32 + 1;
        } else {
            current.push(line);

            if current.len() >= config.max_lines {
                chunks.push(make_chunk(
                    path,
                    chunks.len(),
                    &current,
                    current_start,
                    i as u32 + 1,
                ));
                current = Vec::new();
                current_start = i as u32 + 2;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(make_chunk(
            path,
            chunks.len(),
            &current,
            current_start,
            lines.len() as u32,
        ));
    }

    chunks
}

// ---------------------------------------------------------------------------
// Strategy: sliding window fallback
// ---------------------------------------------------------------------------

/// Fixed windows of `max_lines` with `window_overlap` lines shared between
/// consecutive chunks. The only strategy where chunks overlap.
fn chunk_windows(lines: &[&str], path: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let step = config.max_lines.saturating_sub(config.window_overlap).max(1);
    let mut chunks = Vec::new();

    let mut i = 0usize;
    while i < lines.len() {
        let window = &lines[i..(i + config.max_lines).min(lines.len())];
        chunks.push(make_chunk(
            path,
            chunks.len(),
            window,
            i as u32 + 1,
            (i + window.len()) as u32,
        ));
        i += step;
    }

    chunks
}

fn make_chunk(
    path: &str,
    index: usize,
    lines: &[&str],
    start_line: u32,
    end_line: u32,
) -> TextChunk {
    TextChunk {
        file_path: path.to_string(),
        chunk_index: index as u32,
        content: lines.join("\n"),
        start_line,
        end_line,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
