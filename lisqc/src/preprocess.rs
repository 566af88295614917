//! Textual `#include` expansion, run before lexing.

use crate::error::CompileError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Replaces every line of the form `#include FILENAME` with the contents
/// of that file, resolved relative to `base_dir`. Each distinct file is
/// read once; all of its occurrences receive the same contents. The pass
/// is strictly single-shot: `#include` lines inside included content are
/// spliced through verbatim and never re-expanded.
pub fn process_includes(source: &str, base_dir: &Path) -> Result<String, CompileError> {
    let mut cache: HashMap<String, String> = HashMap::new();
    let mut output = String::with_capacity(source.len());

    for line in source.lines() {
        match line.strip_prefix("#include ") {
            Some(filename) => {
                if !cache.contains_key(filename) {
                    let path: PathBuf = base_dir.join(filename);
                    let contents = fs::read_to_string(&path)
                        .map_err(|source| CompileError::Include { path, source })?;
                    cache.insert(filename.to_string(), contents);
                }

                let contents = &cache[filename];
                output.push_str(contents);
                if !contents.ends_with('\n') {
                    output.push('\n');
                }
            }
            None => {
                output.push_str(line);
                output.push('\n');
            }
        }
    }

    Ok(output)
}
