use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::ImportReport;
use crate::db::SshKey;
use crate::engine::OrderedSet;
use crate::inventory::Inventory;

/// Expand files and directories into the list of key files to import.
///
/// Directories contribute their `*.pub` files. Repeated paths are kept once,
/// in first-seen order. Arguments that are neither a file nor a directory are
/// reported in the returned report.
pub fn collect_key_files(paths: &[PathBuf]) -> Result<(Vec<PathBuf>, ImportReport)> {
    let mut files = OrderedSet::new();
    let mut report = ImportReport::default();

    for path in paths {
        if path.is_dir() {
            let pattern = path.join("*.pub");
            let pattern = pattern
                .to_str()
                .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;
            for entry in glob::glob(pattern).context("Invalid key file pattern")? {
                match entry {
                    Ok(file) if file.is_file() => {
                        files.insert(file);
                    }
                    Ok(file) => report.fail(file.display().to_string(), "not a regular file"),
                    Err(e) => report.fail(e.path().display().to_string(), e.error()),
                }
            }
        } else if path.is_file() {
            files.insert(path.clone());
        } else {
            report.fail(path.display().to_string(), "not a readable file or directory");
        }
    }

    Ok((files.into_vec(), report))
}

/// Import public key files, naming each key after its file name
pub fn import_keys(inv: &mut Inventory, paths: &[PathBuf]) -> Result<ImportReport> {
    let (files, mut report) = collect_key_files(paths)?;

    for file in files {
        let item = file.display().to_string();
        let name = match key_name(&file) {
            Some(name) => name,
            None => {
                report.fail(item, "can not derive a key name from the file name");
                continue;
            }
        };

        if inv.key_by_name(&name).is_some() {
            report.already_present.push(item);
            continue;
        }

        let material = match std::fs::read_to_string(&file) {
            Ok(material) => material,
            Err(e) => {
                report.fail(item, e);
                continue;
            }
        };

        match inv.create_key(&name, &material) {
            Ok(_) => {
                tracing::debug!(file = %item, key = %name, "Imported SSH key");
                report.added.push(item);
            }
            Err(e) => report.fail(item, e),
        }
    }

    Ok(report)
}

fn key_name(file: &Path) -> Option<String> {
    let file_name = file.file_name()?.to_str()?;
    Some(SshKey::filename2name(file_name))
}
