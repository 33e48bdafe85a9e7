//! Bulk importers feeding the inventory: public key files, host lists and
//! available account names.
//!
//! Importers never stop at the first bad item. Every input lands in exactly
//! one bucket of the returned [`ImportReport`].

mod hosts;
mod keys;

pub use hosts::{import_hosts, import_hosts_file, parse_host_line, HostLine, DEFAULT_ENVIRONMENT};
pub use keys::{collect_key_files, import_keys};

use crate::inventory::Inventory;

/// An input item that could not be imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub item: String,
    pub reason: String,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
    pub errors: Vec<ImportFailure>,
}

impl ImportReport {
    fn fail(&mut self, item: impl Into<String>, reason: impl ToString) {
        let item = item.into();
        let reason = reason.to_string();
        tracing::warn!(item = %item, reason = %reason, "Import failed");
        self.errors.push(ImportFailure { item, reason });
    }

    /// Whether the inventory changed and needs saving
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }

    pub fn merge(&mut self, other: ImportReport) {
        self.added.extend(other.added);
        self.already_present.extend(other.already_present);
        self.errors.extend(other.errors);
    }
}

/// Register account names offered for autocompletion
pub fn import_accounts_available<S: AsRef<str>>(inv: &mut Inventory, names: &[S]) -> ImportReport {
    let mut report = ImportReport::default();

    for name in names {
        let name = name.as_ref().trim();
        if inv.account_available_exists(name) {
            report.already_present.push(name.to_string());
            continue;
        }
        match inv.create_account_available(name) {
            Ok(_) => report.added.push(name.to_string()),
            Err(e) => report.fail(name, e),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_accounts_available() {
        let mut inv = Inventory::new();
        inv.create_account_available("root").unwrap();

        let report = import_accounts_available(&mut inv, &["root", "jonas", "ba#r", "www-data"]);
        assert_eq!(report.added, vec!["jonas", "www-data"]);
        assert_eq!(report.already_present, vec!["root"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].item, "ba#r");
        assert!(report.changed());

        assert_eq!(inv.account_available_names(), vec!["jonas", "root", "www-data"]);
    }

    #[test]
    fn test_merge_reports() {
        let mut report = ImportReport::default();
        assert!(!report.changed());

        report.merge(ImportReport {
            added: vec!["a".into()],
            already_present: vec!["b".into()],
            errors: Vec::new(),
        });
        assert!(report.changed());
        assert_eq!(report.already_present, vec!["b"]);
    }
}
