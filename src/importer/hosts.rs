use anyhow::{Context, Result};
use std::path::Path;

use super::ImportReport;
use crate::db::EnvironmentId;
use crate::inventory::validation::{validate_host_name, validate_ip_address};
use crate::inventory::Inventory;

/// Environment used when a host line names none
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// One parsed `hostname[,environment[,ip]]` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLine {
    pub name: String,
    pub environment: String,
    pub ip: Option<String>,
}

/// Parse a host list line. Blank lines yield `None`; empty fields fall back to defaults.
pub fn parse_host_line(line: &str) -> Option<HostLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut fields = line.splitn(3, ',').map(str::trim);
    let name = fields.next().unwrap_or_default().to_string();
    let environment = fields
        .next()
        .filter(|env| !env.is_empty())
        .unwrap_or(DEFAULT_ENVIRONMENT)
        .to_string();
    let ip = fields.next().filter(|ip| !ip.is_empty()).map(str::to_string);

    Some(HostLine {
        name,
        environment,
        ip,
    })
}

/// Import hosts from host list text, creating missing environments
pub fn import_hosts(inv: &mut Inventory, content: &str) -> ImportReport {
    let mut report = ImportReport::default();

    for line in content.lines().filter_map(parse_host_line) {
        if inv.host_by_name(&line.name).is_some() {
            report.already_present.push(line.name);
            continue;
        }
        // a rejected line must not leave a new environment behind
        if let Err(e) = validate_host_name(&line.name)
            .and_then(|_| validate_ip_address(line.ip.as_deref()))
        {
            report.fail(line.name, e);
            continue;
        }

        let env_id = match environment_for(inv, &line.environment) {
            Ok(id) => id,
            Err(e) => {
                report.fail(line.name, e);
                continue;
            }
        };

        match inv.create_host(&line.name, line.ip.as_deref(), env_id) {
            Ok(_) => report.added.push(line.name),
            Err(e) => report.fail(line.name, e),
        }
    }

    report
}

pub fn import_hosts_file(inv: &mut Inventory, path: &Path) -> Result<ImportReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read host list: {}", path.display()))?;
    tracing::info!("Importing hosts from {}", path.display());
    Ok(import_hosts(inv, &content))
}

fn environment_for(inv: &mut Inventory, name: &str) -> Result<EnvironmentId, String> {
    if let Some(env) = inv.environment_by_name(name) {
        return Ok(env.id);
    }
    inv.create_environment(name)
        .map_err(|e| format!("could not create environment {}: {}", name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_line() {
        assert_eq!(parse_host_line("   "), None);
        assert_eq!(
            parse_host_line("web1"),
            Some(HostLine {
                name: "web1".into(),
                environment: "production".into(),
                ip: None,
            })
        );
        assert_eq!(
            parse_host_line(" web1 , staging "),
            Some(HostLine {
                name: "web1".into(),
                environment: "staging".into(),
                ip: None,
            })
        );
        assert_eq!(
            parse_host_line("web1,,10.0.0.1"),
            Some(HostLine {
                name: "web1".into(),
                environment: "production".into(),
                ip: Some("10.0.0.1".into()),
            })
        );
        assert_eq!(parse_host_line("web1,dev,10.0.0.1").unwrap().environment, "dev");
    }

    #[test]
    fn test_import_hosts() {
        let mut inv = Inventory::new();
        let group = inv.create_group("Webservers").unwrap();
        inv.create_group_rule(group, "^web").unwrap();
        let prod = inv.create_environment("production").unwrap();
        inv.create_host("db1", None, prod).unwrap();

        let content = "web1\n\nweb2,staging,10.0.0.2\ndb1,production\nbad##host\nweb3,x y\n";
        let report = import_hosts(&mut inv, content);

        assert_eq!(report.added, vec!["web1", "web2"]);
        assert_eq!(report.already_present, vec!["db1"]);
        let failed: Vec<&str> = report.errors.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(failed, vec!["bad##host", "web3"]);

        let web2 = inv.host_by_name("web2").unwrap();
        assert_eq!(inv.environment(web2.environment_id).unwrap().name, "staging");
        assert_eq!(web2.ipaddress.as_deref(), Some("10.0.0.2"));
        assert_eq!(inv.group_hosts(group).count(), 2);
    }

    #[test]
    fn test_rejected_lines_create_no_environment() {
        let mut inv = Inventory::new();
        let prod = inv.create_environment("production").unwrap();
        inv.create_host("db1", None, prod).unwrap();

        let content = "bad##host,orphan\ndb1,leftover\nweb1,dev,not-an-ip\nweb2,staging\n";
        let report = import_hosts(&mut inv, content);

        assert_eq!(report.added, vec!["web2"]);
        assert_eq!(report.already_present, vec!["db1"]);
        assert_eq!(report.errors.len(), 2);

        let mut environments: Vec<&str> = inv.environments().map(|e| e.name.as_str()).collect();
        environments.sort();
        assert_eq!(environments, vec!["production", "staging"]);
    }

    #[test]
    fn test_import_hosts_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.csv");
        std::fs::write(&path, "web1,production,10.0.0.1\n").unwrap();

        let mut inv = Inventory::new();
        let report = import_hosts_file(&mut inv, &path).unwrap();
        assert_eq!(report.added, vec!["web1"]);
        assert!(import_hosts_file(&mut inv, &dir.path().join("missing.csv")).is_err());
    }
}
