//! Field validation for inventory entities.
//!
//! Every validator receives an already trimmed value and returns a
//! human-readable message on failure. The inventory wraps the message into
//! [`InventoryError::Validation`](super::InventoryError) with the field name.

use lazy_static::lazy_static;
use regex::Regex;
use std::net::IpAddr;

use crate::db::RulePattern;

lazy_static! {
    /// Key, keyring and group names: letters, digits, whitespace, `_`, `.`, `-`
    static ref LABEL_NAME_REGEX: Regex = Regex::new(r"^[0-9A-Za-z\s_.-]+$").unwrap();

    /// Host and account names: letters, digits, `_`, `.`, `-`
    static ref SYSTEM_NAME_REGEX: Regex = Regex::new(r"^[0-9A-Za-z_.-]+$").unwrap();

    /// Environment names are slugs
    static ref SLUG_REGEX: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap();

    /// Public key line: key type, base64 blob, comment
    static ref SSH_PUBLIC_KEY_REGEX: Regex = Regex::new(
        r"^(ecdsa-sha2-nistp256|ssh-dss|ssh-rsa)\s([^\s\n]+) [^\n]+$"
    ).unwrap();
}

pub const MAX_KEY_NAME_LEN: usize = 32;
pub const MAX_GROUP_NAME_LEN: usize = 32;
pub const MAX_GROUP_RULE_LEN: usize = 32;
pub const MAX_ENVIRONMENT_NAME_LEN: usize = 100;
pub const MAX_HOST_NAME_LEN: usize = 155;
pub const MAX_ACCOUNT_NAME_LEN: usize = 100;
const MIN_NAME_LEN: usize = 3;

fn validate_length(value: &str, what: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len == 0 {
        return Err(format!("{} is required", what));
    }
    if len < MIN_NAME_LEN {
        return Err(format!(
            "{} is too short (min {} characters)",
            what, MIN_NAME_LEN
        ));
    }
    if len > max {
        return Err(format!("{} is too long (max {} characters)", what, max));
    }
    Ok(())
}

fn validate_label(value: &str, what: &str, max: usize) -> Result<(), String> {
    validate_length(value, what, max)?;
    if !LABEL_NAME_REGEX.is_match(value) {
        return Err("Only A-Za-z0-9\\s_-. are allowed!".to_string());
    }
    Ok(())
}

/// Validate an SSH key or keyring name
pub fn validate_key_name(name: &str) -> Result<(), String> {
    validate_label(name, "Name", MAX_KEY_NAME_LEN)
}

/// Validate a group name
pub fn validate_group_name(name: &str) -> Result<(), String> {
    validate_label(name, "Group name", MAX_GROUP_NAME_LEN)
}

/// Validate public key material: a single `<type> <base64> <comment>` line
pub fn validate_ssh_public_key(material: &str) -> Result<(), String> {
    if material.is_empty() {
        return Err("SSH key is required".to_string());
    }
    if material.contains('\n') || material.contains('\r') {
        return Err("SSH key must be a single line".to_string());
    }
    if !SSH_PUBLIC_KEY_REGEX.is_match(material) {
        return Err(format!("{} is not a valid SSH Public Key", material));
    }
    Ok(())
}

/// Validate an environment name
pub fn validate_environment_name(name: &str) -> Result<(), String> {
    validate_length(name, "Environment name", MAX_ENVIRONMENT_NAME_LEN)?;
    if !SLUG_REGEX.is_match(name) {
        return Err(
            "Environment name may only contain letters, numbers, underscores or hyphens"
                .to_string(),
        );
    }
    Ok(())
}

/// Validate a host name
pub fn validate_host_name(name: &str) -> Result<(), String> {
    validate_length(name, "Host name", MAX_HOST_NAME_LEN)?;
    if !SYSTEM_NAME_REGEX.is_match(name) {
        return Err("Hostname is not valid.".to_string());
    }
    Ok(())
}

/// Validate an optional IPv4/IPv6 address
pub fn validate_ip_address(ip: Option<&str>) -> Result<(), String> {
    if let Some(ip) = ip {
        if ip.parse::<IpAddr>().is_err() {
            return Err(format!("{} is not a valid IPv4 or IPv6 address", ip));
        }
    }
    Ok(())
}

/// Validate an SSH account name (also used for available account names)
pub fn validate_account_name(name: &str) -> Result<(), String> {
    validate_length(name, "Account name", MAX_ACCOUNT_NAME_LEN)?;
    if !SYSTEM_NAME_REGEX.is_match(name) {
        return Err("Enter a valid value.".to_string());
    }
    Ok(())
}

/// Validate and compile a group rule
pub fn validate_group_rule(rule: &str) -> Result<RulePattern, String> {
    if rule.is_empty() {
        return Err("Rule is required".to_string());
    }
    if rule.chars().count() > MAX_GROUP_RULE_LEN {
        return Err(format!(
            "Rule is too long (max {} characters)",
            MAX_GROUP_RULE_LEN
        ));
    }
    RulePattern::new(rule).map_err(|_| "Rule not valid".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSH_KEY_RSA: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDIsM1GrbmWR+3jzd2njnmimjrlmPcG5CDFIZMq/AHAckbhLD Foo Bar";

    #[test]
    fn test_validate_key_name() {
        assert!(validate_key_name("Foo Bar").is_ok());
        assert!(validate_key_name("All Web Devs").is_ok());
        assert!(validate_key_name("ci-deploy_2.old").is_ok());

        assert!(validate_key_name("").is_err());
        assert!(validate_key_name("ab").is_err());
        assert!(validate_key_name("fsdf#+fds").is_err());
        assert!(validate_key_name(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_group_name() {
        assert!(validate_group_name("Webservers Foobar").is_ok());
        assert!(validate_group_name("jdld#+343").is_err());
    }

    #[test]
    fn test_validate_ssh_public_key() {
        assert!(validate_ssh_public_key(SSH_KEY_RSA).is_ok());
        assert!(validate_ssh_public_key("ssh-dss AAAAB3NzaC1kc3M= admin@bastion").is_ok());
        assert!(validate_ssh_public_key(
            "ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTY= ops"
        )
        .is_ok());

        assert!(validate_ssh_public_key("").is_err());
        // no comment
        assert!(validate_ssh_public_key("ssh-rsa AAAAB3NzaC1yc2E").is_err());
        // unsupported key type prefix
        assert!(validate_ssh_public_key("ssh-foo AAAAB3NzaC1yc2E user").is_err());
        assert!(validate_ssh_public_key("xssh-rsa AAAAB3NzaC1yc2E user").is_err());
        // two lines
        let two_lines = format!("{}\n{}", SSH_KEY_RSA, SSH_KEY_RSA);
        let err = validate_ssh_public_key(&two_lines).unwrap_err();
        assert!(err.contains("single line"));
    }

    #[test]
    fn test_validate_environment_name() {
        assert!(validate_environment_name("production").is_ok());
        assert!(validate_environment_name("prod-eu_1").is_ok());

        assert!(validate_environment_name("").is_err());
        assert!(validate_environment_name("on").is_err());
        assert!(validate_environment_name("one two").is_err());
    }

    #[test]
    fn test_validate_host_name() {
        assert!(validate_host_name("web01.example-foobar.com").is_ok());
        assert!(validate_host_name("fobar").is_ok());

        assert!(validate_host_name("").is_err());
        assert_eq!(
            validate_host_name("fds##dfsda").unwrap_err(),
            "Hostname is not valid."
        );
        assert!(validate_host_name(&"a".repeat(156)).is_err());
    }

    #[test]
    fn test_validate_ip_address() {
        assert!(validate_ip_address(None).is_ok());
        assert!(validate_ip_address(Some("10.0.0.1")).is_ok());
        assert!(validate_ip_address(Some("2001:db8::1")).is_ok());
        assert!(validate_ip_address(Some("10.0.0")).is_err());
        assert!(validate_ip_address(Some("web1")).is_err());
    }

    #[test]
    fn test_validate_account_name() {
        assert!(validate_account_name("root").is_ok());
        assert!(validate_account_name("deploy.user-1").is_ok());

        assert!(validate_account_name("r#+oot").is_err());
        assert!(validate_account_name("two words").is_err());
    }

    #[test]
    fn test_validate_group_rule() {
        assert!(validate_group_rule("^web[0-9]+.foobar.com").is_ok());
        assert_eq!(
            validate_group_rule("^web[0-9+.foobar.com").unwrap_err(),
            "Rule not valid"
        );
        assert!(validate_group_rule("").is_err());
        assert!(validate_group_rule(&"a".repeat(33)).is_err());

        // lookaround and backreferences are outside the supported syntax
        assert_eq!(validate_group_rule("^(?!db)web").unwrap_err(), "Rule not valid");
        assert_eq!(validate_group_rule(r"^(web)\1").unwrap_err(), "Rule not valid");
    }
}
