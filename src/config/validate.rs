use std::collections::{HashMap, HashSet};
use crate::config::types::{Config, HostConfig};

/// Drops host blocks that conflict with another block or reference files/
/// directories that don't exist, logging each drop. Returns the config with
/// only the surviving blocks.
pub fn validate_config(mut config: Config) -> Config {
    let mut drop_indices = HashSet::new();

    // 1. Duplicate server_name (exact match, including more than one wildcard).
    let mut name_usage: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, host) in config.hosts.iter().enumerate() {
        name_usage.entry(host.server_name.clone()).or_default().push(idx);
    }
    for (name, indices) in name_usage {
        if indices.len() > 1 {
            println!(
                "❌ \x1b[1;31mConflict detected:\x1b[0m multiple host blocks named '{}'. Dropping conflicting blocks.",
                name
            );
            drop_indices.extend(indices);
        }
    }

    // 2. File/directory existence.
    for (idx, host) in config.hosts.iter().enumerate() {
        let mut valid = true;

        if !host.home_dir.is_empty() && std::fs::read_dir(&host.home_dir).is_err() {
            println!(
                "❌ \x1b[1;31mDirectory error:\x1b[0m host '{}' refers to invalid home_dir '{}'.",
                host.server_name, host.home_dir
            );
            valid = false;
        }

        if !host.cgi_dir.is_empty() && !host.home_dir.is_empty() {
            let cgi_path = std::path::Path::new(&host.home_dir).join(host.cgi_dir.trim_start_matches('/'));
            if std::fs::read_dir(&cgi_path).is_err() {
                println!(
                    "❌ \x1b[1;31mDirectory error:\x1b[0m host '{}' refers to invalid cgi_dir '{}'.",
                    host.server_name, host.cgi_dir
                );
                valid = false;
            }
        }

        for (code, path) in &host.error_pages {
            if *code < 100 || *code > 599 {
                println!(
                    "❌ \x1b[1;31mInvalid status code:\x1b[0m host '{}' has invalid error page code {}.",
                    host.server_name, code
                );
                valid = false;
            }
            if std::fs::File::open(path).is_err() {
                println!(
                    "❌ \x1b[1;31mFile error:\x1b[0m host '{}' refers to missing error page '{}' for code {}.",
                    host.server_name, path, code
                );
                valid = false;
            }
        }

        if !valid {
            drop_indices.insert(idx);
        }
    }

    if !drop_indices.is_empty() {
        println!(
            "⚠️ \x1b[33mResult:\x1b[0m {} host block(s) dropped due to conflicts.",
            drop_indices.len()
        );
    }

    config.hosts = config
        .hosts
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !drop_indices.contains(idx))
        .map(|(_, h)| h)
        .collect();

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_host(name: &str) -> HostConfig {
        let mut h = HostConfig::default();
        h.server_name = name.to_string();
        h
    }

    fn config_with(hosts: Vec<HostConfig>) -> Config {
        Config {
            hosts,
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_no_conflicts() {
        let config = config_with(vec![make_host("a.example.com"), make_host("b.example.com")]);
        let valid = validate_config(config);
        assert_eq!(valid.hosts.len(), 2);
    }

    #[test]
    fn test_validate_conflict_drops_both() {
        let config = config_with(vec![
            make_host("same.com"),
            make_host("same.com"),
            make_host("other.com"),
        ]);
        let valid = validate_config(config);
        assert_eq!(valid.hosts.len(), 1);
        assert_eq!(valid.hosts[0].server_name, "other.com");
    }

    #[test]
    fn test_validate_invalid_status_code() {
        let mut host = make_host("s1");
        host.error_pages.insert(99, "exists".to_string());
        let valid = validate_config(config_with(vec![host]));
        assert_eq!(valid.hosts.len(), 0);
    }

    #[test]
    fn test_validate_missing_error_page() {
        let mut host = make_host("s1");
        host.error_pages.insert(404, "/non/existent/path/err.html".to_string());
        let valid = validate_config(config_with(vec![host]));
        assert_eq!(valid.hosts.len(), 0);
    }

    #[test]
    fn test_validate_missing_home_dir() {
        let mut host = make_host("s1");
        host.home_dir = "/non/existent/dir".to_string();
        let valid = validate_config(config_with(vec![host]));
        assert_eq!(valid.hosts.len(), 0);
    }

    #[test]
    fn test_validate_valid_files() {
        let temp_dir = std::env::temp_dir();
        let file_path = temp_dir.join("server_proxy_test_err.html");
        std::fs::write(&file_path, "error").unwrap();

        let mut host = make_host("s1");
        host.home_dir = temp_dir.to_str().unwrap().to_string();
        host.error_pages.insert(404, file_path.to_str().unwrap().to_string());

        let valid = validate_config(config_with(vec![host]));
        assert_eq!(valid.hosts.len(), 1);

        let _ = std::fs::remove_file(file_path);
    }

    #[test]
    fn test_validate_wildcard_default_survives() {
        let config = config_with(vec![make_host("_"), make_host("example.com")]);
        let valid = validate_config(config);
        assert_eq!(valid.hosts.len(), 2);
        assert!(valid.hosts.iter().any(|h| h.is_wildcard()));
    }
}
