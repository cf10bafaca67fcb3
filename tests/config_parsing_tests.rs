use server_proxy::config::{Config, FromYaml, HostConfig};
use server_proxy::error::CleanError;

fn err_to_str(e: CleanError) -> String {
    format!("{}", e)
}

#[test]
fn parses_top_level_listen_address() {
    let yaml = "
host: 0.0.0.0
port: 8080
hosts:
  - server_name: _
    home_dir: ./www
";
    let config = Config::from_str(yaml).unwrap();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.hosts.len(), 1);
    assert_eq!(config.hosts[0].home_dir, "./www");
}

#[test]
fn parses_multiple_host_blocks_with_aliases_and_error_pages() {
    let yaml = r#"
host: 127.0.0.1
port: 9090
hosts:
  - server_name: a.example.com
    home_dir: ./a
    cgi_dir: /cgi-bin
    client_max_body_size: 2048
    aliases:
      /old: /new
    error_pages:
      404: /a/404.html
  - server_name: _
    home_dir: ./default
"#;
    let config = Config::from_str(yaml).unwrap();
    assert_eq!(config.hosts.len(), 2);

    let a = &config.hosts[0];
    assert_eq!(a.server_name, "a.example.com");
    assert_eq!(a.cgi_dir, "/cgi-bin");
    assert_eq!(a.client_max_body_size, 2048);
    assert_eq!(a.aliases.get("/old"), Some(&"/new".to_string()));
    assert_eq!(a.error_pages.get(&404), Some(&"/a/404.html".to_string()));

    assert!(config.hosts[1].is_wildcard());
}

#[test]
fn default_values_apply_when_fields_are_absent() {
    let yaml = "server_name: only_field_set";
    let host = HostConfig::from_str(yaml).unwrap();
    assert_eq!(host.home_dir, "");
    assert_eq!(host.cgi_dir, "");
    assert!(host.error_pages.is_empty());
    assert_eq!(host.client_max_body_size, 1_048_576);
}

#[test]
fn missing_colon_is_a_parse_error() {
    let yaml = r#"
hosts:
  - server_name "a"
"#;
    let err = err_to_str(Config::from_str(yaml).unwrap_err());
    assert!(err.contains("Expected"));
}

#[test]
fn type_mismatch_reports_the_underlying_parse_failure() {
    let yaml = r#"
hosts:
  - client_max_body_size: "not a number"
"#;
    let err = err_to_str(Config::from_str(yaml).unwrap_err());
    assert!(err.contains("invalid digit found in string"));
}

#[test]
fn resolve_falls_back_to_wildcard_host() {
    let mut config = Config::default();
    let mut specific = HostConfig::default();
    specific.server_name = "a.example.com".to_string();
    let mut wildcard = HostConfig::default();
    wildcard.server_name = "_".to_string();
    config.hosts.push(specific);
    config.hosts.push(wildcard);

    assert_eq!(
        config.resolve(Some("a.example.com:8080")).unwrap().server_name,
        "a.example.com"
    );
    assert_eq!(config.resolve(Some("unknown.example.com")).unwrap().server_name, "_");
    assert_eq!(config.resolve(None).unwrap().server_name, "_");
}
