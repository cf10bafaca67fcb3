use std::fmt;
use crate::config::types::{Config, HostConfig};

impl fmt::Display for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  \x1b[38;5;244m───────────────────────────────────────────────\x1b[0m"
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mHost:\x1b[0m        \x1b[36m{}\x1b[0m{}",
            self.server_name,
            if self.is_wildcard() { " \x1b[38;5;244m(wildcard default)\x1b[0m" } else { "" }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mHome dir:\x1b[0m    \x1b[32m{}\x1b[0m",
            if self.home_dir.is_empty() { "<none>" } else { &self.home_dir }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mCGI dir:\x1b[0m     \x1b[38;5;208m{}\x1b[0m",
            if self.cgi_dir.is_empty() { "<disabled>" } else { &self.cgi_dir }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mProxy:\x1b[0m       \x1b[35m{}\x1b[0m",
            if self.proxy_host.is_empty() { "<disabled>" } else { &self.proxy_host }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mBody limit:\x1b[0m  \x1b[33m{} KB\x1b[0m",
            self.client_max_body_size / 1024
        )?;

        if !self.aliases.is_empty() {
            writeln!(f, "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mAliases:\x1b[0m")?;
            for (from, to) in &self.aliases {
                writeln!(f, "    \x1b[38;5;244m{}\x1b[0m → \x1b[36m{}\x1b[0m", from, to)?;
            }
        }

        if !self.error_pages.is_empty() {
            writeln!(f, "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mError pages:\x1b[0m")?;
            for (code, path) in &self.error_pages {
                writeln!(f, "    \x1b[38;5;244m{:4}\x1b[0m → \x1b[31m{}\x1b[0m", code, path)?;
            }
        }
        Ok(())
    }
}

pub fn display_config(config: &Config) {
    println!("\n\x1b[1;35m 🌐 SERVER CONFIGURATION DASHBOARD\x1b[0m");
    println!(
        "\x1b[38;5;240m ════════════════════════════════════════════════════════════════\x1b[0m"
    );
    println!(
        "  \x1b[1;37mListening on:\x1b[0m \x1b[32m{}:{}\x1b[0m",
        config.host, config.port
    );
    for (i, host) in config.hosts.iter().enumerate() {
        println!("\n  \x1b[1;37mHOST BLOCK {:02}\x1b[0m", i + 1);
        print!("{}", host);
    }
    println!(
        "\n\x1b[38;5;240m ════════════════════════════════════════════════════════════════\x1b[0m"
    );
    println!(" \x1b[1;32m✔\x1b[0m Configuration loaded successfully - Ready for requests!\n");
}
