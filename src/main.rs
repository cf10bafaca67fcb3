use getopts::Options;
use server_proxy::config::{Config, FromYaml, display_config, validate_config};
use server_proxy::error::Result;
use server_proxy::Server;
use server_proxy::prelude::{errors, info};

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn run() -> Result<i32> {
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("c", "config", "Path to the YAML config file.", "FILE");
    opts.optopt("l", "listen", "Override the listen host.", "HOST");
    opts.optopt("p", "port", "Override the listen port.", "PORT");
    opts.optflag("h", "help", "Print this help menu.");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            print_usage(&program, opts);
            return Err(f.to_string().into());
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, opts);
        return Ok(0);
    }

    let config_path = matches.opt_str("c").unwrap_or_else(|| "config.yaml".to_string());
    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("reading config '{}': {}", config_path, e))?;
    let config = Config::from_str(&content)?;
    let config = validate_config(config);

    let host = matches.opt_str("l").unwrap_or_else(|| config.host.clone());
    let port = match matches.opt_str("p") {
        Some(p) => p.parse::<u16>().map_err(|e| format!("invalid --port '{}': {}", p, e))?,
        None => config.port,
    };

    display_config(&config);
    info!("listening on {}:{}", host, port);

    let mut server = Server::new(config, &host, port)?;
    server.run()?;
    Ok(0)
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            errors!("{}", e);
            std::process::exit(1);
        }
    }
}
