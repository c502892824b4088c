use autoredirect_core::{Parameters, RedirectConfig, RedirectError, RedirectMethod};
use autoredirect_http::request::params_from_pairs;
use serde_json::Value;
use std::path::Path;

pub fn load_config_or_exit(path: Option<&Path>) -> RedirectConfig {
    RedirectConfig::load(path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn parse_method_or_exit(method: &str) -> RedirectMethod {
    method.parse().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// `KEY=VALUE` arguments as parameters; `comment[body]=x` nests.
pub fn parse_params_or_exit(args: &[String]) -> Parameters {
    let mut pairs = Vec::with_capacity(args.len());
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            eprintln!("error: invalid --param `{arg}`; expected KEY=VALUE");
            std::process::exit(1);
        };
        pairs.push((key.to_string(), value.to_string()));
    }
    params_from_pairs(pairs)
}

pub fn or_exit<T>(result: Result<T, RedirectError>, context: &str) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: {context}: {e}");
        std::process::exit(1);
    })
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render JSON: {e}");
            std::process::exit(1);
        }
    }
}
