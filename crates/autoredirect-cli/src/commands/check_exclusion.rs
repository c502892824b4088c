use crate::support::{or_exit, print_json};
use autoredirect_core::RedirectConfig;
use autoredirect_http::BookStore;
use serde_json::json;

/// Route rules are resolved against the demo application's routes.
pub fn run(config: &RedirectConfig, path: &str, json_output: bool) {
    let routes = BookStore::route_table();
    let excluded = match config.exclusions() {
        Some(rule) => or_exit(rule.matches(path, &routes), "exclusion check failed"),
        None => false,
    };

    if json_output {
        print_json(&json!({
            "path": path,
            "excluded": excluded,
            "rulesConfigured": config.exclusions().is_some(),
        }));
    } else if excluded {
        println!("{path}: excluded");
    } else {
        println!("{path}: allowed");
    }
}
