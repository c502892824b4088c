use autoredirect_core::RedirectConfig;
use autoredirect_http::{BookStore, HttpServerConfig, serve};
use std::net::SocketAddr;
use std::process;

pub fn run(config: RedirectConfig, bind: &str) {
    let bind_addr: SocketAddr = bind.parse().unwrap_or_else(|e| {
        eprintln!("error: invalid --bind address `{bind}`: {e}");
        process::exit(1);
    });

    println!("autoredirect serve");
    println!("  bind: {bind_addr}");
    println!("  default target: {}", config.default_target());
    println!("  routes:");
    println!("    GET  /");
    println!("    GET  /books/show/:id");
    println!("    POST /comments/create");
    println!("    GET  /login/login_form");
    println!("    POST /login/process_login   (password: secret)");

    let app = BookStore::new(config);
    if let Err(e) = serve(HttpServerConfig { bind: bind_addr }, &app) {
        eprintln!("error: demo server failed: {e}");
        process::exit(1);
    }
}
