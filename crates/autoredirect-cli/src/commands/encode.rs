use crate::support::{or_exit, parse_method_or_exit, parse_params_or_exit};
use autoredirect_core::{RedirectConfig, RedirectDescriptor};

pub fn run_url(config: &RedirectConfig, url: String) {
    let descriptor = RedirectDescriptor::url(url);
    println!("{}", or_exit(descriptor.save(config.envelope()), "encode failed"));
}

pub fn run_operation(
    config: &RedirectConfig,
    operation: String,
    action: String,
    method: &str,
    params: &[String],
) {
    let descriptor = RedirectDescriptor::operation(
        operation,
        action,
        parse_params_or_exit(params),
        parse_method_or_exit(method),
    );
    println!("{}", or_exit(descriptor.save(config.envelope()), "encode failed"));
}
