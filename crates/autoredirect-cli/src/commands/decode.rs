use crate::support::{or_exit, print_json};
use autoredirect_core::{Envelope, RedirectConfig, RedirectDescriptor};
use serde_json::{Value, json};

pub fn run(config: &RedirectConfig, token: &str, raw: bool, json_output: bool) {
    let envelope = config.envelope();
    if raw {
        let record = or_exit(envelope.open_text(token), "decode failed");
        println!("{}", String::from_utf8_lossy(&record));
        return;
    }

    let descriptor = or_exit(RedirectDescriptor::load(Some(token), envelope), "decode failed");
    if json_output {
        print_json(&descriptor_json(&descriptor, envelope));
    } else {
        print_descriptor(&descriptor, envelope, 0);
    }
}

fn descriptor_json(descriptor: &RedirectDescriptor, envelope: &Envelope) -> Value {
    match descriptor {
        RedirectDescriptor::Url(target) => json!({
            "kind": "url",
            "method": descriptor.method().as_str(),
            "url": target.url,
        }),
        RedirectDescriptor::Operation(op) => {
            let (rest, nested) = op.parameters.split_nested_token();
            let nested = match nested {
                None => Value::Null,
                Some(token) => match RedirectDescriptor::load(Some(&token), envelope) {
                    Ok(inner) => descriptor_json(&inner, envelope),
                    Err(e) => json!({ "error": e.to_string() }),
                },
            };
            json!({
                "kind": "operation",
                "method": op.method.as_str(),
                "operationId": op.operation_id,
                "actionId": op.action_id,
                "parameters": serde_json::to_value(&rest).unwrap_or(Value::Null),
                "nested": nested,
            })
        }
    }
}

fn print_descriptor(descriptor: &RedirectDescriptor, envelope: &Envelope, depth: usize) {
    let indent = "  ".repeat(depth);
    match descriptor {
        RedirectDescriptor::Url(target) => {
            println!("{indent}url: {} ({})", target.url, descriptor.method());
        }
        RedirectDescriptor::Operation(op) => {
            println!(
                "{indent}operation: {}/{} ({})",
                op.operation_id, op.action_id, op.method
            );
            let (rest, nested) = op.parameters.split_nested_token();
            for (name, value) in rest.flatten() {
                println!("{indent}  {name} = {value}");
            }
            if let Some(token) = nested {
                println!("{indent}nested:");
                match RedirectDescriptor::load(Some(&token), envelope) {
                    Ok(inner) => print_descriptor(&inner, envelope, depth + 1),
                    Err(e) => println!("{indent}  <{e}>"),
                }
            }
        }
    }
}
