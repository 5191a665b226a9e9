use std::env::vars;

use dotenvy::dotenv;

const ENV_PREFIXES: [&str; 2] = ["CHECKER_", "RUST_LOG"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    dotenv().ok();

    for (k, v) in vars().filter(|(k, _)| ENV_PREFIXES.iter().any(|prefix| k.starts_with(prefix))) {
        println!("cargo:rustc-env={k}={v}");
    }
}
