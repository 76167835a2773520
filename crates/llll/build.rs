// Build script for llll - embeds version at compile time

fn main() {
    // Release builds may stamp a version; otherwise use Cargo.toml
    let version =
        std::env::var("LLLL_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=LLLL_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=LLLL_VERSION");
}
