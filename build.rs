fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Package version and build time for the health endpoint
    built::write_built_file().expect("Failed to acquire build-time information");
}
