/// Print version and build provenance.
pub fn cmd_info() {
    println!("Passage {}", env!("CARGO_PKG_VERSION"));
    println!("  build date: {}", env!("BUILD_DATE"));
    println!("  git commit: {}", env!("GIT_HASH"));
}
