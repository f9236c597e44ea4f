fn main() {
    #[cfg(feature = "cli")]
    snapwire::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("snapwire: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
