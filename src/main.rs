fn main() {
    if let Err(e) = bavard::cli::main() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
