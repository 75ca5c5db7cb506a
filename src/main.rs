fn main() {
    std::process::exit(pmdcheck::cli::run());
}
