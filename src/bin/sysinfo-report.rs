fn main() {
    if let Err(err) = reconkit::cli::sysinfo::run() {
        reconkit::ui::eprintln_error(&err);
        std::process::exit(reconkit::exit::exit_code(&err));
    }
}
