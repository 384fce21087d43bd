fn main() {
    if let Err(e) = tileos_lib::run() {
        eprintln!("tileos: {e}");
        std::process::exit(1);
    }
}
