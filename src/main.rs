fn main() {
    if let Err(err) = tourview::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
