fn main() {
    if lib_vsk::init().is_err() {
        std::process::exit(1);
    }
}
