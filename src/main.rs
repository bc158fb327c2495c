fn main() {
    ili_align::cli::run();
}
