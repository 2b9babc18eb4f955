fn main() {
    shakecast_lib::run()
}
