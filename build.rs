fn main() {
    println!("cargo:rerun-if-changed=station.env");

    // Host builds (tests, fuzzing) run without the ESP-IDF toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
