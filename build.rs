use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // Version string reported by the programmer console
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    println!("cargo:rustc-env=BUILD_EPOCH={}", epoch);

    // Configure for ATmega328P only when actually targeting AVR; host builds run the tests
    let target = env::var("TARGET").unwrap_or_default();
    if target.contains("avr") {
        println!("cargo:rustc-link-arg=-mmcu=atmega328p");
        // 2048-word boot section
        println!("cargo:rustc-link-arg-bin=bootloader=-Wl,--section-start=.text=0x7000");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
