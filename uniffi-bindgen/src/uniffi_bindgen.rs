//! Generates Swift and Kotlin bindings for `sessionvault-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
