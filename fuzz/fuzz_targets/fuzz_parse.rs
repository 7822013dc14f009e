#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Neither the parser nor the translator may panic on any input.
        let _ = soarta_dsl::parse(s, "fuzz.soar");
        let _ = soarta_engine::pipeline::translate_source(
            s,
            "fuzz.soar",
            &soarta_engine::pipeline::TranslateOptions::default(),
        );
    }
});
