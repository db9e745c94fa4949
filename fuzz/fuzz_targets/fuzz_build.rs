#![no_main]
use libfuzzer_sys::fuzz_target;
use truthmaker_engine::{CheckMode, HyperintensionalTheory, ModelConstraints, Settings, Theory};
use truthmaker_syntax::parse_argument;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let Ok(theory) = HyperintensionalTheory::new() else {
            return;
        };
        if let Ok(syntax) = parse_argument(&[s], &["p"], theory.registry()) {
            let settings = Settings {
                n: 2,
                ..theory.default_settings()
            };
            let _ = ModelConstraints::build(&theory, syntax, &settings, CheckMode::Countermodel);
        }
    }
});
