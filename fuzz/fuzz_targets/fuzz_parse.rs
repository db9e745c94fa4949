#![no_main]
use libfuzzer_sys::fuzz_target;
use truthmaker_syntax::{parse_argument, Connective, OperatorRegistry};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let Ok(registry) = OperatorRegistry::with_standard(&Connective::ALL) else {
            return;
        };
        // Any input either parses or reports a positioned error.
        let premises: Vec<&str> = s.split('\n').collect();
        let _ = parse_argument(&premises, &[] as &[&str], &registry);
    }
});
