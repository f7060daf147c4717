#![no_main]

use genverify_script::Interpreter;
use libfuzzer_sys::fuzz_target;

// Any input must finish within the step budget without panicking.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut interp = Interpreter::new().with_step_limit(50_000).with_max_call_depth(64);
        interp.define_function("alert", |_| genverify_script::Value::Undefined);
        let _ = interp.run(s);
        for _ in 0..16 {
            if interp.run_next_timer().is_none() {
                break;
            }
        }
    }
});
