#![no_main]

use libfuzzer_sys::fuzz_target;
use weather_proxy::{Authenticator, Credentials};

fuzz_target!(|data: &[u8]| {
    let Ok(header) = std::str::from_utf8(data) else {
        return;
    };

    let auth = Authenticator::new(Credentials::new("admin", "secret"));
    if auth.authenticate(Some(header)).is_ok() {
        // Only a payload decoding to exactly "admin:secret" may pass.
        let payload = header.split(' ').nth(1).unwrap_or_default();
        assert_eq!(payload, "YWRtaW46c2VjcmV0");
    }
});
