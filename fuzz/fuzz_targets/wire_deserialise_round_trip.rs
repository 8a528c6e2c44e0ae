#![no_main]
use libfuzzer_sys::fuzz_target;

use dns_wire::protocol::error::ErrorKind;
use dns_wire::protocol::types::Message;

fuzz_target!(|data: &[u8]| {
    if let Ok(deserialised) = Message::from_octets(data) {
        match deserialised.to_octets() {
            Ok(serialised) => {
                let re_deserialised = Message::from_octets(&serialised);
                assert_eq!(Ok(deserialised), re_deserialised);
            }
            // a pointer into the header, or to a name sharing no more
            // than a top-level domain, has nothing to compress against
            Err(err) => assert!(
                matches!(err.kind, ErrorKind::NoCompressionTarget { .. }),
                "{err}"
            ),
        }
    }
});
