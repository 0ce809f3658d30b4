//! Property test for the base-station byte-stuffed framing codec (P3): any payload,
//! once escaped, framed, given a trailer byte and fed back through the decoder byte
//! by byte, broadcasts exactly the original payload.

use arbiter::base::{encode_frame, BaseCodec, BaseEvent};
use arbiter::state::SharedState;
use proptest::prelude::*;

proptest! {
    #[test]
    fn framing_roundtrips_for_any_payload(payload in prop::collection::vec(any::<u8>(), 1..4095)) {
        let shared = SharedState::new();
        let mut codec = BaseCodec::new();

        let mut framed = encode_frame(&payload);
        // Insert an arbitrary trailer byte the decoder strips before broadcasting.
        framed.insert(framed.len() - 1, 0x7e);

        let mut events = Vec::new();
        for byte in framed {
            let event = codec.feed(&shared, byte).unwrap();
            if event != BaseEvent::None {
                events.push(event);
            }
        }

        prop_assert_eq!(events, vec![BaseEvent::Broadcast(payload)]);
    }
}
