//! Property-Based Tests for the MCP endpoint
//!
//! # Test Strategies
//!
//! - **Robustness**: arbitrary bytes never panic the dispatcher and always get
//!   a well-formed JSON-RPC reply
//! - **Id echo**: every request with an id is answered with that same id
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib mcp::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::app::Kick;
use crate::config::KickConfig;
use crate::mcp::server::handle_message;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn kick() -> Kick {
    Kick::from_config(KickConfig::default()).unwrap()
}

fn arb_id() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9-]{1,16}".prop_map(Value::String),
        Just(Value::Null),
    ]
}

fn arb_method() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("initialize".to_string()),
        Just("ping".to_string()),
        Just("tools/list".to_string()),
        "[a-z/_]{1,20}",
    ]
}

proptest! {
    #[test]
    fn prop_arbitrary_bytes_get_a_reply(body in prop::collection::vec(any::<u8>(), 0..256)) {
        let kick = kick();
        let reply = runtime().block_on(handle_message(&kick, &body));

        // Bytes that happen to decode as a notification are the only silent case
        if let Some(reply) = reply {
            prop_assert_eq!(reply.jsonrpc.as_str(), "2.0");
            prop_assert!(reply.result.is_some() != reply.error.is_some());
        }
    }

    #[test]
    fn prop_reply_echoes_id(id in arb_id(), method in arb_method()) {
        let kick = kick();
        let body = json!({"jsonrpc": "2.0", "id": id.clone(), "method": method}).to_string();

        let reply = runtime().block_on(handle_message(&kick, body.as_bytes()));
        let reply = reply.unwrap();
        prop_assert_eq!(reply.id, id);
    }
}
