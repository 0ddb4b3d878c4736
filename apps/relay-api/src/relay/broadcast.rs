//! Room-scoped fan-out of relay events.

use std::sync::Arc;

use super::events::ServerFrame;
use super::registry::ConnectionRegistry;

/// Delivers one outbound frame to every member of a room. Cloneable — store
/// in AppState.
#[derive(Clone)]
pub struct RoomBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `frame` to every connection currently joined to `room_id`,
    /// optionally excluding one (the join notification excludes the joiner;
    /// chat and delete frames reach the whole room, sender included).
    ///
    /// A recipient whose receiver is already gone is silently skipped — the
    /// transport loop reports the disconnect through `unregister`, not here.
    pub fn broadcast_to_room(&self, room_id: &str, frame: &ServerFrame, exclude: Option<&str>) {
        self.registry.for_each_member(room_id, |connection_id, sender| {
            if exclude == Some(connection_id) {
                return;
            }
            let _ = sender.send(frame.clone());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::events::EventName;
    use tokio::sync::mpsc;

    fn setup() -> (
        Arc<ConnectionRegistry>,
        RoomBroadcaster,
        mpsc::UnboundedReceiver<ServerFrame>,
        mpsc::UnboundedReceiver<ServerFrame>,
    ) {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = RoomBroadcaster::new(registry.clone());

        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        registry.register("conn_a", tx_a);
        registry.register("conn_b", tx_b);
        registry.join("conn_a", "ses_1");
        registry.join("conn_b", "ses_1");

        (registry, broadcaster, rx_a, rx_b)
    }

    fn event_frame() -> ServerFrame {
        ServerFrame::dispatch(EventName::USER_LEFT, serde_json::json!({ "user_id": "usr_x" }))
    }

    #[test]
    fn reaches_every_member() {
        let (_registry, broadcaster, mut rx_a, mut rx_b) = setup();

        broadcaster.broadcast_to_room("ses_1", &event_frame(), None);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn exclusion_skips_the_originator() {
        let (_registry, broadcaster, mut rx_a, mut rx_b) = setup();

        broadcaster.broadcast_to_room("ses_1", &event_frame(), Some("conn_a"));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn never_reaches_other_rooms() {
        let (registry, broadcaster, mut rx_a, _rx_b) = setup();

        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        registry.register("conn_c", tx_c);
        registry.join("conn_c", "ses_2");

        broadcaster.broadcast_to_room("ses_2", &event_frame(), None);

        assert!(rx_c.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn dead_receiver_is_silently_skipped() {
        let (_registry, broadcaster, rx_a, mut rx_b) = setup();

        drop(rx_a);
        broadcaster.broadcast_to_room("ses_1", &event_frame(), None);

        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn unknown_room_is_a_no_op() {
        let (_registry, broadcaster, mut rx_a, mut rx_b) = setup();

        broadcaster.broadcast_to_room("ses_unknown", &event_frame(), None);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn unregistered_connection_receives_nothing_afterwards() {
        let (registry, broadcaster, mut rx_a, mut rx_b) = setup();

        registry.unregister("conn_a");
        broadcaster.broadcast_to_room("ses_1", &event_frame(), None);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
