use tracing::debug;

use crate::models::ServerEvent;
use crate::ws::ConnCtx;

/// Handle `ping` - reply with `pong`.
pub fn handle_ping_message(conn: &ConnCtx) {
    debug!("Ping received on connection {}", conn.id);
    if !conn.send(&ServerEvent::Pong) {
        debug!("Failed to queue pong for connection {}", conn.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::Outbound;
    use tokio::sync::mpsc;

    #[test]
    fn replies_with_pong() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnCtx::new("u1", tx);
        handle_ping_message(&conn);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text(r#"{"event":"pong"}"#.to_string()));
    }
}
