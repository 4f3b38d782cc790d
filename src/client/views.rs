//! Live views: local state kept current by gateway events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::manager::{lock, ConnectionManager, RoomGuard, SubscriptionId};
use crate::models::ServerEvent;
use crate::ws::RoomKey;

/// State folded from server events.
pub trait ViewState: Default + Send + 'static {
    fn apply(&mut self, event: &ServerEvent);
}

/// A view state bound to a manager (and optionally a room) for as long as
/// the value lives. Dropping it unsubscribes and leaves the room.
pub struct LiveView<'a, S: ViewState> {
    manager: &'a ConnectionManager,
    state: Arc<Mutex<S>>,
    subscription: SubscriptionId,
    _room: Option<RoomGuard<'a>>,
}

impl<'a, S: ViewState> LiveView<'a, S> {
    pub fn attach(manager: &'a ConnectionManager, room: Option<RoomKey>) -> Self {
        let state = Arc::new(Mutex::new(S::default()));
        let sink = state.clone();
        let subscription = manager.subscribe(move |event| lock(&sink).apply(event));
        let room = room.map(|room| manager.enter_room(room));
        Self {
            manager,
            state,
            subscription,
            _room: room,
        }
    }

    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        lock(&self.state).clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.state))
    }

    /// Local edits, e.g. marking notifications read.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock(&self.state))
    }
}

impl<S: ViewState> Drop for LiveView<'_, S> {
    fn drop(&mut self) {
        self.manager.unsubscribe(self.subscription);
    }
}

/// Ranking of a hackathon, replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaderboard {
    pub entries: Vec<Value>,
    pub updates: u64,
}

impl ViewState for Leaderboard {
    fn apply(&mut self, event: &ServerEvent) {
        if let ServerEvent::LeaderboardUpdate(update) = event {
            self.entries = update.leaderboard.clone();
            self.updates += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionCounter {
    pub submitted: u64,
    pub scored: u64,
    pub last_scored: Option<Value>,
}

impl ViewState for SubmissionCounter {
    fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::SubmissionNew(_) => self.submitted += 1,
            ServerEvent::SubmissionScored(scored) => {
                self.scored += 1;
                self.last_scored = Some(scored.submission.clone());
            }
            _ => {}
        }
    }
}

fn member_id(member: &Value) -> Option<&str> {
    member.get("id").and_then(Value::as_str)
}

/// Members of one team.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamRoster {
    pub members: Vec<Value>,
}

impl TeamRoster {
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().filter_map(member_id).collect()
    }
}

impl ViewState for TeamRoster {
    fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::TeamMemberNew(added) => {
                let existing = member_id(&added.member)
                    .and_then(|id| self.members.iter().position(|m| member_id(m) == Some(id)));
                match existing {
                    Some(index) => self.members[index] = added.member.clone(),
                    None => self.members.push(added.member.clone()),
                }
            }
            ServerEvent::TeamMemberRemoved(removed) => {
                self.members.retain(|m| member_id(m) != Some(removed.member_id.as_str()));
            }
            ServerEvent::TeamUpdate(update) => {
                if let Some(members) = &update.members {
                    self.members = members.clone();
                }
            }
            _ => {}
        }
    }
}

pub const INBOX_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum InboxItem {
    Notification(Value),
    Invitation(Value),
}

/// Personal notifications and invitations, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationInbox {
    pub items: VecDeque<InboxItem>,
    pub unread: usize,
}

impl NotificationInbox {
    pub fn mark_all_read(&mut self) {
        self.unread = 0;
    }

    fn push(&mut self, item: InboxItem) {
        self.items.push_front(item);
        self.items.truncate(INBOX_CAPACITY);
        self.unread = (self.unread + 1).min(INBOX_CAPACITY);
    }
}

impl ViewState for NotificationInbox {
    fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::NotificationNew(new) => self.push(InboxItem::Notification(new.notification.clone())),
            ServerEvent::InvitationNew(new) => self.push(InboxItem::Invitation(new.invitation.clone())),
            _ => {}
        }
    }
}

pub fn leaderboard<'a>(manager: &'a ConnectionManager, hackathon_id: &str) -> LiveView<'a, Leaderboard> {
    LiveView::attach(manager, Some(RoomKey::hackathon(hackathon_id)))
}

pub fn submissions<'a>(manager: &'a ConnectionManager, hackathon_id: &str) -> LiveView<'a, SubmissionCounter> {
    LiveView::attach(manager, Some(RoomKey::hackathon(hackathon_id)))
}

pub fn team_roster<'a>(manager: &'a ConnectionManager, team_id: &str) -> LiveView<'a, TeamRoster> {
    LiveView::attach(manager, Some(RoomKey::team(team_id)))
}

/// The user's private room is joined by the gateway, so no room here.
pub fn inbox(manager: &ConnectionManager) -> LiveView<'_, NotificationInbox> {
    LiveView::attach(manager, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use serde_json::json;

    fn event(value: Value) -> ServerEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn leaderboard_is_replaced() {
        let mut board = Leaderboard::default();
        board.apply(&event(json!({"event": "leaderboard:update", "data": {"leaderboard": [{"teamId": "a"}]}})));
        board.apply(&event(json!({"event": "leaderboard:update", "data": {"leaderboard": [{"teamId": "b"}, {"teamId": "a"}]}})));
        assert_eq!(board.entries.len(), 2);
        assert_eq!(board.updates, 2);
    }

    #[test]
    fn submission_counter_tracks_latest_score() {
        let mut counter = SubmissionCounter::default();
        counter.apply(&event(json!({"event": "submission:new", "data": {"id": "s1"}})));
        counter.apply(&event(json!({"event": "submission:new", "data": {"id": "s2"}})));
        counter.apply(&event(json!({"event": "submission:scored", "data": {"submission": {"id": "s1", "score": 90}}})));
        assert_eq!(counter.submitted, 2);
        assert_eq!(counter.scored, 1);
        assert_eq!(counter.last_scored, Some(json!({"id": "s1", "score": 90})));
    }

    #[test]
    fn roster_follows_member_events() {
        let mut roster = TeamRoster::default();
        roster.apply(&event(json!({"event": "team:member:new", "data": {"member": {"id": "m1", "role": "MEMBER"}}})));
        roster.apply(&event(json!({"event": "team:member:new", "data": {"member": {"id": "m2"}}})));
        roster.apply(&event(json!({"event": "team:member:new", "data": {"member": {"id": "m1", "role": "LEAD"}}})));
        assert_eq!(roster.member_ids(), vec!["m1", "m2"]);
        assert_eq!(roster.members[0]["role"], "LEAD");

        roster.apply(&event(json!({"event": "team:member:removed", "data": {"memberId": "m1"}})));
        assert_eq!(roster.member_ids(), vec!["m2"]);

        roster.apply(&event(json!({"event": "team:update", "data": {"name": "renamed"}})));
        assert_eq!(roster.member_ids(), vec!["m2"]);
        roster.apply(&event(json!({"event": "team:update", "data": {"members": [{"id": "m3"}]}})));
        assert_eq!(roster.member_ids(), vec!["m3"]);
    }

    #[test]
    fn inbox_is_newest_first_and_capped() {
        let mut inbox = NotificationInbox::default();
        for i in 0..(INBOX_CAPACITY + 5) {
            inbox.apply(&event(json!({"event": "notification:new", "data": {"notification": {"n": i}}})));
        }
        inbox.apply(&event(json!({"event": "invitation:new", "data": {"invitation": {"teamId": "t1"}}})));

        assert_eq!(inbox.items.len(), INBOX_CAPACITY);
        assert_eq!(inbox.items[0], InboxItem::Invitation(json!({"teamId": "t1"})));
        assert_eq!(inbox.items[1], InboxItem::Notification(json!({"n": INBOX_CAPACITY + 4})));
        assert_eq!(inbox.unread, INBOX_CAPACITY);

        inbox.mark_all_read();
        assert_eq!(inbox.unread, 0);
    }

    #[test]
    fn live_view_holds_room_and_subscription() {
        let manager = ConnectionManager::new(ClientConfig::default());
        {
            let view = team_roster(&manager, "t1");
            assert_eq!(manager.rooms(), vec![RoomKey::team("t1")]);

            manager.inject(r#"{"event":"team:member:new","data":{"member":{"id":"m1"}}}"#);
            assert_eq!(view.with(|roster| roster.members.len()), 1);
        }
        assert!(manager.rooms().is_empty());

        // Nothing listens any more
        manager.inject(r#"{"event":"team:member:new","data":{"member":{"id":"m2"}}}"#);
    }

    #[test]
    fn inbox_view_supports_local_updates() {
        let manager = ConnectionManager::new(ClientConfig::default());
        let view = inbox(&manager);
        manager.inject(r#"{"event":"notification:new","data":{"notification":{"title":"Scored"}}}"#);
        assert_eq!(view.snapshot().unread, 1);
        view.update(NotificationInbox::mark_all_read);
        assert_eq!(view.with(|inbox| inbox.unread), 0);
        assert!(manager.rooms().is_empty());
    }
}
