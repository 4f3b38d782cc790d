use std::collections::HashMap;

/// Per-user count of open connections.
#[derive(Debug, Default)]
pub struct PresenceSet {
    counts: HashMap<String, usize>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns true when the user just came online.
    pub fn connect(&mut self, user_id: &str) -> bool {
        let count = self.counts.entry(user_id.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Record a closed connection. Returns true when the user just went offline.
    /// Unknown users are ignored so the count never goes negative.
    pub fn disconnect(&mut self, user_id: &str) -> bool {
        match self.counts.get_mut(user_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(user_id);
                true
            }
            None => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.counts.contains_key(user_id)
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.counts.get(user_id).copied().unwrap_or(0)
    }

    /// Online user ids, sorted.
    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.counts.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
