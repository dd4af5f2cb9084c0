//! Stream registry: local identity → current remote identity and config.
//!
//! Two indices are kept in lockstep: `streams` (local → entry) and
//! `by_remote` (remote → local, for routing pushes). Every method mutates
//! both or neither. The registry lives inside the session's state mutex, so a
//! reader never sees a half-applied recovery.

use std::collections::{BTreeMap, HashMap};

use crate::stream::{LocalStreamId, RemoteStreamId, StreamConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamEntry {
    pub config: StreamConfig,
    pub remote_id: RemoteStreamId,
    /// Connection version that issued `remote_id`.
    pub issued_under: u64,
    /// Caller asked to close; hidden from sends and recovery until the
    /// voice-end reply removes the entry.
    pub closing: bool,
}

/// Per-stream result of one recovery commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecoveryOutcome {
    Recovered {
        local_id: LocalStreamId,
        old_remote: RemoteStreamId,
        new_remote: RemoteStreamId,
    },
    Dropped {
        local_id: LocalStreamId,
        code: u32,
    },
    /// Recreated on the server, but the caller closed it meanwhile.
    Orphaned {
        local_id: LocalStreamId,
        remote_id: RemoteStreamId,
    },
}

#[derive(Debug)]
pub(crate) struct StreamRegistry {
    next_id: u64,
    streams: BTreeMap<LocalStreamId, StreamEntry>,
    by_remote: HashMap<RemoteStreamId, LocalStreamId>,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self {
            next_id: 1,
            streams: BTreeMap::new(),
            by_remote: HashMap::new(),
        }
    }
}

impl StreamRegistry {
    /// Hand out the next local identity. Never reused.
    pub fn allocate(&mut self) -> LocalStreamId {
        let id = LocalStreamId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(
        &mut self,
        local_id: LocalStreamId,
        config: StreamConfig,
        remote_id: RemoteStreamId,
        issued_under: u64,
    ) {
        if let Some(previous) = self.streams.insert(
            local_id,
            StreamEntry {
                config,
                remote_id,
                issued_under,
                closing: false,
            },
        ) {
            self.by_remote.remove(&previous.remote_id);
        }
        self.by_remote.insert(remote_id, local_id);
    }

    /// Remote id to send voice against and the connection that issued it,
    /// if the stream is open.
    pub fn sendable(&self, local_id: LocalStreamId) -> Option<(RemoteStreamId, u64)> {
        self.streams
            .get(&local_id)
            .filter(|entry| !entry.closing)
            .map(|entry| (entry.remote_id, entry.issued_under))
    }

    /// Mark a stream closing and return the remote id to end together with
    /// the connection version that issued it.
    pub fn begin_close(&mut self, local_id: LocalStreamId) -> Option<(RemoteStreamId, u64)> {
        let entry = self.streams.get_mut(&local_id)?;
        if entry.closing {
            return None;
        }
        entry.closing = true;
        Some((entry.remote_id, entry.issued_under))
    }

    pub fn remove(&mut self, local_id: LocalStreamId) -> Option<StreamEntry> {
        let entry = self.streams.remove(&local_id)?;
        if self.by_remote.get(&entry.remote_id) == Some(&local_id) {
            self.by_remote.remove(&entry.remote_id);
        }
        Some(entry)
    }

    pub fn local_for_remote(&self, remote_id: RemoteStreamId) -> Option<LocalStreamId> {
        self.by_remote.get(&remote_id).copied()
    }

    pub fn remote_for_local(&self, local_id: LocalStreamId) -> Option<RemoteStreamId> {
        self.streams.get(&local_id).map(|entry| entry.remote_id)
    }

    /// Open streams that must be recreated after a reconnect.
    pub fn recovery_snapshot(&self) -> Vec<(LocalStreamId, StreamConfig)> {
        self.streams
            .iter()
            .filter(|(_, entry)| !entry.closing)
            .map(|(id, entry)| (*id, entry.config.clone()))
            .collect()
    }

    /// Apply every staged recovery result in one step.
    ///
    /// Successes swap in the new remote id under both indices; failures drop
    /// the stream entirely. Streams not named in `staged` are left alone.
    pub fn commit_recovery(
        &mut self,
        staged: Vec<(LocalStreamId, Result<RemoteStreamId, u32>)>,
        version: u64,
    ) -> Vec<RecoveryOutcome> {
        let mut outcomes = Vec::with_capacity(staged.len());

        for (local_id, result) in staged {
            match result {
                Ok(new_remote) => match self.streams.get(&local_id) {
                    Some(entry) if !entry.closing => {
                        let old_remote = entry.remote_id;
                        let config = entry.config.clone();
                        self.insert(local_id, config, new_remote, version);
                        outcomes.push(RecoveryOutcome::Recovered {
                            local_id,
                            old_remote,
                            new_remote,
                        });
                    }
                    _ => outcomes.push(RecoveryOutcome::Orphaned {
                        local_id,
                        remote_id: new_remote,
                    }),
                },
                Err(code) => {
                    let open = self
                        .streams
                        .get(&local_id)
                        .is_some_and(|entry| !entry.closing);
                    if open {
                        self.remove(local_id);
                        outcomes.push(RecoveryOutcome::Dropped { local_id, code });
                    }
                }
            }
        }

        outcomes
    }

    /// Remove everything, returning open streams' remote ids for a final close.
    pub fn drain(&mut self) -> Vec<(LocalStreamId, RemoteStreamId)> {
        self.by_remote.clear();
        std::mem::take(&mut self.streams)
            .into_iter()
            .filter(|(_, entry)| !entry.closing)
            .map(|(id, entry)| (id, entry.remote_id))
            .collect()
    }

    pub fn ids(&self) -> Vec<LocalStreamId> {
        self.streams
            .iter()
            .filter(|(_, entry)| !entry.closing)
            .map(|(id, _)| *id)
            .collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.streams.len()
    }

    #[cfg(test)]
    fn indices_agree(&self) -> bool {
        self.by_remote.len() == self.streams.len()
            && self
                .by_remote
                .iter()
                .all(|(remote, local)| self.streams.get(local).map(|e| e.remote_id) == Some(*remote))
    }
}
