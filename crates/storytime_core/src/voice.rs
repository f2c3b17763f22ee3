//! crates/storytime_core/src/voice.rs
//!
//! The AI voice lifecycle for the signed-in user.
//!
//! Voices live at `users/{userId}/aiVoices/{voiceId}`. The manager keeps the
//! latest snapshot of that collection and repairs the default-voice invariant
//! every time a snapshot arrives: at most one default, and when there is none
//! the earliest-created ready voice is promoted.

use crate::domain::{AiVoice, User, VoiceStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::{
    fields_of, AuthSession, Document, Notifier, OrderBy, PortError, PortResult, QuerySnapshot,
    RemoteStore, SnapshotStream,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub fn voices_collection(user_id: &str) -> String {
    format!("users/{}/aiVoices", user_id)
}

pub fn voice_path(user_id: &str, voice_id: &str) -> String {
    format!("{}/{}", voices_collection(user_id), voice_id)
}

//=========================================================================================
// "Impure" Document Record
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceRecord {
    user_id: String,
    name: String,
    status: VoiceStatus,
    #[serde(default)]
    is_default: bool,
}

impl VoiceRecord {
    fn to_domain(self, doc: &Document) -> AiVoice {
        AiVoice {
            id: doc.id.clone(),
            user_id: self.user_id,
            name: self.name,
            status: self.status,
            is_default: self.is_default,
            created_at: doc.create_time,
            updated_at: doc.update_time,
        }
    }
}

pub fn voice_from_document(doc: &Document) -> PortResult<AiVoice> {
    let record: VoiceRecord = serde_json::from_value(doc.fields.clone().into())
        .map_err(|e| PortError::Unexpected(format!("malformed voice {}: {}", doc.path, e)))?;
    Ok(record.to_domain(doc))
}

/// Converts a snapshot, skipping documents that do not parse as voices.
pub fn voices_from_snapshot(snapshot: &QuerySnapshot) -> Vec<AiVoice> {
    voices_from_documents(&snapshot.documents)
}

fn voices_from_documents(docs: &[Document]) -> Vec<AiVoice> {
    docs.iter()
        .filter_map(|doc| match voice_from_document(doc) {
            Ok(voice) => Some(voice),
            Err(e) => {
                warn!(error = %e, "Skipping voice document.");
                None
            }
        })
        .collect()
}

//=========================================================================================
// Default Reconciliation (pure)
//=========================================================================================

/// The corrective write that restores the default-voice invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRepair {
    pub promote: Option<String>,
    pub demote: Vec<String>,
}

/// Works out what, if anything, must change so that the voice list has at
/// most one default, and exactly one whenever a ready voice exists.
///
/// With several defaults the most recently written one is kept. With none,
/// the earliest-created ready voice is promoted (ties broken by id).
pub fn reconcile_default(voices: &[AiVoice]) -> Option<DefaultRepair> {
    let mut defaults: Vec<&AiVoice> = voices.iter().filter(|v| v.is_default).collect();
    match defaults.len() {
        1 => None,
        0 => voices
            .iter()
            .filter(|v| v.is_ready())
            .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
            .map(|v| DefaultRepair {
                promote: Some(v.id.clone()),
                demote: Vec::new(),
            }),
        _ => {
            defaults.sort_by(|a, b| (b.updated_at, &b.id).cmp(&(a.updated_at, &a.id)));
            Some(DefaultRepair {
                promote: None,
                demote: defaults[1..].iter().map(|v| v.id.clone()).collect(),
            })
        }
    }
}

//=========================================================================================
// VoiceManager
//=========================================================================================

pub struct VoiceManager {
    store: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthSession>,
    notifier: Arc<dyn Notifier>,
    voices: watch::Sender<Vec<AiVoice>>,
}

impl VoiceManager {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthSession>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (voices, _) = watch::channel(Vec::new());
        Self {
            store,
            auth,
            notifier,
            voices,
        }
    }

    /// The latest voice list, oldest first.
    pub fn voices(&self) -> watch::Receiver<Vec<AiVoice>> {
        self.voices.subscribe()
    }

    pub fn current_voices(&self) -> Vec<AiVoice> {
        self.voices.borrow().clone()
    }

    pub fn default_voice(&self) -> Option<AiVoice> {
        self.voices.borrow().iter().find(|v| v.is_default).cloned()
    }

    // --- Voice CRUD ---

    /// Creates a voice in `waiting`, never as the default. Returns its id.
    pub async fn create_voice(&self, name: &str) -> CoreResult<String> {
        let result = self.try_create_voice(name).await;
        self.report("create voice", result)
    }

    pub async fn rename_voice(&self, voice_id: &str, name: &str) -> CoreResult<()> {
        let result = self.try_rename_voice(voice_id, name).await;
        self.report("rename voice", result)
    }

    /// Deletes the voice. A missing default is repaired by the next snapshot.
    pub async fn delete_voice(&self, voice_id: &str) -> CoreResult<()> {
        let result = self.try_delete_voice(voice_id).await;
        self.report("delete voice", result)
    }

    /// Makes `voice_id` the only default in one atomic batch.
    pub async fn set_default(&self, voice_id: &str) -> CoreResult<()> {
        let result = self.try_set_default(voice_id).await;
        self.report("set default voice", result)
    }

    async fn try_create_voice(&self, name: &str) -> CoreResult<String> {
        let user = self.require_user()?;
        let name = validate_name(name)?;
        let fields = fields_of(json!({
            "userId": user.user_id,
            "name": name,
            "status": VoiceStatus::Waiting,
            "isDefault": false,
        }));
        let id = self
            .store
            .create(&voices_collection(&user.user_id), fields)
            .await?;
        info!(voice_id = %id, "Voice created.");
        Ok(id)
    }

    async fn try_rename_voice(&self, voice_id: &str, name: &str) -> CoreResult<()> {
        let user = self.require_user()?;
        let name = validate_name(name)?;
        self.store
            .update(
                &voice_path(&user.user_id, voice_id),
                fields_of(json!({ "name": name })),
            )
            .await?;
        debug!(voice_id, "Voice renamed.");
        Ok(())
    }

    async fn try_delete_voice(&self, voice_id: &str) -> CoreResult<()> {
        let user = self.require_user()?;
        self.store
            .delete(&voice_path(&user.user_id, voice_id))
            .await?;
        info!(voice_id, "Voice deleted.");
        Ok(())
    }

    async fn try_set_default(&self, voice_id: &str) -> CoreResult<()> {
        let user = self.require_user()?;
        let docs = self
            .store
            .list(&voices_collection(&user.user_id), OrderBy::create_time())
            .await?;
        let voices = voices_from_documents(&docs);

        let target = voices
            .iter()
            .find(|v| v.id == voice_id)
            .ok_or_else(|| CoreError::NotFound(voice_path(&user.user_id, voice_id)))?;
        if !target.is_ready() {
            return Err(CoreError::NotReady {
                voice_id: voice_id.to_string(),
            });
        }

        let demote: Vec<String> = voices
            .iter()
            .filter(|v| v.is_default && v.id != voice_id)
            .map(|v| v.id.clone())
            .collect();
        if target.is_default && demote.is_empty() {
            debug!(voice_id, "Voice is already the default.");
            return Ok(());
        }

        self.commit_default(
            &user.user_id,
            &DefaultRepair {
                promote: Some(voice_id.to_string()),
                demote,
            },
        )
        .await?;
        info!(voice_id, "Default voice changed.");
        Ok(())
    }

    // --- Live Subscription ---

    /// Publishes a snapshot to watchers and, if needed, commits the repair
    /// that restores the default-voice invariant.
    ///
    /// A repair is only written if the store still needs it: snapshots queued
    /// behind an earlier repair are stale by the time they are applied.
    pub async fn apply_snapshot(
        &self,
        user_id: &str,
        voices: Vec<AiVoice>,
    ) -> CoreResult<Option<DefaultRepair>> {
        if !self.is_signed_in_as(user_id) {
            debug!(user_id, "Ignoring voices of a user who is no longer signed in.");
            return Ok(None);
        }
        let needs_repair = reconcile_default(&voices).is_some();
        self.voices.send_replace(voices);
        if !needs_repair {
            return Ok(None);
        }

        let result = self.repair_default(user_id).await;
        self.report("repair default voice", result)
    }

    async fn repair_default(&self, user_id: &str) -> CoreResult<Option<DefaultRepair>> {
        let docs = self
            .store
            .list(&voices_collection(user_id), OrderBy::create_time())
            .await?;
        let Some(repair) = reconcile_default(&voices_from_documents(&docs)) else {
            debug!("Default voice already repaired.");
            return Ok(None);
        };
        if !self.is_signed_in_as(user_id) {
            debug!(user_id, "Signed-in user changed; repair dropped.");
            return Ok(None);
        }
        self.commit_default(user_id, &repair).await?;
        info!(
            promote = ?repair.promote,
            demote = ?repair.demote,
            "Repaired default voice."
        );
        Ok(Some(repair))
    }

    /// Starts listening to the signed-in user's voices. Snapshots are applied
    /// one at a time in arrival order until the returned guard is dropped.
    ///
    /// The listener follows sign-in changes: the previous user's voices are
    /// cleared and, if someone else signs in, their voices are loaded.
    pub async fn attach(self: &Arc<Self>) -> CoreResult<VoiceSubscription> {
        let mut auth_changes = self.auth.changes();
        let signed_in = auth_changes.borrow_and_update().clone().ok_or(CoreError::Auth);
        let user = self.report("subscribe to voices", signed_in)?;
        let stream = self.subscribe_for(&user.user_id).await?;

        let token = CancellationToken::new();
        let cancel = token.clone();
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut user_id = Some(user.user_id);
            let mut stream = Some(stream);
            info!(user_id = ?user_id, "Voice listener started.");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = auth_changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = auth_changes
                            .borrow_and_update()
                            .as_ref()
                            .map(|u| u.user_id.clone());
                        if next != user_id {
                            stream = manager
                                .switch_user(user_id.as_deref(), next.as_deref())
                                .await;
                            user_id = next;
                        }
                    }
                    next = next_snapshot(&mut stream) => match next {
                        Some(Ok(snapshot)) => {
                            let Some(user_id) = user_id.as_deref() else {
                                continue;
                            };
                            let voices = voices_from_snapshot(&snapshot);
                            // Failures are already reported; the next snapshot reconciles again.
                            let _ = manager.apply_snapshot(user_id, voices).await;
                        }
                        Some(Err(e)) => {
                            let _: CoreResult<()> =
                                manager.report("receive voice snapshot", Err(e.into()));
                        }
                        None => break,
                    },
                }
            }
            info!(user_id = ?user_id, "Voice listener stopped.");
        });

        Ok(VoiceSubscription {
            token,
            handle: Some(handle),
        })
    }

    /// Drops the previous user's voices and subscribes to the new user's.
    async fn switch_user(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Option<SnapshotStream> {
        info!(from = ?from, to = ?to, "Signed-in user changed.");
        self.voices.send_replace(Vec::new());
        let user_id = to?;
        self.subscribe_for(user_id).await.ok()
    }

    async fn subscribe_for(&self, user_id: &str) -> CoreResult<SnapshotStream> {
        let result = self
            .store
            .subscribe(&voices_collection(user_id), OrderBy::create_time())
            .await
            .map_err(CoreError::from);
        self.report("subscribe to voices", result)
    }

    // --- Helpers ---

    async fn commit_default(&self, user_id: &str, repair: &DefaultRepair) -> CoreResult<()> {
        let mut batch = self.store.batch();
        for id in &repair.demote {
            batch.update(voice_path(user_id, id), fields_of(json!({ "isDefault": false })));
        }
        if let Some(id) = &repair.promote {
            batch.update(voice_path(user_id, id), fields_of(json!({ "isDefault": true })));
        }
        batch.commit().await?;
        Ok(())
    }

    fn require_user(&self) -> CoreResult<User> {
        self.auth.current_user().ok_or(CoreError::Auth)
    }

    fn is_signed_in_as(&self, user_id: &str) -> bool {
        self.auth
            .current_user()
            .is_some_and(|user| user.user_id == user_id)
    }

    /// Logs a failure and raises its alert. The result is passed through.
    fn report<T>(&self, action: &str, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(e) = &result {
            match e {
                CoreError::Validation(_) => debug!(action, error = %e, "Rejected input."),
                CoreError::Remote(_) => error!(action, error = %e, "Remote store failure."),
                _ => warn!(action, error = %e, "Voice operation refused."),
            }
            if let Some(alert) = e.alert() {
                self.notifier.alert(alert);
            }
        }
        result
    }
}

fn validate_name(name: &str) -> CoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("voice name is required".to_string()));
    }
    Ok(name.to_string())
}

/// The next snapshot, or pending forever while no one is signed in.
async fn next_snapshot(stream: &mut Option<SnapshotStream>) -> Option<PortResult<QuerySnapshot>> {
    match stream {
        Some(stream) => stream.next().await,
        None => futures::future::pending().await,
    }
}

/// Keeps the voice listener alive. Dropping it stops the listener.
pub struct VoiceSubscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl VoiceSubscription {
    /// Stops the listener and waits for it to finish.
    pub async fn detach(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Voice listener ended abnormally.");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for VoiceSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn voice(id: &str, status: VoiceStatus, is_default: bool, created: i64) -> AiVoice {
        AiVoice {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: id.to_uppercase(),
            status,
            is_default,
            created_at: at(created),
            updated_at: at(created),
        }
    }

    #[test]
    fn earliest_ready_voice_is_promoted() {
        let voices = vec![
            voice("b", VoiceStatus::Ready, false, 2),
            voice("a", VoiceStatus::Ready, false, 1),
        ];
        let repair = reconcile_default(&voices).unwrap();
        assert_eq!(repair.promote.as_deref(), Some("a"));
        assert!(repair.demote.is_empty());
    }

    #[test]
    fn creation_ties_break_by_id() {
        let voices = vec![
            voice("z", VoiceStatus::Ready, false, 5),
            voice("m", VoiceStatus::Ready, false, 5),
        ];
        assert_eq!(
            reconcile_default(&voices).unwrap().promote.as_deref(),
            Some("m")
        );
    }

    #[test]
    fn voices_that_are_not_ready_are_never_promoted() {
        let voices = vec![
            voice("a", VoiceStatus::Waiting, false, 1),
            voice("b", VoiceStatus::Processing, false, 2),
            voice("c", VoiceStatus::Failed, false, 3),
            voice("d", VoiceStatus::Ready, false, 4),
        ];
        assert_eq!(
            reconcile_default(&voices).unwrap().promote.as_deref(),
            Some("d")
        );
    }

    #[test]
    fn existing_default_means_no_repair() {
        let voices = vec![
            voice("a", VoiceStatus::Ready, false, 1),
            voice("b", VoiceStatus::Ready, true, 2),
        ];
        assert_eq!(reconcile_default(&voices), None);
    }

    #[test]
    fn no_ready_voice_leaves_zero_defaults() {
        let voices = vec![voice("a", VoiceStatus::Waiting, false, 1)];
        assert_eq!(reconcile_default(&voices), None);
        assert_eq!(reconcile_default(&[]), None);
    }

    #[test]
    fn surplus_defaults_keep_the_latest_write() {
        let mut older = voice("a", VoiceStatus::Ready, true, 1);
        older.updated_at = at(10);
        let mut newer = voice("b", VoiceStatus::Ready, true, 2);
        newer.updated_at = at(20);
        let repair = reconcile_default(&[older, newer]).unwrap();
        assert_eq!(repair.promote, None);
        assert_eq!(repair.demote, vec!["a".to_string()]);
    }

    #[test]
    fn voice_documents_parse() {
        let doc = Document {
            id: "v1".into(),
            path: voice_path("u1", "v1"),
            fields: fields_of(json!({
                "userId": "u1",
                "name": "Bedtime voice",
                "status": "processing",
            })),
            create_time: at(1),
            update_time: at(3),
        };
        let voice = voice_from_document(&doc).unwrap();
        assert_eq!(voice.status, VoiceStatus::Processing);
        assert!(!voice.is_default);
        assert_eq!(voice.updated_at, at(3));

        let broken = Document {
            fields: fields_of(json!({ "name": "x", "status": "sleeping" })),
            ..doc
        };
        assert!(voice_from_document(&broken).is_err());
        let snapshot = QuerySnapshot {
            documents: vec![broken],
        };
        assert!(voices_from_snapshot(&snapshot).is_empty());
    }

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(validate_name("  Dad  ").unwrap(), "Dad");
        assert!(matches!(validate_name("   "), Err(CoreError::Validation(_))));
    }

    #[test]
    fn paths_nest_under_the_user() {
        assert_eq!(voices_collection("u1"), "users/u1/aiVoices");
        assert_eq!(voice_path("u1", "v9"), "users/u1/aiVoices/v9");
    }
}
