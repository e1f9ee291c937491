use super::*;
use crate::modules::bridge::state::BridgePhase;
use crate::modules::error::code::ErrorCode;
use crate::modules::mime::{MailBody, MimePart, TransferEncoding};
use crate::modules::transport::FetchedMail;
use crate::raise_error;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use tokio::sync::{Mutex, Notify};

const ROOM: &str = "!bridged:example.org";

fn plain(text: &str) -> MailBody {
    MailBody::Parts(vec![MimePart {
        content_type: "text/plain".into(),
        charset: None,
        transfer_encoding: TransferEncoding::Identity,
        body: text.as_bytes().to_vec(),
    }])
}

fn mail(from: Option<&str>, text: &str) -> FetchedMail {
    FetchedMail {
        from: from.map(String::from),
        subject: Some("test".into()),
        body: plain(text),
    }
}

#[derive(Default)]
struct FakeMailbox {
    messages: Vec<(MessageHandle, FetchedMail)>,
    broken_fetch: HashSet<MessageHandle>,
    fail_open: bool,
    fail_search: bool,
    fail_mark_seen: bool,
    seen: Mutex<Vec<MessageHandle>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    /// When set, `search_unseen` signals `entered` and waits on `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

#[async_trait]
impl MailboxSource for FakeMailbox {
    type Session = ();

    async fn open_session(&self) -> BridgeResult<()> {
        if self.fail_open {
            return Err(raise_error!(
                "connection refused".into(),
                ErrorCode::NetworkError
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search_unseen(&self, _: &mut ()) -> BridgeResult<Vec<MessageHandle>> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if self.fail_search {
            return Err(raise_error!(
                "SEARCH rejected".into(),
                ErrorCode::ImapCommandFailed
            ));
        }
        let seen = self.seen.lock().await;
        Ok(self
            .messages
            .iter()
            .map(|(handle, _)| *handle)
            .filter(|handle| !seen.contains(handle))
            .collect())
    }

    async fn fetch_text_and_headers(
        &self,
        _: &mut (),
        handle: MessageHandle,
    ) -> BridgeResult<FetchedMail> {
        if self.broken_fetch.contains(&handle) {
            return Err(raise_error!(
                "fetch failed".into(),
                ErrorCode::ImapCommandFailed
            ));
        }
        self.messages
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, mail)| mail.clone())
            .ok_or_else(|| raise_error!("gone".into(), ErrorCode::ResourceNotFound))
    }

    async fn mark_seen(&self, _: &mut (), handle: MessageHandle) -> BridgeResult<()> {
        if self.fail_mark_seen {
            return Err(raise_error!(
                "STORE rejected".into(),
                ErrorCode::ImapCommandFailed
            ));
        }
        self.seen.lock().await.push(handle);
        Ok(())
    }

    async fn close_session(&self, _: ()) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeRoom {
    fail_on_text: Option<String>,
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl RoomSink for FakeRoom {
    async fn send_text(
        &self,
        sender: &VirtualIdentity,
        room_id: &str,
        text: &str,
    ) -> BridgeResult<()> {
        if self.fail_on_text.as_deref() == Some(text) {
            return Err(raise_error!(
                "room rejected the message".into(),
                ErrorCode::MatrixRequestFailed
            ));
        }
        self.sent
            .lock()
            .await
            .push((sender.user_id(), room_id.to_string(), text.to_string()));
        Ok(())
    }
}

fn ready_state() -> Arc<SessionState> {
    let state = Arc::new(SessionState::new(
        ROOM,
        VirtualIdentity::new("mailbot", "example.org"),
    ));
    state.set_phase(BridgePhase::Ready);
    state
}

fn poller(
    source: FakeMailbox,
    room: Arc<FakeRoom>,
    state: Arc<SessionState>,
) -> MailPoller<FakeMailbox> {
    MailPoller::new(
        source,
        room,
        IdentityMapper::new("mail_", "example.org"),
        state,
        PollerConfig {
            room_id: ROOM.into(),
            interval: Duration::from_secs(60),
        },
    )
}

#[tokio::test]
async fn failed_delivery_leaves_only_that_message_unseen() {
    let source = FakeMailbox {
        messages: vec![
            (MessageHandle(1), mail(Some("a@example.com"), "one")),
            (MessageHandle(2), mail(Some("b@example.com"), "two")),
            (MessageHandle(3), mail(Some("c@example.com"), "three")),
        ],
        ..Default::default()
    };
    let room = Arc::new(FakeRoom {
        fail_on_text: Some("two".into()),
        ..Default::default()
    });
    let poller = poller(source, room.clone(), ready_state());

    let outcome = poller.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Completed(TickSummary {
            found: 3,
            delivered: 2,
            failed: 1
        })
    );
    assert_eq!(
        *poller.source.seen.lock().await,
        vec![MessageHandle(1), MessageHandle(3)]
    );
    let sent = room.sent.lock().await;
    let texts: Vec<_> = sent.iter().map(|(_, _, text)| text.as_str()).collect();
    assert_eq!(texts, ["one", "three"]);
    assert_eq!(sent[0].0, "@mail_a_example_com:example.org");
    assert_eq!(sent[0].1, ROOM);
    assert_eq!(poller.source.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unseen_message_is_retried_on_next_tick() {
    let source = FakeMailbox {
        messages: vec![(MessageHandle(7), mail(Some("a@example.com"), "retry me"))],
        ..Default::default()
    };
    let room = Arc::new(FakeRoom {
        fail_on_text: Some("retry me".into()),
        ..Default::default()
    });
    let poller = poller(source, room, ready_state());

    for _ in 0..2 {
        let outcome = poller.tick().await;
        assert!(matches!(
            outcome,
            TickOutcome::Completed(TickSummary { found: 1, failed: 1, .. })
        ));
    }
    assert!(poller.source.seen.lock().await.is_empty());
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = FakeMailbox {
        messages: vec![(MessageHandle(1), mail(Some("a@example.com"), "hello"))],
        gate: Some((entered.clone(), release.clone())),
        ..Default::default()
    };
    let room = Arc::new(FakeRoom::default());
    let state = ready_state();
    let poller = Arc::new(poller(source, room, state.clone()));

    let first = tokio::spawn({
        let poller = poller.clone();
        async move { poller.tick().await }
    });
    entered.notified().await;

    assert_eq!(poller.tick().await, TickOutcome::Skipped);
    assert_eq!(poller.source.opened.load(Ordering::SeqCst), 1);
    assert_eq!(state.skipped_polls(), 1);
    assert!(state.last_poll().is_none());

    release.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, TickOutcome::Completed(_)));
    assert_eq!(poller.source.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn guard_is_released_after_a_tick() {
    let source = FakeMailbox::default();
    let poller = poller(source, Arc::new(FakeRoom::default()), ready_state());
    for _ in 0..3 {
        assert_eq!(
            poller.tick().await,
            TickOutcome::Completed(TickSummary::default())
        );
    }
    assert_eq!(poller.source.opened.load(Ordering::SeqCst), 3);
    assert_eq!(poller.source.closed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn nothing_happens_before_ready() {
    let state = Arc::new(SessionState::new(
        ROOM,
        VirtualIdentity::new("mailbot", "example.org"),
    ));
    state.set_phase(BridgePhase::JoiningRoom);
    let poller = poller(FakeMailbox::default(), Arc::new(FakeRoom::default()), state);

    assert_eq!(poller.tick().await, TickOutcome::NotReady);
    assert_eq!(poller.source.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_failures_are_counted() {
    let source = FakeMailbox {
        fail_open: true,
        ..Default::default()
    };
    let state = ready_state();
    let poller = poller(source, Arc::new(FakeRoom::default()), state.clone());

    assert_eq!(poller.tick().await, TickOutcome::SessionFailed);
    assert_eq!(poller.tick().await, TickOutcome::SessionFailed);
    assert_eq!(poller.consecutive_failures(), 2);
    let report = state.last_poll().unwrap();
    assert!(matches!(
        report.outcome,
        PollOutcome::SessionFailed {
            consecutive_failures: 2,
            ..
        }
    ));
    assert_eq!(poller.source.closed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_text_and_missing_sender_use_placeholders() {
    let source = FakeMailbox {
        messages: vec![(
            MessageHandle(4),
            FetchedMail {
                from: None,
                subject: None,
                body: MailBody::Raw(b"no mime sections here".to_vec()),
            },
        )],
        ..Default::default()
    };
    let room = Arc::new(FakeRoom::default());
    let poller = poller(source, room.clone(), ready_state());

    poller.tick().await;
    let sent = room.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "@mail_unknown_sender:example.org");
    assert_eq!(sent[0].2, EMPTY_BODY_PLACEHOLDER);
    assert_eq!(*poller.source.seen.lock().await, vec![MessageHandle(4)]);
}

#[tokio::test]
async fn fetch_error_skips_message_and_continues() {
    let source = FakeMailbox {
        messages: vec![
            (MessageHandle(1), mail(Some("a@example.com"), "first")),
            (MessageHandle(2), mail(Some("b@example.com"), "second")),
        ],
        broken_fetch: HashSet::from([MessageHandle(1)]),
        ..Default::default()
    };
    let poller = poller(source, Arc::new(FakeRoom::default()), ready_state());

    let outcome = poller.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Completed(TickSummary {
            found: 2,
            delivered: 1,
            failed: 1
        })
    );
    assert_eq!(*poller.source.seen.lock().await, vec![MessageHandle(2)]);
}

#[tokio::test]
async fn search_failure_fails_the_session_and_closes_it() {
    let source = FakeMailbox {
        messages: vec![(MessageHandle(1), mail(Some("a@example.com"), "hello"))],
        fail_search: true,
        ..Default::default()
    };
    let room = Arc::new(FakeRoom::default());
    let state = ready_state();
    let poller = poller(source, room.clone(), state.clone());

    assert_eq!(poller.tick().await, TickOutcome::SessionFailed);
    assert_eq!(poller.source.opened.load(Ordering::SeqCst), 1);
    assert_eq!(poller.source.closed.load(Ordering::SeqCst), 1);
    assert_eq!(poller.consecutive_failures(), 1);
    assert!(room.sent.lock().await.is_empty());
    assert!(matches!(
        state.last_poll().unwrap().outcome,
        PollOutcome::SessionFailed {
            consecutive_failures: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn unflagged_message_is_delivered_again_next_tick() {
    let source = FakeMailbox {
        messages: vec![(MessageHandle(3), mail(Some("a@example.com"), "again"))],
        fail_mark_seen: true,
        ..Default::default()
    };
    let room = Arc::new(FakeRoom::default());
    let poller = poller(source, room.clone(), ready_state());

    for _ in 0..2 {
        assert_eq!(
            poller.tick().await,
            TickOutcome::Completed(TickSummary {
                found: 1,
                delivered: 1,
                failed: 0
            })
        );
    }
    assert!(poller.source.seen.lock().await.is_empty());
    assert_eq!(room.sent.lock().await.len(), 2);
    assert_eq!(poller.consecutive_failures(), 0);
}

#[tokio::test]
async fn skipped_tick_keeps_the_last_real_outcome() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = FakeMailbox {
        gate: Some((entered.clone(), release.clone())),
        fail_search: true,
        ..Default::default()
    };
    let state = ready_state();
    let poller = Arc::new(poller(source, Arc::new(FakeRoom::default()), state.clone()));

    let first = tokio::spawn({
        let poller = poller.clone();
        async move { poller.tick().await }
    });
    entered.notified().await;
    release.notify_one();
    assert_eq!(first.await.unwrap(), TickOutcome::SessionFailed);

    let second = tokio::spawn({
        let poller = poller.clone();
        async move { poller.tick().await }
    });
    entered.notified().await;
    assert_eq!(poller.tick().await, TickOutcome::Skipped);

    let report = state.last_poll().unwrap();
    assert!(matches!(
        report.outcome,
        PollOutcome::SessionFailed {
            consecutive_failures: 1,
            ..
        }
    ));
    assert_eq!(state.skipped_polls(), 1);
    assert_eq!(state.diagnostics().skipped_polls, 1);

    release.notify_one();
    assert_eq!(second.await.unwrap(), TickOutcome::SessionFailed);
}
