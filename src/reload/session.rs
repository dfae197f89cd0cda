//! Live-reload session: one per open socket.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──hello (fresh)──► Watching ──close──► Closed
//!       │
//!       └──────hello (stale)─────► Reloaded ──close──► Closed
//! ```
//!
//! The session is an actor. Inbound frames, watcher callbacks and timer
//! firings all become [`SessionEvent`]s on one queue and are handled one at
//! a time against `&mut` state, so a handler always sees the latest `path`
//! and `current` after it resumes from a render.
//!
//! Every watch handle and debounce timer carries a generation. Events from a
//! superseded handle, or a timer that fired after being replaced, are
//! dropped on arrival.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::anyhow;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::debounce::{DebounceTimer, EMPTY_RECHECK_DELAY};
use super::deps::watch_paths;
use super::message::{ClientMessage, ServerMessage, parse_client};
use super::watch::{WatchBackend, WatchHandle, WatchKind};
use crate::compiler::loader::Loader;
use crate::compiler::{ParseResult, diff_markdown, page_stylesheets, parse_markdown};
use crate::config::SiteConfig;
use crate::core::{FilePath, UrlPath, file_to_url, is_not_found, url_to_file};
use crate::{debug, log};

/// Errors that end a session. Each one terminates only its own socket.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("file no longer exists: {0}")]
    SourceGone(FilePath),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Input to a session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Text frame from the browser.
    Message(String),
    /// The page source changed.
    Source { generation: u64, kind: WatchKind },
    /// A dependency of the page changed.
    Attachment { generation: u64, path: FilePath },
    /// The empty-render debounce elapsed.
    Recheck { generation: u64 },
    /// The socket closed.
    Closed,
}

/// Output of a session, in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send(ServerMessage),
    /// Drop the connection without a close handshake.
    Terminate,
}

enum SessionState {
    Uninitialized,
    /// A stale `hello` was answered with `reload`; nothing is watched.
    Reloaded,
    Watching(Box<Watching>),
    Closed,
}

struct Watching {
    /// Root-relative `.md` source.
    path: FilePath,
    current: ParseResult,
    stylesheets: BTreeSet<String>,
    source: Option<Tagged<WatchHandle>>,
    attachments: Option<Tagged<Vec<WatchHandle>>>,
    debounce: Option<Tagged<DebounceTimer>>,
}

/// A resource plus the generation its events are tagged with.
struct Tagged<T> {
    generation: u64,
    _inner: T,
}

impl<T> Tagged<T> {
    fn new(generation: u64, inner: T) -> Self {
        Self {
            generation,
            _inner: inner,
        }
    }
}

fn is_current<T>(slot: &Option<Tagged<T>>, generation: u64) -> bool {
    slot.as_ref().is_some_and(|t| t.generation == generation)
}

/// Everything a handler needs besides the session state.
struct Context<B> {
    config: Arc<SiteConfig>,
    backend: Arc<B>,
    events: UnboundedSender<SessionEvent>,
    outbound: UnboundedSender<Outbound>,
    generation: u64,
}

/// A live-reload session bound to one socket.
pub struct Session<B> {
    ctx: Context<B>,
    state: SessionState,
}

impl<B: WatchBackend> Session<B> {
    /// `events` must feed the receiver later passed to [`Session::run`];
    /// watchers and timers post to it.
    pub fn new(
        config: Arc<SiteConfig>,
        backend: Arc<B>,
        events: UnboundedSender<SessionEvent>,
        outbound: UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            ctx: Context {
                config,
                backend,
                events,
                outbound,
                generation: 0,
            },
            state: SessionState::Uninitialized,
        }
    }

    /// Process events until the socket closes or an error ends the session.
    pub async fn run(mut self, mut inbox: UnboundedReceiver<SessionEvent>) {
        while let Some(event) = inbox.recv().await {
            if matches!(event, SessionEvent::Closed) {
                break;
            }
            if let Err(e) = self.handle(event).await {
                log!("socket"; "{e}");
                let _ = self.ctx.outbound.send(Outbound::Terminate);
                break;
            }
        }
        self.close();
    }

    /// Drop watchers and the pending timer. Idempotent.
    fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    async fn handle(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::Message(text) => self.on_message(&text).await,
            SessionEvent::Source { generation, kind } => {
                let SessionState::Watching(w) = &mut self.state else {
                    return Ok(());
                };
                if !is_current(&w.source, generation) {
                    return Ok(());
                }
                if kind == WatchKind::Rename {
                    // Old handle goes first; the file may have been replaced.
                    w.source = None;
                    match self.ctx.watch_source(&w.path) {
                        Ok(handle) => w.source = Some(handle),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            return Err(SessionError::SourceGone(w.path.clone()));
                        }
                        Err(e) => return Err(anyhow::Error::from(e).into()),
                    }
                }
                self.ctx.change(w, false).await
            }
            SessionEvent::Attachment { generation, path } => {
                let SessionState::Watching(w) = &mut self.state else {
                    return Ok(());
                };
                if !is_current(&w.attachments, generation) {
                    return Ok(());
                }
                let name = file_to_url(&path);
                let cells = &w.current.cells;
                if cells.iter().any(|c| c.imports.iter().any(|i| i.name == name)) {
                    // Import hashes are baked into the cells; recompile.
                    return self.ctx.change(w, false).await;
                }
                let cell_ids: Vec<String> = cells
                    .iter()
                    .filter(|c| c.files.iter().any(|f| f.name == name))
                    .map(|c| c.id.clone())
                    .collect();
                if !cell_ids.is_empty() {
                    self.ctx.send(ServerMessage::Refresh { cell_ids });
                }
                Ok(())
            }
            SessionEvent::Recheck { generation } => {
                let SessionState::Watching(w) = &mut self.state else {
                    return Ok(());
                };
                if !is_current(&w.debounce, generation) {
                    return Ok(());
                }
                w.debounce = None;
                self.ctx.change(w, true).await
            }
            SessionEvent::Closed => Ok(()),
        }
    }

    async fn on_message(&mut self, text: &str) -> Result<(), SessionError> {
        debug!("socket"; "↑ {text}");
        match parse_client(text)? {
            Some(ClientMessage::Hello { path, hash }) => self.hello(&path, &hash).await,
            None => {
                debug!("socket"; "ignoring message: {text}");
                Ok(())
            }
        }
    }

    async fn hello(&mut self, url: &UrlPath, hash: &str) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Uninitialized) {
            return Err(SessionError::Protocol("already watching".into()));
        }
        let path = source_path(url)?;
        let current = self.ctx.render(&path).await?;

        if current.hash != hash {
            self.ctx.send(ServerMessage::Reload);
            self.state = SessionState::Reloaded;
            return Ok(());
        }

        let stylesheets = self.ctx.stylesheets(&path, &current);
        let attachments = self.ctx.watch_attachments(&current);
        let source = self
            .ctx
            .watch_source(&path)
            .map_err(|e| anyhow!("Failed to watch {path}: {e}"))?;

        self.state = SessionState::Watching(Box::new(Watching {
            path,
            current,
            stylesheets,
            source: Some(source),
            attachments: Some(attachments),
            debounce: None,
        }));
        Ok(())
    }
}

impl<B: WatchBackend> Context<B> {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn send(&self, message: ServerMessage) {
        debug!("socket"; "↓ {}", message.to_json());
        let _ = self.outbound.send(Outbound::Send(message));
    }

    async fn render(&self, path: &FilePath) -> anyhow::Result<ParseResult> {
        let root = self.config.root().to_path_buf();
        let path = path.clone();
        tokio::task::spawn_blocking(move || parse_markdown(&root, &path))
            .await
            .map_err(|e| anyhow!("render task failed: {e}"))?
    }

    fn stylesheets(&self, path: &FilePath, parse: &ParseResult) -> BTreeSet<String> {
        page_stylesheets(&self.config, file_to_url(path).as_str(), parse)
    }

    /// Reparse and push whatever changed.
    async fn change(&mut self, w: &mut Watching, force: bool) -> Result<(), SessionError> {
        let updated = match self.render(&w.path).await {
            Ok(updated) => updated,
            Err(e) if is_not_found(&e) => {
                // A rename event follows if the file is really gone.
                debug!("watch"; "{} is missing", w.path);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // Editors can expose a truncated file mid-save.
        if !force && updated.html.is_empty() {
            if w.debounce.is_none() {
                let generation = self.next_generation();
                let events = self.events.clone();
                let timer = DebounceTimer::schedule(EMPTY_RECHECK_DELAY, move || {
                    let _ = events.send(SessionEvent::Recheck { generation });
                });
                w.debounce = Some(Tagged::new(generation, timer));
            }
            return Ok(());
        }
        w.debounce = None;

        if updated.hash == w.current.hash {
            return Ok(());
        }

        let stylesheets = self.stylesheets(&w.path, &updated);
        for href in w.stylesheets.difference(&stylesheets) {
            self.send(ServerMessage::RemoveStylesheet { href: href.clone() });
        }
        for href in stylesheets.difference(&w.stylesheets) {
            self.send(ServerMessage::AddStylesheet { href: href.clone() });
        }
        self.send(ServerMessage::Update {
            diff: diff_markdown(&w.current, &updated),
            previous_hash: w.current.hash.clone(),
            updated_hash: updated.hash.clone(),
        });

        w.stylesheets = stylesheets;
        w.current = updated;
        w.attachments = None;
        w.attachments = Some(self.watch_attachments(&w.current));
        Ok(())
    }

    fn watch_source(&mut self, path: &FilePath) -> io::Result<Tagged<WatchHandle>> {
        let file = path.resolve(self.config.root()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid path: {path}"))
        })?;
        let generation = self.next_generation();
        let events = self.events.clone();
        let handle = self.backend.watch(
            &file,
            Arc::new(move |kind: WatchKind| {
                let _ = events.send(SessionEvent::Source { generation, kind });
            }),
        )?;
        Ok(Tagged::new(generation, handle))
    }

    /// Watch every dependency of `parse` that exists, or its data loader.
    fn watch_attachments(&mut self, parse: &ParseResult) -> Tagged<Vec<WatchHandle>> {
        let generation = self.next_generation();
        let mut handles = Vec::new();

        for dep in watch_paths(parse) {
            let Some(target) = self.attachment_file(&dep) else {
                continue;
            };
            let events = self.events.clone();
            let last_modified = Mutex::new(modified(&target));
            let watched = target.clone();
            let callback = Arc::new(move |_: WatchKind| {
                let now = modified(&watched);
                {
                    let mut last = last_modified.lock();
                    if now.is_some() && *last == now {
                        return;
                    }
                    *last = now;
                }
                let _ = events.send(SessionEvent::Attachment {
                    generation,
                    path: dep.clone(),
                });
            });
            match self.backend.watch(&target, callback) {
                Ok(handle) => handles.push(handle),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("watch"; "skipping {}: {e}", target.display());
                }
                Err(e) => log!("warning"; "cannot watch {}: {e}", target.display()),
            }
        }
        Tagged::new(generation, handles)
    }

    fn attachment_file(&self, dep: &FilePath) -> Option<PathBuf> {
        let root = self.config.root();
        let file = dep.resolve(root)?;
        if file.is_file() {
            return Some(file);
        }
        Loader::find(root, dep).and_then(|loader| loader.source_path().resolve(root))
    }
}

fn modified(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// `/a/` → `/a/index.md`, `/a/b` → `/a/b.md`.
fn source_path(url: &UrlPath) -> Result<FilePath, SessionError> {
    let path = url_to_file(&url.normalize());
    if !path.as_str().starts_with('/') {
        return Err(SessionError::Protocol(format!("Invalid path: {url}")));
    }
    let path = if path.as_str().ends_with('/') {
        path.with_suffix("index")
    } else {
        path
    };
    Ok(path.with_suffix(".md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::reload::watch::scripted::ScriptedBackend;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::{self, error::TryRecvError};

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Harness {
        dir: TempDir,
        backend: Arc<ScriptedBackend>,
        events: UnboundedSender<SessionEvent>,
        outbound: UnboundedReceiver<Outbound>,
        task: tokio::task::JoinHandle<()>,
        clock: u64,
    }

    impl Harness {
        fn start(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (name, content) in files {
                let path = dir.path().join(name);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            let config = Arc::new(test_config(dir.path(), ""));
            let backend = Arc::new(ScriptedBackend::default());
            let (events, inbox) = mpsc::unbounded_channel();
            let (out_tx, outbound) = mpsc::unbounded_channel();
            let session = Session::new(config, Arc::clone(&backend), events.clone(), out_tx);
            let task = tokio::spawn(session.run(inbox));
            Self {
                dir,
                backend,
                events,
                outbound,
                task,
                clock: 0,
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn hash(&self, name: &str) -> String {
            parse_markdown(self.dir.path(), &FilePath::new(format!("/{name}")))
                .unwrap()
                .hash
        }

        fn send(&self, text: &str) {
            self.events.send(SessionEvent::Message(text.to_string())).unwrap();
        }

        fn hello(&self, path: &str, hash: &str) {
            let frame = serde_json::json!({"type": "hello", "path": path, "hash": hash});
            self.send(&frame.to_string());
        }

        /// Rewrite a file with a strictly newer modification time.
        fn write(&mut self, name: &str, content: &str) {
            self.clock += 1;
            let path = self.path(name);
            fs::write(&path, content).unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::now() + Duration::from_secs(self.clock))
                .unwrap();
        }

        fn fire(&self, name: &str, kind: WatchKind) {
            self.backend.fire(&self.path(name), kind);
        }

        async fn watching(&self, name: &str) {
            let path = self.path(name);
            tokio::time::timeout(TIMEOUT, async {
                while self.backend.live(Some(path.as_path())) == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("watch established");
        }

        async fn next(&mut self) -> Outbound {
            tokio::time::timeout(TIMEOUT, self.outbound.recv())
                .await
                .expect("message before timeout")
                .expect("session still running")
        }

        /// Nothing else arrives within a generous window.
        async fn assert_quiet(&mut self) {
            tokio::time::sleep(Duration::from_millis(400)).await;
            match self.outbound.try_recv() {
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
                Ok(message) => panic!("unexpected message: {message:?}"),
            }
        }
    }

    fn update_hashes(message: Outbound) -> (String, String) {
        match message {
            Outbound::Send(ServerMessage::Update {
                previous_hash,
                updated_hash,
                ..
            }) => (previous_hash, updated_hash),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_edit_sends_single_update() {
        let mut h = Harness::start(&[("index.md", "# Home\n\nOne")]);
        let before = h.hash("index.md");
        h.hello("/", &before);
        h.watching("index.md").await;

        h.write("index.md", "# Home\n\nTwo");
        h.fire("index.md", WatchKind::Change);

        let (previous, updated) = update_hashes(h.next().await);
        assert_eq!(previous, before);
        assert_eq!(updated, h.hash("index.md"));
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_unchanged_hash_is_silent() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", &h.hash("a.md"));
        h.watching("a.md").await;

        h.fire("a.md", WatchKind::Change);
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_stylesheet_messages_precede_update() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", &h.hash("a.md"));
        h.watching("a.md").await;

        h.write("a.md", "---\ntheme: slate\n---\n# A\n\n```js\nInputs.text()\n```\n");
        h.fire("a.md", WatchKind::Change);

        assert_eq!(
            h.next().await,
            Outbound::Send(ServerMessage::RemoveStylesheet {
                href: "./_observablehq/theme-air,near-midnight.css".into()
            })
        );
        assert_eq!(
            h.next().await,
            Outbound::Send(ServerMessage::AddStylesheet {
                href: "./_observablehq/stdlib/inputs.css".into()
            })
        );
        assert_eq!(
            h.next().await,
            Outbound::Send(ServerMessage::AddStylesheet {
                href: "./_observablehq/theme-slate.css".into()
            })
        );
        update_hashes(h.next().await);
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_stale_hello_reloads_without_watching() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", "stale");

        assert_eq!(h.next().await, Outbound::Send(ServerMessage::Reload));
        assert_eq!(h.backend.live(None), 0);

        h.write("a.md", "# Changed");
        h.fire("a.md", WatchKind::Change);
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_file_attachment_refreshes_referencing_cells() {
        let page = "```js\nconst a = FileAttachment(\"data.csv\").text();\n```\n\n\
                    ```js\n1 + 1\n```\n\n\
                    ```js\nconst b = FileAttachment(\"data.csv\").csv();\n```\n";
        let mut h = Harness::start(&[("index.md", page), ("data.csv", "x\n1\n")]);
        h.hello("/", &h.hash("index.md"));
        h.watching("data.csv").await;

        let parse = parse_markdown(h.dir.path(), &FilePath::new("/index.md")).unwrap();
        let expected = vec![parse.cells[0].id.clone(), parse.cells[2].id.clone()];

        h.write("data.csv", "x\n2\n");
        h.fire("data.csv", WatchKind::Change);

        assert_eq!(
            h.next().await,
            Outbound::Send(ServerMessage::Refresh { cell_ids: expected })
        );
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_unmodified_attachment_is_ignored() {
        let page = "```js\nconst a = FileAttachment(\"data.csv\").text();\n```\n";
        let mut h = Harness::start(&[("index.md", page), ("data.csv", "x")]);
        h.hello("/", &h.hash("index.md"));
        h.watching("data.csv").await;

        h.fire("data.csv", WatchKind::Change);
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_imported_module_triggers_update() {
        let page = "```js\nimport {x} from \"./lib.js\";\n```\n";
        let mut h = Harness::start(&[("index.md", page), ("lib.js", "export const x = 1;")]);
        let before = h.hash("index.md");
        h.hello("/", &before);
        h.watching("lib.js").await;

        h.write("lib.js", "export const x = 2;");
        h.fire("lib.js", WatchKind::Change);

        let (previous, updated) = update_hashes(h.next().await);
        assert_eq!(previous, before);
        assert_ne!(updated, before);
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_transient_empty_render_is_skipped() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", &h.hash("a.md"));
        h.watching("a.md").await;

        h.write("a.md", "");
        h.fire("a.md", WatchKind::Change);
        h.fire("a.md", WatchKind::Change);
        h.write("a.md", "# Settled");
        h.fire("a.md", WatchKind::Change);

        let (_, updated) = update_hashes(h.next().await);
        assert_eq!(updated, h.hash("a.md"));
        h.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_persistently_empty_page_updates_after_debounce() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        let before = h.hash("a.md");
        h.hello("/a", &before);
        h.watching("a.md").await;

        h.write("a.md", "");
        h.fire("a.md", WatchKind::Change);

        match h.next().await {
            Outbound::Send(ServerMessage::Update {
                diff, previous_hash, ..
            }) => {
                assert_eq!(previous_hash, before);
                assert_eq!(diff.html.as_deref(), Some(""));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_debounce_after_close_is_silent() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", &h.hash("a.md"));
        h.watching("a.md").await;

        h.write("a.md", "");
        h.fire("a.md", WatchKind::Change);
        h.events.send(SessionEvent::Closed).unwrap();

        tokio::time::timeout(TIMEOUT, &mut h.task).await.unwrap().unwrap();
        tokio::time::sleep(EMPTY_RECHECK_DELAY * 2).await;
        assert_eq!(h.outbound.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(h.backend.live(None), 0);
    }

    #[tokio::test]
    async fn test_rename_rewatches_replaced_file() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", &h.hash("a.md"));
        h.watching("a.md").await;

        h.write("a.md", "# Replaced");
        h.fire("a.md", WatchKind::Rename);

        update_hashes(h.next().await);
        assert_eq!(h.backend.live(Some(h.path("a.md").as_path())), 1);
    }

    #[tokio::test]
    async fn test_deleted_source_terminates() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", &h.hash("a.md"));
        h.watching("a.md").await;

        fs::remove_file(h.path("a.md")).unwrap();
        h.fire("a.md", WatchKind::Rename);

        assert_eq!(h.next().await, Outbound::Terminate);
        tokio::time::timeout(TIMEOUT, &mut h.task).await.unwrap().unwrap();
        assert_eq!(h.backend.live(None), 0);
    }

    #[tokio::test]
    async fn test_second_hello_terminates() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        let hash = h.hash("a.md");
        h.hello("/a", &hash);
        h.hello("/a", &hash);
        assert_eq!(h.next().await, Outbound::Terminate);
    }

    #[tokio::test]
    async fn test_hello_after_reload_terminates() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.hello("/a", "stale");
        assert_eq!(h.next().await, Outbound::Send(ServerMessage::Reload));

        let hash = h.hash("a.md");
        h.hello("/a", &hash);
        assert_eq!(h.next().await, Outbound::Terminate);
        assert_eq!(h.backend.live(None), 0);
    }

    #[tokio::test]
    async fn test_invalid_frame_terminates() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.send("not json");
        assert_eq!(h.next().await, Outbound::Terminate);
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let mut h = Harness::start(&[("a.md", "# A")]);
        h.send(r#"{"type":"ping"}"#);
        h.hello("/a", "stale");
        assert_eq!(h.next().await, Outbound::Send(ServerMessage::Reload));
    }

    #[tokio::test]
    async fn test_missing_page_terminates() {
        let mut h = Harness::start(&[]);
        h.hello("/missing", "x");
        assert_eq!(h.next().await, Outbound::Terminate);
    }

    #[test]
    fn test_source_path() {
        let path = |url: &str| source_path(&UrlPath::new(url)).unwrap().to_string();
        assert_eq!(path("/"), "/index.md");
        assert_eq!(path("/a/"), "/a/index.md");
        assert_eq!(path("/a/b"), "/a/b.md");
        assert_eq!(path("/a/../b"), "/b.md");
        assert!(source_path(&UrlPath::new("a")).is_err());
    }

    #[test]
    fn test_generation_guard() {
        let slot = Some(Tagged::new(3, ()));
        assert!(is_current(&slot, 3));
        assert!(!is_current(&slot, 2));
        assert!(!is_current::<()>(&None, 3));
    }
}
